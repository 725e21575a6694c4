//! Batch scheduler integration
//!
//! Builds submit command lines for the Torque and Slurm schedulers on the
//! FAU clusters, runs them, and queries the queues for job state.

mod context;
mod slurm;
mod torque;

pub use context::{ArrayTask, JobContext};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, info};

use crate::config::{JobRequest, TargetSystem};
use crate::error::{HpcError, Result};

/// Batch scheduler flavor
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    /// PBS/Torque
    Torque,
    /// Slurm Workload Manager
    Slurm,
}

impl SchedulerKind {
    /// Detect the scheduler from the environment
    ///
    /// Checks the job environment variables first (`PBS_JOBID`,
    /// `SLURM_JOB_ID`), then falls back to probing the PATH for the
    /// submit binaries.
    pub fn detect() -> Option<Self> {
        if env::var("SLURM_JOB_ID").is_ok() {
            return Some(Self::Slurm);
        }
        if env::var("PBS_JOBID").is_ok() {
            return Some(Self::Torque);
        }
        if which("sbatch").is_some() {
            return Some(Self::Slurm);
        }
        if which("qsub").is_some() {
            return Some(Self::Torque);
        }
        None
    }

    /// Detect the scheduler, failing if none is present
    pub fn detect_required() -> Result<Self> {
        Self::detect().ok_or(HpcError::NoSchedulerDetected)
    }

    /// Get the scheduler name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Torque => "Torque",
            Self::Slurm => "Slurm",
        }
    }
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Job state as reported by the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Waiting in the queue
    Pending,
    /// Currently running
    Running,
    /// Finished successfully
    Completed,
    /// Finished with a failure
    Failed,
    /// Cancelled by the user or an operator
    Cancelled,
    /// State could not be determined
    Unknown,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Scheduler interface for a specific cluster
///
/// Dispatches into the Torque or Slurm backend depending on `kind`.
pub struct Scheduler {
    kind: SchedulerKind,
    system: TargetSystem,
}

impl Scheduler {
    /// Create a scheduler interface for a cluster, detecting the flavor
    pub fn detect(system: TargetSystem) -> Result<Self> {
        Ok(Self {
            kind: SchedulerKind::detect_required()?,
            system,
        })
    }

    /// Create a scheduler interface for a specific flavor and cluster
    pub fn new(kind: SchedulerKind, system: TargetSystem) -> Self {
        Self { kind, system }
    }

    /// Get the scheduler flavor
    pub fn kind(&self) -> SchedulerKind {
        self.kind
    }

    /// Get the target cluster
    pub fn system(&self) -> TargetSystem {
        self.system
    }

    /// Build the submit command line for a job request
    ///
    /// The returned string is ready to be run through the shell. Fails if
    /// the scheduler flavor is not available on the target cluster.
    pub fn build_submit_command(&self, request: &JobRequest) -> Result<String> {
        match self.kind {
            SchedulerKind::Torque => torque::build_submit_command(self.system, request),
            SchedulerKind::Slurm => slurm::build_submit_command(self.system, request),
        }
    }

    /// Submit a job and return the scheduler-assigned job id
    pub fn submit(&self, request: &JobRequest) -> Result<String> {
        let command = self.build_submit_command(request)?;
        debug!(command = %command, "submitting job");

        let output = Command::new("sh")
            .arg("-c")
            .arg(&command)
            .output()
            .map_err(HpcError::from)?;

        if !output.status.success() {
            return Err(HpcError::command_failed(
                command,
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let job_id = match self.kind {
            SchedulerKind::Torque => torque::parse_job_id(&stdout),
            SchedulerKind::Slurm => slurm::parse_job_id(&stdout),
        };

        info!(job_id = %job_id, job_name = %request.job_name, "job submitted");
        Ok(job_id)
    }

    /// List the names of currently running jobs matching `pattern`
    ///
    /// The pattern must contain a capture group selecting the job name,
    /// e.g. `(VP_\w+)`.
    pub fn running_jobs(&self, pattern: &str) -> Result<Vec<String>> {
        match self.kind {
            SchedulerKind::Torque => torque::running_jobs(pattern),
            SchedulerKind::Slurm => slurm::running_jobs(pattern),
        }
    }

    /// Query the state of a single job
    pub fn status(&self, job_id: &str) -> Result<JobStatus> {
        match self.kind {
            SchedulerKind::Torque => torque::status(job_id),
            SchedulerKind::Slurm => slurm::status(job_id),
        }
    }

    /// Cancel a job
    pub fn cancel(&self, job_id: &str) -> Result<()> {
        let cmd = match self.kind {
            SchedulerKind::Torque => "qdel",
            SchedulerKind::Slurm => "scancel",
        };

        let output = Command::new(cmd)
            .arg(job_id)
            .output()
            .map_err(HpcError::from)?;

        if output.status.success() {
            info!(job_id = %job_id, "job cancelled");
            Ok(())
        } else {
            Err(HpcError::command_failed(
                format!("{} {}", cmd, job_id),
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }
}

/// Build the quoted `PARAMS` variable from positional script arguments
///
/// Empty entries are dropped; returns `None` if nothing remains.
pub(crate) fn params_variable(args: &[String]) -> Option<String> {
    let filtered: Vec<&str> = args
        .iter()
        .map(String::as_str)
        .filter(|a| !a.is_empty())
        .collect();

    if filtered.is_empty() {
        None
    } else {
        Some(format!("PARAMS=\"{}\"", filtered.join(" ")))
    }
}

/// Compile a job-name pattern, requiring a capture group
pub(crate) fn compile_pattern(pattern: &str) -> Result<regex::Regex> {
    let re = regex::Regex::new(pattern).map_err(|e| HpcError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;

    if re.captures_len() < 2 {
        return Err(HpcError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: "pattern must contain a capture group".to_string(),
        });
    }

    Ok(re)
}

/// Locate a binary on the PATH
pub(crate) fn which(cmd: &str) -> Option<PathBuf> {
    env::var_os("PATH").and_then(|paths| {
        env::split_paths(&paths).find_map(|dir| {
            let full_path = dir.join(cmd);
            if full_path.is_file() {
                Some(full_path)
            } else {
                None
            }
        })
    })
}

/// Run a query command and return its stdout, failing on nonzero exit
pub(crate) fn query_output(cmd: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(cmd)
        .args(args)
        .output()
        .map_err(HpcError::from)?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(HpcError::command_failed(
            format!("{} {}", cmd, args.join(" ")),
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_variable() {
        let args = vec!["path1".to_string(), "path2".to_string()];
        assert_eq!(
            params_variable(&args),
            Some("PARAMS=\"path1 path2\"".to_string())
        );
    }

    #[test]
    fn test_params_variable_drops_empty_entries() {
        let args = vec!["path1".to_string(), String::new()];
        assert_eq!(params_variable(&args), Some("PARAMS=\"path1\"".to_string()));

        let args = vec![String::new(), String::new()];
        assert_eq!(params_variable(&args), None);

        assert_eq!(params_variable(&[]), None);
    }

    #[test]
    fn test_compile_pattern_requires_capture_group() {
        assert!(compile_pattern(r"(VP_\w+)").is_ok());
        assert!(compile_pattern(r"VP_\w+").is_err());
        assert!(compile_pattern(r"(unclosed").is_err());
    }

    #[test]
    fn test_scheduler_kind_name() {
        assert_eq!(SchedulerKind::Torque.name(), "Torque");
        assert_eq!(SchedulerKind::Slurm.name(), "Slurm");
    }
}
