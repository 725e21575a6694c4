//! Configuration settings for hpc-helper
//!
//! Defines cluster profiles for the FAU HPC systems, job request
//! parameters with their defaults, and all CLI arguments.

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::deploy::DeployTarget;
use crate::error::{HpcError, Result};
use crate::scheduler::SchedulerKind;

/// FAU HPC target systems
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetSystem {
    /// Woody - general purpose throughput cluster
    #[default]
    #[value(name = "woody")]
    Woody,
    /// TinyGPU - GPU cluster
    #[value(name = "tinygpu")]
    TinyGpu,
    /// TinyFat - large-memory cluster
    #[value(name = "tinyfat")]
    TinyFat,
}

impl TargetSystem {
    /// Get the cluster name as used in hostnames and submit binaries
    pub fn name(&self) -> &'static str {
        match self {
            Self::Woody => "woody",
            Self::TinyGpu => "tinygpu",
            Self::TinyFat => "tinyfat",
        }
    }

    /// Torque submit binary for this system, `None` if Torque is unsupported
    ///
    /// TinyGPU still accepts Torque submissions through `qsub.tinygpu`, but
    /// that path is deprecated (see [`TargetSystem::torque_deprecated`]).
    pub fn torque_binary(&self) -> Option<&'static str> {
        match self {
            Self::Woody => Some("qsub"),
            Self::TinyGpu => Some("qsub.tinygpu"),
            Self::TinyFat => None,
        }
    }

    /// Slurm submit binary for this system, `None` if Slurm is unsupported
    pub fn slurm_binary(&self) -> Option<&'static str> {
        match self {
            Self::Woody => None,
            Self::TinyGpu => Some("sbatch.tinygpu"),
            Self::TinyFat => Some("sbatch.tinyfat"),
        }
    }

    /// Whether Torque submission to this system is deprecated
    pub fn torque_deprecated(&self) -> bool {
        matches!(self, Self::TinyGpu)
    }
}

impl fmt::Display for TargetSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Requested wall clock time for a batch job
///
/// Stored as whole seconds. Parses `HH:MM:SS`, `MM:SS` and `D-HH:MM:SS`,
/// and renders back in the scheduler-facing `HH:MM:SS` form
/// (`D-HH:MM:SS` past 24 hours).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Walltime(u64);

impl Walltime {
    /// Create a walltime from whole seconds
    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    /// Total requested seconds
    pub fn as_secs(&self) -> u64 {
        self.0
    }
}

impl Default for Walltime {
    fn default() -> Self {
        // 24 hours, the submit default on woody
        Self(24 * 3600)
    }
}

impl FromStr for Walltime {
    type Err = HpcError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || HpcError::InvalidWalltime(s.to_string());

        let (days, time_str) = match s.split_once('-') {
            Some((d, rest)) => (d.parse::<u64>().map_err(|_| invalid())?, rest),
            None => (0, s),
        };

        let parts: Vec<&str> = time_str.split(':').collect();
        let (hours, minutes, seconds) = match parts.len() {
            3 => (
                parts[0].parse::<u64>().map_err(|_| invalid())?,
                parts[1].parse::<u64>().map_err(|_| invalid())?,
                parts[2].parse::<u64>().map_err(|_| invalid())?,
            ),
            2 => (
                0,
                parts[0].parse::<u64>().map_err(|_| invalid())?,
                parts[1].parse::<u64>().map_err(|_| invalid())?,
            ),
            _ => return Err(invalid()),
        };

        if minutes >= 60 || seconds >= 60 {
            return Err(invalid());
        }

        Ok(Self(days * 86400 + hours * 3600 + minutes * 60 + seconds))
    }
}

impl fmt::Display for Walltime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let minutes = (self.0 % 3600) / 60;
        let secs = self.0 % 60;

        // the schedulers accept plain HH:MM:SS up to and including 24
        // hours, so exactly one day stays in the hour form
        if self.0 > 86400 {
            let days = self.0 / 86400;
            let hours = (self.0 % 86400) / 3600;
            write!(f, "{}-{:02}:{:02}:{:02}", days, hours, minutes, secs)
        } else {
            write!(f, "{:02}:{:02}:{:02}", self.0 / 3600, minutes, secs)
        }
    }
}

/// A batch job submission request
///
/// Collects everything needed to build a `qsub`/`sbatch` command line.
/// Positional `args` are passed to the job script through a single quoted
/// `PARAMS` variable; `exports` are forwarded as individual `KEY=value`
/// environment entries in insertion order.
#[derive(Debug, Clone)]
pub struct JobRequest {
    /// Job name shown in the queue
    pub job_name: String,
    /// Job script to submit
    pub script: String,
    /// Number of nodes requested
    pub nodes: u32,
    /// Tasks (Slurm) or processors (Torque ppn) per node
    pub tasks_per_node: u32,
    /// Requested wall clock time
    pub walltime: Walltime,
    /// Positional arguments for the job script (collapsed into `PARAMS`)
    pub args: Vec<String>,
    /// Environment variables exported to the job, in insertion order
    pub exports: Vec<(String, String)>,
}

impl JobRequest {
    /// Create a request with the woody defaults (1 node, 4 tasks, 24h)
    pub fn new(job_name: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            script: script.into(),
            nodes: 1,
            tasks_per_node: 4,
            walltime: Walltime::default(),
            args: Vec::new(),
            exports: Vec::new(),
        }
    }

    /// Set the number of nodes
    pub fn with_nodes(mut self, nodes: u32) -> Self {
        self.nodes = nodes;
        self
    }

    /// Set tasks (or ppn) per node
    pub fn with_tasks_per_node(mut self, tasks: u32) -> Self {
        self.tasks_per_node = tasks;
        self
    }

    /// Set the walltime
    pub fn with_walltime(mut self, walltime: Walltime) -> Self {
        self.walltime = walltime;
        self
    }

    /// Set the positional script arguments
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Append an exported environment variable
    pub fn with_export(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.exports.push((key.into(), value.into()));
        self
    }

    /// Create a request from the `submit` CLI arguments
    pub fn from_cli(args: &SubmitArgs) -> Result<Self> {
        let mut request = Self::new(&args.name, args.script.to_string_lossy().into_owned())
            .with_nodes(args.nodes)
            .with_tasks_per_node(args.tasks_per_node)
            .with_walltime(args.walltime.parse()?)
            .with_args(args.args.clone());

        for export in &args.export {
            let (key, value) = parse_export(export)?;
            request = request.with_export(key, value);
        }

        Ok(request)
    }
}

/// Parse a `KEY=value` export entry
pub fn parse_export(entry: &str) -> Result<(String, String)> {
    match entry.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(HpcError::config(format!(
            "Invalid export '{}': expected KEY=value",
            entry
        ))),
    }
}

/// hpc-helper - utilities for FAU's High Performance Cluster
#[derive(Parser, Debug, Clone)]
#[command(name = "hpc-helper")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Helper utilities for working with FAU's HPC clusters")]
#[command(long_about = r#"
Helper utilities for working with FAU's High Performance Cluster (HPC).

Builds and submits batch jobs to the Torque and Slurm schedulers, queries
running jobs, tracks per-directory job completion through hpc_status files
and sanity-checks the deployment environment.

Examples:
  hpc-helper submit jobscript.sh -N VP_01 --system woody --dry-run
  hpc-helper jobs '(VP_\w+)' --scheduler torque
  hpc-helper status 12345
  hpc-helper status-file check /path/to/subject
  hpc-helper check-env --deploy local
"#)]
pub struct CliArgs {
    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build and submit a batch job
    #[command(name = "submit")]
    Submit(SubmitArgs),

    /// List currently running jobs matching a name pattern
    #[command(name = "jobs")]
    Jobs {
        /// Job name regex; must contain a capture group, e.g. '(VP_\w+)'
        pattern: String,
        /// Scheduler to query (auto-detected if omitted)
        #[arg(long, value_enum)]
        scheduler: Option<SchedulerKind>,
        /// Emit the job list as JSON
        #[arg(long)]
        json: bool,
    },

    /// Query the status of a single job
    #[command(name = "status")]
    Status {
        /// Job id as reported at submission
        job_id: String,
        /// Scheduler to query (auto-detected if omitted)
        #[arg(long, value_enum)]
        scheduler: Option<SchedulerKind>,
    },

    /// Cancel a job
    #[command(name = "cancel")]
    Cancel {
        /// Job id as reported at submission
        job_id: String,
        /// Scheduler to use (auto-detected if omitted)
        #[arg(long, value_enum)]
        scheduler: Option<SchedulerKind>,
    },

    /// Detect the scheduler and show the surrounding job context
    #[command(name = "detect")]
    Detect {
        /// Emit the context as JSON
        #[arg(long)]
        json: bool,
    },

    /// Verify that the process runs in the expected deploy environment
    #[command(name = "check-env")]
    CheckEnv {
        /// Expected deploy target
        #[arg(long, value_enum)]
        deploy: DeployTarget,
        /// Cluster the hostname is checked against
        #[arg(long, value_enum, default_value = "woody")]
        system: TargetSystem,
    },

    /// Manage per-directory hpc_status completion files
    #[command(name = "status-file")]
    StatusFile {
        /// Action to perform
        #[command(subcommand)]
        action: StatusFileAction,
    },
}

/// Arguments for the `submit` subcommand
#[derive(Args, Debug, Clone)]
pub struct SubmitArgs {
    /// Job script to submit
    #[arg(value_name = "SCRIPT")]
    pub script: PathBuf,

    /// Job name shown in the queue
    #[arg(short = 'N', long)]
    pub name: String,

    /// Target cluster
    #[arg(long, value_enum, default_value = "woody")]
    pub system: TargetSystem,

    /// Scheduler to submit through (auto-detected if omitted)
    #[arg(long, value_enum)]
    pub scheduler: Option<SchedulerKind>,

    /// Number of nodes
    #[arg(long, default_value = "1")]
    pub nodes: u32,

    /// Tasks (Slurm) or processors (Torque ppn) per node
    #[arg(long, default_value = "4", value_name = "NUM")]
    pub tasks_per_node: u32,

    /// Wall clock time (HH:MM:SS)
    #[arg(long, default_value = "24:00:00", value_name = "TIME")]
    pub walltime: String,

    /// Environment variable exported to the job (repeatable)
    #[arg(long = "export", value_name = "KEY=VALUE")]
    pub export: Vec<String>,

    /// Print the submit command instead of running it
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Positional arguments passed to the job script via PARAMS
    #[arg(last = true, value_name = "ARGS")]
    pub args: Vec<String>,
}

/// Actions on hpc_status files
#[derive(Subcommand, Debug, Clone)]
pub enum StatusFileAction {
    /// Check whether a directory holds a successful hpc_status file
    Check {
        /// Directory containing the hpc_status file
        dir: PathBuf,
    },
    /// Write a job exit status to a directory's hpc_status file
    Write {
        /// Directory to write the hpc_status file into
        dir: PathBuf,
        /// Exit status returned by the job
        exit_status: i32,
    },
    /// Remove hpc_status files from the given directories
    Clean {
        /// Directories to clean up
        dirs: Vec<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walltime_parse() {
        assert_eq!("24:00:00".parse::<Walltime>().unwrap().as_secs(), 86400);
        assert_eq!("01:30:00".parse::<Walltime>().unwrap().as_secs(), 5400);
        assert_eq!("30:00".parse::<Walltime>().unwrap().as_secs(), 1800);
        assert_eq!(
            "1-01:01:01".parse::<Walltime>().unwrap().as_secs(),
            90061
        );

        assert!("".parse::<Walltime>().is_err());
        assert!("abc".parse::<Walltime>().is_err());
        assert!("10:99:00".parse::<Walltime>().is_err());
    }

    #[test]
    fn test_walltime_display() {
        assert_eq!(Walltime::from_secs(86400).to_string(), "24:00:00");
        assert_eq!(Walltime::from_secs(5400).to_string(), "01:30:00");
        assert_eq!(Walltime::from_secs(90061).to_string(), "1-01:01:01");
        assert_eq!(Walltime::default().to_string(), "24:00:00");
    }

    #[test]
    fn test_walltime_display_day_boundary() {
        // exactly one day stays in the hour form; anything past it
        // switches to D-HH:MM:SS
        assert_eq!(Walltime::from_secs(86400).to_string(), "24:00:00");
        assert_eq!(Walltime::from_secs(86401).to_string(), "1-00:00:01");
        assert_eq!(Walltime::from_secs(2 * 86400).to_string(), "2-00:00:00");
    }

    #[test]
    fn test_walltime_display_matches_submit_default() {
        // the default must render exactly as the scheduler expects it
        let wt: Walltime = "24:00:00".parse().unwrap();
        assert_eq!(wt, Walltime::default());
    }

    #[test]
    fn test_target_system_support() {
        assert_eq!(TargetSystem::Woody.torque_binary(), Some("qsub"));
        assert_eq!(TargetSystem::TinyGpu.torque_binary(), Some("qsub.tinygpu"));
        assert_eq!(TargetSystem::TinyFat.torque_binary(), None);

        assert_eq!(TargetSystem::Woody.slurm_binary(), None);
        assert_eq!(TargetSystem::TinyGpu.slurm_binary(), Some("sbatch.tinygpu"));
        assert_eq!(TargetSystem::TinyFat.slurm_binary(), Some("sbatch.tinyfat"));

        assert!(TargetSystem::TinyGpu.torque_deprecated());
        assert!(!TargetSystem::Woody.torque_deprecated());
    }

    #[test]
    fn test_parse_export() {
        assert_eq!(
            parse_export("SUBJECT_DIR=path3").unwrap(),
            ("SUBJECT_DIR".to_string(), "path3".to_string())
        );
        // values may contain '='
        assert_eq!(
            parse_export("OPTS=a=b").unwrap(),
            ("OPTS".to_string(), "a=b".to_string())
        );
        assert!(parse_export("NOVALUE").is_err());
        assert!(parse_export("=x").is_err());
    }

    #[test]
    fn test_job_request_defaults() {
        let req = JobRequest::new("Test_Job", "jobscript.sh");
        assert_eq!(req.nodes, 1);
        assert_eq!(req.tasks_per_node, 4);
        assert_eq!(req.walltime.to_string(), "24:00:00");
        assert!(req.args.is_empty());
        assert!(req.exports.is_empty());
    }

    #[test]
    fn test_job_request_export_order_preserved() {
        let req = JobRequest::new("Test_Job", "jobscript.sh")
            .with_export("SUBJECT_DIR", "path3")
            .with_export("TEST_PATH", "path4");
        assert_eq!(req.exports[0].0, "SUBJECT_DIR");
        assert_eq!(req.exports[1].0, "TEST_PATH");
    }
}
