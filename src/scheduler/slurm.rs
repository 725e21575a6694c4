//! Slurm backend
//!
//! Command construction and queue queries for the Slurm scheduler on
//! TinyGPU and TinyFat. Woody only runs Torque.

use regex::Regex;
use std::process::Command;

use crate::config::{JobRequest, TargetSystem};
use crate::error::{HpcError, Result};
use crate::scheduler::{compile_pattern, params_variable, query_output, JobStatus};

/// Build the `sbatch` command line for a job request
///
/// Fails with [`HpcError::UnsupportedScheduler`] if the target cluster
/// does not accept Slurm submissions.
pub fn build_submit_command(system: TargetSystem, request: &JobRequest) -> Result<String> {
    let binary = system
        .slurm_binary()
        .ok_or_else(|| HpcError::unsupported("Slurm", system.name()))?;

    let mut command = format!(
        "{} --job-name {} --nodes={} --ntasks-per-node={} --time={} --mail-type=ALL {}",
        binary,
        request.job_name,
        request.nodes,
        request.tasks_per_node,
        request.walltime,
        request.script
    );

    // sbatch forwards script arguments after the script name
    if let Some(params) = params_variable(&request.args) {
        command.push(' ');
        command.push_str(&params);
    }
    for (key, value) in &request.exports {
        command.push_str(&format!(" {}={}", key, value));
    }

    Ok(command)
}

/// Parse the job id from `sbatch` stdout
///
/// sbatch reports `Submitted batch job <id>`.
pub fn parse_job_id(stdout: &str) -> String {
    stdout
        .split_whitespace()
        .last()
        .unwrap_or("unknown")
        .to_string()
}

/// List the names of currently running jobs matching `pattern`
///
/// Runs `squeue` with a name/state format and keeps jobs in state
/// `RUNNING`. The pattern must contain a capture group selecting the
/// job name.
pub fn running_jobs(pattern: &str) -> Result<Vec<String>> {
    let re = compile_pattern(pattern)?;
    let output = query_output("squeue", &["-h", "-o", "%j %T"])?;
    Ok(parse_running_jobs(&output, &re))
}

/// Extract matching job names from `squeue -h -o "%j %T"` output
fn parse_running_jobs(output: &str, re: &Regex) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let (name, state) = line.trim().rsplit_once(' ')?;
            if state != "RUNNING" {
                return None;
            }
            re.captures(name.trim())
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str().to_string())
        })
        .collect()
}

/// Query the state of a single job via `squeue`, falling back to `sacct`
///
/// squeue only knows queued and running jobs; finished jobs are looked
/// up in the accounting database.
pub fn status(job_id: &str) -> Result<JobStatus> {
    let output = Command::new("squeue")
        .args(["-j", job_id, "-h", "-o", "%T"])
        .output()
        .map_err(HpcError::from)?;

    if output.status.success() {
        let state = String::from_utf8_lossy(&output.stdout)
            .trim()
            .to_uppercase();
        if !state.is_empty() {
            return Ok(map_state(&state));
        }
    }

    let output = Command::new("sacct")
        .args(["-j", job_id, "-n", "-o", "State"])
        .output()
        .map_err(HpcError::from)?;

    if output.status.success() {
        let state = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or("")
            .trim()
            .to_uppercase();
        Ok(map_state(&state))
    } else {
        Ok(JobStatus::Unknown)
    }
}

fn map_state(state: &str) -> JobStatus {
    match state {
        "PENDING" | "CONFIGURING" => JobStatus::Pending,
        "RUNNING" | "COMPLETING" => JobStatus::Running,
        "COMPLETED" => JobStatus::Completed,
        "FAILED" | "TIMEOUT" | "NODE_FAIL" | "OUT_OF_MEMORY" => JobStatus::Failed,
        "CANCELLED" => JobStatus::Cancelled,
        _ => JobStatus::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> JobRequest {
        JobRequest::new("Test_Job", "jobscript.sh")
    }

    #[test]
    fn test_build_submit_command_tinygpu() {
        let cmd = build_submit_command(TargetSystem::TinyGpu, &request()).unwrap();
        assert_eq!(
            cmd,
            "sbatch.tinygpu --job-name Test_Job --nodes=1 --ntasks-per-node=4 \
             --time=24:00:00 --mail-type=ALL jobscript.sh"
        );
    }

    #[test]
    fn test_build_submit_command_with_args() {
        let req = request().with_args(["path1", "path2"]);
        let cmd = build_submit_command(TargetSystem::TinyGpu, &req).unwrap();
        assert_eq!(
            cmd,
            "sbatch.tinygpu --job-name Test_Job --nodes=1 --ntasks-per-node=4 \
             --time=24:00:00 --mail-type=ALL jobscript.sh PARAMS=\"path1 path2\""
        );
    }

    #[test]
    fn test_build_submit_command_drops_empty_args() {
        let req = request()
            .with_args(["path1", ""])
            .with_export("SUBJECT_DIR", "path3");
        let cmd = build_submit_command(TargetSystem::TinyGpu, &req).unwrap();
        assert_eq!(
            cmd,
            "sbatch.tinygpu --job-name Test_Job --nodes=1 --ntasks-per-node=4 \
             --time=24:00:00 --mail-type=ALL jobscript.sh PARAMS=\"path1\" SUBJECT_DIR=path3"
        );
    }

    #[test]
    fn test_build_submit_command_export_only() {
        let req = request().with_export("SUBJECT_DIR", "path3");
        let cmd = build_submit_command(TargetSystem::TinyGpu, &req).unwrap();
        assert_eq!(
            cmd,
            "sbatch.tinygpu --job-name Test_Job --nodes=1 --ntasks-per-node=4 \
             --time=24:00:00 --mail-type=ALL jobscript.sh SUBJECT_DIR=path3"
        );
    }

    #[test]
    fn test_build_submit_command_tinyfat_suffix() {
        let cmd = build_submit_command(TargetSystem::TinyFat, &request()).unwrap();
        assert!(cmd.starts_with("sbatch.tinyfat "));
    }

    #[test]
    fn test_build_submit_command_woody_unsupported() {
        let err = build_submit_command(TargetSystem::Woody, &request()).unwrap_err();
        assert!(matches!(err, HpcError::UnsupportedScheduler { .. }));
    }

    #[test]
    fn test_parse_job_id() {
        assert_eq!(parse_job_id("Submitted batch job 12345\n"), "12345");
        assert_eq!(parse_job_id(""), "unknown");
    }

    #[test]
    fn test_parse_running_jobs() {
        let output = "\
VP_01 RUNNING
VP_02 PENDING
VP_03 RUNNING
OTHER_01 RUNNING
";
        let re = compile_pattern(r"(VP_\w+)").unwrap();
        let jobs = parse_running_jobs(output, &re);
        assert_eq!(jobs, vec!["VP_01", "VP_03"]);
    }

    #[test]
    fn test_map_state() {
        assert_eq!(map_state("PENDING"), JobStatus::Pending);
        assert_eq!(map_state("RUNNING"), JobStatus::Running);
        assert_eq!(map_state("COMPLETING"), JobStatus::Running);
        assert_eq!(map_state("COMPLETED"), JobStatus::Completed);
        assert_eq!(map_state("NODE_FAIL"), JobStatus::Failed);
        assert_eq!(map_state("CANCELLED"), JobStatus::Cancelled);
        assert_eq!(map_state(""), JobStatus::Unknown);
    }
}
