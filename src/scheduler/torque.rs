//! Torque (PBS) backend
//!
//! Command construction and queue queries for the Torque scheduler as
//! deployed on woody. TinyGPU submission still works through
//! `qsub.tinygpu` but is deprecated in favor of Slurm.

use regex::Regex;
use std::process::Command;
use tracing::warn;

use crate::config::{JobRequest, TargetSystem};
use crate::error::{HpcError, Result};
use crate::scheduler::{compile_pattern, params_variable, query_output, JobStatus};

/// Build the `qsub` command line for a job request
///
/// Fails with [`HpcError::UnsupportedScheduler`] if the target cluster
/// does not accept Torque submissions.
pub fn build_submit_command(system: TargetSystem, request: &JobRequest) -> Result<String> {
    let binary = system
        .torque_binary()
        .ok_or_else(|| HpcError::unsupported("Torque", system.name()))?;

    if system.torque_deprecated() {
        warn!(
            system = %system,
            "Torque submission to this cluster is deprecated, use Slurm instead"
        );
    }

    let mut command = format!(
        "{} -N {} -l nodes={}:ppn={},walltime={} -m abe",
        binary, request.job_name, request.nodes, request.tasks_per_node, request.walltime
    );

    // qsub takes script arguments and environment through a single -v
    // variable list. PARAMS plus exports are space separated; exports
    // alone are comma joined.
    match params_variable(&request.args) {
        Some(params) => {
            command.push_str(" -v ");
            command.push_str(&params);
            for (key, value) in &request.exports {
                command.push_str(&format!(" {}={}", key, value));
            }
        }
        None if !request.exports.is_empty() => {
            let vars: Vec<String> = request
                .exports
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect();
            command.push_str(" -v ");
            command.push_str(&vars.join(","));
        }
        None => {}
    }

    command.push(' ');
    command.push_str(&request.script);
    Ok(command)
}

/// Parse the job id from `qsub` stdout
///
/// qsub prints the full job id (e.g. `12345.woody`) on its own line.
pub fn parse_job_id(stdout: &str) -> String {
    stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

/// List the names of currently running jobs matching `pattern`
///
/// Runs `qstat` and scans its table for rows in state `R`. The pattern
/// must contain a capture group selecting the job name.
pub fn running_jobs(pattern: &str) -> Result<Vec<String>> {
    let re = queue_regex(pattern)?;
    let output = query_output("qstat", &[])?;
    Ok(parse_running_jobs(&output, &re))
}

/// Build the qstat row regex around the caller's job-name pattern
fn queue_regex(pattern: &str) -> Result<Regex> {
    // validate the user pattern on its own first so the error points at it
    compile_pattern(pattern)?;

    Regex::new(&format!(r"\S* {}\s*\w+\s*\S*\s*R", pattern)).map_err(|e| {
        HpcError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Extract matching job names from qstat output
fn parse_running_jobs(output: &str, re: &Regex) -> Vec<String> {
    re.captures_iter(output)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Query the state of a single job via `qstat`
///
/// Torque forgets finished jobs quickly, so an unknown job id is
/// reported as [`JobStatus::Unknown`] rather than an error.
pub fn status(job_id: &str) -> Result<JobStatus> {
    let output = Command::new("qstat")
        .arg(job_id)
        .output()
        .map_err(HpcError::from)?;

    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().skip(2) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() >= 5 {
                return Ok(map_state(fields[4]));
            }
        }
    }

    Ok(JobStatus::Unknown)
}

fn map_state(state: &str) -> JobStatus {
    match state {
        "Q" | "W" | "H" => JobStatus::Pending,
        "R" | "E" => JobStatus::Running,
        "C" => JobStatus::Completed,
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
    fn test_build_submit_command_woody() {
        let cmd = build_submit_command(TargetSystem::Woody, &request()).unwrap();
        assert_eq!(
            cmd,
            "qsub -N Test_Job -l nodes=1:ppn=4,walltime=24:00:00 -m abe jobscript.sh"
        );
    }

    #[test]
    fn test_build_submit_command_with_args() {
        let req = request().with_args(["path1", "path2"]);
        let cmd = build_submit_command(TargetSystem::Woody, &req).unwrap();
        assert_eq!(
            cmd,
            "qsub -N Test_Job -l nodes=1:ppn=4,walltime=24:00:00 -m abe \
             -v PARAMS=\"path1 path2\" jobscript.sh"
        );
    }

    #[test]
    fn test_build_submit_command_with_args_and_export() {
        let req = request()
            .with_args(["path1", "path2"])
            .with_export("SUBJECT_DIR", "path3");
        let cmd = build_submit_command(TargetSystem::Woody, &req).unwrap();
        assert_eq!(
            cmd,
            "qsub -N Test_Job -l nodes=1:ppn=4,walltime=24:00:00 -m abe \
             -v PARAMS=\"path1 path2\" SUBJECT_DIR=path3 jobscript.sh"
        );
    }

    #[test]
    fn test_build_submit_command_drops_empty_args() {
        let req = request()
            .with_args(["path1", ""])
            .with_export("SUBJECT_DIR", "path3");
        let cmd = build_submit_command(TargetSystem::Woody, &req).unwrap();
        assert_eq!(
            cmd,
            "qsub -N Test_Job -l nodes=1:ppn=4,walltime=24:00:00 -m abe \
             -v PARAMS=\"path1\" SUBJECT_DIR=path3 jobscript.sh"
        );
    }

    #[test]
    fn test_build_submit_command_export_only() {
        let req = request().with_export("SUBJECT_DIR", "path3");
        let cmd = build_submit_command(TargetSystem::Woody, &req).unwrap();
        assert_eq!(
            cmd,
            "qsub -N Test_Job -l nodes=1:ppn=4,walltime=24:00:00 -m abe \
             -v SUBJECT_DIR=path3 jobscript.sh"
        );
    }

    #[test]
    fn test_build_submit_command_exports_comma_joined() {
        let req = request()
            .with_export("SUBJECT_DIR", "path3")
            .with_export("TEST_PATH", "path4");
        let cmd = build_submit_command(TargetSystem::Woody, &req).unwrap();
        assert_eq!(
            cmd,
            "qsub -N Test_Job -l nodes=1:ppn=4,walltime=24:00:00 -m abe \
             -v SUBJECT_DIR=path3,TEST_PATH=path4 jobscript.sh"
        );
    }

    #[test]
    fn test_build_submit_command_tinygpu_suffix() {
        let cmd = build_submit_command(TargetSystem::TinyGpu, &request()).unwrap();
        assert_eq!(
            cmd,
            "qsub.tinygpu -N Test_Job -l nodes=1:ppn=4,walltime=24:00:00 -m abe jobscript.sh"
        );
    }

    #[test]
    fn test_build_submit_command_tinyfat_unsupported() {
        let err = build_submit_command(TargetSystem::TinyFat, &request()).unwrap_err();
        assert!(matches!(err, HpcError::UnsupportedScheduler { .. }));
    }

    #[test]
    fn test_parse_running_jobs() {
        let output = "\
Job ID                    Name             User            Time Use S Queue
------------------------- ---------------- --------------- -------- - -----
1234.woody VP_01 alice 00:10:11 R work
1235.woody VP_02 alice 0 Q work
1236.woody VP_03 alice 01:22:33 R work
1237.woody OTHER_01 bob 00:00:10 R work
";
        let re = queue_regex(r"(VP_\w+)").unwrap();
        let jobs = parse_running_jobs(output, &re);
        assert_eq!(jobs, vec!["VP_01", "VP_03"]);
    }

    #[test]
    fn test_queue_regex_requires_capture_group() {
        assert!(queue_regex(r"VP_\w+").is_err());
    }

    #[test]
    fn test_parse_job_id() {
        assert_eq!(parse_job_id("12345.woody\n"), "12345.woody");
        assert_eq!(parse_job_id(""), "unknown");
    }

    #[test]
    fn test_map_state() {
        assert_eq!(map_state("Q"), JobStatus::Pending);
        assert_eq!(map_state("H"), JobStatus::Pending);
        assert_eq!(map_state("R"), JobStatus::Running);
        assert_eq!(map_state("C"), JobStatus::Completed);
        assert_eq!(map_state("X"), JobStatus::Unknown);
    }
}
