//! Job context detection
//!
//! When a process runs inside a batch job, the scheduler exposes the job
//! metadata through environment variables. This module collects them into
//! a [`JobContext`] for Slurm and PBS/Torque jobs.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

use crate::scheduler::SchedulerKind;

/// Metadata of the batch job the process is running in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobContext {
    /// Scheduler that started the job, `None` outside a job
    pub scheduler: Option<SchedulerKind>,
    /// Job id
    pub job_id: Option<String>,
    /// Job name
    pub job_name: Option<String>,
    /// Number of allocated nodes
    pub num_nodes: Option<u32>,
    /// Number of tasks/processes
    pub num_tasks: Option<u32>,
    /// Directory the job was submitted from
    pub submit_dir: Option<PathBuf>,
    /// Array task info if this is an array job
    pub array: Option<ArrayTask>,
}

/// Array job task information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArrayTask {
    /// Array job id
    pub array_job_id: String,
    /// Task index within the array
    pub task_id: u32,
    /// Total tasks in the array, if known
    pub task_count: Option<u32>,
}

impl JobContext {
    /// Collect job metadata from the environment
    pub fn collect() -> Self {
        if env::var("SLURM_JOB_ID").is_ok() {
            Self::collect_slurm()
        } else if env::var("PBS_JOBID").is_ok() {
            Self::collect_pbs()
        } else {
            Self::empty()
        }
    }

    /// Whether the process is running inside a batch job
    pub fn is_job(&self) -> bool {
        self.job_id.is_some()
    }

    fn empty() -> Self {
        Self {
            scheduler: None,
            job_id: None,
            job_name: None,
            num_nodes: None,
            num_tasks: None,
            submit_dir: None,
            array: None,
        }
    }

    fn collect_slurm() -> Self {
        let array = env::var("SLURM_ARRAY_JOB_ID").ok().map(|array_job_id| ArrayTask {
            array_job_id,
            task_id: env::var("SLURM_ARRAY_TASK_ID")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            task_count: env::var("SLURM_ARRAY_TASK_COUNT")
                .ok()
                .and_then(|s| s.parse().ok()),
        });

        Self {
            scheduler: Some(SchedulerKind::Slurm),
            job_id: env::var("SLURM_JOB_ID").ok(),
            job_name: env::var("SLURM_JOB_NAME").ok(),
            num_nodes: env::var("SLURM_NNODES").ok().and_then(|s| s.parse().ok()),
            num_tasks: env::var("SLURM_NTASKS").ok().and_then(|s| s.parse().ok()),
            submit_dir: env::var("SLURM_SUBMIT_DIR").ok().map(PathBuf::from),
            array,
        }
    }

    fn collect_pbs() -> Self {
        let num_nodes = env::var("PBS_NODEFILE")
            .ok()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|content| nodes_from_nodefile(&content));

        let array = env::var("PBS_ARRAY_ID").ok().map(|array_job_id| ArrayTask {
            array_job_id,
            task_id: env::var("PBS_ARRAY_INDEX")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0),
            task_count: None,
        });

        Self {
            scheduler: Some(SchedulerKind::Torque),
            job_id: env::var("PBS_JOBID").ok(),
            job_name: env::var("PBS_JOBNAME").ok(),
            num_nodes,
            num_tasks: env::var("PBS_NP").ok().and_then(|s| s.parse().ok()),
            submit_dir: env::var("PBS_O_WORKDIR").ok().map(PathBuf::from),
            array,
        }
    }
}

/// Count distinct hosts in a PBS nodefile
///
/// The nodefile lists one hostname per allocated slot, so a node with
/// four slots appears four times.
fn nodes_from_nodefile(content: &str) -> Option<u32> {
    let hosts: HashSet<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    if hosts.is_empty() {
        None
    } else {
        Some(hosts.len() as u32)
    }
}
