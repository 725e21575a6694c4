//! # hpc-helper - FAU HPC utilities
//!
//! Helper utilities for working with FAU's High Performance Cluster (HPC):
//! building and submitting batch jobs to the Torque and Slurm schedulers,
//! querying the queues, tracking per-directory job completion and checking
//! the deployment environment.
//!
//! ## Building a submit command
//!
//! ```
//! use hpc_helper::config::{JobRequest, TargetSystem};
//! use hpc_helper::scheduler::{Scheduler, SchedulerKind};
//!
//! let request = JobRequest::new("VP_01", "jobscript.sh")
//!     .with_args(["data/VP_01"])
//!     .with_export("SUBJECT_DIR", "data/VP_01");
//!
//! let scheduler = Scheduler::new(SchedulerKind::Torque, TargetSystem::Woody);
//! let command = scheduler.build_submit_command(&request).unwrap();
//!
//! assert!(command.starts_with("qsub -N VP_01"));
//! ```
//!
//! ## Tracking job completion
//!
//! ```no_run
//! use hpc_helper::status::{check_status_file, write_status_file};
//!
//! if !check_status_file("data/VP_01").unwrap() {
//!     // job for this subject has not finished cleanly yet, resubmit
//! }
//! write_status_file("data/VP_01", 0).unwrap();
//! ```
//!
//! ## Guarding the deploy environment
//!
//! ```no_run
//! use hpc_helper::config::TargetSystem;
//! use hpc_helper::deploy::{ensure_deploy_target, DeployTarget};
//!
//! ensure_deploy_target(DeployTarget::Hpc, TargetSystem::Woody).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod deploy;
pub mod error;
pub mod scheduler;
pub mod status;

// Re-export commonly used types
pub use config::{JobRequest, TargetSystem, Walltime};
pub use deploy::DeployTarget;
pub use error::{HpcError, Result};
pub use scheduler::{JobStatus, Scheduler, SchedulerKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use hpc_helper::prelude::*;
    //! ```

    pub use crate::config::{JobRequest, TargetSystem, Walltime};
    pub use crate::deploy::{ensure_deploy_target, DeployTarget};
    pub use crate::error::{HpcError, Result};
    pub use crate::scheduler::{JobContext, JobStatus, Scheduler, SchedulerKind};
    pub use crate::status::{check_status_file, cleanup_status_files, write_status_file};
}
