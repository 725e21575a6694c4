//! Deployment environment checks
//!
//! Job scripts are usually developed locally and then run on a cluster
//! frontend. Mixing the two up wastes queue time (or worse, hammers a
//! login node), so scripts assert their deploy target up front.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

use crate::config::TargetSystem;
use crate::error::{HpcError, Result};

/// Where the code is supposed to run
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployTarget {
    /// On the cluster (alias: remote)
    #[value(name = "hpc", alias = "remote")]
    Hpc,
    /// On a local development machine (alias: develop)
    #[value(name = "local", alias = "develop")]
    Local,
}

impl DeployTarget {
    /// Get the target name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hpc => "hpc",
            Self::Local => "local",
        }
    }
}

impl fmt::Display for DeployTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Verify that the current host matches the requested deploy target
///
/// The cluster frontends carry the cluster name in their hostname
/// (e.g. `woody3.rrze.fau.de`), which is what the check keys on.
pub fn ensure_deploy_target(target: DeployTarget, system: TargetSystem) -> Result<()> {
    let host = current_hostname();
    verify_deploy_target(target, system, &host)?;
    info!(host = %host, target = %target, "deploy environment ok");
    Ok(())
}

/// Hostname-based deploy check, separated out for testability
pub fn verify_deploy_target(target: DeployTarget, system: TargetSystem, host: &str) -> Result<()> {
    let on_cluster = host.contains(system.name());

    match target {
        DeployTarget::Hpc if !on_cluster => Err(HpcError::DeployMismatch {
            expected: format!("hpc ({})", system.name()),
            hostname: host.to_string(),
        }),
        DeployTarget::Local if on_cluster => Err(HpcError::DeployMismatch {
            expected: "local".to_string(),
            hostname: host.to_string(),
        }),
        _ => Ok(()),
    }
}

fn current_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| std::env::var("HOSTNAME").unwrap_or_default())
}
