//! hpc_status completion files
//!
//! Long parameter sweeps submit one job per subject directory. Each job
//! records its exit status in an `hpc_status` file inside that directory,
//! so a resubmission pass can skip work that already finished cleanly.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{HpcError, IoResultExt, Result};

/// File name used for per-directory completion tracking
pub const STATUS_FILE_NAME: &str = "hpc_status";

/// Path of the status file inside `dir`
pub fn status_file_path(dir: impl AsRef<Path>) -> PathBuf {
    dir.as_ref().join(STATUS_FILE_NAME)
}

/// Check whether a directory holds a successful `hpc_status` file
///
/// Returns `true` iff the file exists, is non-empty and records exit
/// status `0`. A missing or empty file means the job has not finished
/// yet; a nonzero code means it failed. Content that is not an integer
/// is an error.
pub fn check_status_file(dir: impl AsRef<Path>) -> Result<bool> {
    let path = status_file_path(&dir);
    if !path.exists() {
        return Ok(false);
    }

    let content = fs::read_to_string(&path).with_path(&path)?;
    let content = content.trim();
    if content.is_empty() {
        return Ok(false);
    }

    let exit_status: i32 = content.parse().map_err(|_| HpcError::InvalidStatusFile {
        path: path.clone(),
        content: content.to_string(),
    })?;

    debug!(path = %path.display(), exit_status, "read status file");
    Ok(exit_status == 0)
}

/// Write a job exit status to a directory's `hpc_status` file
pub fn write_status_file(dir: impl AsRef<Path>, exit_status: i32) -> Result<()> {
    let path = status_file_path(&dir);
    fs::write(&path, format!("{}\n", exit_status)).with_path(&path)?;
    debug!(path = %path.display(), exit_status, "wrote status file");
    Ok(())
}

/// Remove `hpc_status` files after all jobs completed
///
/// Directories without a status file are skipped silently.
pub fn cleanup_status_files<P: AsRef<Path>>(dirs: impl IntoIterator<Item = P>) -> Result<()> {
    let mut removed = 0usize;
    for dir in dirs {
        let path = status_file_path(&dir);
        if path.exists() {
            fs::remove_file(&path).with_path(&path)?;
            removed += 1;
        }
    }
    info!(removed, "status file cleanup done");
    Ok(())
}
