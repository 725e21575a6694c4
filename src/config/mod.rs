//! Configuration module for hpc-helper
//!
//! Provides cluster profiles, job request settings, walltime handling
//! and the CLI argument surface.

mod settings;

pub use settings::*;
