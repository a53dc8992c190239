//! Configuration module
//!
//! Handles application settings and default directories.

mod settings;

pub use settings::AppConfig;

use directories::{ProjectDirs, UserDirs};
use std::path::PathBuf;

/// Get the application configuration directory.
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("io", "viamon", "Viamon").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Default base directory for session output: `~/via_outputlogs`.
pub fn default_output_dir() -> Option<PathBuf> {
    UserDirs::new().map(|dirs| dirs.home_dir().join("via_outputlogs"))
}
