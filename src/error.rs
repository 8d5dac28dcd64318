//! Error types for lagsync
//!
//! Only fatal conditions live here. A transfer that keeps failing is not an
//! error: the dispatcher retries it, reports it and moves on.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type of a sync run
#[derive(Error, Debug)]
pub enum SyncError {
    /// The destination is not of the form `host:remote_directory`
    #[error("Malformed destination '{destination}': {reason}")]
    MalformedDestination { destination: String, reason: String },

    /// Traversal could not start
    #[error("Planning failed: {0}")]
    Plan(#[from] PlanError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SyncError {
    pub(crate) fn malformed(destination: &str, reason: impl Into<String>) -> Self {
        Self::MalformedDestination {
            destination: destination.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors raised while preparing the traversal root
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Root directory not found: '{}'", path.display())]
    RootNotFound { path: PathBuf },

    #[error("Root is not a directory: '{}'", path.display())]
    NotADirectory { path: PathBuf },

    #[error("Could not resolve root '{}': {source}", path.display())]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required setting was given neither on the command line nor in the file
    #[error("Missing required setting '{0}' (pass it as an argument or set it in the config file)")]
    Missing(&'static str),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Could not read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

pub type Result<T> = std::result::Result<T, SyncError>;
