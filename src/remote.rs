use std::{
    fmt::Display,
    path::{Path, PathBuf},
};

use crate::error::{Result, SyncError};

pub mod transfer;

/// `host:remote_directory`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub host: String,
    pub remote_dir: PathBuf,
}

impl Destination {
    /// Exactly one `:` must separate a non-empty host from the remote directory.
    /// The directory may be empty, which rsync reads as the remote home.
    pub fn parse(destination: &str) -> Result<Self> {
        let Some((host, remote_dir)) = destination.split_once(':') else {
            return Err(SyncError::malformed(destination, "missing ':' separator"));
        };

        if remote_dir.contains(':') {
            return Err(SyncError::malformed(destination, "more than one ':' separator"));
        }
        if host.trim().is_empty() {
            return Err(SyncError::malformed(destination, "host is empty"));
        }

        Ok(Self {
            host: host.to_string(),
            remote_dir: PathBuf::from(remote_dir),
        })
    }

    pub fn remote_path(&self, entry: &Path) -> PathBuf {
        self.remote_dir.join(entry)
    }

    /// `host:remote_dir/entry`, as handed to the transfer tool.
    pub fn target(&self, entry: &Path) -> String {
        format!("{}:{}", self.host, self.remote_path(entry).display())
    }
}

impl Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.remote_dir.display())
    }
}
