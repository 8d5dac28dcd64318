use std::{fmt::Display, io, path::PathBuf, process::Stdio, time::Duration};

use tokio::process::Command;
use tracing::debug;

/// One fully formed transfer command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub options: Vec<String>,
    pub src: PathBuf,
    /// `host:dst`
    pub target: String,
}

impl Invocation {
    pub fn args(&self) -> Vec<String> {
        self.options
            .iter()
            .cloned()
            .chain([self.src.display().to_string(), self.target.clone()])
            .collect()
    }
}

impl Display for Invocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in self.args() {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferStatus {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stderr: String,
}

impl TransferStatus {
    pub fn exited(exit_code: i32) -> Self {
        Self {
            exit_code: Some(exit_code),
            stderr: String::new(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs a transfer command and reports how it ended.
///
/// `Err` means the command could not be run at all (missing binary, timeout);
/// the dispatcher treats it like any other failed attempt.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    async fn run(&self, invocation: &Invocation) -> io::Result<TransferStatus>;
}

/// Spawns the real transfer program.
#[derive(Debug, Clone, Default)]
pub struct RsyncRunner {
    timeout: Option<Duration>,
}

impl RsyncRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl CommandRunner for RsyncRunner {
    async fn run(&self, invocation: &Invocation) -> io::Result<TransferStatus> {
        let child = Command::new(&invocation.program)
            .args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                io::Error::new(
                    err.kind(),
                    format!("failed to launch '{}': {err}", invocation.program),
                )
            })?;

        let output = match self.timeout {
            Some(timeout) => tokio::time::timeout(timeout, child.wait_with_output())
                .await
                .map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("'{}' did not finish within {:?}", invocation.program, timeout),
                    )
                })??,
            None => child.wait_with_output().await?,
        };

        let status = TransferStatus {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !status.success() {
            debug!(
                exit_code = ?status.exit_code,
                stderr = status.stderr.lines().last().unwrap_or(""),
                "{} failed",
                invocation
            );
        }

        Ok(status)
    }
}
