//! lagsync - sync the entries found at a fixed depth of a directory tree
//!
//! Two stages run one after the other:
//! - [`adapter::fs::plan`] walks the tree and collects the directories and
//!   files sitting at the requested depth
//! - [`remote::transfer::send_plan`] runs the transfer program once per
//!   entry, retrying failures up to a limit

pub mod adapter;
pub mod config;
pub mod error;
pub mod progress;
pub mod remote;
pub mod services;

pub use adapter::fs::{get_depth, plan, Entry, EntryType, SyncPlan};
pub use adapter::rsync::{CommandRunner, Invocation, RsyncRunner, TransferStatus};
pub use config::{CliArgs, ConfigFile, SyncConfig};
pub use error::{ConfigError, PlanError, Result, SyncError};
pub use progress::{ConsoleObserver, TransferObserver};
pub use remote::transfer::{send_plan, DispatchReport, EntryOutcome, TransferRequest};
pub use remote::Destination;
pub use services::run_sync::run_sync;
