//! Configuration for lagsync
//!
//! Settings come from three layers, highest priority first:
//! - command line arguments (`CliArgs`)
//! - a YAML file (`ConfigFile`), `./lagsync.yaml` unless `--config` says otherwise
//! - built-in defaults

use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

use clap::Parser;
use serde::Deserialize;

use crate::{
    error::ConfigError,
    remote::transfer::{TransferRequest, DEFAULT_MAX_RETRIES, DEFAULT_OPTIONS, DEFAULT_PROGRAM},
};

pub const DEFAULT_CONFIG_FILE: &str = "./lagsync.yaml";
pub const DEFAULT_DEPTH: i64 = 1;

/// Sync the entries found at a fixed depth of a directory tree with rsync
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "lagsync",
    version,
    about = "Sync the entries found at a fixed depth of a directory tree with rsync",
    long_about = "Walks ROOT down to DEPTH, collects the directories and files found there \
                  and runs one rsync per entry towards DESTINATION (host:remote_directory).\n\n\
                  Failed transfers are retried; an entry that keeps failing is reported \
                  and skipped.",
    after_help = "EXAMPLES:\n    \
        lagsync ~/photos backup:/srv/photos -d 2 --dry-run\n    \
        lagsync /data nas:/mirror -d 1 -o '-az --delete' -j 4\n    \
        lagsync -c nightly.yaml"
)]
pub struct CliArgs {
    /// Directory tree to walk
    #[arg(value_name = "ROOT")]
    pub root: Option<PathBuf>,

    /// Where to send the entries (host:remote_directory)
    #[arg(value_name = "DESTINATION")]
    pub destination: Option<String>,

    /// Collect the children of the directories DEPTH-1 levels below ROOT
    #[arg(short = 'd', long, value_name = "NUM", allow_negative_numbers = true)]
    pub depth: Option<i64>,

    /// Local directory the entries are sent from (defaults to ROOT)
    #[arg(short = 's', long, value_name = "DIR")]
    pub source: Option<PathBuf>,

    /// Options for the transfer program, split like a shell would
    #[arg(short = 'o', long, value_name = "OPTS", allow_hyphen_values = true)]
    pub options: Option<String>,

    /// Retries per entry after the first failed attempt
    #[arg(short = 'r', long, value_name = "NUM")]
    pub max_retries: Option<u32>,

    /// Print the commands instead of running them
    #[arg(short = 'n', long, overrides_with = "no_dry_run")]
    pub dry_run: bool,

    /// Run the transfers even if the config file asks for a dry run
    #[arg(long, overrides_with = "dry_run")]
    pub no_dry_run: bool,

    /// Number of entries transferred concurrently
    #[arg(short = 'j', long, value_name = "NUM")]
    pub jobs: Option<usize>,

    /// Kill a transfer that runs longer than this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Transfer program to invoke
    #[arg(long, value_name = "PROGRAM")]
    pub program: Option<String>,

    /// Show a progress spinner during live runs
    #[arg(short = 'p', long, overrides_with = "no_progress")]
    pub progress: bool,

    /// Hide the spinner even if the config file enables it
    #[arg(long, overrides_with = "progress")]
    pub no_progress: bool,

    /// YAML configuration file
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Verbose output (show every retry)
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

/// Settings read from the YAML file; every key is optional.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub root: Option<PathBuf>,
    #[serde(alias = "dest")]
    pub destination: Option<String>,
    pub depth: Option<i64>,
    pub source: Option<PathBuf>,
    pub options: Option<String>,
    pub max_retries: Option<u32>,
    pub dry_run: Option<bool>,
    pub jobs: Option<usize>,
    pub timeout: Option<u64>,
    pub program: Option<String>,
    pub progress: Option<bool>,
}

impl ConfigFile {
    pub fn parse(yaml: &str, origin: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::new(file);

        serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// An explicit `--config` must exist; the default file is optional.
pub fn read_config(path: Option<&Path>) -> Result<Option<ConfigFile>, ConfigError> {
    match path {
        Some(path) => ConfigFile::read(path).map(Some),
        None => {
            let default = Path::new(DEFAULT_CONFIG_FILE);
            if default.is_file() {
                ConfigFile::read(default).map(Some)
            } else {
                Ok(None)
            }
        }
    }
}

/// Validated settings of one run
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub root: PathBuf,
    pub depth: i64,
    pub transfer: TransferRequest,
    pub timeout: Option<Duration>,
}

impl SyncConfig {
    pub fn resolve(args: CliArgs, file: Option<ConfigFile>) -> Result<Self, ConfigError> {
        let file = file.unwrap_or_default();

        let root = args
            .root
            .or(file.root)
            .ok_or(ConfigError::Missing("root"))?;
        let destination = args
            .destination
            .or(file.destination)
            .ok_or(ConfigError::Missing("destination"))?;
        let source = args.source.or(file.source).unwrap_or_else(|| root.clone());

        let jobs = args.jobs.or(file.jobs).unwrap_or(1);
        if jobs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "jobs",
                reason: "must be at least 1".to_string(),
            });
        }

        let timeout = match args.timeout.or(file.timeout) {
            Some(0) => {
                return Err(ConfigError::InvalidValue {
                    field: "timeout",
                    reason: "must be at least 1 second".to_string(),
                })
            }
            secs => secs.map(Duration::from_secs),
        };

        let program = args
            .program
            .or(file.program)
            .unwrap_or_else(|| DEFAULT_PROGRAM.to_string());
        if program.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "program",
                reason: "must not be empty".to_string(),
            });
        }

        let transfer = TransferRequest {
            source,
            destination,
            options: args
                .options
                .or(file.options)
                .unwrap_or_else(|| DEFAULT_OPTIONS.to_string()),
            max_retries: args
                .max_retries
                .or(file.max_retries)
                .unwrap_or(DEFAULT_MAX_RETRIES),
            dry_run: switch(args.dry_run, args.no_dry_run, file.dry_run),
            program,
            jobs,
            show_progress: switch(args.progress, args.no_progress, file.progress),
        };
        transfer.option_words()?;

        Ok(Self {
            root,
            depth: args.depth.or(file.depth).unwrap_or(DEFAULT_DEPTH),
            transfer,
            timeout,
        })
    }
}

/// `--flag` / `--no-flag` pair falling back to the file, then to off.
fn switch(on: bool, off: bool, file: Option<bool>) -> bool {
    match (on, off) {
        (true, _) => true,
        (_, true) => false,
        _ => file.unwrap_or(false),
    }
}
