use std::path::PathBuf;

use futures::StreamExt;
use tracing::debug;

use crate::{
    adapter::{
        fs::{Entry, SyncPlan},
        rsync::{CommandRunner, Invocation},
    },
    error::{ConfigError, Result},
    progress::{ProgressView, TransferObserver},
    remote::Destination,
};

pub const DEFAULT_MAX_RETRIES: u32 = 10;
pub const DEFAULT_PROGRAM: &str = "rsync";
pub const DEFAULT_OPTIONS: &str = "-a";

/// Everything the dispatcher needs besides the plan itself.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub source: PathBuf,
    /// Unparsed `host:remote_directory`
    pub destination: String,
    /// Split with shell quoting rules, otherwise passed through unvalidated
    pub options: String,
    pub max_retries: u32,
    pub dry_run: bool,
    pub program: String,
    /// How many entries may be in flight at once
    pub jobs: usize,
    pub show_progress: bool,
}

impl TransferRequest {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            options: DEFAULT_OPTIONS.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            dry_run: false,
            program: DEFAULT_PROGRAM.to_string(),
            jobs: 1,
            show_progress: false,
        }
    }

    /// The options as separate arguments: `-a -e 'ssh -p 2222'` gives
    /// `-a`, `-e`, `ssh -p 2222`.
    pub fn option_words(&self) -> std::result::Result<Vec<String>, ConfigError> {
        shell_words::split(&self.options).map_err(|err| ConfigError::InvalidValue {
            field: "options",
            reason: format!("{err} in '{}'", self.options),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Dry run: the command line was printed, nothing ran
    Previewed,
    Transferred { attempts: u32 },
    /// Every attempt failed; the entry was abandoned
    Exhausted { attempts: u32 },
}

#[derive(Debug, Clone)]
pub struct EntryReport {
    pub entry: Entry,
    pub invocation: Invocation,
    pub outcome: EntryOutcome,
}

/// Per-entry outcomes, in completion order.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub entries: Vec<EntryReport>,
}

impl DispatchReport {
    fn count(&self, pred: impl Fn(&EntryOutcome) -> bool) -> usize {
        self.entries.iter().filter(|report| pred(&report.outcome)).count()
    }

    pub fn transferred(&self) -> usize {
        self.count(|outcome| matches!(outcome, EntryOutcome::Transferred { .. }))
    }

    pub fn exhausted(&self) -> usize {
        self.count(|outcome| matches!(outcome, EntryOutcome::Exhausted { .. }))
    }

    pub fn previewed(&self) -> usize {
        self.count(|outcome| matches!(outcome, EntryOutcome::Previewed))
    }
}

/// Transfer (or, in dry-run mode, print) every entry of `plan`.
///
/// Directories go first, then files. A malformed destination is reported
/// before anything runs; an entry that keeps failing only produces a warning.
pub async fn send_plan<R: CommandRunner, O: TransferObserver>(
    runner: &R,
    observer: &O,
    request: &TransferRequest,
    plan: &SyncPlan,
) -> Result<DispatchReport> {
    let destination = Destination::parse(&request.destination)?;
    let options = request.option_words()?;

    let planned: Vec<(Entry, Invocation)> = plan
        .entries()
        .map(|entry| {
            let invocation = Invocation {
                program: request.program.clone(),
                options: options.clone(),
                src: request.source.join(&entry.path_name),
                target: destination.target(&entry.path_name),
            };
            (entry, invocation)
        })
        .collect();

    if request.dry_run {
        let entries = planned
            .into_iter()
            .map(|(entry, invocation)| {
                observer.preview(&invocation);
                EntryReport {
                    entry,
                    invocation,
                    outcome: EntryOutcome::Previewed,
                }
            })
            .collect();

        return Ok(DispatchReport { entries });
    }

    let total_items = planned.len();
    let mut progress = (request.show_progress && total_items > 0)
        .then(|| ProgressView::new(format!("Syncing to {destination}")));
    if let Some(progress) = progress.as_mut() {
        progress.start();
    }

    let mut entries = Vec::with_capacity(total_items);
    let mut in_flight = futures::stream::iter(planned)
        .map(|(entry, invocation)| async move {
            let outcome =
                transfer_with_retry(runner, observer, &entry, &invocation, request.max_retries)
                    .await;
            EntryReport {
                entry,
                invocation,
                outcome,
            }
        })
        .buffer_unordered(request.jobs.max(1));

    while let Some(report) = in_flight.next().await {
        if let Some(progress) = progress.as_mut() {
            progress.report_intermediate(
                (entries.len() + 1, total_items),
                Some(&report.entry.to_string()),
            );
        }
        entries.push(report);
    }

    let report = DispatchReport { entries };

    if let Some(progress) = progress.as_mut() {
        match report.exhausted() {
            0 => progress.success(Some(&format!("Sent {total_items} entries"))),
            abandoned => progress.failure(Some(&format!(
                "{abandoned} of {total_items} entries abandoned"
            ))),
        }
    }

    Ok(report)
}

/// One initial attempt plus up to `max_retries` retries.
async fn transfer_with_retry<R: CommandRunner, O: TransferObserver>(
    runner: &R,
    observer: &O,
    entry: &Entry,
    invocation: &Invocation,
    max_retries: u32,
) -> EntryOutcome {
    let mut retries = 0;

    loop {
        let succeeded = match runner.run(invocation).await {
            Ok(status) => status.success(),
            Err(err) => {
                debug!("{}: {}", invocation, err);
                false
            }
        };

        if succeeded {
            return EntryOutcome::Transferred {
                attempts: attempts_after(retries),
            };
        }

        if retries >= max_retries {
            observer.exhausted(entry, max_retries);
            return EntryOutcome::Exhausted {
                attempts: attempts_after(retries),
            };
        }

        retries += 1;
        debug!(retry = retries, max_retries, "retrying {}", entry);
    }
}

// Saturates so that `max_retries == u32::MAX` cannot overflow
fn attempts_after(retries: u32) -> u32 {
    retries.saturating_add(1)
}
