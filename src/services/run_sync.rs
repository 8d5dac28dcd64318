use tracing::{info, warn};

use crate::{
    adapter::{fs::plan, rsync::CommandRunner},
    config::SyncConfig,
    error::Result,
    progress::TransferObserver,
    remote::{
        transfer::{send_plan, DispatchReport},
        Destination,
    },
};

/// Plan the entries under `config.root`, then hand them to the dispatcher.
///
/// The destination is checked before the tree is walked.
pub async fn run_sync<R: CommandRunner, O: TransferObserver>(
    config: &SyncConfig,
    runner: &R,
    observer: &O,
) -> Result<DispatchReport> {
    let destination = Destination::parse(&config.transfer.destination)?;
    let sync_plan = plan(&config.root, config.depth)?;

    if sync_plan.is_empty() {
        info!(
            "Nothing to sync at depth {} below {}",
            config.depth,
            config.root.display()
        );
    } else {
        info!(
            dirs = sync_plan.dirs.len(),
            files = sync_plan.files.len(),
            "Planned {} entries for {}",
            sync_plan.len(),
            destination
        );
    }

    let report = send_plan(runner, observer, &config.transfer, &sync_plan).await?;

    if config.transfer.dry_run {
        info!("Dry run: previewed {} entries", report.previewed());
    } else if report.exhausted() > 0 {
        warn!(
            "Transferred {} entries, abandoned {}",
            report.transferred(),
            report.exhausted()
        );
    } else {
        info!("Transferred {} entries", report.transferred());
    }

    Ok(report)
}
