//! End-to-end runs of plan + dispatch with a recording transfer runner

use std::{fs, io, path::PathBuf, sync::Mutex};

use lagsync::{
    progress::exhaustion_notice, run_sync, CommandRunner, ConsoleObserver, Entry, EntryOutcome,
    Invocation, SyncConfig, SyncError, TransferObserver, TransferRequest,
    TransferStatus,
};
use tempfile::tempdir;

/// Records every invocation and answers with a fixed exit code.
struct RecordingRunner {
    exit_code: i32,
    calls: Mutex<Vec<Invocation>>,
}

impl RecordingRunner {
    fn new(exit_code: i32) -> Self {
        Self {
            exit_code,
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for RecordingRunner {
    async fn run(&self, invocation: &Invocation) -> io::Result<TransferStatus> {
        self.calls.lock().unwrap().push(invocation.clone());
        Ok(TransferStatus::exited(self.exit_code))
    }
}

/// Collects exhaustion notices; previews are not expected.
#[derive(Default)]
struct NoticeLog {
    notices: Mutex<Vec<String>>,
}

impl TransferObserver for NoticeLog {
    fn preview(&self, invocation: &Invocation) {
        panic!("unexpected preview of {invocation}");
    }

    fn exhausted(&self, entry: &Entry, max_retries: u32) {
        self.notices
            .lock()
            .unwrap()
            .push(exhaustion_notice(entry, max_retries));
    }
}

fn config(root: PathBuf, depth: i64, destination: &str) -> SyncConfig {
    SyncConfig {
        transfer: TransferRequest::new(root.clone(), destination),
        root,
        depth,
        timeout: None,
    }
}

#[tokio::test]
async fn live_run_sends_each_entry_at_depth() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("photos/2023")).unwrap();
    fs::create_dir_all(dir.path().join("photos/2024")).unwrap();
    fs::write(dir.path().join("photos/index.html"), "").unwrap();

    let runner = RecordingRunner::new(0);
    let config = config(dir.path().to_path_buf(), 2, "nas:/mirror");

    let report = run_sync(&config, &runner, &NoticeLog::default()).await.unwrap();

    assert_eq!(report.transferred(), 3);
    let mut targets: Vec<_> = runner.calls().into_iter().map(|call| call.target).collect();
    targets.sort();
    assert_eq!(
        targets,
        vec![
            "nas:/mirror/photos/2023",
            "nas:/mirror/photos/2024",
            "nas:/mirror/photos/index.html",
        ]
    );

    for call in runner.calls() {
        assert_eq!(call.program, "rsync");
        assert_eq!(call.options, vec!["-a"]);
        assert!(call.src.starts_with(dir.path()));
        assert!(call.src.exists());
    }
}

#[tokio::test]
async fn dry_run_never_invokes_the_runner() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("a")).unwrap();
    fs::write(dir.path().join("b.txt"), "").unwrap();

    let runner = RecordingRunner::new(0);
    let mut config = config(dir.path().to_path_buf(), 1, "nas:/mirror");
    config.transfer.dry_run = true;

    let observer = ConsoleObserver::new(Vec::new());
    let report = run_sync(&config, &runner, &observer).await.unwrap();

    assert!(runner.calls().is_empty());
    assert_eq!(report.previewed(), 2);

    let preview = String::from_utf8(observer.into_inner()).unwrap();
    let root = dir.path().display();
    assert_eq!(
        preview,
        format!("rsync -a {root}/a nas:/mirror/a\nrsync -a {root}/b.txt nas:/mirror/b.txt\n")
    );
}

#[tokio::test]
async fn exhausted_entries_do_not_fail_the_run() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("a")).unwrap();
    fs::create_dir(dir.path().join("b")).unwrap();

    let runner = RecordingRunner::new(255);
    let mut config = config(dir.path().to_path_buf(), 1, "nas:/mirror");
    config.transfer.max_retries = 2;

    let observer = NoticeLog::default();
    let report = run_sync(&config, &runner, &observer).await.unwrap();

    assert_eq!(report.exhausted(), 2);
    let mut notices = observer.notices.lock().unwrap().clone();
    notices.sort();
    assert_eq!(
        notices,
        vec![
            "Giving up on a/ after reaching the retry limit of 2",
            "Giving up on b/ after reaching the retry limit of 2",
        ]
    );
    assert_eq!(runner.calls().len(), 6);
    assert!(report
        .entries
        .iter()
        .all(|entry| entry.outcome == EntryOutcome::Exhausted { attempts: 3 }));
}

#[tokio::test]
async fn malformed_destination_stops_before_any_transfer() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("a")).unwrap();

    let runner = RecordingRunner::new(0);
    let config = config(dir.path().to_path_buf(), 1, "no-colon-here");

    let err = run_sync(&config, &runner, &NoticeLog::default()).await.unwrap_err();

    assert!(matches!(err, SyncError::MalformedDestination { .. }));
    assert!(runner.calls().is_empty());
}

#[tokio::test]
async fn separate_source_root_is_used_for_src_paths() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("a")).unwrap();

    let runner = RecordingRunner::new(0);
    let mut config = config(dir.path().to_path_buf(), 1, "nas:/mirror");
    config.transfer.source = PathBuf::from("/staging");

    run_sync(&config, &runner, &NoticeLog::default()).await.unwrap();

    assert_eq!(runner.calls()[0].src, PathBuf::from("/staging/a"));
}

#[tokio::test]
async fn malformed_destination_is_reported_before_walking() {
    let dir = tempdir().unwrap();

    let runner = RecordingRunner::new(0);
    let config = config(dir.path().join("missing"), 1, "no-colon-here");

    let err = run_sync(&config, &runner, &NoticeLog::default())
        .await
        .unwrap_err();

    // the root is missing too, but the destination is checked first
    assert!(matches!(err, SyncError::MalformedDestination { .. }));
}
