use std::{
    io::{self, Stdout, Write},
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use spinners_rs::{Spinner, Spinners};
use tracing::warn;

use crate::adapter::{fs::Entry, rsync::Invocation};

// ESEQ is for "escape sequence"
pub const ESEQ_DELETE_LINE: &str = "\x1b[0J";
pub const ESEQ_RED: &str = "\x1b[38;5;1m";
pub const ESEQ_GREEN: &str = "\x1b[38;5;2m";
pub const ESEQ_WEAK: &str = "\x1b[38;5;240m";
pub const ESEQ_RESET: &str = "\x1b[m";

pub const SPINNER_MS: u64 = 50;

/// Spinner line showing `[done/total] task - current entry` during a live run.
pub struct ProgressView {
    task: String,
    spinner: Spinner,
    previous_update: Option<Instant>,
}

impl ProgressView {
    pub fn new(task: impl ToString) -> Self {
        let mut spinner = Spinner::new(Spinners::BouncingBar, task.to_string());
        spinner.set_interval(SPINNER_MS);

        Self {
            task: task.to_string(),
            spinner,
            previous_update: None,
        }
    }

    pub fn start(&mut self) {
        self.spinner.start();
    }

    pub fn report_intermediate(&mut self, progress: (usize, usize), comment: Option<&str>) {
        let now = Instant::now();
        if !should_redraw(self.previous_update, now, progress) {
            return;
        }
        self.previous_update = Some(now);

        self.spinner.set_message(format!(
            "{ESEQ_DELETE_LINE}[{}/{}] {}{}{ESEQ_RESET}",
            progress.0,
            progress.1,
            self.task,
            comment
                .map(|comment| format!("{ESEQ_WEAK} - {comment}"))
                .unwrap_or_default()
        ));
    }

    pub fn success(&mut self, message: Option<&str>) {
        self.finish(ESEQ_GREEN, "✓", message);
    }

    pub fn failure(&mut self, message: Option<&str>) {
        self.finish(ESEQ_RED, "!", message);
    }

    fn finish(&mut self, color: &str, mark: &str, message: Option<&str>) {
        self.spinner.stop_with_message(format!(
            "{ESEQ_DELETE_LINE}{color}{mark} {}{}{ESEQ_RESET}",
            self.task,
            message
                .map(|message| format!(" - {message}"))
                .unwrap_or_default()
        ));
        println!();
    }
}

/// Rate limit for the spinner line, so a burst of fast transfers does not
/// flood the terminal. The final `[total/total]` update is always drawn.
pub fn should_redraw(previous: Option<Instant>, now: Instant, progress: (usize, usize)) -> bool {
    let finished = progress.0 >= progress.1;
    let too_soon = previous
        .is_some_and(|at| now.saturating_duration_since(at) <= Duration::from_millis(SPINNER_MS * 2));

    finished || !too_soon
}

/// Receives what a sync run shows the user besides the spinner.
pub trait TransferObserver {
    /// Dry run: the command line that would have run
    fn preview(&self, invocation: &Invocation);

    /// `entry` was abandoned after `max_retries` retries
    fn exhausted(&self, entry: &Entry, max_retries: u32);
}

pub fn exhaustion_notice(entry: &Entry, max_retries: u32) -> String {
    format!("Giving up on {entry} after reaching the retry limit of {max_retries}")
}

/// Previews go to a writer (stdout unless told otherwise), exhaustion
/// notices to the log as warnings.
pub struct ConsoleObserver<W = Stdout> {
    out: Mutex<W>,
}

impl ConsoleObserver {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleObserver<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write> TransferObserver for ConsoleObserver<W> {
    fn preview(&self, invocation: &Invocation) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(err) = writeln!(out, "{invocation}").and_then(|_| out.flush()) {
            warn!("Could not write preview of {}: {}", invocation, err);
        }
    }

    fn exhausted(&self, entry: &Entry, max_retries: u32) {
        warn!("{}", exhaustion_notice(entry, max_retries));
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use super::*;
    use crate::adapter::fs::EntryType;

    #[test]
    fn first_update_is_always_drawn() {
        assert!(should_redraw(None, Instant::now(), (1, 10)));
    }

    #[test]
    fn updates_inside_the_interval_are_skipped() {
        let at = Instant::now();
        let now = at + Duration::from_millis(SPINNER_MS);

        assert!(!should_redraw(Some(at), now, (2, 10)));
        assert!(should_redraw(Some(at), now + Duration::from_millis(SPINNER_MS * 2), (2, 10)));
    }

    #[test]
    fn last_update_ignores_the_interval() {
        let at = Instant::now();

        assert!(should_redraw(Some(at), at, (10, 10)));
    }

    #[test]
    fn preview_writes_the_command_line() {
        let observer = ConsoleObserver::new(Vec::new());
        let invocation = Invocation {
            program: "rsync".to_string(),
            options: vec!["-a".to_string()],
            src: PathBuf::from("/src/a/b.txt"),
            target: "host:remote/dir/a/b.txt".to_string(),
        };

        observer.preview(&invocation);
        observer.preview(&invocation);

        let written = String::from_utf8(observer.into_inner()).unwrap();
        assert_eq!(
            written,
            "rsync -a /src/a/b.txt host:remote/dir/a/b.txt\n".repeat(2)
        );
    }

    #[test]
    fn exhaustion_notice_names_entry_and_limit() {
        let entry = Entry::new(EntryType::File, Path::new("a/b.txt"));

        let notice = exhaustion_notice(&entry, 3);

        assert!(notice.contains("a/b.txt"), "{notice}");
        assert!(notice.contains('3'), "{notice}");
    }
}
