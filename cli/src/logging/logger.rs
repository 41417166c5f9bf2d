//! Structured logger with dry-run awareness and summary collection.
use std::path::PathBuf;
use std::sync::Mutex;

use super::types::{EntryStatus, Log, SummaryEntry};
use super::utils::{log_file_path, terminal_columns, truncate_to};

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
///
/// `record` is not included because its signature differs from the
/// `fn(&self, &str)` pattern shared by the display methods.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Structured logger with dry-run awareness and summary collection.
///
/// Messages go through [`tracing`]; the subscriber installed by
/// [`init_subscriber`](super::subscriber::init_subscriber) decides where they
/// end up (console and `$XDG_CACHE_HOME/devsetup/<command>.log`).
#[derive(Debug)]
pub struct Logger {
    entries: Mutex<Vec<SummaryEntry>>,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create a logger for `command`.
    ///
    /// Only remembers the log file path for the summary footer; the file
    /// itself is owned by the [`FileLayer`](super::subscriber::FileLayer).
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            log_file: log_file_path(command),
        }
    }

    /// Create a logger without a log file path (tests, embedded use).
    #[must_use]
    pub const fn detached() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            log_file: None,
        }
    }

    /// Return a clone of all recorded summary entries.
    #[must_use]
    pub fn entries(&self) -> Vec<SummaryEntry> {
        self.entries.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        tracing::info!(target: "devsetup::stage", "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose; always
    /// written to the log file).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Log a dry-run action message.
    pub fn dry_run(&self, msg: &str) {
        tracing::info!(target: "devsetup::dry_run", "{msg}");
    }

    /// Record a result for the summary.
    pub fn record(&self, label: &str, status: EntryStatus, message: Option<&str>) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.push(SummaryEntry {
                label: label.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }

    /// Count recorded entries with the given status.
    #[must_use]
    pub fn count(&self, status: EntryStatus) -> usize {
        self.entries
            .lock()
            .map_or(0, |guard| guard.iter().filter(|e| e.status == status).count())
    }

    /// Count the number of failed entries.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.count(EntryStatus::Failed)
    }

    /// Print the summary of all recorded entries.
    #[allow(clippy::print_stdout)]
    pub fn print_summary(&self) {
        let entries = self.entries();
        if entries.is_empty() {
            return;
        }

        println!();
        self.stage("Summary");

        let width = terminal_columns().saturating_sub(4);
        for entry in &entries {
            let (icon, color) = entry.status.style();
            let suffix = entry
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));
            let line = truncate_to(&format!("{icon} {}{suffix}", entry.label), width);
            self.info(&format!("{color}{line}\x1b[0m"));
        }

        let tally = |status| entries.iter().filter(|e| e.status == status).count();
        let (ok, changed, skipped) = (
            tally(EntryStatus::Ok),
            tally(EntryStatus::Changed),
            tally(EntryStatus::Skipped),
        );
        let (dry_run, warned, failed) = (
            tally(EntryStatus::DryRun),
            tally(EntryStatus::Warned),
            tally(EntryStatus::Failed),
        );
        println!();
        self.info(&format!(
            "{} steps: \x1b[32m{ok} ok\x1b[0m, \x1b[36m{changed} changed\x1b[0m, \x1b[2m{skipped} skipped\x1b[0m, \x1b[37m{dry_run} dry-run\x1b[0m, \x1b[33m{warned} warnings\x1b[0m, \x1b[31m{failed} failed\x1b[0m",
            entries.len()
        ));

        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error, dry_run);

    fn record(&self, label: &str, status: EntryStatus, message: Option<&str>) {
        self.record(label, status, message);
    }
}
