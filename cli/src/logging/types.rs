//! Core logging types: summary entries, status, and the [`Log`] trait.
use std::fmt::Debug;

/// One line of the end-of-run summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryEntry {
    /// Label, usually `phase/step`.
    pub label: String,
    /// Final status of the unit of work.
    pub status: EntryStatus,
    /// Optional detail (skip reason, failure description, strategy used).
    pub message: Option<String>,
}

/// Status of a step or phase as reported in the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryStatus {
    /// Already in the target state; nothing was done.
    Ok,
    /// State was changed (installed, refreshed, relinked).
    Changed,
    /// Deliberately not run (skipped phase, out of update scope).
    Skipped,
    /// Dry-run preview; nothing was changed.
    DryRun,
    /// An optional unit of work failed; the run continued.
    Warned,
    /// A mandatory unit of work failed.
    Failed,
}

impl EntryStatus {
    /// Summary icon and ANSI color for this status.
    pub(super) const fn style(self) -> (&'static str, &'static str) {
        match self {
            Self::Ok => ("✓", "\x1b[32m"),
            Self::Changed => ("+", "\x1b[36m"),
            Self::Skipped => ("○", "\x1b[2m"),
            Self::DryRun => ("~", "\x1b[37m"),
            Self::Warned => ("!", "\x1b[33m"),
            Self::Failed => ("✗", "\x1b[31m"),
        }
    }
}

/// Abstraction over logging backends.
///
/// Steps, phases and commands log through this trait so tests can swap the
/// console logger for one that only records.
pub trait Log: Send + Sync + Debug {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a dry-run action message.
    fn dry_run(&self, msg: &str);
    /// Record a result for the summary.
    fn record(&self, label: &str, status: EntryStatus, message: Option<&str>);
}
