//! Idempotent resource primitives: probes and acquisition strategies.
pub mod archive;
pub mod file;
pub mod git;
pub mod helpers;
pub mod package;
pub mod probe;
pub mod prompt;
pub mod shell;
pub mod symlink;

use anyhow::Result;
use std::fmt::{self, Debug};

use crate::config::phases::Category;
use crate::error::ResourceError;
use crate::phases::Context;
use probe::Probe;

/// State of a resource as reported by a probe.
///
/// # Examples
///
/// ```
/// use devsetup_cli::resources::ResourceState;
///
/// let missing = ResourceState::Missing;
/// let drift = ResourceState::Incorrect { current: "/bin/bash".into() };
///
/// assert_ne!(missing, ResourceState::Correct);
/// assert!(drift.needs_change());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Resource does not exist.
    Missing,
    /// Resource exists and matches the desired state.
    Correct,
    /// Resource exists but does not match the desired state.
    Incorrect {
        /// What was found instead.
        current: String,
    },
    /// Resource cannot be checked or applied (e.g., a directory where a file belongs).
    Invalid {
        /// Why.
        reason: String,
    },
}

impl ResourceState {
    /// Whether an acquisition could bring this resource to the target state.
    #[must_use]
    pub const fn needs_change(&self) -> bool {
        matches!(self, Self::Missing | Self::Incorrect { .. })
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing => f.write_str("missing"),
            Self::Correct => f.write_str("present"),
            Self::Incorrect { current } => write!(f, "incorrect ({current})"),
            Self::Invalid { reason } => write!(f, "invalid ({reason})"),
        }
    }
}

/// Result of running one acquisition strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceChange {
    /// Resource was created or updated.
    Applied,
    /// Resource was already correct (no change needed).
    AlreadyCorrect,
    /// Strategy declined to act (tool unavailable, user declined a prompt).
    Skipped {
        /// Why the strategy declined.
        reason: String,
    },
}

/// Result of refreshing an existing resource during `update`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Refresh {
    /// The resource was brought up to date.
    Refreshed,
    /// Nothing changed.
    UpToDate,
    /// This strategy has no refresh action.
    Unsupported,
}

/// One acquisition method in a step's fallback chain.
///
/// Implementations mutate the system only in [`acquire`](Self::acquire) and
/// [`refresh`](Self::refresh); they never run in dry-run mode.
pub trait Strategy: Debug + Send + Sync {
    /// Kind name as written in `phases.toml`.
    fn kind(&self) -> &'static str;

    /// Human-readable description of what [`acquire`](Self::acquire) would do.
    fn describe(&self, ctx: &Context) -> String;

    /// Bring the resource into existence.
    ///
    /// # Errors
    ///
    /// Returns an error if the acquisition was attempted and failed.
    fn acquire(&self, ctx: &Context) -> Result<ResourceChange>;

    /// Bring an existing resource up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the refresh was attempted and failed.
    fn refresh(&self, _ctx: &Context) -> Result<Refresh> {
        Ok(Refresh::Unsupported)
    }

    /// Probe used when the step declares none.
    fn implied_probe(&self) -> Option<Probe>;

    /// Category used when the step declares none.
    fn implied_category(&self) -> Category;

    /// Whether this strategy installs a specific pinned version.
    fn is_versioned(&self) -> bool {
        false
    }
}

/// Run `program args` with root privileges, prefixing `sudo` unless already root.
///
/// # Errors
///
/// Returns an error if the command cannot be spawned or exits non-zero.
pub fn run_privileged(
    ctx: &Context,
    program: &str,
    args: &[&str],
) -> Result<crate::exec::ExecResult> {
    if ctx.platform.is_root {
        ctx.executor.run(program, args)
    } else {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(program);
        full.extend_from_slice(args);
        ctx.executor.run("sudo", &full)
    }
}

/// Decline a strategy whose tool is not on the search path.
#[must_use]
pub fn tool_missing(tool: &str) -> ResourceChange {
    ResourceChange::Skipped {
        reason: ResourceError::ToolMissing(tool.to_string()).to_string(),
    }
}

/// Render a privileged command line for dry-run output.
#[must_use]
pub fn privileged_display(ctx: &Context, command: &str) -> String {
    if ctx.platform.is_root {
        command.to_string()
    } else {
        format!("sudo {command}")
    }
}
