//! Domain-specific error types for the provisioning engine.
//!
//! Internal modules return typed errors (e.g., [`ConfigError`], [`PhaseError`])
//! while command handlers at the CLI boundary convert them to [`anyhow::Error`]
//! via the standard `?` operator.
//!
//! There is one enum per concern and no wrapping top-level type.

use thiserror::Error;

/// Errors that arise from loading and validating the phase model.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A phase id appears more than once.
    #[error("duplicate phase id {0}")]
    DuplicatePhase(u32),

    /// Phase ids start at 1.
    #[error("phase '{0}' has id 0; phase ids start at 1")]
    ZeroPhaseId(String),

    /// Two steps in the same phase share a name.
    #[error("phase {phase}: duplicate step name '{step}'")]
    DuplicateStep {
        /// Phase id.
        phase: u32,
        /// Step name.
        step: String,
    },

    /// A step declares no acquisition strategy.
    #[error("phase {phase}: step '{step}' has no strategy")]
    NoStrategy {
        /// Phase id.
        phase: u32,
        /// Step name.
        step: String,
    },

    /// A step has no explicit probe and none can be implied.
    #[error("phase {phase}: step '{step}' needs an explicit probe")]
    NoProbe {
        /// Phase id.
        phase: u32,
        /// Step name.
        step: String,
    },

    /// `--skip-phase` names a phase that does not exist.
    #[error("unknown phase {requested} (valid: {valid})")]
    UnknownPhase {
        /// The id passed on the command line.
        requested: u32,
        /// Comma-separated list of defined ids.
        valid: String,
    },

    /// The phase file contains no phases.
    #[error("no phases defined in {0}")]
    Empty(String),
}

/// Errors that abort a provisioning run at a phase boundary.
#[derive(Error, Debug)]
pub enum PhaseError {
    /// A mandatory step could not be brought to its target state.
    #[error("phase {phase} ({name}) failed: mandatory step '{step}': {reason}")]
    MandatoryStepFailed {
        /// Phase id.
        phase: u32,
        /// Phase display name.
        name: String,
        /// Step name.
        step: String,
        /// Human-readable reason.
        reason: String,
    },
}

/// Errors that arise from probes and acquisition strategies.
#[derive(Error, Debug)]
pub enum ResourceError {
    /// Every strategy in the chain failed.
    #[error("all strategies failed for '{step}': {reasons}")]
    ChainExhausted {
        /// Step name.
        step: String,
        /// Joined per-strategy reasons.
        reasons: String,
    },

    /// A downloaded archive did not match its pinned digest.
    #[error("checksum mismatch for {url}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Download URL.
        url: String,
        /// Pinned digest.
        expected: String,
        /// Computed digest.
        actual: String,
    },

    /// The expected binary was not present in an unpacked archive.
    #[error("binary '{binary}' not found in archive {url}")]
    BinaryNotInArchive {
        /// Binary file name.
        binary: String,
        /// Download URL.
        url: String,
    },

    /// A tool required by a strategy is not available.
    #[error("required tool '{0}' not found on PATH")]
    ToolMissing(String),
}

/// Errors that arise from platform preconditions.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// The engine was started with superuser privileges.
    #[error("refusing to run as root; run as the target user (sudo is used per command)")]
    Superuser,

    /// `--user` names an account that does not exist.
    #[error("unknown user '{0}'")]
    UnknownUser(String),

    /// The target home directory cannot be determined.
    #[error("cannot determine home directory for '{0}'")]
    NoHome(String),
}
