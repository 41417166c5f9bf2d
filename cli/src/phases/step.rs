//! Installer steps: probe, then walk the strategy chain until the probe holds.
use anyhow::Result;

use crate::config::phases::Category;
use crate::error::ResourceError;
use crate::resources::probe::{Probe, ProbeOutcome, VersionMarker};
use crate::resources::{Refresh, ResourceChange, ResourceState, Strategy};

use super::Context;

/// Smallest idempotent unit of provisioning work.
#[derive(Debug)]
pub struct Step {
    /// Logical resource name.
    pub name: String,
    /// Update category.
    pub category: Category,
    /// Whether failure aborts the run.
    pub mandatory: bool,
    /// Verification predicate.
    pub probe: Probe,
    /// Pinned version, if any.
    pub version: Option<String>,
    /// Acquisition strategies, tried in order.
    pub strategies: Vec<Box<dyn Strategy>>,
}

/// What happened to a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Target state already held.
    Skipped,
    /// A strategy brought the resource into (or up to) the target state.
    Installed {
        /// Kind of the strategy that succeeded.
        via: String,
    },
    /// Dry run: the intended actions were logged.
    DryRun,
    /// Every strategy declined to act.
    NotApplied {
        /// Collected decline reasons.
        reason: String,
    },
    /// The probe was invalid, or strategies ran without reaching the target state.
    Failed {
        /// Collected failure reasons.
        reason: String,
    },
}

impl StepOutcome {
    /// Whether the step ended short of its target state.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::NotApplied { .. } | Self::Failed { .. })
    }

    /// Failure reason, if any.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::NotApplied { reason } | Self::Failed { reason } => Some(reason),
            _ => None,
        }
    }
}

impl Step {
    /// Evaluate this step's probe against its pinned version.
    ///
    /// # Errors
    ///
    /// Returns an error if the observation itself fails.
    pub fn check(&self, ctx: &Context) -> Result<ProbeOutcome> {
        self.probe.evaluate(ctx, self.version.as_deref())
    }

    /// Bring the step to its target state unless it already holds.
    pub fn apply(&self, ctx: &Context) -> StepOutcome {
        let outcome = match self.check(ctx) {
            Ok(outcome) => outcome,
            Err(e) => {
                return StepOutcome::Failed {
                    reason: format!("probe failed: {e:#}"),
                };
            }
        };
        match outcome.state {
            ResourceState::Correct => StepOutcome::Skipped,
            ResourceState::Invalid { reason } => StepOutcome::Failed { reason },
            ResourceState::Missing | ResourceState::Incorrect { .. } => {
                if ctx.dry_run() {
                    self.log_chain(ctx, self.strategies.iter().map(AsRef::as_ref));
                    return StepOutcome::DryRun;
                }
                self.run_chain(ctx, self.strategies.iter().map(AsRef::as_ref))
            }
        }
    }

    /// Bring an existing resource up to date; a missing one is applied.
    ///
    /// Pinned steps re-run only their versioned strategies, and only when
    /// the installed version differs from the pin. Other steps refresh
    /// through the first strategy that supports it.
    pub fn refresh(&self, ctx: &Context) -> StepOutcome {
        let outcome = match self.check(ctx) {
            Ok(outcome) => outcome,
            Err(e) => {
                return StepOutcome::Failed {
                    reason: format!("probe failed: {e:#}"),
                };
            }
        };
        match &outcome.state {
            ResourceState::Missing => return self.apply(ctx),
            ResourceState::Invalid { reason } => {
                return StepOutcome::Failed {
                    reason: reason.clone(),
                };
            }
            ResourceState::Correct | ResourceState::Incorrect { .. } => {}
        }

        if let Some(pin) = &self.version {
            return self.refresh_pinned(ctx, pin, &outcome);
        }

        if ctx.dry_run() {
            ctx.log.dry_run(&format!("would refresh {}", self.name));
            return StepOutcome::DryRun;
        }
        for strategy in &self.strategies {
            match strategy.refresh(ctx) {
                Ok(Refresh::Unsupported) => {}
                Ok(Refresh::UpToDate) => return StepOutcome::Skipped,
                Ok(Refresh::Refreshed) => {
                    return StepOutcome::Installed {
                        via: strategy.kind().to_string(),
                    };
                }
                Err(e) => {
                    return StepOutcome::Failed {
                        reason: format!("{}: {e:#}", strategy.kind()),
                    };
                }
            }
        }
        StepOutcome::Skipped
    }

    fn refresh_pinned(&self, ctx: &Context, pin: &str, outcome: &ProbeOutcome) -> StepOutcome {
        let pin = pin.trim_start_matches('v');
        let stale = match &outcome.version {
            Some(VersionMarker::Known(current)) => current != pin,
            Some(VersionMarker::Unknown) => false,
            None => !outcome.is_correct(),
        };
        if !stale {
            return StepOutcome::Skipped;
        }
        let versioned = || {
            self.strategies
                .iter()
                .filter(|s| s.is_versioned())
                .map(AsRef::as_ref)
        };
        if versioned().next().is_none() {
            return StepOutcome::NotApplied {
                reason: format!("no versioned strategy to install {pin}"),
            };
        }
        if ctx.dry_run() {
            self.log_chain(ctx, versioned());
            return StepOutcome::DryRun;
        }
        self.run_chain(ctx, versioned())
    }

    fn log_chain<'a>(&self, ctx: &Context, chain: impl Iterator<Item = &'a dyn Strategy>) {
        for (i, strategy) in chain.enumerate() {
            let lead = if i == 0 { "would" } else { "  or else" };
            ctx.log
                .dry_run(&format!("{}: {lead} {}", self.name, strategy.describe(ctx)));
        }
    }

    fn run_chain<'a>(
        &self,
        ctx: &Context,
        chain: impl Iterator<Item = &'a dyn Strategy>,
    ) -> StepOutcome {
        let mut reasons = Vec::new();
        let mut attempted = false;
        for strategy in chain {
            let kind = strategy.kind();
            ctx.log
                .debug(&format!("{}: trying {}", self.name, strategy.describe(ctx)));
            match strategy.acquire(ctx) {
                Ok(ResourceChange::Skipped { reason }) => {
                    ctx.log.debug(&format!("{}: {kind} declined: {reason}", self.name));
                    reasons.push(format!("{kind}: {reason}"));
                }
                Ok(ResourceChange::Applied | ResourceChange::AlreadyCorrect) => {
                    attempted = true;
                    match self.check(ctx) {
                        Ok(after) if after.is_correct() => {
                            return StepOutcome::Installed {
                                via: kind.to_string(),
                            };
                        }
                        Ok(after) => {
                            let reason = format!("{kind}: probe still reports {}", after.state);
                            ctx.log.debug(&format!("{}: {reason}", self.name));
                            reasons.push(reason);
                        }
                        Err(e) => reasons.push(format!("{kind}: probe failed: {e:#}")),
                    }
                }
                Err(e) => {
                    attempted = true;
                    ctx.log.debug(&format!("{}: {kind} failed: {e:#}", self.name));
                    reasons.push(format!("{kind}: {e:#}"));
                }
            }
        }
        let reason = ResourceError::ChainExhausted {
            step: self.name.clone(),
            reasons: reasons.join("; "),
        }
        .to_string();
        if attempted {
            StepOutcome::Failed { reason }
        } else {
            StepOutcome::NotApplied { reason }
        }
    }
}
