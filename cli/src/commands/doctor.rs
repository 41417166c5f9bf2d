//! Command: read-only health check over every step's target state.
use anyhow::Result;
use std::fmt;
use std::sync::Arc;

use super::version::installed_marker;
use super::{CommandSetup, VERSION};
use crate::cli::GlobalOpts;
use crate::logging::{Log, Logger};
use crate::phases::{Context, Phase, Step};
use crate::resources::ResourceState;
use crate::resources::probe::{Probe, ProbeOutcome};

/// Classification of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    /// Target state holds.
    Ok,
    /// Optional step missing, or drift from the target state.
    Warn,
    /// Mandatory step missing or unverifiable.
    Fail,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Ok => "[OK]",
            Self::Warn => "[WARN]",
            Self::Fail => "[FAIL]",
        })
    }
}

/// One report line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Phase id the step belongs to.
    pub phase: u32,
    /// Step name.
    pub step: String,
    /// Classification.
    pub health: Health,
    /// Version marker or state detail.
    pub detail: Option<String>,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<6} {}", self.health, self.step)?;
        if let Some(detail) = &self.detail {
            write!(f, " ({detail})")?;
        }
        Ok(())
    }
}

/// Outcome of a doctor run.
#[derive(Debug, Default)]
pub struct Report {
    /// Steps whose target state holds.
    pub ok: usize,
    /// Steps with warnings.
    pub warn: usize,
    /// Steps that failed.
    pub fail: usize,
    /// Per-step findings in phase order.
    pub findings: Vec<Finding>,
}

impl Report {
    fn push(&mut self, finding: Finding) {
        match finding.health {
            Health::Ok => self.ok += 1,
            Health::Warn => self.warn += 1,
            Health::Fail => self.fail += 1,
        }
        self.findings.push(finding);
    }

    /// Whether the report carries no failures.
    #[must_use]
    pub const fn is_healthy(&self) -> bool {
        self.fail == 0
    }

    /// `N ok, N warnings, N failures`.
    #[must_use]
    pub fn totals(&self) -> String {
        format!(
            "{} ok, {} warnings, {} failures",
            self.ok, self.warn, self.fail
        )
    }
}

/// Classify a step from its probe result.
#[must_use]
pub fn classify(step: &Step, probe: &Result<ProbeOutcome>) -> (Health, Option<String>) {
    let unverifiable = if step.mandatory {
        Health::Fail
    } else {
        Health::Warn
    };
    match probe {
        Err(e) => (unverifiable, Some(format!("probe failed: {e:#}"))),
        Ok(outcome) => {
            let version = outcome.version.as_ref().map(ToString::to_string);
            match &outcome.state {
                ResourceState::Correct => (Health::Ok, version),
                ResourceState::Missing => (unverifiable, Some("missing".to_string())),
                ResourceState::Incorrect { current } if matches!(step.probe, Probe::Package { .. }) => {
                    (unverifiable, Some(current.clone()))
                }
                ResourceState::Incorrect { current } => {
                    let detail = step.version.as_ref().map_or_else(
                        || format!("found {current}"),
                        |pin| format!("found {current}, want {pin}"),
                    );
                    (Health::Warn, Some(detail))
                }
                ResourceState::Invalid { reason } => (unverifiable, Some(reason.clone())),
            }
        }
    }
}

/// Probe every step of every phase. Never mutates state.
#[must_use]
pub fn check(phases: &[Phase], ctx: &Context) -> Report {
    let mut report = Report::default();
    for phase in phases {
        for step in &phase.steps {
            let (health, detail) = classify(step, &step.check(ctx));
            report.push(Finding {
                phase: phase.id,
                step: step.name.clone(),
                health,
                detail,
            });
        }
    }
    report
}

/// Log the environment, then one line per step grouped by phase, then totals.
pub fn print(report: &Report, phases: &[Phase], ctx: &Context) {
    let log = ctx.log.as_ref();
    log.stage("Environment");
    log.info(&format!("devsetup {VERSION}"));
    log.info(&format!("architecture: {}", ctx.platform.arch));
    log.info(&format!(
        "package manager: {}",
        ctx.platform.package_manager().unwrap_or("none")
    ));
    log.info(&format!(
        "installed: {}",
        installed_marker(ctx.home()).as_deref().unwrap_or("none")
    ));

    for phase in phases {
        log.stage(&phase.title());
        for finding in report.findings.iter().filter(|f| f.phase == phase.id) {
            log.info(&finding.to_string());
        }
    }

    log.stage("Result");
    log.info(&report.totals());
}

/// Run the doctor command.
///
/// # Errors
///
/// Returns an error if setup fails or any step is classified FAIL.
pub fn run(global: &GlobalOpts, log: &Arc<Logger>) -> Result<()> {
    let setup = CommandSetup::init(global, &[], Arc::clone(log) as Arc<dyn Log>)?;
    let report = check(&setup.config.phases, &setup.ctx);
    print(&report, &setup.config.phases, &setup.ctx);
    if !report.is_healthy() {
        anyhow::bail!("{} failure(s)", report.fail);
    }
    Ok(())
}
