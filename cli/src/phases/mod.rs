//! Phases: ordered, skippable groups of installer steps.
pub mod backup;
pub mod context;
pub mod step;

use std::collections::BTreeMap;

pub use context::Context;
pub use step::{Step, StepOutcome};

use crate::error::PhaseError;
use crate::logging::EntryStatus;

/// An ordered group of steps with a stable numeric id.
#[derive(Debug)]
pub struct Phase {
    /// Stable id, used by `--skip-phase`.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Steps in execution order.
    pub steps: Vec<Step>,
}

impl Phase {
    /// Stage header, e.g. `Phase 2: CLI tools`.
    #[must_use]
    pub fn title(&self) -> String {
        format!("Phase {}: {}", self.id, self.name)
    }
}

/// Lifecycle of one phase within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStatus {
    /// Not reached (a previous phase aborted the run).
    NotStarted,
    /// Steps are executing.
    Running,
    /// All steps ran; optional failures may have been warned about.
    Completed,
    /// Excluded by `--skip-phase`.
    Skipped,
    /// Completed in dry-run mode.
    DryRun,
    /// A mandatory step failed.
    Failed,
}

/// What to do with each step of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Probe, then acquire what is missing.
    Apply,
    /// Bring existing resources up to date.
    Refresh,
}

/// Result of running a list of phases.
#[derive(Debug)]
pub struct RunOutcome {
    /// Final status per phase id.
    pub statuses: BTreeMap<u32, PhaseStatus>,
    /// The mandatory failure that aborted the run, if any.
    pub failure: Option<PhaseError>,
}

impl RunOutcome {
    /// Convert into a result, surfacing the aborting failure.
    ///
    /// # Errors
    ///
    /// Returns the [`PhaseError`] that aborted the run.
    pub fn into_result(self) -> Result<BTreeMap<u32, PhaseStatus>, PhaseError> {
        match self.failure {
            Some(e) => Err(e),
            None => Ok(self.statuses),
        }
    }
}

/// Run `phases` in order, applying `action` to every step accepted by `in_scope`.
///
/// Phases in the run's skip set are marked skipped without probing. A
/// failed optional step is warned about and the phase continues; a failed
/// mandatory step fails its phase and leaves later phases not started.
pub fn run(
    phases: &[Phase],
    ctx: &Context,
    action: Action,
    in_scope: impl Fn(&Step) -> bool,
) -> RunOutcome {
    let mut statuses: BTreeMap<u32, PhaseStatus> = phases
        .iter()
        .map(|p| (p.id, PhaseStatus::NotStarted))
        .collect();

    for phase in phases {
        if ctx.run.skip_phases.contains(&phase.id) {
            ctx.log.info(&format!("skipping {}", phase.title()));
            ctx.log
                .record(&phase.title(), EntryStatus::Skipped, Some("--skip-phase"));
            statuses.insert(phase.id, PhaseStatus::Skipped);
            continue;
        }

        let steps: Vec<&Step> = phase.steps.iter().filter(|s| in_scope(s)).collect();
        if steps.is_empty() {
            statuses.insert(phase.id, PhaseStatus::Completed);
            continue;
        }

        ctx.log.stage(&phase.title());
        statuses.insert(phase.id, PhaseStatus::Running);

        for step in steps {
            let outcome = match action {
                Action::Apply => step.apply(ctx),
                Action::Refresh => step.refresh(ctx),
            };
            report(ctx, phase, step, &outcome);
            if step.mandatory && outcome.is_failure() {
                statuses.insert(phase.id, PhaseStatus::Failed);
                let failure = PhaseError::MandatoryStepFailed {
                    phase: phase.id,
                    name: phase.name.clone(),
                    step: step.name.clone(),
                    reason: outcome.reason().unwrap_or_default().to_string(),
                };
                return RunOutcome {
                    statuses,
                    failure: Some(failure),
                };
            }
        }

        let done = if ctx.dry_run() {
            PhaseStatus::DryRun
        } else {
            PhaseStatus::Completed
        };
        statuses.insert(phase.id, done);
    }

    RunOutcome {
        statuses,
        failure: None,
    }
}

/// Log a step outcome and record it for the summary.
fn report(ctx: &Context, phase: &Phase, step: &Step, outcome: &StepOutcome) {
    let label = format!("{}/{}", phase.id, step.name);
    match outcome {
        StepOutcome::Skipped => {
            ctx.log.debug(&format!("{}: already present", step.name));
            ctx.log.record(&label, EntryStatus::Ok, None);
        }
        StepOutcome::Installed { via } => {
            ctx.log.info(&format!("{}: done via {via}", step.name));
            ctx.log.record(&label, EntryStatus::Changed, Some(via));
        }
        StepOutcome::DryRun => ctx.log.record(&label, EntryStatus::DryRun, None),
        StepOutcome::NotApplied { reason } | StepOutcome::Failed { reason } => {
            if step.mandatory {
                ctx.log.error(&format!("{}: {reason}", step.name));
                ctx.log.record(&label, EntryStatus::Failed, Some(reason));
            } else {
                ctx.log.warn(&format!("{}: {reason}", step.name));
                ctx.log.record(&label, EntryStatus::Warned, Some(reason));
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::phases::Category;
    use crate::logging::Logger;
    use crate::resources::file::Mkdir;
    use crate::resources::probe::Probe;
    use crate::resources::test_helpers::{MockExecutor, context};
    use std::fmt::Write as _;
    use std::sync::Arc;

    fn mkdir_step(name: &str, mandatory: bool, path: &str) -> Step {
        Step {
            name: name.to_string(),
            category: Category::System,
            mandatory,
            probe: Probe::Dir {
                path: path.to_string(),
            },
            version: None,
            strategies: vec![Box::new(Mkdir {
                path: path.to_string(),
            })],
        }
    }

    /// A step that can never be satisfied: its probe watches a path no strategy creates.
    fn broken_step(name: &str, mandatory: bool) -> Step {
        Step {
            probe: Probe::Dir {
                path: "~/never".to_string(),
            },
            ..mkdir_step(name, mandatory, "~/elsewhere")
        }
    }

    fn phases() -> Vec<Phase> {
        vec![
            Phase {
                id: 1,
                name: "Base".to_string(),
                steps: vec![mkdir_step("bin", true, "~/.local/bin")],
            },
            Phase {
                id: 2,
                name: "Optional".to_string(),
                steps: vec![
                    broken_step("flaky", false),
                    mkdir_step("plugins", false, "~/.devsetup/plugins"),
                ],
            },
            Phase {
                id: 3,
                name: "Tail".to_string(),
                steps: vec![mkdir_step("lib", false, "~/.devsetup/lib")],
            },
        ]
    }

    fn listing(statuses: &BTreeMap<u32, PhaseStatus>) -> String {
        let mut out = String::new();
        for (id, status) in statuses {
            writeln!(out, "{id} {status:?}").unwrap();
        }
        out
    }

    #[test]
    fn optional_failure_warns_and_continues() {
        let home = tempfile::tempdir().unwrap();
        let logger = Arc::new(Logger::detached());
        let mut ctx = context(home.path(), home.path(), Arc::new(MockExecutor::default()));
        ctx.log = Arc::clone(&logger) as Arc<dyn crate::logging::Log>;

        let statuses = run(&phases(), &ctx, Action::Apply, |_| true)
            .into_result()
            .unwrap();
        insta::assert_snapshot!(listing(&statuses), @r"
        1 Completed
        2 Completed
        3 Completed
        ");
        assert!(home.path().join(".devsetup/lib").is_dir());
        assert_eq!(logger.count(EntryStatus::Warned), 1);
        assert_eq!(logger.count(EntryStatus::Changed), 3);
    }

    #[test]
    fn second_run_skips_everything() {
        let home = tempfile::tempdir().unwrap();
        let ctx = context(home.path(), home.path(), Arc::new(MockExecutor::default()));
        run(&phases(), &ctx, Action::Apply, |_| true);

        let logger = Arc::new(Logger::detached());
        let mut ctx = ctx;
        ctx.log = Arc::clone(&logger) as Arc<dyn crate::logging::Log>;
        run(&phases(), &ctx, Action::Apply, |_| true);
        assert_eq!(logger.count(EntryStatus::Changed), 0);
        assert_eq!(logger.count(EntryStatus::Ok), 3);
    }

    #[test]
    fn mandatory_failure_aborts_later_phases() {
        let home = tempfile::tempdir().unwrap();
        let ctx = context(home.path(), home.path(), Arc::new(MockExecutor::default()));
        let mut model = phases();
        model[1].steps[0].mandatory = true;

        let outcome = run(&model, &ctx, Action::Apply, |_| true);
        insta::assert_snapshot!(listing(&outcome.statuses), @r"
        1 Completed
        2 Failed
        3 NotStarted
        ");
        let err = outcome.failure.unwrap();
        assert!(err.to_string().contains("phase 2 (Optional)"));
        assert!(!home.path().join(".devsetup/lib").exists());
    }

    #[test]
    fn skipped_phase_is_not_inspected() {
        let home = tempfile::tempdir().unwrap();
        let mut ctx = context(home.path(), home.path(), Arc::new(MockExecutor::default()));
        ctx.run.skip_phases.insert(3);

        let statuses = run(&phases(), &ctx, Action::Apply, |_| true)
            .into_result()
            .unwrap();
        assert_eq!(statuses[&3], PhaseStatus::Skipped);
        assert!(!home.path().join(".devsetup/lib").exists());
        assert!(home.path().join(".devsetup/plugins").exists());
    }

    #[test]
    fn dry_run_marks_phases_and_mutates_nothing() {
        let home = tempfile::tempdir().unwrap();
        let mut ctx = context(home.path(), home.path(), Arc::new(MockExecutor::default()));
        ctx.run.dry_run = true;

        let statuses = run(&phases(), &ctx, Action::Apply, |_| true)
            .into_result()
            .unwrap();
        assert!(statuses.values().all(|s| *s == PhaseStatus::DryRun));
        assert!(!home.path().join(".local").exists());
        assert!(!home.path().join(".devsetup").exists());
    }

    #[test]
    fn scope_filter_limits_steps() {
        let home = tempfile::tempdir().unwrap();
        let ctx = context(home.path(), home.path(), Arc::new(MockExecutor::default()));
        run(&phases(), &ctx, Action::Apply, |s| s.name == "lib");
        assert!(home.path().join(".devsetup/lib").is_dir());
        assert!(!home.path().join(".local/bin").exists());
    }
}
