use anyhow::Result;
use std::sync::Arc;

use super::{CommandSetup, VERSION, finish, refuse_superuser};
use crate::cli::{GlobalOpts, InstallOpts};
use crate::config::Config;
use crate::logging::{Log, Logger};
use crate::phases::{self, Action, Context};
use crate::platform::Platform;

/// Run the install command.
///
/// # Errors
///
/// Returns an error if a precondition fails (superuser, unknown user,
/// unknown skip phase), the phase file cannot be loaded, or a mandatory
/// step fails.
pub fn run(global: &GlobalOpts, opts: &InstallOpts, log: &Arc<Logger>) -> Result<()> {
    log.info(&format!("devsetup {VERSION}"));
    refuse_superuser(&Platform::detect())?;
    let setup = CommandSetup::init(global, &opts.skip_phases, Arc::clone(log) as Arc<dyn Log>)?;
    finish(log, execute(&setup.config, &setup.ctx))
}

/// Check preconditions, then apply every phase not in the skip set.
///
/// Nothing is mutated when a precondition fails.
///
/// # Errors
///
/// Returns [`PlatformError::Superuser`](crate::error::PlatformError::Superuser) when running as root,
/// [`ConfigError::UnknownPhase`](crate::error::ConfigError::UnknownPhase)
/// for an undefined skip id, or the
/// [`PhaseError`](crate::error::PhaseError) that aborted the run.
pub fn execute(config: &Config, ctx: &Context) -> Result<()> {
    refuse_superuser(&ctx.platform)?;
    let skip: Vec<u32> = ctx.run.skip_phases.iter().copied().collect();
    config.check_skip_phases(&skip)?;

    ctx.log.info(&format!(
        "provisioning {} ({}) on {}",
        ctx.run.user,
        ctx.home().display(),
        ctx.platform.arch
    ));
    if ctx.dry_run() {
        ctx.log.dry_run("no changes will be made");
    }

    phases::run(&config.phases, ctx, Action::Apply, |_| true).into_result()?;
    Ok(())
}
