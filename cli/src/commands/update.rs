//! Command: refresh the provisioning repository, then refresh steps in scope.
use anyhow::Result;
use std::sync::Arc;

use super::{VERSION, context, finish, load_config, refuse_superuser, resolve_root};
use crate::cli::{GlobalOpts, UpdateOpts};
use crate::config::Config;
use crate::config::phases::Category;
use crate::logging::{Log, Logger};
use crate::phases::{self, Action, Context};
use crate::platform::Platform;
use crate::resources::Refresh;
use crate::resources::git::{is_repository, pull};

/// Which step categories an update touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Configs, plugins, tools and agents.
    All,
    /// `config` steps.
    Configs,
    /// `plugin` steps.
    Plugins,
    /// `package` steps.
    Tools,
    /// `agent` steps.
    Agents,
}

impl Scope {
    /// Whether steps of `category` are refreshed. `system` steps never are.
    #[must_use]
    pub const fn includes(self, category: Category) -> bool {
        match self {
            Self::All => !matches!(category, Category::System),
            Self::Configs => matches!(category, Category::Config),
            Self::Plugins => matches!(category, Category::Plugin),
            Self::Tools => matches!(category, Category::Package),
            Self::Agents => matches!(category, Category::Agent),
        }
    }
}

/// Run the update command.
///
/// The phase file is loaded only after the provisioning repository has
/// been pulled, so updates pick up new steps.
///
/// # Errors
///
/// Returns an error if setup fails, the phase file cannot be loaded, or a
/// mandatory step fails.
pub fn run(global: &GlobalOpts, opts: &UpdateOpts, log: &Arc<Logger>) -> Result<()> {
    log.info(&format!("devsetup {VERSION}"));
    refuse_superuser(&Platform::detect())?;
    let root = resolve_root(global)?;
    let ctx = context(global, root, &[], Arc::clone(log) as Arc<dyn Log>)?;
    refresh_root(&ctx);
    let config = load_config(&ctx.root, ctx.log.as_ref())?;
    finish(log, execute(&config, &ctx, opts.scope()))
}

/// `git pull --ff-only` in the provisioning root; failures only warn.
pub fn refresh_root(ctx: &Context) {
    ctx.log.stage("Updating provisioning repository");
    if !is_repository(&ctx.root) {
        ctx.log.warn(&format!(
            "{} is not a git checkout; using it as is",
            ctx.root.display()
        ));
        return;
    }
    if ctx.dry_run() {
        ctx.log
            .dry_run(&format!("would git pull --ff-only in {}", ctx.root.display()));
        return;
    }
    match pull(ctx, &ctx.root) {
        Ok(Refresh::UpToDate) => ctx.log.info("already up to date"),
        Ok(_) => ctx.log.info("pulled new commits"),
        Err(e) => ctx.log.warn(&format!("pull failed, continuing: {e:#}")),
    }
}

/// Refresh every step whose category is in `scope`, in phase order.
///
/// # Errors
///
/// Returns [`PlatformError::Superuser`](crate::error::PlatformError::Superuser)
/// when running as root, or the [`PhaseError`](crate::error::PhaseError) of
/// a failed mandatory step.
pub fn execute(config: &Config, ctx: &Context, scope: Scope) -> Result<()> {
    refuse_superuser(&ctx.platform)?;
    ctx.log.debug(&format!("update scope: {scope:?}"));
    if ctx.dry_run() {
        ctx.log.dry_run("no changes will be made");
    }
    phases::run(&config.phases, ctx, Action::Refresh, |step| {
        scope.includes(step.category)
    })
    .into_result()?;
    Ok(())
}
