//! Default login shell.
use anyhow::Result;

use super::probe::Probe;
use super::{ResourceChange, Strategy, privileged_display, run_privileged};
use crate::config::phases::Category;
use crate::phases::Context;

/// `sudo chsh -s <shell path> <user>`.
#[derive(Debug, Clone)]
pub struct Chsh {
    /// Shell name, resolved on the search path.
    pub shell: String,
}

impl Strategy for Chsh {
    fn kind(&self) -> &'static str {
        "chsh"
    }

    fn describe(&self, ctx: &Context) -> String {
        let shell = ctx
            .executor
            .resolve(&self.shell)
            .map_or_else(|| self.shell.clone(), |p| p.display().to_string());
        privileged_display(ctx, &format!("chsh -s {shell} {}", ctx.run.user))
    }

    fn acquire(&self, ctx: &Context) -> Result<ResourceChange> {
        let Some(path) = ctx.executor.resolve(&self.shell) else {
            return Ok(ResourceChange::Skipped {
                reason: format!("{} not installed", self.shell),
            });
        };
        let path = path.to_string_lossy();
        run_privileged(ctx, "chsh", &["-s", &path, &ctx.run.user])?;
        Ok(ResourceChange::Applied)
    }

    fn implied_probe(&self) -> Option<Probe> {
        Some(Probe::Shell {
            name: self.shell.clone(),
        })
    }

    fn implied_category(&self) -> Category {
        Category::System
    }
}
