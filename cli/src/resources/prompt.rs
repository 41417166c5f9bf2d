//! Interactive clone of an optional private repository.
use anyhow::{Context as _, Result};

use super::git::{clone_into, is_repository, pull};
use super::probe::Probe;
use super::{Refresh, ResourceChange, Strategy, tool_missing};
use crate::config::phases::Category;
use crate::phases::Context;

/// Ask for a repository URL and clone it; a blank answer declines.
#[derive(Debug, Clone)]
pub struct PromptClone {
    /// Question shown to the user.
    pub prompt: String,
    /// Checkout location.
    pub dest: String,
}

impl PromptClone {
    /// Normalise an answer: trimmed, `None` when blank.
    fn answer(raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

impl Strategy for PromptClone {
    fn kind(&self) -> &'static str {
        "prompt-clone"
    }

    fn describe(&self, ctx: &Context) -> String {
        format!(
            "ask \"{}\" and clone into {}",
            self.prompt,
            ctx.expand(&self.dest).display()
        )
    }

    fn acquire(&self, ctx: &Context) -> Result<ResourceChange> {
        if !ctx.interactive {
            return Ok(ResourceChange::Skipped {
                reason: "not an interactive terminal".to_string(),
            });
        }
        if !ctx.executor.which("git") {
            return Ok(tool_missing("git"));
        }
        let raw: String = dialoguer::Input::new()
            .with_prompt(&self.prompt)
            .allow_empty(true)
            .interact_text()
            .context("reading repository URL")?;
        let Some(url) = Self::answer(&raw) else {
            return Ok(ResourceChange::Skipped {
                reason: "no repository given".to_string(),
            });
        };
        clone_into(ctx, &url, &ctx.expand(&self.dest))?;
        Ok(ResourceChange::Applied)
    }

    fn refresh(&self, ctx: &Context) -> Result<Refresh> {
        let dest = ctx.expand(&self.dest);
        if !is_repository(&dest) {
            return Ok(Refresh::Unsupported);
        }
        pull(ctx, &dest)
    }

    fn implied_probe(&self) -> Option<Probe> {
        Some(Probe::Git {
            path: self.dest.clone(),
            url: None,
        })
    }

    fn implied_category(&self) -> Category {
        Category::Config
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resources::test_helpers::{MockExecutor, context};
    use std::sync::Arc;

    fn private() -> PromptClone {
        PromptClone {
            prompt: "Private config repository (blank to skip)".to_string(),
            dest: "~/.devsetup/private".to_string(),
        }
    }

    #[test]
    fn non_interactive_run_declines_without_prompting() {
        let home = tempfile::tempdir().unwrap();
        let exec = Arc::new(MockExecutor::default().with_program("git"));
        let ctx = context(home.path(), home.path(), Arc::clone(&exec));
        assert_eq!(
            private().acquire(&ctx).unwrap(),
            ResourceChange::Skipped {
                reason: "not an interactive terminal".to_string()
            }
        );
        assert_eq!(exec.call_count(), 0);
    }

    #[test]
    fn blank_answers_decline() {
        assert_eq!(PromptClone::answer("   "), None);
        assert_eq!(PromptClone::answer(""), None);
        assert_eq!(
            PromptClone::answer(" git@example.com:me/private.git\n"),
            Some("git@example.com:me/private.git".to_string())
        );
    }

    #[test]
    fn implied_check_is_any_checkout() {
        assert_eq!(
            private().implied_probe(),
            Some(Probe::Git {
                path: "~/.devsetup/private".to_string(),
                url: None
            })
        );
    }
}
