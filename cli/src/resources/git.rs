//! Repository clones and fast-forward pulls.
use anyhow::{Result, bail};
use std::path::Path;

use super::helpers::fs::replace_dir_atomic;
use super::probe::Probe;
use super::{Refresh, ResourceChange, Strategy, tool_missing};
use crate::config::phases::Category;
use crate::phases::Context;

/// Shallow-clone `url` into `dest` through a staging directory.
///
/// An existing non-repository directory at `dest` is backed up first and
/// replaced only once the clone has succeeded.
///
/// # Errors
///
/// Returns an error if `git clone` fails, produces no checkout, or the
/// result cannot be moved into place.
pub fn clone_into(ctx: &Context, url: &str, dest: &Path) -> Result<()> {
    if dest.exists() {
        let saved = ctx.backups.save(dest)?;
        ctx.log.debug(&format!(
            "backed up {} to {}",
            dest.display(),
            saved.display()
        ));
    }
    replace_dir_atomic(dest, |stage| {
        let stage_str = stage.to_string_lossy();
        ctx.executor
            .run("git", &["clone", "--depth", "1", url, &stage_str])?;
        if !stage.join(".git").exists() {
            bail!("git clone of {url} produced no checkout");
        }
        Ok(())
    })
}

/// `git pull --ff-only` in `dest`.
///
/// # Errors
///
/// Returns an error if the pull fails (diverged history, network).
pub fn pull(ctx: &Context, dest: &Path) -> Result<Refresh> {
    let result = ctx.executor.run_in(dest, "git", &["pull", "--ff-only"])?;
    let out = result.stdout.to_lowercase();
    if out.contains("already up to date") || out.contains("already up-to-date") {
        Ok(Refresh::UpToDate)
    } else {
        Ok(Refresh::Refreshed)
    }
}

/// Whether `path` is a git checkout.
#[must_use]
pub fn is_repository(path: &Path) -> bool {
    git2::Repository::open(path).is_ok()
}

/// URL of the `origin` remote of the checkout at `path`, if any.
#[must_use]
pub fn origin_url(path: &Path) -> Option<String> {
    let repo = git2::Repository::open(path).ok()?;
    let remote = repo.find_remote("origin").ok()?;
    remote.url().map(String::from)
}

/// Shallow clone of a plugin repository.
#[derive(Debug, Clone)]
pub struct GitClone {
    /// Remote URL.
    pub url: String,
    /// Checkout location.
    pub dest: String,
}

impl Strategy for GitClone {
    fn kind(&self) -> &'static str {
        "git-clone"
    }

    fn describe(&self, ctx: &Context) -> String {
        format!(
            "git clone --depth 1 {} {}",
            self.url,
            ctx.expand(&self.dest).display()
        )
    }

    fn acquire(&self, ctx: &Context) -> Result<ResourceChange> {
        if !ctx.executor.which("git") {
            return Ok(tool_missing("git"));
        }
        clone_into(ctx, &self.url, &ctx.expand(&self.dest))?;
        Ok(ResourceChange::Applied)
    }

    fn refresh(&self, ctx: &Context) -> Result<Refresh> {
        let dest = ctx.expand(&self.dest);
        if !is_repository(&dest) {
            return Ok(Refresh::Unsupported);
        }
        // A checkout of another remote is replaced, never pulled.
        if origin_url(&dest).as_deref() != Some(self.url.as_str()) {
            if !ctx.executor.which("git") {
                return Ok(Refresh::Unsupported);
            }
            clone_into(ctx, &self.url, &dest)?;
            return Ok(Refresh::Refreshed);
        }
        pull(ctx, &dest)
    }

    fn implied_probe(&self) -> Option<Probe> {
        Some(Probe::Git {
            path: self.dest.clone(),
            url: Some(self.url.clone()),
        })
    }

    fn implied_category(&self) -> Category {
        Category::Plugin
    }
}
