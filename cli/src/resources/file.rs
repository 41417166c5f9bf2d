//! Configuration files: copies, directory trees, literal writes and directories.
use anyhow::{Context as _, Result};
use std::path::Path;

use super::helpers::fs::{
    copy_dir_recursive, replace_dir_atomic, same_contents, trees_equal, write_atomic,
};
use super::probe::Probe;
use super::{Refresh, ResourceChange, Strategy};
use crate::config::phases::Category;
use crate::phases::Context;

/// Value substituted for `{version}` in written files (the installed marker).
pub const MARKER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Back up `dest` if it exists, logging where it went.
fn backup(ctx: &Context, dest: &Path) -> Result<()> {
    if dest.symlink_metadata().is_ok() && !dest.is_symlink() {
        let saved = ctx.backups.save(dest)?;
        ctx.log.info(&format!(
            "backed up {} to {}",
            dest.display(),
            saved.display()
        ));
    }
    Ok(())
}

/// Write `bytes` to `dest` unless it already holds them; back up what is replaced.
fn replace_file(ctx: &Context, dest: &Path, bytes: &[u8]) -> Result<Refresh> {
    if std::fs::read(dest).is_ok_and(|current| current == bytes) {
        return Ok(Refresh::UpToDate);
    }
    backup(ctx, dest)?;
    write_atomic(dest, bytes, None)?;
    Ok(Refresh::Refreshed)
}

/// Copy a file from the provisioning repository.
#[derive(Debug, Clone)]
pub struct CopyFile {
    /// Source, relative to the provisioning root.
    pub source: String,
    /// Destination.
    pub dest: String,
}

impl CopyFile {
    fn copy(&self, ctx: &Context) -> Result<Option<Refresh>> {
        let src = ctx.source_path(&self.source);
        if !src.is_file() {
            return Ok(None);
        }
        let dest = ctx.expand(&self.dest);
        if same_contents(&src, &dest) {
            return Ok(Some(Refresh::UpToDate));
        }
        let bytes = std::fs::read(&src).with_context(|| format!("reading {}", src.display()))?;
        replace_file(ctx, &dest, &bytes).map(Some)
    }
}

impl Strategy for CopyFile {
    fn kind(&self) -> &'static str {
        "copy"
    }

    fn describe(&self, ctx: &Context) -> String {
        format!(
            "copy {} to {}",
            ctx.source_path(&self.source).display(),
            ctx.expand(&self.dest).display()
        )
    }

    fn acquire(&self, ctx: &Context) -> Result<ResourceChange> {
        Ok(match self.copy(ctx)? {
            None => ResourceChange::Skipped {
                reason: format!("source {} missing", self.source),
            },
            Some(Refresh::UpToDate) => ResourceChange::AlreadyCorrect,
            Some(_) => ResourceChange::Applied,
        })
    }

    fn refresh(&self, ctx: &Context) -> Result<Refresh> {
        Ok(self.copy(ctx)?.unwrap_or(Refresh::Unsupported))
    }

    fn implied_probe(&self) -> Option<Probe> {
        Some(Probe::File {
            path: self.dest.clone(),
            source: Some(self.source.clone()),
            contents: None,
        })
    }

    fn implied_category(&self) -> Category {
        Category::Config
    }
}

/// Copy a directory tree from the provisioning repository.
#[derive(Debug, Clone)]
pub struct CopyDir {
    /// Source directory, relative to the provisioning root.
    pub source: String,
    /// Destination directory.
    pub dest: String,
}

impl CopyDir {
    fn copy(&self, ctx: &Context) -> Result<Option<Refresh>> {
        let src = ctx.source_path(&self.source);
        if !src.is_dir() {
            return Ok(None);
        }
        let dest = ctx.expand(&self.dest);
        if dest.is_dir() && trees_equal(&src, &dest, true)? {
            return Ok(Some(Refresh::UpToDate));
        }
        backup(ctx, &dest)?;
        replace_dir_atomic(&dest, |stage| copy_dir_recursive(&src, stage, true))?;
        Ok(Some(Refresh::Refreshed))
    }
}

impl Strategy for CopyDir {
    fn kind(&self) -> &'static str {
        "copy-dir"
    }

    fn describe(&self, ctx: &Context) -> String {
        format!(
            "copy tree {} to {}",
            ctx.source_path(&self.source).display(),
            ctx.expand(&self.dest).display()
        )
    }

    fn acquire(&self, ctx: &Context) -> Result<ResourceChange> {
        Ok(match self.copy(ctx)? {
            None => ResourceChange::Skipped {
                reason: format!("source {} missing", self.source),
            },
            Some(Refresh::UpToDate) => ResourceChange::AlreadyCorrect,
            Some(_) => ResourceChange::Applied,
        })
    }

    fn refresh(&self, ctx: &Context) -> Result<Refresh> {
        Ok(self.copy(ctx)?.unwrap_or(Refresh::Unsupported))
    }

    fn implied_probe(&self) -> Option<Probe> {
        Some(Probe::Dir {
            path: self.dest.clone(),
        })
    }

    fn implied_category(&self) -> Category {
        Category::Config
    }
}

/// Write literal contents; `{version}` becomes the binary version.
#[derive(Debug, Clone)]
pub struct WriteFile {
    /// Destination.
    pub dest: String,
    /// Contents template.
    pub contents: String,
}

impl Strategy for WriteFile {
    fn kind(&self) -> &'static str {
        "write"
    }

    fn describe(&self, ctx: &Context) -> String {
        format!("write {}", ctx.expand(&self.dest).display())
    }

    fn acquire(&self, ctx: &Context) -> Result<ResourceChange> {
        Ok(match self.refresh(ctx)? {
            Refresh::UpToDate => ResourceChange::AlreadyCorrect,
            _ => ResourceChange::Applied,
        })
    }

    fn refresh(&self, ctx: &Context) -> Result<Refresh> {
        let bytes = ctx.render(&self.contents, Some(MARKER_VERSION));
        replace_file(ctx, &ctx.expand(&self.dest), bytes.as_bytes())
    }

    fn implied_probe(&self) -> Option<Probe> {
        Some(Probe::File {
            path: self.dest.clone(),
            source: None,
            contents: Some(self.contents.clone()),
        })
    }

    fn implied_category(&self) -> Category {
        Category::Config
    }
}

/// Create a directory (and its parents).
#[derive(Debug, Clone)]
pub struct Mkdir {
    /// Directory path.
    pub path: String,
}

impl Strategy for Mkdir {
    fn kind(&self) -> &'static str {
        "mkdir"
    }

    fn describe(&self, ctx: &Context) -> String {
        format!("mkdir -p {}", ctx.expand(&self.path).display())
    }

    fn acquire(&self, ctx: &Context) -> Result<ResourceChange> {
        let path = ctx.expand(&self.path);
        if path.is_dir() {
            return Ok(ResourceChange::AlreadyCorrect);
        }
        std::fs::create_dir_all(&path)
            .with_context(|| format!("creating {}", path.display()))?;
        Ok(ResourceChange::Applied)
    }

    fn implied_probe(&self) -> Option<Probe> {
        Some(Probe::Dir {
            path: self.path.clone(),
        })
    }

    fn implied_category(&self) -> Category {
        Category::System
    }
}
