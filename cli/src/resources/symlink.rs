//! Symlinks from the home directory into the provisioning repository.
use anyhow::{Context as _, Result};
use std::path::Path;

use super::helpers::fs::ensure_parent_dir;
use super::probe::Probe;
use super::{Refresh, ResourceChange, ResourceState, Strategy};
use crate::config::phases::Category;
use crate::phases::Context;

/// Replace whatever is at `link` with a symlink to `source`.
#[derive(Debug, Clone)]
pub struct Symlink {
    /// Link target, relative to the provisioning root.
    pub source: String,
    /// Where the link lives.
    pub link: String,
}

impl Symlink {
    fn probe(&self) -> Probe {
        Probe::Symlink {
            link: self.link.clone(),
            target: self.source.clone(),
        }
    }

    fn relink(&self, ctx: &Context) -> Result<()> {
        let target = ctx.source_path(&self.source);
        let link = ctx.expand(&self.link);
        ensure_parent_dir(&link)?;

        if let Ok(meta) = link.symlink_metadata()
            && !meta.file_type().is_symlink()
        {
            let saved = ctx.backups.save(&link)?;
            ctx.log.info(&format!(
                "backed up {} to {}",
                link.display(),
                saved.display()
            ));
        }

        let staged = staging_path(&link);
        let _ = std::fs::remove_file(&staged);
        std::os::unix::fs::symlink(&target, &staged).with_context(|| {
            format!("creating symlink {} -> {}", staged.display(), target.display())
        })?;
        if let Err(e) = std::fs::rename(&staged, &link) {
            let _ = std::fs::remove_file(&staged);
            return Err(e).with_context(|| format!("replacing {}", link.display()));
        }
        Ok(())
    }
}

/// Sibling path used to stage a link before it is renamed over the old one.
fn staging_path(link: &Path) -> std::path::PathBuf {
    let name = link
        .file_name()
        .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
    link.with_file_name(format!(".devsetup-stage-{name}"))
}

impl Strategy for Symlink {
    fn kind(&self) -> &'static str {
        "symlink"
    }

    fn describe(&self, ctx: &Context) -> String {
        format!(
            "ln -sf {} {}",
            ctx.source_path(&self.source).display(),
            ctx.expand(&self.link).display()
        )
    }

    fn acquire(&self, ctx: &Context) -> Result<ResourceChange> {
        if !ctx.source_path(&self.source).exists() {
            return Ok(ResourceChange::Skipped {
                reason: format!("source {} missing", self.source),
            });
        }
        match self.probe().evaluate(ctx, None)?.state {
            ResourceState::Correct => Ok(ResourceChange::AlreadyCorrect),
            ResourceState::Invalid { reason } => Ok(ResourceChange::Skipped { reason }),
            ResourceState::Missing | ResourceState::Incorrect { .. } => {
                self.relink(ctx)?;
                Ok(ResourceChange::Applied)
            }
        }
    }

    fn refresh(&self, ctx: &Context) -> Result<Refresh> {
        Ok(match self.acquire(ctx)? {
            ResourceChange::Applied => Refresh::Refreshed,
            ResourceChange::AlreadyCorrect => Refresh::UpToDate,
            ResourceChange::Skipped { .. } => Refresh::Unsupported,
        })
    }

    fn implied_probe(&self) -> Option<Probe> {
        Some(self.probe())
    }

    fn implied_category(&self) -> Category {
        Category::Config
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::phases::backup::Backups;
    use crate::resources::test_helpers::{MockExecutor, context};
    use std::sync::Arc;

    fn zshrc() -> Symlink {
        Symlink {
            source: "files/zshrc".to_string(),
            link: "~/.zshrc".to_string(),
        }
    }

    fn setup() -> (tempfile::TempDir, tempfile::TempDir, Context) {
        let root = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("files")).unwrap();
        std::fs::write(root.path().join("files/zshrc"), "source ~/.devsetup/zshrc\n").unwrap();
        let ctx = context(root.path(), home.path(), Arc::new(MockExecutor::default()))
            .with_backups(Backups::with_stamp(home.path(), "20260101-120000"));
        (root, home, ctx)
    }

    #[test]
    fn creates_link_to_repository_file() {
        let (root, home, ctx) = setup();
        assert_eq!(zshrc().acquire(&ctx).unwrap(), ResourceChange::Applied);
        assert_eq!(
            std::fs::read_link(home.path().join(".zshrc")).unwrap(),
            root.path().join("files/zshrc")
        );
        assert!(zshrc().implied_probe().unwrap().evaluate(&ctx, None).unwrap().is_correct());
        assert_eq!(zshrc().acquire(&ctx).unwrap(), ResourceChange::AlreadyCorrect);
    }

    #[test]
    fn regular_file_is_backed_up_then_replaced() {
        let (_root, home, ctx) = setup();
        std::fs::write(home.path().join(".zshrc"), "export EDITOR=vi\n").unwrap();

        assert_eq!(zshrc().refresh(&ctx).unwrap(), Refresh::Refreshed);

        assert!(home.path().join(".zshrc").is_symlink());
        let saved = home.path().join(".devsetup/backups/20260101-120000/.zshrc");
        assert_eq!(std::fs::read_to_string(saved).unwrap(), "export EDITOR=vi\n");
    }

    #[test]
    fn wrong_link_is_replaced_without_backup() {
        let (_root, home, ctx) = setup();
        std::os::unix::fs::symlink("/etc/zsh/zshrc", home.path().join(".zshrc")).unwrap();
        assert_eq!(zshrc().acquire(&ctx).unwrap(), ResourceChange::Applied);
        assert!(ctx.backups.dir().is_none());
        assert!(!home.path().join(".devsetup-stage-.zshrc").exists());
    }

    #[test]
    fn directory_in_place_declines() {
        let (_root, home, ctx) = setup();
        std::fs::create_dir(home.path().join(".zshrc")).unwrap();
        assert!(matches!(
            zshrc().acquire(&ctx).unwrap(),
            ResourceChange::Skipped { .. }
        ));
    }

    #[test]
    fn missing_source_declines() {
        let (_root, _home, ctx) = setup();
        let link = Symlink {
            source: "files/absent".to_string(),
            link: "~/.absent".to_string(),
        };
        assert!(matches!(
            link.acquire(&ctx).unwrap(),
            ResourceChange::Skipped { .. }
        ));
    }
}
