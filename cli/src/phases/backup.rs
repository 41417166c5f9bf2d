//! Timestamped backups of user files taken before they are overwritten.
use anyhow::{Context as _, Result};
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use crate::resources::helpers::fs::{copy_dir_recursive, ensure_parent_dir};

/// Backup directory for one run: `~/.devsetup/backups/<YYYYMMDD-HHMMSS>/`.
///
/// The directory is created on the first [`save`](Self::save) and reused for
/// the rest of the run. If a directory with the same timestamp already
/// exists, `-1`, `-2`, ... is appended.
#[derive(Debug)]
pub struct Backups {
    home: PathBuf,
    stamp: String,
    dir: Mutex<Option<PathBuf>>,
}

impl Backups {
    /// Backups for a run starting now, in local time.
    #[must_use]
    pub fn new(home: &Path) -> Self {
        Self::with_stamp(home, &chrono::Local::now().format("%Y%m%d-%H%M%S").to_string())
    }

    /// Backups with an explicit timestamp.
    #[must_use]
    pub fn with_stamp(home: &Path, stamp: &str) -> Self {
        Self {
            home: home.to_path_buf(),
            stamp: stamp.to_string(),
            dir: Mutex::new(None),
        }
    }

    /// Root of all backup runs.
    #[must_use]
    pub fn base(&self) -> PathBuf {
        self.home.join(".devsetup").join("backups")
    }

    /// The directory used by this run, if anything has been backed up.
    #[must_use]
    pub fn dir(&self) -> Option<PathBuf> {
        self.dir.lock().ok().and_then(|g| g.clone())
    }

    fn ensure_dir(&self) -> Result<PathBuf> {
        let mut guard = self
            .dir
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(dir) = guard.as_ref() {
            return Ok(dir.clone());
        }
        let base = self.base();
        let mut candidate = base.join(&self.stamp);
        let mut n = 0u32;
        while candidate.exists() {
            n += 1;
            candidate = base.join(format!("{}-{n}", self.stamp));
        }
        std::fs::create_dir_all(&candidate)
            .with_context(|| format!("creating backup directory {}", candidate.display()))?;
        *guard = Some(candidate.clone());
        Ok(candidate)
    }

    /// Copy `path` (file or directory) into the backup directory, keeping its
    /// location relative to home. Returns the backup location.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup directory cannot be created or the
    /// copy fails.
    pub fn save(&self, path: &Path) -> Result<PathBuf> {
        let rel = self.relative(path);
        let dest = self.ensure_dir()?.join(rel);
        if path.is_dir() {
            copy_dir_recursive(path, &dest, false)?;
        } else {
            ensure_parent_dir(&dest)?;
            std::fs::copy(path, &dest).with_context(|| {
                format!("backing up {} to {}", path.display(), dest.display())
            })?;
        }
        Ok(dest)
    }

    /// Path of `path` relative to home; paths elsewhere keep their absolute
    /// layout without the leading `/`.
    fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.home).map_or_else(
            |_| {
                path.components()
                    .filter(|c| matches!(c, Component::Normal(_)))
                    .collect()
            },
            Path::to_path_buf,
        )
    }
}
