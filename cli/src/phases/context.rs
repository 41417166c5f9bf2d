use std::io::IsTerminal as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::run::RunConfig;
use crate::exec::Executor;
use crate::logging::Log;
use crate::platform::Platform;

use super::backup::Backups;

/// Shared context for phase, step and strategy execution.
///
/// Carries all ambient state explicitly so tests can fabricate one with a
/// temporary home, a mock executor and a fixed platform.
pub struct Context {
    /// Root of the provisioning repository (holds `conf/` and `files/`).
    pub root: PathBuf,
    /// Per-invocation settings.
    pub run: RunConfig,
    /// Detected platform information.
    pub platform: Platform,
    /// Logger for output and summary recording.
    pub log: Arc<dyn Log>,
    /// Command executor (for testing or real system calls).
    pub executor: Arc<dyn Executor>,
    /// Backup directory for files replaced during this run.
    pub backups: Backups,
    /// Whether prompts may be shown (stdin is a terminal).
    pub interactive: bool,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("root", &self.root)
            .field("run", &self.run)
            .field("platform", &self.platform)
            .field("log", &"<dyn Log>")
            .field("executor", &"<dyn Executor>")
            .field("backups", &self.backups)
            .field("interactive", &self.interactive)
            .finish()
    }
}

impl Context {
    /// Create a context. Interactivity follows whether stdin is a terminal.
    #[must_use]
    pub fn new(
        root: PathBuf,
        run: RunConfig,
        platform: Platform,
        log: Arc<dyn Log>,
        executor: Arc<dyn Executor>,
    ) -> Self {
        let backups = Backups::new(&run.home);
        Self {
            root,
            run,
            platform,
            log,
            executor,
            backups,
            interactive: std::io::stdin().is_terminal(),
        }
    }

    /// Override whether prompts may be shown.
    #[must_use]
    pub const fn with_interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Replace the backup directory (fixed timestamps in tests).
    #[must_use]
    pub fn with_backups(mut self, backups: Backups) -> Self {
        self.backups = backups;
        self
    }

    /// Target home directory.
    #[must_use]
    pub fn home(&self) -> &Path {
        &self.run.home
    }

    /// Whether this is a dry run.
    #[must_use]
    pub const fn dry_run(&self) -> bool {
        self.run.dry_run
    }

    /// `~/.devsetup`.
    #[must_use]
    pub fn devsetup_dir(&self) -> PathBuf {
        self.run.home.join(".devsetup")
    }

    /// `~/.local/bin`, where downloaded and npm-installed tools land.
    #[must_use]
    pub fn local_bin(&self) -> PathBuf {
        self.run.home.join(".local").join("bin")
    }

    /// Expand a destination path: `~` and `~/...` against home, absolute
    /// paths unchanged, anything else relative to home.
    #[must_use]
    pub fn expand(&self, raw: &str) -> PathBuf {
        if raw == "~" {
            return self.run.home.clone();
        }
        if let Some(rest) = raw.strip_prefix("~/") {
            return self.run.home.join(rest);
        }
        let p = Path::new(raw);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.run.home.join(p)
        }
    }

    /// Resolve a source path: relative paths against the provisioning root.
    #[must_use]
    pub fn source_path(&self, raw: &str) -> PathBuf {
        if raw == "~" || raw.starts_with("~/") {
            return self.expand(raw);
        }
        let p = Path::new(raw);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root.join(p)
        }
    }

    /// Substitute `{version}`, `{arch}` and `{deb_arch}` in `template`.
    /// `{version}` is left untouched when no version is given.
    #[must_use]
    pub fn render(&self, template: &str, version: Option<&str>) -> String {
        let mut out = template
            .replace("{arch}", self.platform.arch.as_str())
            .replace("{deb_arch}", self.platform.arch.deb_arch());
        if let Some(v) = version {
            out = out.replace("{version}", v);
        }
        out
    }
}
