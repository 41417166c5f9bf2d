pub mod doctor;
pub mod install;
pub mod update;
pub mod version;

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::GlobalOpts;
use crate::config::{Config, PHASE_FILE};
use crate::config::run::RunConfig;
use crate::error::PlatformError;
use crate::exec::SystemExecutor;
use crate::logging::{Log, Logger};
use crate::phases::Context;
use crate::platform::Platform;

/// Binary version: set at build time from CI or `git describe`, else the crate version.
pub const VERSION: &str = match option_env!("DEVSETUP_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};

/// Build the execution context for the target user.
///
/// The executor searches the target home's `~/.local/bin` and `~/.cargo/bin`
/// ahead of `PATH`.
///
/// # Errors
///
/// Returns an error if `--user` names an unknown account or no home
/// directory can be determined.
pub fn context(
    global: &GlobalOpts,
    root: PathBuf,
    skip_phases: &[u32],
    log: Arc<dyn Log>,
) -> Result<Context> {
    let platform = Platform::detect();
    let run = RunConfig::resolve(global.dry_run, skip_phases, global.user.as_deref())?;
    let executor = SystemExecutor::with_extra_paths(vec![
        run.home.join(".local").join("bin"),
        run.home.join(".cargo").join("bin"),
    ]);
    Ok(Context::new(root, run, platform, log, Arc::new(executor)))
}

/// Refuse to provision from a superuser process.
///
/// # Errors
///
/// Returns [`PlatformError::Superuser`] when `platform` runs as root.
pub const fn refuse_superuser(platform: &Platform) -> Result<(), PlatformError> {
    if platform.is_root {
        return Err(PlatformError::Superuser);
    }
    Ok(())
}

/// Load the phase model and report validation warnings.
///
/// # Errors
///
/// Returns an error if the phase file cannot be parsed or fails validation.
pub fn load_config(root: &Path, log: &dyn Log) -> Result<Config> {
    log.debug(&format!("loading {}", root.join(PHASE_FILE).display()));
    let config = Config::load(root)?;
    log.debug(&format!(
        "{} phases, {} steps",
        config.phases.len(),
        config.phases.iter().map(|p| p.steps.len()).sum::<usize>()
    ));

    if !config.warnings.is_empty() {
        log.warn(&format!(
            "found {} configuration warning(s):",
            config.warnings.len()
        ));
        for warning in &config.warnings {
            log.warn(&format!("  {warning}"));
        }
    }
    Ok(config)
}

/// Shared state produced by the common command setup sequence.
#[derive(Debug)]
pub struct CommandSetup {
    /// Phase model loaded from the resolved root.
    pub config: Config,
    /// Execution context for the target user.
    pub ctx: Context,
}

impl CommandSetup {
    /// Resolve the root, build the context and load the phase model.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be determined, the
    /// target user cannot be resolved, or the phase file fails to load.
    pub fn init(global: &GlobalOpts, skip_phases: &[u32], log: Arc<dyn Log>) -> Result<Self> {
        let root = resolve_root(global)?;
        let ctx = context(global, root, skip_phases, log)?;
        let config = load_config(&ctx.root, ctx.log.as_ref())?;
        Ok(Self { config, ctx })
    }
}

/// Print the summary, then surface the run's outcome.
///
/// # Errors
///
/// Returns `outcome` unchanged.
pub fn finish(log: &Logger, outcome: Result<()>) -> Result<()> {
    log.print_summary();
    outcome
}

/// Resolve the provisioning root.
///
/// First match wins: `--root`, `DEVSETUP_ROOT`, a directory near the
/// executable holding `conf/phases.toml`, the current directory.
///
/// # Errors
///
/// Returns an error if no candidate holds a phase file.
pub fn resolve_root(global: &GlobalOpts) -> Result<PathBuf> {
    if let Some(ref root) = global.root {
        return Ok(root.clone());
    }

    if let Ok(root) = std::env::var("DEVSETUP_ROOT") {
        return Ok(PathBuf::from(root));
    }

    if let Ok(exe) = std::env::current_exe()
        && let Some(parent) = exe.parent()
    {
        let candidates = [
            parent.join("../../.."), // cli/target/release/ → repo root
            parent.join("../.."),    // target/release/ → repo root
            parent.join(".."),       // bin/ → repo root
        ];
        for candidate in &candidates {
            if candidate.join(PHASE_FILE).is_file() {
                return Ok(dunce::canonicalize(candidate)?);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    if cwd.join(PHASE_FILE).is_file() {
        return Ok(cwd);
    }

    anyhow::bail!("cannot determine devsetup root. Use --root or set DEVSETUP_ROOT env var");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn global(root: Option<&str>) -> GlobalOpts {
        GlobalOpts {
            dry_run: false,
            user: None,
            root: root.map(PathBuf::from),
        }
    }

    #[test]
    fn resolve_root_uses_explicit_root() {
        assert_eq!(
            resolve_root(&global(Some("/explicit/path"))).unwrap(),
            PathBuf::from("/explicit/path")
        );
    }

    #[test]
    fn superuser_is_refused_before_setup() {
        use crate::platform::Arch;
        let root = Platform::new(Arch::X86_64, true, true);
        assert!(matches!(
            refuse_superuser(&root),
            Err(PlatformError::Superuser)
        ));
        assert!(refuse_superuser(&Platform::new(Arch::X86_64, true, false)).is_ok());
    }

    #[test]
    fn version_is_never_empty() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn load_config_logs_warnings() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("conf")).unwrap();
        std::fs::write(
            root.path().join(PHASE_FILE),
            r#"
            [[phase]]
            id = 3
            name = "Configuration files"
            [[phase.step]]
            name = "aliases"
            strategy = [{ kind = "copy", source = "files/aliases.zsh", dest = "~/.devsetup/aliases.zsh" }]
            "#,
        )
        .unwrap();
        let log = Logger::detached();
        let config = load_config(root.path(), &log).unwrap();
        assert_eq!(config.warnings.len(), 1);
    }
}
