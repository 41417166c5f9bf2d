use anyhow::{Context, Result, bail};
use std::ffi::OsString;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Whether the process exited with status 0.
    pub success: bool,
    /// Exit code, if the process was not killed by a signal.
    pub code: Option<i32>,
}

impl From<Output> for ExecResult {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            code: output.status.code(),
        }
    }
}

/// Abstraction over process execution and `PATH` lookup.
///
/// Every external collaborator (apt, git, npm, cargo, chsh, dpkg-query) is
/// reached through this trait so that steps and probes can be exercised
/// against a fabricated executor in tests.
pub trait Executor: Send + Sync + Debug {
    /// Run a command and return its output. Fails if the command exits non-zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exits non-zero.
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Run a command in a specific directory. Fails if the command exits non-zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exits non-zero.
    fn run_in(&self, dir: &Path, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Run a command, allowing failure (returns result without bailing).
    ///
    /// # Errors
    ///
    /// Returns an error only if the process cannot be spawned.
    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult>;

    /// Resolve `program` to an absolute path on the search path.
    fn resolve(&self, program: &str) -> Option<PathBuf>;

    /// Check if a program is available on the search path.
    fn which(&self, program: &str) -> bool {
        self.resolve(program).is_some()
    }
}

/// Production [`Executor`] that spawns real processes.
///
/// `extra_paths` are prepended to `PATH` both for lookups and for spawned
/// commands, so tools installed into the target user's `~/.local/bin` are
/// visible within the same run.
#[derive(Debug, Default, Clone)]
pub struct SystemExecutor {
    extra_paths: Vec<PathBuf>,
}

impl SystemExecutor {
    /// Create an executor that also searches `extra_paths`.
    #[must_use]
    pub const fn with_extra_paths(extra_paths: Vec<PathBuf>) -> Self {
        Self { extra_paths }
    }

    /// The effective `PATH` value: extra entries first, then the inherited `PATH`.
    fn search_path(&self) -> Option<OsString> {
        let inherited = std::env::var_os("PATH");
        let mut entries: Vec<PathBuf> = self.extra_paths.clone();
        if let Some(ref path) = inherited {
            entries.extend(std::env::split_paths(path));
        }
        std::env::join_paths(entries).ok().or(inherited)
    }

    fn command(&self, program: &str, args: &[&str]) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(path) = self.search_path() {
            cmd.env("PATH", path);
        }
        cmd
    }
}

/// Execute a command and return the result, bailing on non-zero exit.
fn execute_checked(mut cmd: Command, label: &str) -> Result<ExecResult> {
    let output = cmd
        .output()
        .with_context(|| format!("failed to execute: {label}"))?;
    let result = ExecResult::from(output);
    if !result.success {
        bail!(
            "{label} failed (exit {}): {}",
            result.code.unwrap_or(-1),
            result.stderr.trim()
        );
    }
    Ok(result)
}

impl Executor for SystemExecutor {
    fn run(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        execute_checked(self.command(program, args), program)
    }

    fn run_in(&self, dir: &Path, program: &str, args: &[&str]) -> Result<ExecResult> {
        let mut cmd = self.command(program, args);
        cmd.current_dir(dir);
        execute_checked(cmd, &format!("{program} in {}", dir.display()))
    }

    fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ExecResult> {
        let output = self
            .command(program, args)
            .output()
            .with_context(|| format!("failed to execute: {program}"))?;
        Ok(ExecResult::from(output))
    }

    fn resolve(&self, program: &str) -> Option<PathBuf> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        which::which_in(program, self.search_path(), cwd).ok()
    }
}
