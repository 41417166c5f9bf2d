// Shared helpers for integration tests.
//
// Provides a temporary provisioning repository plus a temporary home, a fake
// system executor that emulates apt, dpkg, git, npm and the passwd database
// in memory, and a logger that records every message so tests can assert on
// dry-run output.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use devsetup_cli::config::Config;
use devsetup_cli::config::run::RunConfig;
use devsetup_cli::exec::{ExecResult, Executor};
use devsetup_cli::logging::{EntryStatus, Log};
use devsetup_cli::phases::Context;
use devsetup_cli::phases::backup::Backups;
use devsetup_cli::platform::{Arch, Platform};

/// Fixed backup stamp so backup paths are predictable.
pub const STAMP: &str = "20260101-120000";

/// Phase model used by most tests: every strategy kind that the fake system
/// can emulate without network access.
pub const MODEL: &str = r#"
[[phase]]
id = 1
name = "System packages"

[[phase.step]]
name = "base packages"
mandatory = true
strategy = [{ kind = "apt", packages = ["git", "curl"] }]

[[phase]]
id = 2
name = "CLI tools"

[[phase.step]]
name = "bat"
probe = { kind = "command", names = ["bat", "batcat"] }
strategy = [{ kind = "apt", packages = ["bat"] }]

[[phase.step]]
name = "lsd"
version = "1.1.5"
probe = { kind = "command", names = ["lsd"] }
strategy = [
  { kind = "apt", packages = ["lsd"] },
  { kind = "archive", url = "https://github.com/lsd-rs/lsd/releases/download/v{version}/lsd-v{version}-{arch}-unknown-linux-gnu.tar.gz", binary = "lsd" },
]

[[phase]]
id = 3
name = "Configuration files"

[[phase.step]]
name = "provisioning dir"
strategy = [{ kind = "mkdir", path = "~/.devsetup" }]

[[phase.step]]
name = "shell lib"
strategy = [{ kind = "copy-dir", source = "files/lib", dest = "~/.devsetup/lib" }]

[[phase.step]]
name = "aliases"
strategy = [{ kind = "copy", source = "files/aliases.zsh", dest = "~/.devsetup/aliases.zsh" }]

[[phase.step]]
name = "theme"
strategy = [{ kind = "copy", source = "files/theme.zsh", dest = "~/.devsetup/theme.zsh" }]

[[phase.step]]
name = "version marker"
strategy = [{ kind = "write", dest = "~/.devsetup/VERSION", contents = "{version}\n" }]

[[phase]]
id = 4
name = "Shell setup"

[[phase.step]]
name = "zsh"
mandatory = true
probe = { kind = "command", names = ["zsh"] }
strategy = [{ kind = "apt", packages = ["zsh"] }]

[[phase.step]]
name = "zsh-autosuggestions"
mandatory = true
strategy = [
  { kind = "git-clone", url = "https://github.com/zsh-users/zsh-autosuggestions", dest = "~/.devsetup/plugins/zsh-autosuggestions" },
]

[[phase.step]]
name = "zshrc link"
strategy = [{ kind = "symlink", source = "files/zshrc", link = "~/.zshrc" }]

[[phase.step]]
name = "default shell"
strategy = [{ kind = "chsh", shell = "zsh" }]

[[phase]]
id = 6
name = "AI agents"

[[phase.step]]
name = "codex"
strategy = [{ kind = "npm", package = "@openai/codex", bin = "codex" }]
"#;

/// A provisioning repository and a target home, both temporary.
pub struct TestRepo {
    pub root: tempfile::TempDir,
    pub home: tempfile::TempDir,
}

impl TestRepo {
    /// Repository holding [`MODEL`] and its source files.
    pub fn new() -> Self {
        Self::with_model(MODEL)
    }

    /// Repository holding `model` and the standard source files.
    pub fn with_model(model: &str) -> Self {
        let root = tempfile::tempdir().expect("create root");
        let home = tempfile::tempdir().expect("create home");
        let r = root.path();
        std::fs::create_dir_all(r.join("conf")).unwrap();
        std::fs::create_dir_all(r.join("files/lib")).unwrap();
        std::fs::write(r.join("conf/phases.toml"), model).unwrap();
        std::fs::write(r.join("files/zshrc"), "source ~/.devsetup/aliases.zsh\n").unwrap();
        std::fs::write(r.join("files/aliases.zsh"), "alias ll='lsd -l'\n").unwrap();
        std::fs::write(r.join("files/theme.zsh"), "PROMPT='%~ ❯ '\n").unwrap();
        std::fs::write(r.join("files/lib/functions.sh"), "mkcd() { mkdir -p \"$1\"; }\n").unwrap();
        Self { root, home }
    }

    /// Repository holding the phase model and files shipped with the crate.
    pub fn shipped() -> Self {
        let root = tempfile::tempdir().expect("create root");
        let home = tempfile::tempdir().expect("create home");
        let shipped = Path::new(env!("CARGO_MANIFEST_DIR")).parent().unwrap();
        copy_tree(&shipped.join("conf"), &root.path().join("conf"));
        copy_tree(&shipped.join("files"), &root.path().join("files"));
        Self { root, home }
    }

    pub fn root_path(&self) -> &Path {
        self.root.path()
    }

    /// Path under the target home.
    pub fn home_path(&self, rel: &str) -> PathBuf {
        self.home.path().join(rel)
    }

    pub fn config(&self) -> Config {
        Config::load(self.root.path()).expect("load config")
    }

    /// Non-interactive x86_64 context for user `dev` with a fixed backup stamp.
    pub fn context(&self, system: &Arc<FakeSystem>, log: &Arc<RecordingLog>) -> Context {
        Context::new(
            self.root.path().to_path_buf(),
            RunConfig::new("dev", self.home.path()),
            Platform::new(Arch::X86_64, true, false),
            Arc::clone(log) as Arc<dyn Log>,
            Arc::clone(system) as Arc<dyn Executor>,
        )
        .with_interactive(false)
        .with_backups(Backups::with_stamp(self.home.path(), STAMP))
    }

    /// Every path under home, relative and sorted.
    pub fn home_tree(&self) -> Vec<String> {
        let mut out = Vec::new();
        walk(self.home.path(), self.home.path(), &mut out);
        out.sort();
        out
    }
}

fn copy_tree(from: &Path, to: &Path) {
    std::fs::create_dir_all(to).unwrap();
    for entry in std::fs::read_dir(from).unwrap().flatten() {
        let target = to.join(entry.file_name());
        if entry.path().is_dir() {
            copy_tree(&entry.path(), &target);
        } else {
            std::fs::copy(entry.path(), &target).unwrap();
        }
    }
}

fn walk(base: &Path, dir: &Path, out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        out.push(path.strip_prefix(base).unwrap().display().to_string());
        if path.is_dir() && !path.is_symlink() {
            walk(base, &path, out);
        }
    }
}

/// In-memory Debian-like system.
///
/// Every call is recorded as a space-joined command line. `sudo` is
/// unwrapped before dispatch.
#[derive(Debug)]
pub struct FakeSystem {
    programs: Mutex<HashSet<String>>,
    packages: Mutex<HashSet<String>>,
    versions: Mutex<HashMap<String, String>>,
    shell: Mutex<String>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl Default for FakeSystem {
    fn default() -> Self {
        let programs = ["apt-get", "dpkg-query", "getent", "git", "npm", "sudo"]
            .iter()
            .map(ToString::to_string)
            .collect();
        Self {
            programs: Mutex::new(programs),
            packages: Mutex::new(HashSet::new()),
            versions: Mutex::new(HashMap::new()),
            shell: Mutex::new("/bin/bash".to_string()),
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeSystem {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make every invocation of `program` fail.
    pub fn fail(&self, program: &str) {
        self.failing.lock().unwrap().insert(program.to_string());
    }

    /// Report `version` from `<binary> --version`.
    pub fn set_version(&self, binary: &str, version: &str) {
        self.versions
            .lock()
            .unwrap()
            .insert(binary.to_string(), version.to_string());
    }

    pub fn set_shell(&self, shell: &str) {
        *self.shell.lock().unwrap() = shell.to_string();
    }

    pub fn shell(&self) -> String {
        self.shell.lock().unwrap().clone()
    }

    pub fn has_program(&self, name: &str) -> bool {
        self.programs.lock().unwrap().contains(name)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Calls that change system state (installs, clones, pulls, chsh).
    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| {
                c.starts_with("sudo ")
                    || c.starts_with("git clone")
                    || c.starts_with("git pull")
                    || c.starts_with("npm install")
                    || c.starts_with("cargo install")
            })
            .collect()
    }

    fn install_binary(&self, name: &str) {
        self.programs.lock().unwrap().insert(name.to_string());
    }

    fn dispatch(&self, program: &str, args: &[&str]) -> Result<String, String> {
        let name = Path::new(program)
            .file_name()
            .map_or_else(|| program.to_string(), |n| n.to_string_lossy().into_owned());
        if self.failing.lock().unwrap().contains(&name) {
            return Err(format!("{name} exited with code 100"));
        }
        match (name.as_str(), args) {
            ("sudo", [inner, rest @ ..]) => self.dispatch(inner, rest),
            ("apt-get", ["install", "--only-upgrade", ..]) | ("apt-get", ["update"]) => {
                Ok(String::new())
            }
            ("apt-get", ["install", "-y", packages @ ..]) => {
                for package in packages {
                    self.packages.lock().unwrap().insert((*package).to_string());
                    self.install_binary(match *package {
                        "bat" => "batcat",
                        "fd-find" => "fdfind",
                        "ripgrep" => "rg",
                        "neovim" => "nvim",
                        other => other,
                    });
                }
                Ok(String::new())
            }
            ("dpkg-query", [.., package]) => {
                if self.packages.lock().unwrap().contains(*package) {
                    Ok("install ok installed".to_string())
                } else {
                    Err(format!("dpkg-query: no packages found matching {package}"))
                }
            }
            ("getent", ["passwd", user]) => Ok(format!(
                "{user}:x:1000:1000:{user}:/home/{user}:{}",
                self.shell()
            )),
            ("chsh", ["-s", shell, _user]) => {
                self.set_shell(shell);
                Ok(String::new())
            }
            ("git", ["clone", "--depth", "1", url, dest]) => {
                let repo = git2::Repository::init(dest).map_err(|e| e.to_string())?;
                repo.remote("origin", url).map_err(|e| e.to_string())?;
                Ok(String::new())
            }
            ("git", ["pull", "--ff-only"]) => Ok("Already up to date.\n".to_string()),
            ("npm", ["install", "-g", "--prefix", _, spec]) => {
                let spec: &str = spec;
                let package = spec.strip_suffix("@latest").unwrap_or(spec);
                let bin = match package.rsplit('/').next().unwrap_or(package) {
                    "gemini-cli" => "gemini",
                    other => other,
                };
                self.install_binary(bin);
                Ok(String::new())
            }
            (bin, ["--version"]) if self.has_program(bin) => {
                let versions = self.versions.lock().unwrap();
                let version = versions.get(bin).map_or("1.1.5", String::as_str);
                Ok(format!("{bin} {version}\n"))
            }
            _ => Err(format!("unexpected call: {program} {}", args.join(" "))),
        }
    }

    fn call(&self, program: &str, args: &[&str]) -> ExecResult {
        let mut line = program.to_string();
        for a in args {
            line.push(' ');
            line.push_str(a);
        }
        self.calls.lock().unwrap().push(line);
        match self.dispatch(program, args) {
            Ok(stdout) => ExecResult {
                stdout,
                stderr: String::new(),
                success: true,
                code: Some(0),
            },
            Err(stderr) => ExecResult {
                stdout: String::new(),
                stderr,
                success: false,
                code: Some(1),
            },
        }
    }
}

impl Executor for FakeSystem {
    fn run(&self, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
        let result = self.call(program, args);
        if !result.success {
            anyhow::bail!("{program} failed: {}", result.stderr);
        }
        Ok(result)
    }

    fn run_in(&self, _dir: &Path, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
        self.run(program, args)
    }

    fn run_unchecked(&self, program: &str, args: &[&str]) -> anyhow::Result<ExecResult> {
        Ok(self.call(program, args))
    }

    fn resolve(&self, program: &str) -> Option<PathBuf> {
        self.has_program(program)
            .then(|| PathBuf::from("/usr/bin").join(program))
    }
}

/// Logger that keeps every message and summary entry.
#[derive(Debug, Default)]
pub struct RecordingLog {
    messages: Mutex<Vec<(&'static str, String)>>,
    entries: Mutex<Vec<(String, EntryStatus)>>,
}

impl RecordingLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Messages logged at `level` ("stage", "info", "debug", "warn", "error", "dry_run").
    pub fn messages(&self, level: &str) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn count(&self, status: EntryStatus) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, s)| *s == status)
            .count()
    }

    /// Summary labels recorded with `status`.
    pub fn labels(&self, status: EntryStatus) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, s)| *s == status)
            .map(|(l, _)| l.clone())
            .collect()
    }

    fn push(&self, level: &'static str, msg: &str) {
        self.messages.lock().unwrap().push((level, msg.to_string()));
    }
}

impl Log for RecordingLog {
    fn stage(&self, msg: &str) {
        self.push("stage", msg);
    }
    fn info(&self, msg: &str) {
        self.push("info", msg);
    }
    fn debug(&self, msg: &str) {
        self.push("debug", msg);
    }
    fn warn(&self, msg: &str) {
        self.push("warn", msg);
    }
    fn error(&self, msg: &str) {
        self.push("error", msg);
    }
    fn dry_run(&self, msg: &str) {
        self.push("dry_run", msg);
    }
    fn record(&self, label: &str, status: EntryStatus, _message: Option<&str>) {
        self.entries
            .lock()
            .unwrap()
            .push((label.to_string(), status));
    }
}
