//! Schema of `conf/phases.toml`.
//!
//! ```toml
//! [[phase]]
//! id = 2
//! name = "CLI tools"
//!
//! [[phase.step]]
//! name = "lsd"
//! version = "1.1.5"
//! probe = { kind = "command", names = ["lsd"] }
//! strategy = [
//!   { kind = "apt", packages = ["lsd"] },
//!   { kind = "archive", url = "https://example.com/lsd-v{version}-{arch}.tar.gz", binary = "lsd" },
//! ]
//! ```
use serde::Deserialize;
use std::fmt;

use crate::resources::Strategy;
use crate::resources::archive::Archive;
use crate::resources::file::{CopyDir, CopyFile, Mkdir, WriteFile};
use crate::resources::git::GitClone;
use crate::resources::package::{Apt, AptUpdate, Cargo, Npm};
use crate::resources::probe::Probe;
use crate::resources::prompt::PromptClone;
use crate::resources::shell::Chsh;
use crate::resources::symlink::Symlink;

/// Root of the phase file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseFile {
    /// Declared phases, in file order.
    #[serde(default, rename = "phase")]
    pub phases: Vec<PhaseSpec>,
}

/// One `[[phase]]` table.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhaseSpec {
    /// Stable numeric id used by `--skip-phase`.
    pub id: u32,
    /// Display name.
    pub name: String,
    /// Steps in execution order.
    #[serde(default, rename = "step")]
    pub steps: Vec<StepSpec>,
}

/// One `[[phase.step]]` table.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepSpec {
    /// Logical resource name.
    pub name: String,
    /// Update category; implied by the first strategy when omitted.
    pub category: Option<Category>,
    /// Whether failure aborts the run.
    #[serde(default)]
    pub mandatory: bool,
    /// Verification predicate; implied by the first strategy when omitted.
    pub probe: Option<Probe>,
    /// Pinned version for command probes and archive downloads.
    pub version: Option<String>,
    /// Ordered acquisition strategies.
    #[serde(default, rename = "strategy")]
    pub strategies: Vec<StrategySpec>,
}

/// Classification used by the updater to select steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Installed tools (apt, archive, cargo).
    Package,
    /// Configuration files copied or linked into the home directory.
    Config,
    /// Cloned plugin repositories.
    Plugin,
    /// AI agent CLIs.
    Agent,
    /// One-off system settings; never refreshed.
    System,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Package => "package",
            Self::Config => "config",
            Self::Plugin => "plugin",
            Self::Agent => "agent",
            Self::System => "system",
        })
    }
}

/// One entry of a step's `strategy` list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", deny_unknown_fields)]
pub enum StrategySpec {
    /// `sudo apt-get update`.
    AptUpdate,
    /// `sudo apt-get install -y <packages>`.
    Apt {
        /// Debian package names.
        packages: Vec<String>,
    },
    /// `npm install -g --prefix ~/.local <package>`.
    Npm {
        /// npm package specifier.
        package: String,
        /// Installed binary name when it differs from the package.
        bin: Option<String>,
    },
    /// Download a release asset into `~/.local/bin`.
    Archive {
        /// URL template with `{version}`, `{arch}` and `{deb_arch}` placeholders.
        url: String,
        /// Binary to extract (or the file name for raw downloads).
        binary: String,
        /// Optional pinned SHA-256 of the download.
        sha256: Option<String>,
    },
    /// `cargo install --locked <crate>`.
    Cargo {
        /// Crate name.
        #[serde(rename = "crate")]
        crate_name: String,
        /// Installed binary name when it differs from the crate.
        bin: Option<String>,
    },
    /// Shallow clone of a repository.
    GitClone {
        /// Remote URL.
        url: String,
        /// Checkout location.
        dest: String,
    },
    /// Copy a single file from the provisioning repository.
    Copy {
        /// Source, relative to the provisioning root.
        source: String,
        /// Destination.
        dest: String,
    },
    /// Copy a directory tree from the provisioning repository.
    CopyDir {
        /// Source directory, relative to the provisioning root.
        source: String,
        /// Destination directory.
        dest: String,
    },
    /// Write literal contents (`{version}` is the binary version).
    Write {
        /// Destination.
        dest: String,
        /// File contents.
        contents: String,
    },
    /// Symlink `link` to `source`.
    Symlink {
        /// Link target.
        source: String,
        /// Link location.
        link: String,
    },
    /// Create a directory.
    Mkdir {
        /// Directory path.
        path: String,
    },
    /// Change the login shell.
    Chsh {
        /// Shell name, resolved on the search path.
        shell: String,
    },
    /// Ask for a repository URL and clone it.
    PromptClone {
        /// Question shown to the user.
        prompt: String,
        /// Checkout location.
        dest: String,
    },
}

impl StrategySpec {
    /// Kind name as written in the phase file.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::AptUpdate => "apt-update",
            Self::Apt { .. } => "apt",
            Self::Npm { .. } => "npm",
            Self::Archive { .. } => "archive",
            Self::Cargo { .. } => "cargo",
            Self::GitClone { .. } => "git-clone",
            Self::Copy { .. } => "copy",
            Self::CopyDir { .. } => "copy-dir",
            Self::Write { .. } => "write",
            Self::Symlink { .. } => "symlink",
            Self::Mkdir { .. } => "mkdir",
            Self::Chsh { .. } => "chsh",
            Self::PromptClone { .. } => "prompt-clone",
        }
    }

    /// Build the runtime strategy. `version` is the step's pin, if any.
    #[must_use]
    pub fn build(&self, version: Option<&str>) -> Box<dyn Strategy> {
        match self.clone() {
            Self::AptUpdate => Box::new(AptUpdate),
            Self::Apt { packages } => Box::new(Apt { packages }),
            Self::Npm { package, bin } => Box::new(Npm { package, bin }),
            Self::Archive {
                url,
                binary,
                sha256,
            } => Box::new(Archive {
                url,
                binary,
                sha256,
                version: version.map(String::from),
            }),
            Self::Cargo { crate_name, bin } => Box::new(Cargo { crate_name, bin }),
            Self::GitClone { url, dest } => Box::new(GitClone { url, dest }),
            Self::Copy { source, dest } => Box::new(CopyFile { source, dest }),
            Self::CopyDir { source, dest } => Box::new(CopyDir { source, dest }),
            Self::Write { dest, contents } => Box::new(WriteFile { dest, contents }),
            Self::Symlink { source, link } => Box::new(Symlink { source, link }),
            Self::Mkdir { path } => Box::new(Mkdir { path }),
            Self::Chsh { shell } => Box::new(Chsh { shell }),
            Self::PromptClone { prompt, dest } => Box::new(PromptClone { prompt, dest }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn parses_phase_with_inline_strategies() {
        let toml = r#"
            [[phase]]
            id = 2
            name = "CLI tools"

            [[phase.step]]
            name = "bat"
            probe = { kind = "command", names = ["bat", "batcat"] }
            strategy = [{ kind = "apt", packages = ["bat"] }]
        "#;
        let file: PhaseFile = toml::from_str(toml).unwrap();
        assert_eq!(file.phases.len(), 1);
        let step = &file.phases[0].steps[0];
        assert_eq!(step.name, "bat");
        assert!(!step.mandatory);
        assert_eq!(
            step.probe,
            Some(Probe::Command {
                names: vec!["bat".to_string(), "batcat".to_string()]
            })
        );
        assert_eq!(step.strategies[0].kind(), "apt");
    }

    #[test]
    fn parses_strategy_table_array_form() {
        let toml = r#"
            [[phase]]
            id = 1
            name = "System packages"

            [[phase.step]]
            name = "package index"
            mandatory = true

            [[phase.step.strategy]]
            kind = "apt-update"
        "#;
        let file: PhaseFile = toml::from_str(toml).unwrap();
        let step = &file.phases[0].steps[0];
        assert!(step.mandatory);
        assert_eq!(step.strategies, vec![StrategySpec::AptUpdate]);
    }

    #[test]
    fn crate_field_is_renamed() {
        let spec: StrategySpec =
            toml::from_str("kind = \"cargo\"\ncrate = \"lsd\"\n").unwrap();
        assert_eq!(
            spec,
            StrategySpec::Cargo {
                crate_name: "lsd".to_string(),
                bin: None
            }
        );
    }

    #[test]
    fn unknown_strategy_kind_is_rejected() {
        let err = toml::from_str::<StrategySpec>("kind = \"brew\"\n").unwrap_err();
        assert!(err.to_string().contains("brew"));
    }

    #[test]
    fn unknown_step_field_is_rejected() {
        let toml = r#"
            [[phase]]
            id = 1
            name = "x"
            [[phase.step]]
            name = "y"
            optional = true
        "#;
        assert!(toml::from_str::<PhaseFile>(toml).is_err());
    }

    #[test]
    fn category_parses_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            category: Category,
        }
        let w: Wrapper = toml::from_str("category = \"agent\"").unwrap();
        assert_eq!(w.category, Category::Agent);
        assert_eq!(w.category.to_string(), "agent");
    }

    #[test]
    fn empty_file_has_no_phases() {
        let file: PhaseFile = toml::from_str("").unwrap();
        assert!(file.phases.is_empty());
    }
}
