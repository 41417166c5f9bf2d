use clap::{Args, Parser, Subcommand};

use crate::commands::VERSION;
use crate::commands::update::Scope;

/// Top-level CLI entry point for the provisioning engine.
#[derive(Parser, Debug)]
#[command(
    name = "devsetup",
    about = "Idempotent provisioning for Debian/Ubuntu developer workstations",
    version = VERSION
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Provision for this user instead of the invoking one
    #[arg(long, global = true, value_name = "USER")]
    pub user: Option<String>,

    /// Override the provisioning root directory
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<std::path::PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run all phases
    Install(InstallOpts),
    /// Read-only health check
    Doctor,
    /// Refresh configs, plugins, tools and agents
    Update(UpdateOpts),
    /// Print binary and installed versions
    Version,
}

impl Command {
    /// Name used for the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Install(_) => "install",
            Self::Doctor => "doctor",
            Self::Update(_) => "update",
            Self::Version => "version",
        }
    }
}

/// Options for the `install` subcommand.
#[derive(Args, Debug, Clone)]
pub struct InstallOpts {
    /// Skip a phase by id (repeatable)
    #[arg(long = "skip-phase", value_name = "N")]
    pub skip_phases: Vec<u32>,
}

/// Options for the `update` subcommand. Scope flags override one another.
#[derive(Args, Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct UpdateOpts {
    /// Refresh everything (default)
    #[arg(long, overrides_with_all = ["configs", "tools", "agents", "plugins"])]
    pub all: bool,
    /// Re-copy configuration files
    #[arg(long, overrides_with_all = ["all", "tools", "agents", "plugins"])]
    pub configs: bool,
    /// Upgrade packages and pinned tools
    #[arg(long, overrides_with_all = ["all", "configs", "agents", "plugins"])]
    pub tools: bool,
    /// Upgrade AI agent CLIs
    #[arg(long, overrides_with_all = ["all", "configs", "tools", "plugins"])]
    pub agents: bool,
    /// Pull plugin repositories
    #[arg(long, overrides_with_all = ["all", "configs", "tools", "agents"])]
    pub plugins: bool,
}

impl UpdateOpts {
    /// The selected scope; with no flag, everything.
    #[must_use]
    pub const fn scope(&self) -> Scope {
        if self.configs {
            Scope::Configs
        } else if self.tools {
            Scope::Tools
        } else if self.agents {
            Scope::Agents
        } else if self.plugins {
            Scope::Plugins
        } else {
            Scope::All
        }
    }
}
