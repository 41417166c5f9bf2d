//! Package-manager strategies: apt, npm and cargo.
use anyhow::Result;

use super::helpers::fs::write_atomic;
use super::probe::Probe;
use super::{
    Refresh, ResourceChange, Strategy, privileged_display, run_privileged, tool_missing,
};
use crate::config::phases::Category;
use crate::phases::Context;

/// Touched after every successful `apt-get update`. The lists directory
/// itself keeps its old mtime when no source changed.
pub const APT_STAMP: &str = "~/.devsetup/apt-updated";

/// Apt package lists are considered fresh for a day.
const APT_LISTS_MAX_AGE_HOURS: u64 = 24;

/// `sudo apt-get update`.
#[derive(Debug, Clone, Copy)]
pub struct AptUpdate;

impl Strategy for AptUpdate {
    fn kind(&self) -> &'static str {
        "apt-update"
    }

    fn describe(&self, ctx: &Context) -> String {
        privileged_display(ctx, "apt-get update")
    }

    fn acquire(&self, ctx: &Context) -> Result<ResourceChange> {
        if !ctx.executor.which("apt-get") {
            return Ok(tool_missing("apt-get"));
        }
        run_privileged(ctx, "apt-get", &["update"])?;
        let stamp = ctx.expand(APT_STAMP);
        let now = chrono::Utc::now().to_rfc3339();
        write_atomic(&stamp, format!("{now}\n").as_bytes(), None)?;
        Ok(ResourceChange::Applied)
    }

    fn refresh(&self, ctx: &Context) -> Result<Refresh> {
        match self.acquire(ctx)? {
            ResourceChange::Applied => Ok(Refresh::Refreshed),
            _ => Ok(Refresh::Unsupported),
        }
    }

    fn implied_probe(&self) -> Option<Probe> {
        Some(Probe::Fresh {
            path: APT_STAMP.to_string(),
            max_age_hours: APT_LISTS_MAX_AGE_HOURS,
        })
    }

    fn implied_category(&self) -> Category {
        Category::Package
    }
}

/// `sudo apt-get install -y <packages>`.
#[derive(Debug, Clone)]
pub struct Apt {
    /// Debian package names.
    pub packages: Vec<String>,
}

impl Apt {
    fn run_apt(&self, ctx: &Context, leading: &[&str]) -> Result<()> {
        let mut args: Vec<&str> = leading.to_vec();
        args.extend(self.packages.iter().map(String::as_str));
        run_privileged(ctx, "apt-get", &args)?;
        Ok(())
    }
}

impl Strategy for Apt {
    fn kind(&self) -> &'static str {
        "apt"
    }

    fn describe(&self, ctx: &Context) -> String {
        privileged_display(
            ctx,
            &format!("apt-get install -y {}", self.packages.join(" ")),
        )
    }

    fn acquire(&self, ctx: &Context) -> Result<ResourceChange> {
        if !ctx.executor.which("apt-get") {
            return Ok(tool_missing("apt-get"));
        }
        self.run_apt(ctx, &["install", "-y"])?;
        Ok(ResourceChange::Applied)
    }

    fn refresh(&self, ctx: &Context) -> Result<Refresh> {
        if !ctx.executor.which("apt-get") {
            return Ok(Refresh::Unsupported);
        }
        self.run_apt(ctx, &["install", "--only-upgrade", "-y"])?;
        Ok(Refresh::Refreshed)
    }

    fn implied_probe(&self) -> Option<Probe> {
        Some(Probe::Package {
            names: self.packages.clone(),
        })
    }

    fn implied_category(&self) -> Category {
        Category::Package
    }
}

/// `npm install -g --prefix ~/.local <package>`.
#[derive(Debug, Clone)]
pub struct Npm {
    /// npm package specifier.
    pub package: String,
    /// Binary name, when it differs from the package's last path segment.
    pub bin: Option<String>,
}

impl Npm {
    /// Name of the installed binary.
    #[must_use]
    pub fn binary(&self) -> String {
        self.bin.clone().unwrap_or_else(|| {
            self.package
                .rsplit('/')
                .next()
                .unwrap_or(&self.package)
                .trim_start_matches('@')
                .to_string()
        })
    }

    fn install(&self, ctx: &Context, spec: &str) -> Result<()> {
        let prefix = ctx.home().join(".local");
        let prefix = prefix.to_string_lossy();
        ctx.executor
            .run("npm", &["install", "-g", "--prefix", &prefix, spec])?;
        Ok(())
    }
}

impl Strategy for Npm {
    fn kind(&self) -> &'static str {
        "npm"
    }

    fn describe(&self, ctx: &Context) -> String {
        format!(
            "npm install -g --prefix {} {}",
            ctx.home().join(".local").display(),
            self.package
        )
    }

    fn acquire(&self, ctx: &Context) -> Result<ResourceChange> {
        if !ctx.executor.which("npm") {
            return Ok(tool_missing("npm"));
        }
        self.install(ctx, &self.package)?;
        Ok(ResourceChange::Applied)
    }

    fn refresh(&self, ctx: &Context) -> Result<Refresh> {
        if !ctx.executor.which("npm") {
            return Ok(Refresh::Unsupported);
        }
        self.install(ctx, &format!("{}@latest", self.package))?;
        Ok(Refresh::Refreshed)
    }

    fn implied_probe(&self) -> Option<Probe> {
        Some(Probe::Command {
            names: vec![self.binary()],
        })
    }

    fn implied_category(&self) -> Category {
        Category::Agent
    }
}

/// `cargo install --locked <crate>`, building from source.
#[derive(Debug, Clone)]
pub struct Cargo {
    /// Crate name.
    pub crate_name: String,
    /// Binary name, when it differs from the crate.
    pub bin: Option<String>,
}

impl Strategy for Cargo {
    fn kind(&self) -> &'static str {
        "cargo"
    }

    fn describe(&self, _ctx: &Context) -> String {
        format!("cargo install --locked {}", self.crate_name)
    }

    fn acquire(&self, ctx: &Context) -> Result<ResourceChange> {
        if !ctx.executor.which("cargo") {
            return Ok(tool_missing("cargo"));
        }
        ctx.executor
            .run("cargo", &["install", "--locked", &self.crate_name])?;
        Ok(ResourceChange::Applied)
    }

    fn implied_probe(&self) -> Option<Probe> {
        Some(Probe::Command {
            names: vec![self.bin.clone().unwrap_or_else(|| self.crate_name.clone())],
        })
    }

    fn implied_category(&self) -> Category {
        Category::Package
    }
}
