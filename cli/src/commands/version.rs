//! Command: print version information.
use std::path::Path;

use super::VERSION;
use crate::cli::GlobalOpts;
use crate::config::run::RunConfig;

/// Contents of `~/.devsetup/VERSION`, trimmed, if present and non-empty.
#[must_use]
pub fn installed_marker(home: &Path) -> Option<String> {
    let raw = std::fs::read_to_string(home.join(".devsetup").join("VERSION")).ok()?;
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Print the binary version and the installed marker to stdout.
#[allow(clippy::print_stdout)]
pub fn run(global: &GlobalOpts) {
    println!("devsetup {VERSION}");
    let installed = RunConfig::resolve(false, &[], global.user.as_deref())
        .ok()
        .and_then(|run| installed_marker(&run.home));
    println!("installed: {}", installed.as_deref().unwrap_or("none"));
}
