//! Side-effect-free verification predicates.
//!
//! A probe answers "does the target state already hold?" for one step. It is
//! evaluated before acting, after every strategy, and by `doctor`.
use anyhow::{Context as _, Result};
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::sync::LazyLock;
use std::time::{Duration, SystemTime};

use super::ResourceState;
use super::file::MARKER_VERSION;
use crate::phases::Context;

/// First `N.N[.N]` in a `--version` banner.
static VERSION_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d+\.\d+(?:\.\d+)?)").ok());

/// Verification predicate declared (or implied) for a step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case", deny_unknown_fields)]
pub enum Probe {
    /// Any of `names` resolves on the search path.
    Command {
        /// Candidate binary names, in order (`bat`, `batcat`).
        names: Vec<String>,
    },
    /// Every package is reported installed by `dpkg-query`.
    Package {
        /// Debian package names.
        names: Vec<String>,
    },
    /// A regular file exists, optionally with given bytes.
    File {
        /// File location.
        path: String,
        /// Provisioning-repo file whose bytes must match.
        source: Option<String>,
        /// Literal contents that must match (`{version}` is the binary version).
        contents: Option<String>,
    },
    /// A directory exists.
    Dir {
        /// Directory location.
        path: String,
    },
    /// `link` is a symlink pointing at `target`.
    Symlink {
        /// Link location.
        link: String,
        /// Expected target (provisioning-repo relative or `~/`).
        target: String,
    },
    /// `path` is a git checkout, optionally with a matching `origin`.
    Git {
        /// Checkout location.
        path: String,
        /// Expected `origin` URL.
        url: Option<String>,
    },
    /// The target user's login shell is `name`.
    Shell {
        /// Shell name, e.g. `zsh`.
        name: String,
    },
    /// `path` was modified within the last `max_age_hours`.
    Fresh {
        /// File or directory whose mtime is checked.
        path: String,
        /// Freshness window.
        max_age_hours: u64,
    },
}

/// Version reported by a command probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionMarker {
    /// Parsed from `--version` output.
    Known(String),
    /// The binary exists but reported no parseable version.
    Unknown,
}

impl fmt::Display for VersionMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Known(v) => write!(f, "{v}"),
            Self::Unknown => f.write_str("version unknown"),
        }
    }
}

/// Result of evaluating a [`Probe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Observed state.
    pub state: ResourceState,
    /// Version marker (command probes only).
    pub version: Option<VersionMarker>,
}

impl ProbeOutcome {
    const fn state(state: ResourceState) -> Self {
        Self {
            state,
            version: None,
        }
    }

    /// Whether the target state holds.
    #[must_use]
    pub const fn is_correct(&self) -> bool {
        matches!(self.state, ResourceState::Correct)
    }
}

impl Probe {
    /// Short description for logs and the doctor report.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Command { names } => format!("command {}", names.join("|")),
            Self::Package { names } => format!("package {}", names.join(" ")),
            Self::File { path, .. } => format!("file {path}"),
            Self::Dir { path } => format!("dir {path}"),
            Self::Symlink { link, target } => format!("symlink {link} -> {target}"),
            Self::Git { path, .. } => format!("git checkout {path}"),
            Self::Shell { name } => format!("login shell {name}"),
            Self::Fresh {
                path,
                max_age_hours,
            } => format!("{path} newer than {max_age_hours}h"),
        }
    }

    /// Evaluate the probe. `pin` is the step's pinned version.
    ///
    /// # Errors
    ///
    /// Returns an error only when the observation itself fails (unreadable
    /// file, executor failure); absent or drifted resources are states.
    pub fn evaluate(&self, ctx: &Context, pin: Option<&str>) -> Result<ProbeOutcome> {
        match self {
            Self::Command { names } => Ok(probe_command(ctx, names, pin)),
            Self::Package { names } => probe_packages(ctx, names),
            Self::File {
                path,
                source,
                contents,
            } => probe_file(ctx, path, source.as_deref(), contents.as_deref()),
            Self::Dir { path } => Ok(ProbeOutcome::state(probe_dir(&ctx.expand(path)))),
            Self::Symlink { link, target } => Ok(ProbeOutcome::state(probe_symlink(
                &ctx.expand(link),
                &ctx.source_path(target),
            ))),
            Self::Git { path, url } => Ok(ProbeOutcome::state(probe_git(
                &ctx.expand(path),
                url.as_deref(),
            ))),
            Self::Shell { name } => probe_shell(ctx, name),
            Self::Fresh {
                path,
                max_age_hours,
            } => Ok(ProbeOutcome::state(probe_fresh(
                &ctx.expand(path),
                Duration::from_secs(max_age_hours.saturating_mul(3600)),
            ))),
        }
    }
}

/// Extract the first `N.N[.N]` from a version banner.
#[must_use]
pub fn extract_version(text: &str) -> Option<String> {
    VERSION_RE
        .as_ref()?
        .captures(text)?
        .get(1)
        .map(|m| m.as_str().to_string())
}

fn probe_command(ctx: &Context, names: &[String], pin: Option<&str>) -> ProbeOutcome {
    let Some(binary) = names.iter().find_map(|n| ctx.executor.resolve(n)) else {
        return ProbeOutcome::state(ResourceState::Missing);
    };
    let found = binary
        .to_str()
        .and_then(|b| ctx.executor.run_unchecked(b, &["--version"]).ok())
        .and_then(|r| extract_version(&format!("{}\n{}", r.stdout, r.stderr)));
    let Some(found) = found else {
        return ProbeOutcome {
            state: ResourceState::Correct,
            version: Some(VersionMarker::Unknown),
        };
    };
    let state = match pin {
        Some(pin) if pin.trim_start_matches('v') != found => ResourceState::Incorrect {
            current: found.clone(),
        },
        _ => ResourceState::Correct,
    };
    ProbeOutcome {
        state,
        version: Some(VersionMarker::Known(found)),
    }
}

fn probe_packages(ctx: &Context, names: &[String]) -> Result<ProbeOutcome> {
    if !ctx.executor.which("dpkg-query") {
        return Ok(ProbeOutcome::state(ResourceState::Invalid {
            reason: "dpkg-query not available".to_string(),
        }));
    }
    let mut missing = Vec::new();
    for name in names {
        let result = ctx
            .executor
            .run_unchecked("dpkg-query", &["-W", "-f=${Status}", name])?;
        if !(result.success && result.stdout.contains("install ok installed")) {
            missing.push(name.as_str());
        }
    }
    Ok(ProbeOutcome::state(if missing.is_empty() {
        ResourceState::Correct
    } else if missing.len() == names.len() {
        ResourceState::Missing
    } else {
        ResourceState::Incorrect {
            current: format!("missing {}", missing.join(", ")),
        }
    }))
}

fn probe_file(
    ctx: &Context,
    path: &str,
    source: Option<&str>,
    contents: Option<&str>,
) -> Result<ProbeOutcome> {
    let path = ctx.expand(path);
    let Ok(meta) = path.metadata() else {
        return Ok(ProbeOutcome::state(ResourceState::Missing));
    };
    if meta.is_dir() {
        return Ok(ProbeOutcome::state(ResourceState::Invalid {
            reason: format!("{} is a directory", path.display()),
        }));
    }
    let expected = match (source, contents) {
        (Some(src), _) => {
            let src = ctx.source_path(src);
            if !src.exists() {
                return Ok(ProbeOutcome::state(ResourceState::Invalid {
                    reason: format!("source {} missing", src.display()),
                }));
            }
            Some(std::fs::read(&src).with_context(|| format!("reading {}", src.display()))?)
        }
        (None, Some(text)) => Some(ctx.render(text, Some(MARKER_VERSION)).into_bytes()),
        (None, None) => None,
    };
    let Some(expected) = expected else {
        return Ok(ProbeOutcome::state(ResourceState::Correct));
    };
    let actual = std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
    Ok(ProbeOutcome::state(if actual == expected {
        ResourceState::Correct
    } else {
        ResourceState::Incorrect {
            current: "contents differ".to_string(),
        }
    }))
}

fn probe_dir(path: &std::path::Path) -> ResourceState {
    match path.metadata() {
        Ok(m) if m.is_dir() => ResourceState::Correct,
        Ok(_) => ResourceState::Incorrect {
            current: "not a directory".to_string(),
        },
        Err(_) => ResourceState::Missing,
    }
}

fn probe_symlink(link: &std::path::Path, target: &std::path::Path) -> ResourceState {
    let Ok(meta) = link.symlink_metadata() else {
        return ResourceState::Missing;
    };
    if meta.file_type().is_symlink() {
        return match std::fs::read_link(link) {
            Ok(current) if current == target => ResourceState::Correct,
            Ok(current) => ResourceState::Incorrect {
                current: current.display().to_string(),
            },
            Err(e) => ResourceState::Invalid {
                reason: e.to_string(),
            },
        };
    }
    if meta.is_dir() {
        return ResourceState::Invalid {
            reason: format!("{} is a directory", link.display()),
        };
    }
    ResourceState::Incorrect {
        current: "regular file".to_string(),
    }
}

fn probe_git(path: &std::path::Path, url: Option<&str>) -> ResourceState {
    if !path.exists() {
        return ResourceState::Missing;
    }
    let Ok(repo) = git2::Repository::open(path) else {
        return ResourceState::Incorrect {
            current: "not a git repository".to_string(),
        };
    };
    let Some(expected) = url else {
        return ResourceState::Correct;
    };
    let origin = repo
        .find_remote("origin")
        .ok()
        .and_then(|r| r.url().map(String::from));
    match origin {
        Some(current) if current == expected => ResourceState::Correct,
        Some(current) => ResourceState::Incorrect { current },
        None => ResourceState::Incorrect {
            current: "no origin remote".to_string(),
        },
    }
}

fn probe_shell(ctx: &Context, name: &str) -> Result<ProbeOutcome> {
    let entry = ctx
        .executor
        .run_unchecked("getent", &["passwd", &ctx.run.user])?;
    let shell = entry
        .success
        .then(|| entry.stdout.trim().rsplit(':').next().map(String::from))
        .flatten();
    let Some(shell) = shell else {
        return Ok(ProbeOutcome::state(ResourceState::Invalid {
            reason: format!("no passwd entry for {}", ctx.run.user),
        }));
    };
    let suffix = format!("/{name}");
    Ok(ProbeOutcome::state(if shell.ends_with(&suffix) {
        ResourceState::Correct
    } else {
        ResourceState::Incorrect { current: shell }
    }))
}

fn probe_fresh(path: &std::path::Path, max_age: Duration) -> ResourceState {
    let Ok(modified) = path.metadata().and_then(|m| m.modified()) else {
        return ResourceState::Missing;
    };
    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO);
    if age <= max_age {
        ResourceState::Correct
    } else {
        ResourceState::Incorrect {
            current: format!("{}h old", age.as_secs() / 3600),
        }
    }
}
