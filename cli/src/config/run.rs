//! Per-invocation run configuration.
use std::collections::BTreeSet;
use std::path::PathBuf;

use nix::unistd::{Uid, User};

use crate::error::PlatformError;

/// Immutable settings for one invocation, built once at start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Report intended actions without mutating anything.
    pub dry_run: bool,
    /// Phase ids excluded from the run.
    pub skip_phases: BTreeSet<u32>,
    /// Target account name.
    pub user: String,
    /// Target home directory.
    pub home: PathBuf,
}

impl RunConfig {
    /// Resolve the target user and home.
    ///
    /// With `user` given, the account must exist in the passwd database and
    /// its home directory is used. Otherwise the invoking user is looked up,
    /// falling back to `$USER`/`$HOME` when the database has no entry.
    ///
    /// # Errors
    ///
    /// Returns [`PlatformError::UnknownUser`] for a nonexistent `--user` and
    /// [`PlatformError::NoHome`] when no home directory can be determined.
    pub fn resolve(
        dry_run: bool,
        skip_phases: &[u32],
        user: Option<&str>,
    ) -> Result<Self, PlatformError> {
        let (user, home) = match user {
            Some(name) => {
                let entry = User::from_name(name)
                    .ok()
                    .flatten()
                    .ok_or_else(|| PlatformError::UnknownUser(name.to_string()))?;
                (entry.name, entry.dir)
            }
            None => invoking_user()?,
        };
        Ok(Self {
            dry_run,
            skip_phases: skip_phases.iter().copied().collect(),
            user,
            home,
        })
    }

    /// Build a configuration with explicit values (tests, fabricated contexts).
    #[must_use]
    pub fn new(user: &str, home: impl Into<PathBuf>) -> Self {
        Self {
            dry_run: false,
            skip_phases: BTreeSet::new(),
            user: user.to_string(),
            home: home.into(),
        }
    }

    /// Set dry-run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the skipped phase ids.
    #[must_use]
    pub fn with_skip_phases(mut self, ids: &[u32]) -> Self {
        self.skip_phases = ids.iter().copied().collect();
        self
    }
}

fn invoking_user() -> Result<(String, PathBuf), PlatformError> {
    let env_home = std::env::var_os("HOME").map(PathBuf::from);
    match User::from_uid(Uid::current()).ok().flatten() {
        Some(entry) => {
            let home = env_home
                .filter(|h| h.is_absolute())
                .unwrap_or(entry.dir);
            Ok((entry.name, home))
        }
        None => {
            let name = std::env::var("USER").unwrap_or_else(|_| Uid::current().to_string());
            let home = env_home.ok_or_else(|| PlatformError::NoHome(name.clone()))?;
            Ok((name, home))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unknown_user_is_rejected() {
        let err = RunConfig::resolve(false, &[], Some("devsetup-no-such-user-4711")).unwrap_err();
        assert!(matches!(err, PlatformError::UnknownUser(ref u) if u == "devsetup-no-such-user-4711"));
    }

    #[test]
    fn root_account_resolves_from_passwd() {
        let run = RunConfig::resolve(false, &[], Some("root")).unwrap();
        assert_eq!(run.user, "root");
        assert_eq!(run.home, PathBuf::from("/root"));
    }

    #[test]
    fn invoking_user_resolves() {
        let run = RunConfig::resolve(true, &[4, 2, 4], None).unwrap();
        assert!(!run.user.is_empty());
        assert!(run.dry_run);
        assert_eq!(run.skip_phases.iter().copied().collect::<Vec<_>>(), vec![2, 4]);
    }

    #[test]
    fn builder_sets_fields() {
        let run = RunConfig::new("dev", "/home/dev")
            .with_dry_run(true)
            .with_skip_phases(&[3]);
        assert_eq!(run.home, PathBuf::from("/home/dev"));
        assert!(run.dry_run);
        assert!(run.skip_phases.contains(&3));
    }
}
