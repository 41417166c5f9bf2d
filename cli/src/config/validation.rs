//! Phase model validation: hard errors abort loading, warnings are reported.
use std::collections::HashSet;
use std::path::Path;

use super::phases::{PhaseFile, PhaseSpec, StepSpec, StrategySpec};
use crate::error::ConfigError;
use crate::resources::probe::Probe;

/// A validation warning detected during configuration loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    /// Where the problem is (e.g. "phase 2").
    pub source: String,
    /// The step that triggered the warning.
    pub item: String,
    /// Human-readable warning message.
    pub message: String,
}

impl ValidationWarning {
    /// Build a warning about `item` found while validating `source`.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        item: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            item: item.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.source, self.item, self.message)
    }
}

/// Reject models that cannot run: no phases, bad ids, duplicate or empty steps.
///
/// # Errors
///
/// Returns the first [`ConfigError`] found.
pub fn check(file: &PhaseFile, path: &Path) -> Result<(), ConfigError> {
    if file.phases.is_empty() {
        return Err(ConfigError::Empty(path.display().to_string()));
    }
    let mut ids = HashSet::new();
    for phase in &file.phases {
        if phase.id == 0 {
            return Err(ConfigError::ZeroPhaseId(phase.name.clone()));
        }
        if !ids.insert(phase.id) {
            return Err(ConfigError::DuplicatePhase(phase.id));
        }
        let mut names = HashSet::new();
        for step in &phase.steps {
            if !names.insert(step.name.as_str()) {
                return Err(ConfigError::DuplicateStep {
                    phase: phase.id,
                    step: step.name.clone(),
                });
            }
            if step.strategies.is_empty() {
                return Err(ConfigError::NoStrategy {
                    phase: phase.id,
                    step: step.name.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Trait for configuration validators.
///
/// Implementations look at one step at a time and report suspicious but
/// runnable declarations.
pub trait ConfigValidator {
    /// Validate one step and return any warnings found.
    fn validate(&self, root: &Path, phase: &PhaseSpec, step: &StepSpec) -> Vec<ValidationWarning>;
}

/// Pinned versions that can never take effect.
#[derive(Debug)]
pub struct PinValidator;

impl ConfigValidator for PinValidator {
    fn validate(&self, _root: &Path, phase: &PhaseSpec, step: &StepSpec) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let Some(version) = &step.version else {
            return warnings;
        };
        let source = format!("phase {}", phase.id);

        for strategy in &step.strategies {
            if let StrategySpec::Archive { url, .. } = strategy
                && !url.contains("{version}")
            {
                warnings.push(ValidationWarning::new(
                    &source,
                    &step.name,
                    format!("version {version} is pinned but the archive URL has no {{version}}"),
                ));
            }
        }

        let probe_is_command = match &step.probe {
            Some(probe) => matches!(probe, Probe::Command { .. }),
            None => matches!(
                step.strategies.first(),
                Some(
                    StrategySpec::Archive { .. }
                        | StrategySpec::Npm { .. }
                        | StrategySpec::Cargo { .. }
                )
            ),
        };
        if !probe_is_command {
            warnings.push(ValidationWarning::new(
                &source,
                &step.name,
                "a pinned version is only checked by command probes",
            ));
        }

        warnings
    }
}

/// Source files that do not exist in the provisioning repository.
#[derive(Debug)]
pub struct SourceValidator;

impl ConfigValidator for SourceValidator {
    fn validate(&self, root: &Path, phase: &PhaseSpec, step: &StepSpec) -> Vec<ValidationWarning> {
        let strategy_sources = step.strategies.iter().filter_map(|s| match s {
            StrategySpec::Copy { source, .. }
            | StrategySpec::CopyDir { source, .. }
            | StrategySpec::Symlink { source, .. } => Some(source.as_str()),
            _ => None,
        });
        let probe_source = match &step.probe {
            Some(Probe::File {
                source: Some(source),
                ..
            }) => Some(source.as_str()),
            _ => None,
        };

        let mut seen = HashSet::new();
        strategy_sources
            .chain(probe_source)
            .filter(|source| seen.insert(*source))
            .filter(|source| {
                let p = Path::new(source);
                !p.is_absolute() && !source.starts_with('~') && !root.join(p).exists()
            })
            .map(|source| {
                ValidationWarning::new(
                    format!("phase {}", phase.id),
                    &step.name,
                    format!("source file does not exist: {}", root.join(source).display()),
                )
            })
            .collect()
    }
}

/// Run all validators over every step.
#[must_use]
pub fn validate_all(file: &PhaseFile, root: &Path) -> Vec<ValidationWarning> {
    let validators: Vec<Box<dyn ConfigValidator>> =
        vec![Box::new(PinValidator), Box::new(SourceValidator)];

    let mut all_warnings = Vec::new();
    for phase in &file.phases {
        for step in &phase.steps {
            for validator in &validators {
                all_warnings.extend(validator.validate(root, phase, step));
            }
        }
    }
    all_warnings
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> PhaseFile {
        toml::from_str(toml).unwrap()
    }

    #[test]
    fn empty_model_is_rejected() {
        let err = check(&PhaseFile::default(), Path::new("conf/phases.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Empty(p) if p == "conf/phases.toml"));
    }

    #[test]
    fn zero_and_duplicate_ids_are_rejected() {
        let zero = parse("[[phase]]\nid = 0\nname = \"x\"\n");
        assert!(matches!(
            check(&zero, Path::new("p")),
            Err(ConfigError::ZeroPhaseId(_))
        ));

        let dup = parse("[[phase]]\nid = 3\nname = \"a\"\n[[phase]]\nid = 3\nname = \"b\"\n");
        assert!(matches!(
            check(&dup, Path::new("p")),
            Err(ConfigError::DuplicatePhase(3))
        ));
    }

    #[test]
    fn step_without_strategy_is_rejected() {
        let file = parse(
            r#"
            [[phase]]
            id = 1
            name = "x"
            [[phase.step]]
            name = "nothing"
            probe = { kind = "dir", path = "~/x" }
            "#,
        );
        assert!(matches!(
            check(&file, Path::new("p")),
            Err(ConfigError::NoStrategy { phase: 1, .. })
        ));
    }

    #[test]
    fn duplicate_step_names_are_rejected() {
        let file = parse(
            r#"
            [[phase]]
            id = 5
            name = "x"
            [[phase.step]]
            name = "nvim"
            strategy = [{ kind = "apt", packages = ["neovim"] }]
            [[phase.step]]
            name = "nvim"
            strategy = [{ kind = "apt", packages = ["neovim"] }]
            "#,
        );
        assert!(matches!(
            check(&file, Path::new("p")),
            Err(ConfigError::DuplicateStep { phase: 5, .. })
        ));
    }

    #[test]
    fn archive_pin_without_placeholder_warns() {
        let file = parse(
            r#"
            [[phase]]
            id = 2
            name = "CLI tools"
            [[phase.step]]
            name = "lsd"
            version = "1.1.5"
            probe = { kind = "command", names = ["lsd"] }
            strategy = [{ kind = "archive", url = "https://example.com/lsd.tar.gz", binary = "lsd" }]
            "#,
        );
        let warnings = validate_all(&file, Path::new("/nonexistent"));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("{version}"));
        assert_eq!(warnings[0].item, "lsd");
    }

    #[test]
    fn pin_on_non_command_check_warns() {
        let file = parse(
            r#"
            [[phase]]
            id = 3
            name = "Configuration files"
            [[phase.step]]
            name = "lib"
            version = "1.0"
            strategy = [{ kind = "mkdir", path = "~/.devsetup/lib" }]
            "#,
        );
        let warnings = validate_all(&file, Path::new("/nonexistent"));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("command probes"));
    }

    #[test]
    fn missing_source_files_warn_once() {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("files")).unwrap();
        std::fs::write(root.path().join("files/zshrc"), "").unwrap();
        let file = parse(
            r#"
            [[phase]]
            id = 3
            name = "Configuration files"
            [[phase.step]]
            name = "aliases"
            probe = { kind = "file", path = "~/.devsetup/aliases.zsh", source = "files/aliases.zsh" }
            strategy = [{ kind = "copy", source = "files/aliases.zsh", dest = "~/.devsetup/aliases.zsh" }]
            [[phase.step]]
            name = "zshrc"
            strategy = [{ kind = "symlink", source = "files/zshrc", link = "~/.zshrc" }]
            "#,
        );
        let warnings = validate_all(&file, root.path());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].item, "aliases");
        assert!(warnings[0].to_string().starts_with("phase 3: aliases: source file does not exist"));
    }
}
