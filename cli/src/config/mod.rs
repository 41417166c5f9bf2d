pub mod phases;
pub mod run;
pub mod toml_loader;
pub mod validation;

use anyhow::{Context, Result};
use std::path::Path;

use crate::error::ConfigError;
use crate::phases::{Phase, Step};
use phases::{PhaseFile, PhaseSpec, StepSpec};
use validation::ValidationWarning;

/// Location of the phase model, relative to the provisioning root.
pub const PHASE_FILE: &str = "conf/phases.toml";

/// The loaded phase model.
#[derive(Debug)]
pub struct Config {
    /// Phases in ascending id order.
    pub phases: Vec<Phase>,
    /// Non-fatal problems found while loading.
    pub warnings: Vec<ValidationWarning>,
}

impl Config {
    /// Load `conf/phases.toml` from the provisioning root.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or fails validation.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(PHASE_FILE);
        let file: PhaseFile =
            toml_loader::load_config(&path).context("loading phases.toml")?;
        validation::check(&file, &path)?;
        let warnings = validation::validate_all(&file, root);

        let mut phases = file
            .phases
            .into_iter()
            .map(build_phase)
            .collect::<Result<Vec<_>, ConfigError>>()?;
        phases.sort_by_key(|p| p.id);

        Ok(Self {
            phases,
            warnings,
        })
    }

    /// Defined phase ids, ascending.
    #[must_use]
    pub fn phase_ids(&self) -> Vec<u32> {
        self.phases.iter().map(|p| p.id).collect()
    }

    /// Ensure every requested id names a defined phase.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownPhase`] for the first unknown id.
    pub fn check_skip_phases(&self, requested: &[u32]) -> Result<(), ConfigError> {
        let ids = self.phase_ids();
        match requested.iter().find(|id| !ids.contains(id)) {
            Some(&requested) => Err(ConfigError::UnknownPhase {
                requested,
                valid: ids
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
            None => Ok(()),
        }
    }
}

fn build_phase(spec: PhaseSpec) -> Result<Phase, ConfigError> {
    let id = spec.id;
    let steps = spec
        .steps
        .into_iter()
        .map(|step| build_step(id, step))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Phase {
        id,
        name: spec.name,
        steps,
    })
}

/// Build runtime strategies; probe and category default to the first strategy's.
fn build_step(phase: u32, spec: StepSpec) -> Result<Step, ConfigError> {
    let strategies: Vec<_> = spec
        .strategies
        .iter()
        .map(|s| s.build(spec.version.as_deref()))
        .collect();
    let first = strategies.first().ok_or_else(|| ConfigError::NoStrategy {
        phase,
        step: spec.name.clone(),
    })?;
    let probe = spec
        .probe
        .or_else(|| first.implied_probe())
        .ok_or_else(|| ConfigError::NoProbe {
            phase,
            step: spec.name.clone(),
        })?;
    let category = spec.category.unwrap_or_else(|| first.implied_category());
    Ok(Step {
        name: spec.name,
        category,
        mandatory: spec.mandatory,
        probe,
        version: spec.version,
        strategies,
    })
}
