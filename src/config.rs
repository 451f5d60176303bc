//! Solver and pipeline configuration.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AssignmentError;
use crate::relaxation::GravityChainSolver;
use crate::traits::Mode;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveOptions {
    /// Attempts per problem before settling for the best one seen.
    pub assignment_iterations: usize,
    /// Redraws allowed to find chain distances that can reach both anchors.
    pub sampler_iterations: usize,
    /// Spring relaxation steps for chains with several variable activities.
    pub relaxation_iterations: usize,
    /// Share of a leg's length error corrected per relaxation step.
    pub alpha: f64,
    /// Leg length tolerance of the relaxation (meters).
    pub eps: f64,
    /// Bound of the initial lateral jitter; the anchor distance if unset.
    pub lateral_deviation: Option<f64>,
    /// Accepted gap between sampled and realized leg distance, per mode (meters).
    pub thresholds: BTreeMap<Mode, f64>,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            assignment_iterations: 20,
            sampler_iterations: 1000,
            relaxation_iterations: 1000,
            alpha: 0.3,
            eps: 1.0,
            lateral_deviation: None,
            thresholds: BTreeMap::from([
                (Mode::Car, 200.0),
                (Mode::CarPassenger, 200.0),
                (Mode::Pt, 200.0),
                (Mode::Bike, 100.0),
                (Mode::Walk, 100.0),
            ]),
        }
    }
}

impl SolveOptions {
    pub fn threshold(&self, mode: Mode) -> Result<f64, AssignmentError> {
        self.thresholds
            .get(&mode)
            .copied()
            .ok_or(AssignmentError::MissingThreshold(mode))
    }

    pub fn gravity_solver(&self) -> GravityChainSolver {
        GravityChainSolver {
            alpha: self.alpha,
            eps: self.eps,
            maximum_iterations: self.relaxation_iterations,
            lateral_deviation: self.lateral_deviation,
        }
    }

    pub fn validate(&self) -> Result<(), AssignmentError> {
        for (name, iterations) in [
            ("assignment_iterations", self.assignment_iterations),
            ("sampler_iterations", self.sampler_iterations),
            ("relaxation_iterations", self.relaxation_iterations),
        ] {
            if iterations == 0 {
                return Err(AssignmentError::InvalidConfig(format!(
                    "{} must be positive",
                    name
                )));
            }
        }
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(AssignmentError::InvalidConfig(format!(
                "alpha must be in (0, 1], got {}",
                self.alpha
            )));
        }
        if !(self.eps > 0.0) {
            return Err(AssignmentError::InvalidConfig(format!(
                "eps must be positive, got {}",
                self.eps
            )));
        }
        if let Some((mode, threshold)) = self
            .thresholds
            .iter()
            .find(|(_, threshold)| !(**threshold >= 0.0))
        {
            return Err(AssignmentError::InvalidConfig(format!(
                "threshold for {} must be non-negative, got {}",
                mode, threshold
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Master seed; worker `i` draws from `seed + i`.
    pub seed: u64,
    /// Number of person chunks solved in parallel.
    pub workers: usize,
    pub options: SolveOptions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            workers: rayon::current_num_threads(),
            options: SolveOptions::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, AssignmentError> {
        let reader = BufReader::new(File::open(path)?);
        let config: Self = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AssignmentError> {
        if self.workers == 0 {
            return Err(AssignmentError::InvalidConfig(
                "workers must be positive".to_string(),
            ));
        }
        self.options.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.workers > 0);
        config.validate().unwrap();
        assert_eq!(config.options.threshold(Mode::Walk).unwrap(), 100.0);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{ "seed": 42, "options": { "alpha": 0.5 } }"#).unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.options.alpha, 0.5);
        assert_eq!(config.options.assignment_iterations, 20);
        assert_eq!(config.options.thresholds.len(), 5);
    }

    #[test]
    fn test_thresholds_by_mode_name() {
        let options: SolveOptions =
            serde_json::from_str(r#"{ "thresholds": { "car": 50.0 } }"#).unwrap();
        assert_eq!(options.threshold(Mode::Car).unwrap(), 50.0);
        assert!(matches!(
            options.threshold(Mode::Bike),
            Err(AssignmentError::MissingThreshold(Mode::Bike))
        ));
    }

    #[test]
    fn test_invalid_options_rejected() {
        let options = SolveOptions {
            alpha: 0.0,
            ..SolveOptions::default()
        };
        assert!(options.validate().is_err());

        for options in [
            SolveOptions {
                sampler_iterations: 0,
                ..SolveOptions::default()
            },
            SolveOptions {
                relaxation_iterations: 0,
                ..SolveOptions::default()
            },
        ] {
            assert!(matches!(
                options.validate(),
                Err(AssignmentError::InvalidConfig(_))
            ));
        }

        let config = PipelineConfig {
            workers: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
