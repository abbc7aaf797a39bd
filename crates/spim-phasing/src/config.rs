use serde::{Deserialize, Serialize};
use spim_runtime::RuntimeMode;

use crate::algorithm::Algorithm;
use crate::constraints::RealSpaceConstraint;
use crate::error::{PhasingError, PhasingResult};
use crate::support::ShrinkWrap;

/// Phases combined with the measured amplitudes to form the starting image.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialPhase {
    /// Uniform in `[0, 2π)` from the context's seeded generator.
    #[default]
    Random,
    Zero,
    /// One phase (radians) per Fourier sample, corner-origin order.
    Supplied(Vec<f64>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconstructionConfig {
    pub algorithm: Algorithm,
    pub max_iterations: usize,
    pub convergence_threshold: f64,
    /// Consecutive iterations the real-space error must stay below the
    /// threshold.
    pub convergence_window: usize,
    /// A run whose error rose on each of the last `divergence_window`
    /// iterations is reported as diverged. 0 disables the check.
    pub divergence_window: usize,
    pub real_space: RealSpaceConstraint,
    pub initial_phase: InitialPhase,
    pub shrink_wrap: Option<ShrinkWrap>,
    pub mode: RuntimeMode,
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            algorithm: Algorithm::default(),
            max_iterations: 1000,
            convergence_threshold: 1e-6,
            convergence_window: 1,
            divergence_window: 25,
            real_space: RealSpaceConstraint::None,
            initial_phase: InitialPhase::Random,
            shrink_wrap: None,
            mode: RuntimeMode::Strict,
        }
    }
}

impl ReconstructionConfig {
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    #[must_use]
    pub fn with_convergence(mut self, threshold: f64, window: usize) -> Self {
        self.convergence_threshold = threshold;
        self.convergence_window = window;
        self
    }

    #[must_use]
    pub fn with_divergence_window(mut self, divergence_window: usize) -> Self {
        self.divergence_window = divergence_window;
        self
    }

    #[must_use]
    pub fn with_real_space(mut self, real_space: RealSpaceConstraint) -> Self {
        self.real_space = real_space;
        self
    }

    #[must_use]
    pub fn with_initial_phase(mut self, initial_phase: InitialPhase) -> Self {
        self.initial_phase = initial_phase;
        self
    }

    #[must_use]
    pub fn with_shrink_wrap(mut self, shrink_wrap: ShrinkWrap) -> Self {
        self.shrink_wrap = Some(shrink_wrap);
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: RuntimeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Checks that do not depend on the input grids.
    pub fn validate(&self) -> PhasingResult<()> {
        self.algorithm.validate()?;
        if self.max_iterations == 0 {
            return Err(PhasingError::config(
                "max_iterations",
                "iteration budget must be at least 1",
            ));
        }
        if !(self.convergence_threshold.is_finite() && self.convergence_threshold >= 0.0) {
            return Err(PhasingError::config(
                "convergence_threshold",
                format!(
                    "must be finite and non-negative, got {}",
                    self.convergence_threshold
                ),
            ));
        }
        if self.convergence_window == 0 {
            return Err(PhasingError::config(
                "convergence_window",
                "at least one iteration must fall below the threshold",
            ));
        }
        if let InitialPhase::Supplied(phases) = &self.initial_phase
            && phases.iter().any(|phase| !phase.is_finite())
        {
            return Err(PhasingError::config(
                "initial_phase",
                "supplied phases must be finite",
            ));
        }
        if let Some(shrink_wrap) = &self.shrink_wrap {
            shrink_wrap.validate()?;
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration. Missing fields take their
    /// defaults.
    pub fn from_json_str(json: &str) -> PhasingResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|err| PhasingError::config("json", err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> PhasingResult<String> {
        serde_json::to_string_pretty(self).map_err(|err| PhasingError::config("json", err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{InitialPhase, ReconstructionConfig};
    use crate::{Algorithm, PhasingError, ShrinkWrap, SupportUpdate};

    #[test]
    fn defaults_match_documented_choices() {
        let config = ReconstructionConfig::default();
        assert_eq!(config.algorithm, Algorithm::HybridInputOutput { beta: 0.9 });
        assert_eq!(config.max_iterations, 1000);
        assert_eq!(config.convergence_threshold, 1e-6);
        assert_eq!(config.convergence_window, 1);
        assert_eq!(config.divergence_window, 25);
        assert!(config.shrink_wrap.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_budget_fails_fast() {
        let err = ReconstructionConfig::default()
            .with_max_iterations(0)
            .validate()
            .expect_err("empty budget");
        assert!(matches!(
            err,
            PhasingError::InvalidConfig {
                field: "max_iterations",
                ..
            }
        ));
    }

    #[test]
    fn nested_sections_are_validated() {
        let config = ReconstructionConfig::default().with_shrink_wrap(
            ShrinkWrap::default().with_method(SupportUpdate::Threshold { fraction: 2.0 }),
        );
        assert!(config.validate().is_err());
        let config = ReconstructionConfig::default()
            .with_algorithm(Algorithm::HybridInputOutput { beta: 1.2 });
        assert!(config.validate().is_err());
        let config = ReconstructionConfig::default()
            .with_initial_phase(InitialPhase::Supplied(vec![0.0, f64::INFINITY]));
        assert!(config.validate().is_err());
    }

    #[test]
    fn json_roundtrip_and_partial_documents() {
        let config = ReconstructionConfig::default()
            .with_algorithm(Algorithm::Raar { beta: 0.8 })
            .with_shrink_wrap(ShrinkWrap::default());
        let json = config.to_json_string().expect("serialize");
        assert_eq!(
            ReconstructionConfig::from_json_str(&json).expect("parse"),
            config
        );

        let partial = ReconstructionConfig::from_json_str(
            r#"{"algorithm":{"variant":"error_reduction"},"max_iterations":200}"#,
        )
        .expect("parse");
        assert_eq!(partial.algorithm, Algorithm::ErrorReduction);
        assert_eq!(partial.max_iterations, 200);
        assert_eq!(partial.divergence_window, 25);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        assert!(matches!(
            ReconstructionConfig::from_json_str(r#"{"max_iterations":-5}"#),
            Err(PhasingError::InvalidConfig { field: "json", .. })
        ));
        assert!(matches!(
            ReconstructionConfig::from_json_str(r#"{"algorithm":{"variant":"gradient"}}"#),
            Err(PhasingError::InvalidConfig { field: "json", .. })
        ));
    }
}
