use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::constraints::{RealSpaceConstraint, is_feasible, project_sample};
use crate::error::{PhasingError, PhasingResult};

/// Update rule combining the current iterate `x` with its modulus projection
/// `p = P_M x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum Algorithm {
    /// Alternating projections: `x' = P_S p`.
    ErrorReduction,
    /// Fienup hybrid input-output.
    HybridInputOutput { beta: f64 },
    /// Relaxed averaged alternating reflections.
    Raar { beta: f64 },
    /// Elser difference map with `gamma_S = -1/beta`, `gamma_M = 1/beta`.
    DifferenceMap { beta: f64 },
}

impl Default for Algorithm {
    fn default() -> Self {
        Self::HybridInputOutput { beta: 0.9 }
    }
}

impl Algorithm {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ErrorReduction => "error_reduction",
            Self::HybridInputOutput { .. } => "hybrid_input_output",
            Self::Raar { .. } => "raar",
            Self::DifferenceMap { .. } => "difference_map",
        }
    }

    #[must_use]
    pub const fn beta(self) -> Option<f64> {
        match self {
            Self::ErrorReduction => None,
            Self::HybridInputOutput { beta } | Self::Raar { beta } | Self::DifferenceMap { beta } => {
                Some(beta)
            }
        }
    }

    /// The difference map needs a second modulus projection per iteration.
    #[must_use]
    pub const fn needs_reflected_projection(self) -> bool {
        matches!(self, Self::DifferenceMap { .. })
    }

    pub fn validate(self) -> PhasingResult<()> {
        if let Some(beta) = self.beta()
            && !(beta > 0.0 && beta <= 1.0)
        {
            return Err(PhasingError::config(
                "algorithm.beta",
                format!("{} requires 0 < beta <= 1, got {beta}", self.name()),
            ));
        }
        Ok(())
    }

    /// Next iterate for one sample, for every rule except the difference map.
    ///
    /// `x` is the current iterate and `p` its modulus projection.
    #[must_use]
    pub fn update_sample(
        self,
        x: Complex64,
        p: Complex64,
        inside: bool,
        constraint: RealSpaceConstraint,
    ) -> Complex64 {
        match self {
            Self::ErrorReduction => project_sample(p, inside, constraint),
            Self::HybridInputOutput { beta } => {
                if is_feasible(p, inside, constraint) {
                    project_sample(p, inside, constraint)
                } else {
                    x - p * beta
                }
            }
            Self::Raar { beta } => {
                if is_feasible(p, inside, constraint) {
                    project_sample(p, inside, constraint)
                } else {
                    x * beta + p * (1.0 - 2.0 * beta)
                }
            }
            // handled by `support_estimate` / `difference_map_update`
            Self::DifferenceMap { .. } => project_sample(p, inside, constraint),
        }
    }
}

/// `f_S(x) = (1 + gamma_S) P_S x - gamma_S x` with `gamma_S = -1/beta`.
#[must_use]
pub fn support_estimate(
    x: Complex64,
    inside: bool,
    constraint: RealSpaceConstraint,
    beta: f64,
) -> Complex64 {
    let ps = project_sample(x, inside, constraint);
    ps * (1.0 - 1.0 / beta) + x / beta
}

/// `f_M(x) = (1 + gamma_M) P_M x - gamma_M x` with `gamma_M = 1/beta`.
#[must_use]
pub fn modulus_estimate(x: Complex64, p: Complex64, beta: f64) -> Complex64 {
    p * (1.0 + 1.0 / beta) - x / beta
}

/// `x' = x + beta (P_S f_M(x) - P_M f_S(x))`.
#[must_use]
pub fn difference_map_update(
    x: Complex64,
    p: Complex64,
    projected_support_estimate: Complex64,
    inside: bool,
    constraint: RealSpaceConstraint,
    beta: f64,
) -> Complex64 {
    let fm = project_sample(modulus_estimate(x, p, beta), inside, constraint);
    x + (fm - projected_support_estimate) * beta
}

#[cfg(test)]
mod tests {
    use super::{Algorithm, difference_map_update, modulus_estimate, support_estimate};
    use crate::PhasingError;
    use crate::constraints::RealSpaceConstraint;
    use num_complex::Complex64;

    const NONE: RealSpaceConstraint = RealSpaceConstraint::None;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn default_is_hio_with_beta_09() {
        assert_eq!(
            Algorithm::default(),
            Algorithm::HybridInputOutput { beta: 0.9 }
        );
    }

    #[test]
    fn beta_outside_unit_interval_is_rejected() {
        for beta in [0.0, -0.5, 1.5, f64::NAN] {
            let err = Algorithm::Raar { beta }
                .validate()
                .expect_err("beta out of range");
            assert!(matches!(
                err,
                PhasingError::InvalidConfig {
                    field: "algorithm.beta",
                    ..
                }
            ));
        }
        assert!(Algorithm::DifferenceMap { beta: 1.0 }.validate().is_ok());
        assert!(Algorithm::ErrorReduction.validate().is_ok());
    }

    #[test]
    fn error_reduction_projects_onto_support() {
        let er = Algorithm::ErrorReduction;
        assert_eq!(er.update_sample(c(9.0, 9.0), c(1.0, 2.0), true, NONE), c(1.0, 2.0));
        assert_eq!(er.update_sample(c(9.0, 9.0), c(1.0, 2.0), false, NONE), c(0.0, 0.0));
    }

    #[test]
    fn hio_feeds_back_outside_support() {
        let hio = Algorithm::HybridInputOutput { beta: 0.5 };
        assert_eq!(hio.update_sample(c(1.0, 0.0), c(2.0, 0.0), true, NONE), c(2.0, 0.0));
        assert_eq!(hio.update_sample(c(1.0, 0.0), c(2.0, 0.0), false, NONE), c(0.0, 0.0));
        // negative real part violates positivity even inside the support
        let out = hio.update_sample(
            c(1.0, 0.0),
            c(-2.0, 0.0),
            true,
            RealSpaceConstraint::Positive,
        );
        assert_eq!(out, c(2.0, 0.0));
    }

    #[test]
    fn raar_blends_outside_support() {
        let raar = Algorithm::Raar { beta: 0.75 };
        let out = raar.update_sample(c(4.0, 0.0), c(2.0, 0.0), false, NONE);
        assert_eq!(out, c(4.0 * 0.75 - 2.0 * 0.5, 0.0));
        // beta = 1 reduces RAAR to the averaged reflection x - p outside
        let raar1 = Algorithm::Raar { beta: 1.0 };
        assert_eq!(raar1.update_sample(c(4.0, 0.0), c(2.0, 0.0), false, NONE), c(2.0, 0.0));
    }

    #[test]
    fn difference_map_with_unit_beta_matches_hio_shape() {
        // beta = 1: f_S(x) = x, f_M(x) = 2p - x
        let x = c(1.0, 1.0);
        let p = c(3.0, -1.0);
        assert_eq!(support_estimate(x, false, NONE, 1.0), x);
        assert_eq!(modulus_estimate(x, p, 1.0), c(5.0, -3.0));
        // P_M f_S(x) = p when f_S(x) = x
        let inside = difference_map_update(x, p, p, true, NONE, 1.0);
        assert_eq!(inside, x + c(5.0, -3.0) - p);
        let outside = difference_map_update(x, p, p, false, NONE, 1.0);
        assert_eq!(outside, x - p);
    }

    #[test]
    fn algorithm_config_roundtrips_through_json() {
        let json = serde_json::to_string(&Algorithm::DifferenceMap { beta: 0.7 }).expect("json");
        assert!(json.contains("difference_map"));
        let back: Algorithm = serde_json::from_str(&json).expect("parse");
        assert_eq!(back, Algorithm::DifferenceMap { beta: 0.7 });
        let er: Algorithm =
            serde_json::from_str(r#"{"variant":"error_reduction"}"#).expect("parse");
        assert_eq!(er, Algorithm::ErrorReduction);
    }
}
