#![forbid(unsafe_code)]

//! Iterative phase retrieval.
//!
//! | Module          | Contents                                                        |
//! |-----------------|-----------------------------------------------------------------|
//! | `constraints`   | support and modulus projections, real-space priors, Fourier error |
//! | `algorithm`     | [`Algorithm`] update rules (ER, HIO, RAAR, difference map)      |
//! | `support`       | [`ShrinkWrap`] support refinement and the Gaussian blur it uses |
//! | `config`        | [`ReconstructionConfig`] and [`InitialPhase`]                   |
//! | `context`       | [`PhasingContext`]: FFT plans, seed, cancellation, traces       |
//! | `reconstructor` | [`Reconstructor`] state machine and [`reconstruct`]             |
//! | `ensemble`      | [`reconstruct_ensemble`] over independent seeds (rayon)         |
//! | `trace`         | [`IterationTrace`] JSON-line records                            |
//!
//! All transforms are unitary (`Normalization::Ortho`), so the real-space
//! error of different runs and grid sizes share one scale.

pub mod algorithm;
pub mod config;
pub mod constraints;
pub mod context;
pub mod ensemble;
pub mod error;
pub mod reconstructor;
pub mod support;
pub mod trace;

pub use algorithm::Algorithm;
pub use config::{InitialPhase, ReconstructionConfig};
pub use constraints::{
    RealSpaceConstraint, apply_modulus, apply_modulus_in_place, apply_support,
    apply_support_in_place, apply_support_with, fourier_error, is_feasible, project_sample,
};
pub use context::PhasingContext;
pub use ensemble::reconstruct_ensemble;
pub use error::{PhasingError, PhasingResult};
pub use reconstructor::{ReconstructionResult, Reconstructor, RunState, reconstruct};
pub use support::{
    ShrinkWrap, SupportUpdate, gaussian_blur, gaussian_kernel, periodic_gaussian_kernel,
};
pub use trace::IterationTrace;
