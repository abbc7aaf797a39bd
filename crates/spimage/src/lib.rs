#![forbid(unsafe_code)]

//! One namespace over the imaging crates.
//!
//! The component crates are re-exported as modules (`spimage::phasing`,
//! `spimage::prtf`, ...) and their everyday types are flattened into the
//! crate root, so a reconstruction and its PRTF can be driven with a single
//! `use spimage::*`.

pub use spim_fft as fft;
pub use spim_image as image;
pub use spim_phasing as phasing;
pub use spim_prtf as prtf;
pub use spim_runtime as runtime;

pub use spim_fft::{Complex64, FftContext, FftError, FftOptions, Normalization};
pub use spim_image::{
    ComplexImage, Detector, GridShape, ImageError, MeasuredModulus, SupportMask,
};
pub use spim_phasing::{
    Algorithm, InitialPhase, PhasingContext, PhasingError, ReconstructionConfig,
    ReconstructionResult, Reconstructor, RealSpaceConstraint, RunState, ShrinkWrap,
    SupportUpdate, apply_modulus, apply_support, reconstruct, reconstruct_ensemble,
};
pub use spim_prtf::{AlignmentMode, PrtfConfig, PrtfError, PrtfResult, compute_prtf};
pub use spim_runtime::{CancellationToken, RuntimeMode};

/// Final images of an ensemble, in member order, ready for [`compute_prtf`].
#[must_use]
pub fn final_images(results: &[ReconstructionResult]) -> Vec<ComplexImage> {
    results.iter().map(|result| result.image.clone()).collect()
}
