#![forbid(unsafe_code)]

//! Phase retrieval transfer function.
//!
//! | Module   | Contents                                                     |
//! |----------|--------------------------------------------------------------|
//! | `align`  | global-phase, translation and twin registration              |
//! | `radial` | shell averaging of Fourier-space maps                        |
//! | `prtf`   | [`PrtfConfig`], [`PrtfResult`] and [`compute_prtf`]          |
//!
//! The PRTF compares the Fourier transforms of independent reconstructions of
//! the same object. Where every run recovered the same phase it is 1; where
//! the phases are unrelated it falls toward `1/sqrt(N)` for `N` runs.

pub mod align;
pub mod error;
pub mod prtf;
pub mod radial;

pub use align::{
    AlignmentMode, align_ensemble, align_to, best_translation, enantiomorph, phase_align, register,
    roll,
};
pub use error::PrtfError;
pub use prtf::{MIN_ENSEMBLE, PrtfConfig, PrtfResult, compute_prtf};
pub use radial::{RadialProfile, radial_average};
