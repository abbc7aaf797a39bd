#![forbid(unsafe_code)]

//! Fourier transform oracle for the phasing and PRTF layers.
//!
//! - `transforms`: backends, [`FftContext`] and the one-shot entrypoints
//! - `plan`: context-owned plan bookkeeping ([`LocalPlanCache`])
//! - `helpers`: sample frequencies and zero-frequency shifts

pub mod helpers;
pub mod plan;
pub mod transforms;

pub use helpers::{fftfreq, fftshift_1d, fftshift_nd, ifftshift_1d, ifftshift_nd};
pub use num_complex::Complex64;
pub use plan::{
    CacheAdmissionPolicy, LocalPlanCache, PlanCacheBackend, PlanCacheConfig, PlanFingerprint,
    PlanKey, PlanMetadata,
};
pub use transforms::{
    BackendKind, FftBackend, FftContext, FftError, FftOptions, MAX_RUSTFFT_PLANS,
    NaiveDftBackend, RustFftBackend, TransformTrace, fft, fft2, fftn, ifft, ifft2, ifftn,
};

use serde::{Deserialize, Serialize};

/// FFT normalization modes.
///
/// `Ortho` scales both directions by `1/sqrt(n)`, making the transform
/// unitary; the phasing layers always run with it so that real-space and
/// Fourier-space norms agree.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub enum Normalization {
    Forward,
    #[default]
    Backward,
    Ortho,
}

/// Transform entrypoints, used as part of plan keys and traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransformKind {
    Fft,
    Ifft,
    Fftn,
    Ifftn,
}

impl TransformKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Fft => "fft",
            Self::Ifft => "ifft",
            Self::Fftn => "fftn",
            Self::Ifftn => "ifftn",
        }
    }

    #[must_use]
    pub const fn is_inverse(self) -> bool {
        matches!(self, Self::Ifft | Self::Ifftn)
    }
}
