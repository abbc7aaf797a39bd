//! Real-space and Fourier-space projections.
//!
//! The slice-level `*_in_place` variants are what the iteration loop uses;
//! the [`ComplexImage`]-level functions are the checked, allocating forms.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use spim_image::{ComplexImage, MeasuredModulus, SupportMask};

use crate::error::PhasingResult;

/// Additional real-space prior applied inside the support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RealSpaceConstraint {
    #[default]
    None,
    /// Imaginary parts are zeroed.
    Real,
    /// Imaginary parts are zeroed and negative real parts clamped to zero.
    Positive,
}

impl RealSpaceConstraint {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Real => "real",
            Self::Positive => "positive",
        }
    }
}

/// Nearest sample satisfying the support and `constraint`.
#[must_use]
pub fn project_sample(value: Complex64, inside: bool, constraint: RealSpaceConstraint) -> Complex64 {
    if !inside {
        return Complex64::new(0.0, 0.0);
    }
    match constraint {
        RealSpaceConstraint::None => value,
        RealSpaceConstraint::Real => Complex64::new(value.re, 0.0),
        RealSpaceConstraint::Positive => Complex64::new(value.re.max(0.0), 0.0),
    }
}

/// Whether the input-output rules keep the projected sample as is.
///
/// Inside the support a sample is feasible unless positivity is requested and
/// its real part is negative; the imaginary part is dropped by the projection
/// rather than counted against feasibility.
#[must_use]
pub fn is_feasible(value: Complex64, inside: bool, constraint: RealSpaceConstraint) -> bool {
    inside
        && match constraint {
            RealSpaceConstraint::None | RealSpaceConstraint::Real => true,
            RealSpaceConstraint::Positive => value.re >= 0.0,
        }
}

/// Zero every sample outside `mask`; identity inside.
pub fn apply_support(image: &ComplexImage, mask: &SupportMask) -> PhasingResult<ComplexImage> {
    apply_support_with(image, mask, RealSpaceConstraint::None)
}

/// [`apply_support`] plus a real-space prior inside the support.
pub fn apply_support_with(
    image: &ComplexImage,
    mask: &SupportMask,
    constraint: RealSpaceConstraint,
) -> PhasingResult<ComplexImage> {
    mask.ensure_shape(image.shape())?;
    let mut out = image.snapshot();
    apply_support_in_place(out.data_mut(), mask, constraint);
    Ok(out)
}

/// Caller guarantees `data.len() == mask.shape().len()`.
pub fn apply_support_in_place(
    data: &mut [Complex64],
    mask: &SupportMask,
    constraint: RealSpaceConstraint,
) {
    for (value, &inside) in data.iter_mut().zip(mask.as_slice()) {
        *value = project_sample(*value, inside, constraint);
    }
}

/// Replace each known amplitude with the measured one, keeping the phase.
///
/// Unknown samples pass through. A zero sample with a positive measured
/// amplitude gets phase 0.
pub fn apply_modulus(
    fourier: &ComplexImage,
    measured: &MeasuredModulus,
) -> PhasingResult<ComplexImage> {
    measured.ensure_shape(fourier.shape())?;
    let mut out = fourier.snapshot();
    apply_modulus_in_place(out.data_mut(), measured);
    Ok(out)
}

/// Caller guarantees `data.len() == measured.shape().len()`.
pub fn apply_modulus_in_place(data: &mut [Complex64], measured: &MeasuredModulus) {
    let samples = data
        .iter_mut()
        .zip(measured.amplitudes())
        .zip(measured.known());
    for ((value, &amplitude), &known) in samples {
        if !known {
            continue;
        }
        let magnitude = value.norm();
        *value = if magnitude > 0.0 {
            *value * (amplitude / magnitude)
        } else {
            Complex64::new(amplitude, 0.0)
        };
    }
}

/// `sqrt(Σ_known (|F| - m)²) / sqrt(Σ_known m²)`; 0 when the known norm is 0.
#[must_use]
pub fn fourier_error(data: &[Complex64], measured: &MeasuredModulus) -> f64 {
    let mut residual = 0.0;
    let mut reference = 0.0;
    let samples = data
        .iter()
        .zip(measured.amplitudes())
        .zip(measured.known());
    for ((value, &amplitude), &known) in samples {
        if known {
            residual += (value.norm() - amplitude).powi(2);
            reference += amplitude * amplitude;
        }
    }
    if reference > 0.0 {
        (residual / reference).sqrt()
    } else {
        0.0
    }
}
