//! Registration of reconstructions against a reference.
//!
//! Phase retrieval leaves three ambiguities: a global phase factor, a cyclic
//! translation, and the centro-symmetric twin `conj(x(-r))`. All three
//! leave the Fourier modulus unchanged, so they must be removed before
//! reconstructions are compared.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use spim_fft::FftContext;
use spim_image::GridShape;

use crate::error::PrtfError;

/// Which ambiguities to remove before averaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentMode {
    /// Inputs are already aligned.
    #[default]
    None,
    Phase,
    PhaseAndTranslation,
}

/// Multiply `image` by the unit phase that makes `<reference, image>` real
/// and non-negative. Returns the factor applied (1 when the product is 0).
pub fn phase_align(reference: &[Complex64], image: &mut [Complex64]) -> Complex64 {
    let overlap = inner(reference, image);
    let magnitude = overlap.norm();
    if magnitude == 0.0 {
        return Complex64::new(1.0, 0.0);
    }
    let factor = overlap.conj() / magnitude;
    for value in image.iter_mut() {
        *value *= factor;
    }
    factor
}

/// `sum_r conj(reference(r)) * image(r)`.
fn inner(reference: &[Complex64], image: &[Complex64]) -> Complex64 {
    reference
        .iter()
        .zip(image)
        .map(|(r, x)| r.conj() * x)
        .sum()
}

/// Centro-symmetric twin `conj(x(-r))` with cyclic indexing.
#[must_use]
pub fn enantiomorph(image: &[Complex64], shape: GridShape) -> Vec<Complex64> {
    (0..shape.len())
        .map(|flat| {
            let mirrored = shape
                .coords(flat)
                .iter()
                .zip(shape.dims())
                .map(|(&c, &n)| (n - c) % n)
                .collect::<Vec<_>>();
            let source = shape.flat_index(&mirrored).unwrap_or(flat);
            image[source].conj()
        })
        .collect()
}

/// Cyclic shift: `out(r) = image(r - shift)`.
#[must_use]
pub fn roll(image: &[Complex64], shape: GridShape, shift: &[usize]) -> Vec<Complex64> {
    (0..shape.len())
        .map(|flat| {
            let source = shape
                .coords(flat)
                .iter()
                .zip(shape.dims())
                .zip(shift)
                .map(|((&c, &n), &s)| (c + n - s % n) % n)
                .collect::<Vec<_>>();
            image[shape.flat_index(&source).unwrap_or(flat)]
        })
        .collect()
}

/// Translation maximizing `|sum_r reference(r) conj(image(r - s))|`, and
/// that maximum.
pub fn best_translation(
    reference_spectrum: &[Complex64],
    image: &[Complex64],
    shape: GridShape,
    fft: &mut FftContext,
) -> Result<(Vec<usize>, f64), PrtfError> {
    let spectrum = fft.fftn(image, shape.dims())?;
    let cross = reference_spectrum
        .iter()
        .zip(&spectrum)
        .map(|(r, x)| r * x.conj())
        .collect::<Vec<_>>();
    let correlation = fft.ifftn(&cross, shape.dims())?;
    let (peak, score) = correlation
        .iter()
        .enumerate()
        .map(|(flat, value)| (flat, value.norm()))
        .fold((0, f64::NEG_INFINITY), |best, candidate| {
            if candidate.1 > best.1 { candidate } else { best }
        });
    Ok((shape.coords(peak), score))
}

/// Shift `image` cyclically onto `reference` by the best integer translation.
pub fn register(
    reference: &[Complex64],
    image: &[Complex64],
    shape: GridShape,
    fft: &mut FftContext,
) -> Result<Vec<Complex64>, PrtfError> {
    let spectrum = fft.fftn(reference, shape.dims())?;
    let (shift, _) = best_translation(&spectrum, image, shape, fft)?;
    Ok(roll(image, shape, &shift))
}

/// Align `image` to `reference` under `mode`, optionally also trying the
/// twin. The twin is kept only when it matches strictly better.
pub fn align_to(
    reference: &[Complex64],
    image: &[Complex64],
    shape: GridShape,
    mode: AlignmentMode,
    enantiomorphs: bool,
    fft: &mut FftContext,
) -> Result<Vec<Complex64>, PrtfError> {
    if mode == AlignmentMode::None {
        return Ok(image.to_vec());
    }
    let mut candidates = vec![image.to_vec()];
    if enantiomorphs {
        candidates.push(enantiomorph(image, shape));
    }

    let reference_spectrum = match mode {
        AlignmentMode::PhaseAndTranslation => Some(fft.fftn(reference, shape.dims())?),
        _ => None,
    };
    let mut best: Option<(Vec<Complex64>, f64)> = None;
    for candidate in candidates {
        let (placed, score) = match &reference_spectrum {
            Some(spectrum) => {
                let (shift, score) = best_translation(spectrum, &candidate, shape, fft)?;
                (roll(&candidate, shape, &shift), score)
            }
            None => {
                let score = inner(reference, &candidate).norm();
                (candidate, score)
            }
        };
        if best.as_ref().is_none_or(|(_, top)| score > *top) {
            best = Some((placed, score));
        }
    }

    let mut aligned = best.map(|(placed, _)| placed).unwrap_or_else(|| image.to_vec());
    phase_align(reference, &mut aligned);
    Ok(aligned)
}

/// Align every member to the first. The first member is returned unchanged.
pub fn align_ensemble(
    images: &[Vec<Complex64>],
    shape: GridShape,
    mode: AlignmentMode,
    enantiomorphs: bool,
    fft: &mut FftContext,
) -> Result<Vec<Vec<Complex64>>, PrtfError> {
    let Some((reference, rest)) = images.split_first() else {
        return Ok(Vec::new());
    };
    let mut aligned = Vec::with_capacity(images.len());
    aligned.push(reference.clone());
    for image in rest {
        aligned.push(align_to(reference, image, shape, mode, enantiomorphs, fft)?);
    }
    Ok(aligned)
}
