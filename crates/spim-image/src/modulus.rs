use serde::{Deserialize, Serialize};

use crate::image::ComplexImage;
use crate::shape::{GridShape, ImageError, ImageResult};

/// Fourier-space amplitudes measured by the detector, in corner-origin
/// layout, with a mask of which samples were actually measured.
///
/// Unknown samples (beamstop, saturated or missing pixels) are left
/// unconstrained by the modulus projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMeasuredModulus")]
pub struct MeasuredModulus {
    shape: GridShape,
    amplitudes: Vec<f64>,
    known: Vec<bool>,
}

#[derive(Deserialize)]
struct RawMeasuredModulus {
    shape: GridShape,
    amplitudes: Vec<f64>,
    known: Vec<bool>,
}

impl TryFrom<RawMeasuredModulus> for MeasuredModulus {
    type Error = ImageError;

    fn try_from(raw: RawMeasuredModulus) -> ImageResult<Self> {
        Self::from_amplitudes(raw.shape, raw.amplitudes)?.with_known_mask(raw.known)
    }
}

impl MeasuredModulus {
    /// Every sample known. Amplitudes must be non-negative (NaN is rejected).
    pub fn from_amplitudes(shape: GridShape, amplitudes: Vec<f64>) -> ImageResult<Self> {
        shape.validate()?;
        if amplitudes.len() != shape.len() {
            return Err(ImageError::LengthMismatch {
                expected: shape.len(),
                actual: amplitudes.len(),
            });
        }
        if let Some(flat) = amplitudes.iter().position(|&a| a.is_nan() || a < 0.0) {
            return Err(ImageError::InvalidArgument {
                message: format!(
                    "amplitude at {:?} must be non-negative, got {}",
                    shape.coords(flat),
                    amplitudes[flat]
                ),
            });
        }
        Ok(Self {
            shape,
            known: vec![true; amplitudes.len()],
            amplitudes,
        })
    }

    /// Square root of measured intensities. Negative intensities (background
    /// subtraction noise) clamp to zero.
    pub fn from_intensities(shape: GridShape, intensities: &[f64]) -> ImageResult<Self> {
        let amplitudes = intensities
            .iter()
            .map(|&i| if i < 0.0 { 0.0 } else { i.sqrt() })
            .collect();
        Self::from_amplitudes(shape, amplitudes)
    }

    /// Amplitudes of a diffraction image, honoring its `scaled` and `shifted`
    /// flags.
    pub fn from_image(image: &ComplexImage) -> ImageResult<Self> {
        let image = image.to_shifted()?;
        let values = image.amplitudes();
        if image.scaled {
            Self::from_amplitudes(image.shape(), values)
        } else {
            Self::from_intensities(image.shape(), &values)
        }
    }

    /// Replace the known mask; `false` entries become unconstrained.
    pub fn with_known_mask(mut self, known: Vec<bool>) -> ImageResult<Self> {
        if known.len() != self.shape.len() {
            return Err(ImageError::LengthMismatch {
                expected: self.shape.len(),
                actual: known.len(),
            });
        }
        self.known = known;
        Ok(self)
    }

    #[must_use]
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    #[must_use]
    pub fn amplitudes(&self) -> &[f64] {
        &self.amplitudes
    }

    #[must_use]
    pub fn known(&self) -> &[bool] {
        &self.known
    }

    #[must_use]
    pub fn amplitude(&self, flat: usize) -> Option<f64> {
        self.amplitudes.get(flat).copied()
    }

    #[must_use]
    pub fn is_known(&self, flat: usize) -> bool {
        self.known.get(flat).copied().unwrap_or(false)
    }

    #[must_use]
    pub fn known_count(&self) -> usize {
        self.known.iter().filter(|&&k| k).count()
    }

    /// Norm over known samples only.
    #[must_use]
    pub fn norm_known(&self) -> f64 {
        self.amplitudes
            .iter()
            .zip(&self.known)
            .filter(|(_, known)| **known)
            .map(|(a, _)| a * a)
            .sum::<f64>()
            .sqrt()
    }

    pub fn ensure_shape(&self, expected: GridShape) -> ImageResult<()> {
        expected.ensure_same(self.shape)
    }

    pub fn ensure_finite(&self) -> ImageResult<()> {
        match self.amplitudes.iter().position(|a| !a.is_finite()) {
            Some(flat) => Err(ImageError::NonFiniteInput {
                message: format!("measured amplitude {:?}", self.shape.coords(flat)),
            }),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::MeasuredModulus;
    use crate::{Complex64, ComplexImage, GridShape, ImageError};

    #[test]
    fn negative_and_nan_amplitudes_are_rejected() {
        let shape = GridShape::new_2d(1, 2);
        assert!(matches!(
            MeasuredModulus::from_amplitudes(shape, vec![1.0, -0.5]),
            Err(ImageError::InvalidArgument { .. })
        ));
        assert!(matches!(
            MeasuredModulus::from_amplitudes(shape, vec![f64::NAN, 0.5]),
            Err(ImageError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn intensities_take_square_root_and_clamp() {
        let shape = GridShape::new_2d(2, 2);
        let modulus =
            MeasuredModulus::from_intensities(shape, &[4.0, 9.0, -1.0, 0.25]).expect("valid");
        assert_eq!(modulus.amplitudes(), &[2.0, 3.0, 0.0, 0.5]);
    }

    #[test]
    fn infinite_amplitudes_pass_construction_but_fail_finite_check() {
        let shape = GridShape::new_2d(1, 2);
        let modulus =
            MeasuredModulus::from_amplitudes(shape, vec![1.0, f64::INFINITY]).expect("valid");
        assert!(matches!(
            modulus.ensure_finite(),
            Err(ImageError::NonFiniteInput { .. })
        ));
    }

    #[test]
    fn known_mask_controls_norm_and_count() {
        let shape = GridShape::new_2d(2, 2);
        let modulus = MeasuredModulus::from_amplitudes(shape, vec![3.0, 4.0, 100.0, 0.0])
            .expect("valid")
            .with_known_mask(vec![true, true, false, true])
            .expect("mask fits");
        assert_eq!(modulus.known_count(), 3);
        assert!(!modulus.is_known(2));
        assert_eq!(modulus.norm_known(), 5.0);
        assert!(
            MeasuredModulus::from_amplitudes(shape, vec![0.0; 4])
                .expect("valid")
                .with_known_mask(vec![true])
                .is_err()
        );
    }

    #[test]
    fn from_image_honors_scaled_and_shifted_flags() {
        let shape = GridShape::new_2d(1, 3);
        let intensities = ComplexImage::from_real(shape, &[1.0, 4.0, 9.0])
            .expect("valid")
            .with_flags(false, false, true);
        let modulus = MeasuredModulus::from_image(&intensities).expect("valid");
        assert_eq!(modulus.amplitudes(), &[1.0, 2.0, 3.0]);

        // centered 1x3 layout has its origin at column 1
        let centered = ComplexImage::from_vec(
            shape,
            vec![
                Complex64::new(0.0, 2.0),
                Complex64::new(5.0, 0.0),
                Complex64::new(1.0, 0.0),
            ],
        )
        .expect("valid");
        let modulus = MeasuredModulus::from_image(&centered).expect("valid");
        assert_eq!(modulus.amplitudes(), &[5.0, 1.0, 2.0]);
    }

    #[test]
    fn deserialize_rejects_inconsistent_moduli() {
        let shape = GridShape::new_2d(2, 2);
        let modulus = MeasuredModulus::from_amplitudes(shape, vec![1.0, 2.0, 3.0, 4.0])
            .expect("valid")
            .with_known_mask(vec![true, false, true, true])
            .expect("mask");
        let value = serde_json::to_value(&modulus).expect("to value");
        assert_eq!(
            serde_json::from_value::<MeasuredModulus>(value.clone()).expect("valid"),
            modulus
        );

        let mut negative = value.clone();
        negative["amplitudes"][2] = serde_json::json!(-1.0);
        assert!(serde_json::from_value::<MeasuredModulus>(negative).is_err());

        let mut short_known = value.clone();
        short_known["known"] = serde_json::json!([true]);
        assert!(serde_json::from_value::<MeasuredModulus>(short_known).is_err());

        let mut bad_rank = value;
        bad_rank["shape"]["rank"] = serde_json::json!(5);
        assert!(serde_json::from_value::<MeasuredModulus>(bad_rank).is_err());
    }
}
