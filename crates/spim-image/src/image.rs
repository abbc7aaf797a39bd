use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::detector::Detector;
use crate::shape::{GridShape, ImageError, ImageResult};

/// Complex-valued samples on a 2D or 3D grid.
///
/// The layout flags travel with the data:
/// - `phased`: samples carry meaningful phases (false for amplitude-only data)
/// - `scaled`: samples are amplitudes rather than intensities
/// - `shifted`: the origin sits at index 0 (FFT layout) rather than at the
///   grid center
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawComplexImage")]
pub struct ComplexImage {
    shape: GridShape,
    data: Vec<Complex64>,
    pub phased: bool,
    pub scaled: bool,
    pub shifted: bool,
    pub detector: Option<Detector>,
}

#[derive(Deserialize)]
struct RawComplexImage {
    shape: GridShape,
    data: Vec<Complex64>,
    phased: bool,
    scaled: bool,
    shifted: bool,
    detector: Option<Detector>,
}

impl TryFrom<RawComplexImage> for ComplexImage {
    type Error = ImageError;

    fn try_from(raw: RawComplexImage) -> ImageResult<Self> {
        let mut image = Self::from_vec(raw.shape, raw.data)?
            .with_flags(raw.phased, raw.scaled, raw.shifted);
        image.detector = raw.detector;
        Ok(image)
    }
}

impl ComplexImage {
    #[must_use]
    pub fn zeros(shape: GridShape) -> Self {
        Self {
            shape,
            data: vec![Complex64::new(0.0, 0.0); shape.len()],
            phased: true,
            scaled: true,
            shifted: false,
            detector: None,
        }
    }

    pub fn from_vec(shape: GridShape, data: Vec<Complex64>) -> ImageResult<Self> {
        shape.validate()?;
        if data.len() != shape.len() {
            return Err(ImageError::LengthMismatch {
                expected: shape.len(),
                actual: data.len(),
            });
        }
        Ok(Self {
            shape,
            data,
            phased: true,
            scaled: true,
            shifted: false,
            detector: None,
        })
    }

    /// Real samples, imaginary parts zero.
    pub fn from_real(shape: GridShape, values: &[f64]) -> ImageResult<Self> {
        Self::from_vec(
            shape,
            values.iter().map(|&re| Complex64::new(re, 0.0)).collect(),
        )
    }

    #[must_use]
    pub fn with_flags(mut self, phased: bool, scaled: bool, shifted: bool) -> Self {
        self.phased = phased;
        self.scaled = scaled;
        self.shifted = shifted;
        self
    }

    #[must_use]
    pub fn with_detector(mut self, detector: Detector) -> Self {
        self.detector = Some(detector);
        self
    }

    #[must_use]
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn data(&self) -> &[Complex64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [Complex64] {
        &mut self.data
    }

    #[must_use]
    pub fn into_data(self) -> Vec<Complex64> {
        self.data
    }

    pub fn get(&self, coords: &[usize]) -> ImageResult<Complex64> {
        let flat = self.index_of(coords)?;
        Ok(self.data[flat])
    }

    pub fn set(&mut self, coords: &[usize], value: Complex64) -> ImageResult<()> {
        let flat = self.index_of(coords)?;
        self.data[flat] = value;
        Ok(())
    }

    fn index_of(&self, coords: &[usize]) -> ImageResult<usize> {
        self.shape
            .flat_index(coords)
            .ok_or_else(|| ImageError::IndexOutOfBounds {
                index: coords.to_vec(),
                shape: self.shape,
            })
    }

    /// Euclidean norm over every sample.
    #[must_use]
    pub fn norm(&self) -> f64 {
        norm(&self.data)
    }

    /// `self - other`, sample by sample.
    pub fn difference(&self, other: &ComplexImage) -> ImageResult<ComplexImage> {
        self.shape.ensure_same(other.shape)?;
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(&a, &b)| a - b)
            .collect();
        Ok(Self {
            data,
            ..self.clone_layout()
        })
    }

    /// Norm of `self - other` without allocating the difference.
    pub fn distance(&self, other: &ComplexImage) -> ImageResult<f64> {
        self.shape.ensure_same(other.shape)?;
        Ok(self
            .data
            .iter()
            .zip(&other.data)
            .map(|(&a, &b)| (a - b).norm_sqr())
            .sum::<f64>()
            .sqrt())
    }

    #[must_use]
    pub fn amplitudes(&self) -> Vec<f64> {
        self.data.iter().map(|value| value.norm()).collect()
    }

    #[must_use]
    pub fn phases(&self) -> Vec<f64> {
        self.data.iter().map(|value| value.arg()).collect()
    }

    /// Deep copy for output; never aliases the running buffer.
    #[must_use]
    pub fn snapshot(&self) -> ComplexImage {
        self.clone()
    }

    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|value| value.is_finite())
    }

    pub fn ensure_finite(&self) -> ImageResult<()> {
        match self.data.iter().position(|value| !value.is_finite()) {
            Some(flat) => Err(ImageError::NonFiniteInput {
                message: format!("image sample {:?}", self.shape.coords(flat)),
            }),
            None => Ok(()),
        }
    }

    /// Corner-origin copy. A no-op clone when already shifted.
    pub fn to_shifted(&self) -> ImageResult<ComplexImage> {
        if self.shifted {
            return Ok(self.clone());
        }
        let data = spim_fft::ifftshift_nd(&self.data, self.shape.dims()).map_err(shift_error)?;
        Ok(Self {
            data,
            shifted: true,
            ..self.clone_layout()
        })
    }

    /// Center-origin copy. A no-op clone when already centered.
    pub fn to_centered(&self) -> ImageResult<ComplexImage> {
        if !self.shifted {
            return Ok(self.clone());
        }
        let data = spim_fft::fftshift_nd(&self.data, self.shape.dims()).map_err(shift_error)?;
        Ok(Self {
            data,
            shifted: false,
            ..self.clone_layout()
        })
    }

    fn clone_layout(&self) -> Self {
        Self {
            shape: self.shape,
            data: Vec::new(),
            phased: self.phased,
            scaled: self.scaled,
            shifted: self.shifted,
            detector: self.detector.clone(),
        }
    }
}

/// Euclidean norm of a complex slice.
#[must_use]
pub fn norm(data: &[Complex64]) -> f64 {
    data.iter().map(Complex64::norm_sqr).sum::<f64>().sqrt()
}

fn shift_error(err: spim_fft::FftError) -> ImageError {
    ImageError::InvalidShape {
        message: err.to_string(),
    }
}
