use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type ImageResult<T> = Result<T, ImageError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ImageError {
    #[error("invalid shape: {message}")]
    InvalidShape { message: String },
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch {
        expected: GridShape,
        actual: GridShape,
    },
    #[error("length mismatch: expected {expected} samples, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("index {index:?} out of bounds for shape {shape}")]
    IndexOutOfBounds { index: Vec<usize>, shape: GridShape },
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },
    #[error("non-finite input: {message}")]
    NonFiniteInput { message: String },
}

/// Extent of a 2D or 3D row-major grid.
///
/// Unused trailing axes are stored as 1 so the struct stays `Copy`;
/// [`GridShape::dims`] only exposes the first `rank` extents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawGridShape")]
pub struct GridShape {
    extents: [usize; 3],
    rank: usize,
}

#[derive(Deserialize)]
struct RawGridShape {
    extents: [usize; 3],
    rank: usize,
}

impl TryFrom<RawGridShape> for GridShape {
    type Error = ImageError;

    fn try_from(raw: RawGridShape) -> ImageResult<Self> {
        if !matches!(raw.rank, 2 | 3) {
            return Err(ImageError::InvalidShape {
                message: format!("grids must be 2D or 3D, got rank {}", raw.rank),
            });
        }
        Self::from_dims(&raw.extents[..raw.rank])
    }
}

impl GridShape {
    #[must_use]
    pub const fn new_2d(rows: usize, cols: usize) -> Self {
        Self {
            extents: [rows, cols, 1],
            rank: 2,
        }
    }

    #[must_use]
    pub const fn new_3d(depth: usize, rows: usize, cols: usize) -> Self {
        Self {
            extents: [depth, rows, cols],
            rank: 3,
        }
    }

    /// Build a shape from 2 or 3 positive extents.
    pub fn from_dims(dims: &[usize]) -> ImageResult<Self> {
        let shape = match *dims {
            [rows, cols] => Self::new_2d(rows, cols),
            [depth, rows, cols] => Self::new_3d(depth, rows, cols),
            _ => {
                return Err(ImageError::InvalidShape {
                    message: format!("grids must be 2D or 3D, got {} axes", dims.len()),
                });
            }
        };
        shape.validate()?;
        Ok(shape)
    }

    /// Reject zero extents and element counts that overflow `usize`.
    pub fn validate(&self) -> ImageResult<()> {
        if !matches!(self.rank, 2 | 3) {
            return Err(ImageError::InvalidShape {
                message: format!("grids must be 2D or 3D, got rank {}", self.rank),
            });
        }
        if self.dims().contains(&0) {
            return Err(ImageError::InvalidShape {
                message: format!("all extents must be positive, got {self}"),
            });
        }
        self.dims()
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n))
            .ok_or_else(|| ImageError::InvalidShape {
                message: format!("element count of {self} overflows usize"),
            })?;
        Ok(())
    }

    #[must_use]
    pub fn dims(&self) -> &[usize] {
        &self.extents[..self.rank]
    }

    #[must_use]
    pub const fn rank(&self) -> usize {
        self.rank
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.dims().iter().product()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major strides, one per axis.
    #[must_use]
    pub fn strides(&self) -> Vec<usize> {
        let dims = self.dims();
        let mut strides = vec![1usize; dims.len()];
        for axis in (0..dims.len().saturating_sub(1)).rev() {
            strides[axis] = strides[axis + 1] * dims[axis + 1];
        }
        strides
    }

    /// Flat index of `coords`, or `None` if out of bounds or the wrong rank.
    #[must_use]
    pub fn flat_index(&self, coords: &[usize]) -> Option<usize> {
        if coords.len() != self.rank {
            return None;
        }
        let mut flat = 0usize;
        for (&coord, &extent) in coords.iter().zip(self.dims()) {
            if coord >= extent {
                return None;
            }
            flat = flat * extent + coord;
        }
        Some(flat)
    }

    /// Inverse of [`GridShape::flat_index`].
    #[must_use]
    pub fn coords(&self, mut flat: usize) -> Vec<usize> {
        let mut coords = vec![0usize; self.rank];
        for (axis, &extent) in self.dims().iter().enumerate().rev() {
            coords[axis] = flat % extent.max(1);
            flat /= extent.max(1);
        }
        coords
    }

    /// Signed spatial frequency of `coord` along `axis` in cycles per sample,
    /// for corner-origin (unshifted) Fourier layouts.
    #[must_use]
    pub fn signed_frequency(&self, axis: usize, coord: usize) -> f64 {
        let n = self.dims()[axis];
        if coord < n.div_ceil(2) {
            coord as f64 / n as f64
        } else {
            -((n - coord) as f64) / n as f64
        }
    }

    /// Euclidean length of the frequency vector at `flat`.
    #[must_use]
    pub fn frequency_radius(&self, flat: usize) -> f64 {
        self.coords(flat)
            .iter()
            .enumerate()
            .map(|(axis, &coord)| self.signed_frequency(axis, coord).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// Fail with [`ImageError::ShapeMismatch`] unless `other == self`.
    pub fn ensure_same(&self, other: GridShape) -> ImageResult<()> {
        if *self != other {
            return Err(ImageError::ShapeMismatch {
                expected: *self,
                actual: other,
            });
        }
        Ok(())
    }
}

impl Display for GridShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let dims = self
            .dims()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        write!(f, "[{}]", dims.join("x"))
    }
}

#[cfg(test)]
mod tests {
    use super::{GridShape, ImageError};

    #[test]
    fn from_dims_accepts_only_2d_and_3d() {
        assert_eq!(
            GridShape::from_dims(&[4, 5]).expect("2d"),
            GridShape::new_2d(4, 5)
        );
        assert_eq!(
            GridShape::from_dims(&[2, 4, 5]).expect("3d"),
            GridShape::new_3d(2, 4, 5)
        );
        assert!(matches!(
            GridShape::from_dims(&[16]),
            Err(ImageError::InvalidShape { .. })
        ));
        assert!(matches!(
            GridShape::from_dims(&[2, 2, 2, 2]),
            Err(ImageError::InvalidShape { .. })
        ));
        assert!(matches!(
            GridShape::from_dims(&[4, 0]),
            Err(ImageError::InvalidShape { .. })
        ));
    }

    #[test]
    fn flat_index_and_coords_are_inverse() {
        let shape = GridShape::new_3d(2, 3, 4);
        assert_eq!(shape.strides(), vec![12, 4, 1]);
        for flat in 0..shape.len() {
            let coords = shape.coords(flat);
            assert_eq!(shape.flat_index(&coords), Some(flat));
        }
        assert_eq!(shape.flat_index(&[1, 3, 0]), None);
        assert_eq!(shape.flat_index(&[1, 2]), None);
    }

    #[test]
    fn signed_frequency_matches_fftfreq_layout() {
        let shape = GridShape::new_2d(8, 5);
        let rows = (0..8)
            .map(|i| shape.signed_frequency(0, i))
            .collect::<Vec<_>>();
        assert_eq!(rows, spim_fft::fftfreq(8, 1.0).expect("fftfreq"));
        let cols = (0..5)
            .map(|i| shape.signed_frequency(1, i))
            .collect::<Vec<_>>();
        assert_eq!(cols, spim_fft::fftfreq(5, 1.0).expect("fftfreq"));
    }

    #[test]
    fn frequency_radius_is_zero_only_at_origin() {
        let shape = GridShape::new_2d(4, 4);
        assert_eq!(shape.frequency_radius(0), 0.0);
        let corner = shape.flat_index(&[2, 2]).expect("index");
        assert!((shape.frequency_radius(corner) - 0.5f64.hypot(0.5)).abs() < 1e-15);
    }

    #[test]
    fn display_joins_extents() {
        assert_eq!(GridShape::new_3d(2, 3, 4).to_string(), "[2x3x4]");
    }

    #[test]
    fn deserialize_rejects_invalid_shapes() {
        let parse = |json: &str| serde_json::from_str::<GridShape>(json);
        let shape = parse(r#"{"extents":[3,4,9],"rank":2}"#).expect("valid 2D");
        assert_eq!(shape, GridShape::new_2d(3, 4));
        assert!(parse(r#"{"extents":[3,4,5],"rank":5}"#).is_err());
        assert!(parse(r#"{"extents":[3,4,5],"rank":1}"#).is_err());
        assert!(parse(r#"{"extents":[3,0,5],"rank":3}"#).is_err());

        let raw = GridShape {
            extents: [2, 2, 2],
            rank: 4,
        };
        assert!(matches!(raw.validate(), Err(ImageError::InvalidShape { .. })));
    }
}
