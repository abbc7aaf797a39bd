use serde::{Deserialize, Serialize};

use crate::shape::{GridShape, ImageError, ImageResult};

/// Boolean real-space support. `true` marks samples the object may occupy.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSupportMask")]
pub struct SupportMask {
    shape: GridShape,
    mask: Vec<bool>,
}

#[derive(Deserialize)]
struct RawSupportMask {
    shape: GridShape,
    mask: Vec<bool>,
}

impl TryFrom<RawSupportMask> for SupportMask {
    type Error = ImageError;

    fn try_from(raw: RawSupportMask) -> ImageResult<Self> {
        Self::from_vec(raw.shape, raw.mask)
    }
}

impl SupportMask {
    #[must_use]
    pub fn full(shape: GridShape) -> Self {
        Self {
            shape,
            mask: vec![true; shape.len()],
        }
    }

    #[must_use]
    pub fn empty(shape: GridShape) -> Self {
        Self {
            shape,
            mask: vec![false; shape.len()],
        }
    }

    pub fn from_vec(shape: GridShape, mask: Vec<bool>) -> ImageResult<Self> {
        shape.validate()?;
        if mask.len() != shape.len() {
            return Err(ImageError::LengthMismatch {
                expected: shape.len(),
                actual: mask.len(),
            });
        }
        Ok(Self { shape, mask })
    }

    /// Box of `extents` centered on the grid center (`n / 2` per axis).
    ///
    /// This is the centered layout; shift it with [`SupportMask::to_shifted`]
    /// before pairing it with corner-origin data.
    pub fn centered_box(shape: GridShape, extents: &[usize]) -> ImageResult<Self> {
        shape.validate()?;
        if extents.len() != shape.rank() {
            return Err(ImageError::InvalidArgument {
                message: format!(
                    "box has {} extents but the grid has {} axes",
                    extents.len(),
                    shape.rank()
                ),
            });
        }
        let mut bounds = Vec::with_capacity(extents.len());
        for (&extent, &n) in extents.iter().zip(shape.dims()) {
            if extent == 0 || extent > n {
                return Err(ImageError::InvalidArgument {
                    message: format!("box extent {extent} does not fit axis of length {n}"),
                });
            }
            let start = n / 2 - extent / 2;
            bounds.push(start..start + extent);
        }
        Ok(Self::from_fn(shape, |coords| {
            coords
                .iter()
                .zip(&bounds)
                .all(|(coord, range)| range.contains(coord))
        }))
    }

    /// Evaluate `inside` at every grid coordinate.
    pub fn from_fn(shape: GridShape, mut inside: impl FnMut(&[usize]) -> bool) -> Self {
        let mask = (0..shape.len())
            .map(|flat| inside(&shape.coords(flat)))
            .collect();
        Self { shape, mask }
    }

    /// Keep samples whose value is at least `threshold`.
    pub fn from_threshold(shape: GridShape, values: &[f64], threshold: f64) -> ImageResult<Self> {
        Self::from_vec(shape, values.iter().map(|&v| v >= threshold).collect())
    }

    #[must_use]
    pub fn shape(&self) -> GridShape {
        self.shape
    }

    #[must_use]
    pub fn as_slice(&self) -> &[bool] {
        &self.mask
    }

    #[must_use]
    pub fn contains(&self, flat: usize) -> bool {
        self.mask.get(flat).copied().unwrap_or(false)
    }

    /// Number of samples inside the support.
    #[must_use]
    pub fn count(&self) -> usize {
        self.mask.iter().filter(|&&inside| inside).count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.mask.iter().any(|&inside| inside)
    }

    /// Fail unless the mask was built for `expected`.
    pub fn ensure_shape(&self, expected: GridShape) -> ImageResult<()> {
        expected.ensure_same(self.shape)
    }

    /// Corner-origin copy of a centered mask.
    pub fn to_shifted(&self) -> ImageResult<Self> {
        let mask = spim_fft::ifftshift_nd(&self.mask, self.shape.dims()).map_err(|err| {
            ImageError::InvalidShape {
                message: err.to_string(),
            }
        })?;
        Ok(Self {
            shape: self.shape,
            mask,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::SupportMask;
    use crate::{GridShape, ImageError};

    #[test]
    fn centered_box_covers_the_middle() {
        let shape = GridShape::new_2d(6, 6);
        let support = SupportMask::centered_box(shape, &[2, 4]).expect("fits");
        assert_eq!(support.count(), 8);
        assert!(support.contains(shape.flat_index(&[2, 1]).expect("index")));
        assert!(support.contains(shape.flat_index(&[3, 4]).expect("index")));
        assert!(!support.contains(shape.flat_index(&[1, 3]).expect("index")));
        assert!(!support.contains(shape.flat_index(&[3, 5]).expect("index")));
    }

    #[test]
    fn centered_box_rejects_oversized_or_wrong_rank() {
        let shape = GridShape::new_2d(4, 4);
        assert!(matches!(
            SupportMask::centered_box(shape, &[5, 1]),
            Err(ImageError::InvalidArgument { .. })
        ));
        assert!(matches!(
            SupportMask::centered_box(shape, &[2, 2, 2]),
            Err(ImageError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn threshold_mask_keeps_values_at_or_above_cut() {
        let shape = GridShape::new_2d(2, 2);
        let support =
            SupportMask::from_threshold(shape, &[0.1, 0.5, 0.9, 0.49], 0.5).expect("valid");
        assert_eq!(support.as_slice(), &[false, true, true, false]);
        assert!(SupportMask::from_threshold(shape, &[1.0; 3], 0.5).is_err());
    }

    #[test]
    fn shifted_box_wraps_around_the_corner() {
        let shape = GridShape::new_2d(4, 4);
        let shifted = SupportMask::centered_box(shape, &[2, 2])
            .expect("fits")
            .to_shifted()
            .expect("shift");
        assert_eq!(shifted.count(), 4);
        for coords in [[0, 0], [0, 3], [3, 0], [3, 3]] {
            assert!(shifted.contains(shape.flat_index(&coords).expect("index")));
        }
    }

    #[test]
    fn full_and_empty_masks() {
        let shape = GridShape::new_3d(2, 2, 2);
        assert_eq!(SupportMask::full(shape).count(), 8);
        assert!(SupportMask::empty(shape).is_empty());
        assert!(!SupportMask::full(shape).contains(99));
    }

    #[test]
    fn deserialize_rejects_length_mismatch() {
        let support = SupportMask::full(GridShape::new_2d(2, 3));
        let json = serde_json::to_string(&support).expect("serialize");
        assert_eq!(
            serde_json::from_str::<SupportMask>(&json).expect("valid"),
            support
        );

        let mut value = serde_json::to_value(&support).expect("to value");
        value["mask"] = serde_json::json!([]);
        let err = serde_json::from_value::<SupportMask>(value).expect_err("empty mask");
        assert!(err.to_string().contains("length mismatch"));
    }
}
