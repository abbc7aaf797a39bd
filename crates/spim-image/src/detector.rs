use serde::{Deserialize, Serialize};

use crate::shape::{ImageError, ImageResult};

/// Far-field detector geometry. All lengths are in metres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detector {
    pub pixel_size: f64,
    pub detector_distance: f64,
    pub wavelength: f64,
    /// Beam position on the detector in pixels, one entry per axis. Empty
    /// means the geometric center of the grid.
    pub image_center: Vec<f64>,
}

impl Detector {
    pub fn new(pixel_size: f64, detector_distance: f64, wavelength: f64) -> ImageResult<Self> {
        for (name, value) in [
            ("pixel_size", pixel_size),
            ("detector_distance", detector_distance),
            ("wavelength", wavelength),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ImageError::InvalidArgument {
                    message: format!("{name} must be finite and positive, got {value}"),
                });
            }
        }
        Ok(Self {
            pixel_size,
            detector_distance,
            wavelength,
            image_center: Vec::new(),
        })
    }

    #[must_use]
    pub fn with_image_center(mut self, image_center: Vec<f64>) -> Self {
        self.image_center = image_center;
        self
    }

    /// Scattering angle (radians) of a detector pixel `radius_px` pixels away
    /// from the beam.
    #[must_use]
    pub fn scattering_angle(&self, radius_px: f64) -> f64 {
        (radius_px * self.pixel_size / self.detector_distance).atan()
    }

    /// Real-space full-period resolution for a spatial frequency given in
    /// cycles per pixel on a grid `extent` pixels wide.
    ///
    /// Zero frequency maps to `f64::INFINITY`.
    #[must_use]
    pub fn resolution_at(&self, frequency: f64, extent: usize) -> f64 {
        let radius_px = frequency.abs() * extent as f64;
        let theta = self.scattering_angle(radius_px);
        let half = (theta / 2.0).sin();
        if half <= 0.0 {
            return f64::INFINITY;
        }
        self.wavelength / (2.0 * half)
    }

    /// Size of one real-space pixel of the reconstruction.
    #[must_use]
    pub fn real_space_pixel_size(&self, extent: usize) -> f64 {
        self.wavelength * self.detector_distance / (extent.max(1) as f64 * self.pixel_size)
    }
}
