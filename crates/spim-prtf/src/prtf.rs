use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use spim_fft::FftContext;
use spim_image::{ComplexImage, Detector, GridShape};
use spim_runtime::RuntimeMode;

use crate::align::{AlignmentMode, align_ensemble};
use crate::error::PrtfError;
use crate::radial::radial_average;

/// Smallest ensemble the PRTF is defined for.
pub const MIN_ENSEMBLE: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PrtfConfig {
    /// Number of radial shells; 0 returns the full-grid PRTF.
    pub radial_bins: usize,
    pub alignment: AlignmentMode,
    /// Also try the centro-symmetric twin of each member during alignment.
    pub enantiomorphs: bool,
    pub mode: RuntimeMode,
}

impl PrtfConfig {
    #[must_use]
    pub fn with_radial_bins(mut self, radial_bins: usize) -> Self {
        self.radial_bins = radial_bins;
        self
    }

    #[must_use]
    pub fn with_alignment(mut self, alignment: AlignmentMode) -> Self {
        self.alignment = alignment;
        self
    }

    #[must_use]
    pub fn with_enantiomorphs(mut self, enantiomorphs: bool) -> Self {
        self.enantiomorphs = enantiomorphs;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: RuntimeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, PrtfError> {
        serde_json::from_str(json).map_err(|err| PrtfError::InvalidConfig {
            field: "json",
            detail: err.to_string(),
        })
    }

    pub fn to_json_string(&self) -> Result<String, PrtfError> {
        serde_json::to_string_pretty(self).map_err(|err| PrtfError::InvalidConfig {
            field: "json",
            detail: err.to_string(),
        })
    }
}

/// Per-frequency phase consistency of an ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrtfResult {
    pub shape: GridShape,
    /// Radial profile when radial bins were requested, else the full grid.
    pub per_bin_values: Vec<f64>,
    /// PRTF at every Fourier sample, corner-origin order.
    pub full_grid: Vec<f64>,
    /// Shell centers in cycles per sample; empty without radial binning.
    pub radial_frequencies: Vec<f64>,
    pub bin_counts: Vec<usize>,
    /// Mean of the aligned ensemble in real space.
    pub average_image: ComplexImage,
    pub ensemble_size: usize,
}

impl PrtfResult {
    /// Real-space resolution of each radial shell, measured along the
    /// longest grid axis.
    #[must_use]
    pub fn resolution_axis(&self, detector: &Detector) -> Vec<f64> {
        let extent = self.shape.dims().iter().copied().max().unwrap_or(1);
        self.radial_frequencies
            .iter()
            .map(|&frequency| detector.resolution_at(frequency, extent))
            .collect()
    }
}

/// PRTF of `images`: at each frequency, the magnitude of the ensemble's mean
/// spectrum over the mean of the individual magnitudes.
///
/// 1 means every member agrees in phase; uncorrelated phases tend to 0 as
/// the ensemble grows. Samples where every member has zero amplitude report 1.
pub fn compute_prtf(
    images: &[ComplexImage],
    config: &PrtfConfig,
    fft: &mut FftContext,
) -> Result<PrtfResult, PrtfError> {
    if images.len() < MIN_ENSEMBLE {
        return Err(PrtfError::InsufficientEnsemble {
            required: MIN_ENSEMBLE,
            actual: images.len(),
        });
    }
    let shape = images[0].shape();
    shape.validate()?;
    for (index, image) in images.iter().enumerate().skip(1) {
        if image.shape() != shape {
            return Err(PrtfError::ShapeMismatch {
                index,
                expected: shape,
                actual: image.shape(),
            });
        }
    }
    if config.mode.checks_finite() {
        for image in images {
            image.ensure_finite()?;
        }
    }

    let members = images
        .iter()
        .map(|image| image.data().to_vec())
        .collect::<Vec<_>>();
    let aligned = align_ensemble(
        &members,
        shape,
        config.alignment,
        config.enantiomorphs,
        fft,
    )?;

    let mut coherent = vec![Complex64::new(0.0, 0.0); shape.len()];
    let mut incoherent = vec![0.0; shape.len()];
    let mut average = vec![Complex64::new(0.0, 0.0); shape.len()];
    for member in &aligned {
        let spectrum = fft.fftn(member, shape.dims())?;
        for ((sum, magnitude), value) in coherent.iter_mut().zip(&mut incoherent).zip(&spectrum) {
            *sum += value;
            *magnitude += value.norm();
        }
        for (acc, value) in average.iter_mut().zip(member) {
            *acc += value;
        }
    }
    let full_grid = coherent
        .iter()
        .zip(&incoherent)
        .map(|(sum, &magnitude)| {
            if magnitude > 0.0 {
                (sum.norm() / magnitude).min(1.0)
            } else {
                1.0
            }
        })
        .collect::<Vec<_>>();

    let scale = 1.0 / aligned.len() as f64;
    for value in &mut average {
        *value *= scale;
    }
    let mut average_image = ComplexImage::zeros(shape).with_flags(
        images[0].phased,
        images[0].scaled,
        images[0].shifted,
    );
    average_image.data_mut().copy_from_slice(&average);
    if let Some(detector) = &images[0].detector {
        average_image = average_image.with_detector(detector.clone());
    }

    let (per_bin_values, radial_frequencies, bin_counts) = if config.radial_bins > 0 {
        let profile = radial_average(&full_grid, shape, config.radial_bins);
        (profile.values, profile.frequencies, profile.counts)
    } else {
        (full_grid.clone(), Vec::new(), Vec::new())
    };
    log::debug!(
        "prtf over {} members on {shape}: mean {:.4}",
        aligned.len(),
        full_grid.iter().sum::<f64>() / full_grid.len() as f64
    );

    Ok(PrtfResult {
        shape,
        per_bin_values,
        full_grid,
        radial_frequencies,
        bin_counts,
        average_image,
        ensemble_size: aligned.len(),
    })
}
