use serde::{Deserialize, Serialize};
use spim_image::GridShape;

/// Shell averages of a corner-origin Fourier-space map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadialProfile {
    pub values: Vec<f64>,
    /// Center of each shell in cycles per sample.
    pub frequencies: Vec<f64>,
    pub counts: Vec<usize>,
}

/// Average `values` over `bins` shells of equal width in |frequency|,
/// spanning zero to the largest radius present on the grid.
///
/// Empty shells report 0 with a count of 0.
#[must_use]
pub fn radial_average(values: &[f64], shape: GridShape, bins: usize) -> RadialProfile {
    let bins = bins.max(1);
    let radii = (0..shape.len())
        .map(|flat| shape.frequency_radius(flat))
        .collect::<Vec<_>>();
    let r_max = radii.iter().copied().fold(0.0f64, f64::max);
    let width = if r_max > 0.0 { r_max / bins as f64 } else { 1.0 };

    let mut sums = vec![0.0; bins];
    let mut counts = vec![0usize; bins];
    for (&value, &radius) in values.iter().zip(&radii) {
        let bin = ((radius / width) as usize).min(bins - 1);
        sums[bin] += value;
        counts[bin] += 1;
    }
    let values = sums
        .iter()
        .zip(&counts)
        .map(|(&sum, &count)| if count > 0 { sum / count as f64 } else { 0.0 })
        .collect();
    let frequencies = (0..bins).map(|b| (b as f64 + 0.5) * width).collect();
    RadialProfile {
        values,
        frequencies,
        counts,
    }
}
