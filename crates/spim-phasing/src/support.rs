//! Shrink-wrap support refinement.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use spim_image::{GridShape, SupportMask};

use crate::error::{PhasingError, PhasingResult};

/// How a blurred amplitude map becomes a support.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SupportUpdate {
    /// Keep samples at or above `fraction` of the maximum.
    Threshold { fraction: f64 },
    /// Keep the brightest `fraction` of all samples.
    Area { fraction: f64 },
}

impl Default for SupportUpdate {
    fn default() -> Self {
        Self::Threshold { fraction: 0.2 }
    }
}

/// Periodic support regeneration from the smoothed current image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShrinkWrap {
    /// Update after every `every` iterations.
    pub every: usize,
    pub sigma_start: f64,
    pub sigma_end: f64,
    /// Iterations over which sigma moves linearly from start to end.
    pub sigma_decay_iterations: usize,
    pub method: SupportUpdate,
}

impl Default for ShrinkWrap {
    fn default() -> Self {
        Self {
            every: 20,
            sigma_start: 3.0,
            sigma_end: 0.7,
            sigma_decay_iterations: 1000,
            method: SupportUpdate::default(),
        }
    }
}

impl ShrinkWrap {
    #[must_use]
    pub fn with_every(mut self, every: usize) -> Self {
        self.every = every;
        self
    }

    #[must_use]
    pub fn with_sigma(mut self, start: f64, end: f64, decay_iterations: usize) -> Self {
        self.sigma_start = start;
        self.sigma_end = end;
        self.sigma_decay_iterations = decay_iterations;
        self
    }

    #[must_use]
    pub fn with_method(mut self, method: SupportUpdate) -> Self {
        self.method = method;
        self
    }

    pub fn validate(&self) -> PhasingResult<()> {
        if self.every == 0 {
            return Err(PhasingError::config(
                "shrink_wrap.every",
                "update interval must be at least 1",
            ));
        }
        for (field, sigma) in [
            ("shrink_wrap.sigma_start", self.sigma_start),
            ("shrink_wrap.sigma_end", self.sigma_end),
        ] {
            if !(sigma.is_finite() && sigma >= 0.0) {
                return Err(PhasingError::config(
                    field,
                    format!("sigma must be finite and non-negative, got {sigma}"),
                ));
            }
        }
        let fraction = match self.method {
            SupportUpdate::Threshold { fraction } | SupportUpdate::Area { fraction } => fraction,
        };
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(PhasingError::config(
                "shrink_wrap.method.fraction",
                format!("fraction must lie in (0, 1], got {fraction}"),
            ));
        }
        Ok(())
    }

    /// Whether the support is regenerated after `completed` iterations.
    #[must_use]
    pub fn is_due(&self, completed: usize) -> bool {
        completed > 0 && self.every > 0 && completed.is_multiple_of(self.every)
    }

    #[must_use]
    pub fn sigma_at(&self, iteration: usize) -> f64 {
        if self.sigma_decay_iterations == 0 || iteration >= self.sigma_decay_iterations {
            return self.sigma_end;
        }
        let t = iteration as f64 / self.sigma_decay_iterations as f64;
        self.sigma_start + (self.sigma_end - self.sigma_start) * t
    }

    /// New support from the amplitudes of `image` after `iteration` iterations.
    ///
    /// Never empty: if the cut keeps nothing, the brightest sample survives.
    pub fn update(
        &self,
        image: &[Complex64],
        shape: GridShape,
        iteration: usize,
    ) -> PhasingResult<SupportMask> {
        let amplitudes = image.iter().map(|v| v.norm()).collect::<Vec<_>>();
        let blurred = gaussian_blur(&amplitudes, shape, self.sigma_at(iteration));
        let mut mask = match self.method {
            SupportUpdate::Threshold { fraction } => {
                let peak = blurred.iter().copied().fold(0.0f64, f64::max);
                let cut = peak * fraction;
                blurred.iter().map(|&v| peak > 0.0 && v >= cut).collect::<Vec<_>>()
            }
            SupportUpdate::Area { fraction } => brightest_fraction(&blurred, fraction),
        };
        if !mask.iter().any(|&inside| inside)
            && let Some(brightest) = argmax(&blurred)
        {
            mask[brightest] = true;
        }
        Ok(SupportMask::from_vec(shape, mask)?)
    }
}

fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(index, _)| index)
}

fn brightest_fraction(values: &[f64], fraction: f64) -> Vec<bool> {
    let keep = ((values.len() as f64 * fraction).round() as usize).clamp(1, values.len().max(1));
    let mut order = (0..values.len()).collect::<Vec<_>>();
    // stable sort keeps ties in index order, so the result is deterministic
    order.sort_by(|&a, &b| values[b].total_cmp(&values[a]));
    let mut mask = vec![false; values.len()];
    for &index in order.iter().take(keep) {
        mask[index] = true;
    }
    mask
}

/// Normalized Gaussian taps for offsets `-radius..=radius`, `radius = ceil(3 sigma)`.
#[must_use]
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    if sigma.is_nan() || sigma <= 0.0 {
        return vec![1.0];
    }
    let radius = (3.0 * sigma).ceil() as isize;
    let mut taps = (-radius..=radius)
        .map(|offset| (-((offset * offset) as f64) / (2.0 * sigma * sigma)).exp())
        .collect::<Vec<_>>();
    let total = taps.iter().sum::<f64>();
    for tap in &mut taps {
        *tap /= total;
    }
    taps
}

/// [`gaussian_kernel`] wrapped onto a periodic axis of length `n`: entry `k`
/// is the total weight of every offset congruent to `k` modulo `n`.
///
/// At `sigma >= n` the wrapped Gaussian is uniform to within `exp(-2 pi^2)`,
/// so the flat kernel is returned without expanding the taps.
#[must_use]
pub fn periodic_gaussian_kernel(sigma: f64, n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    if sigma.is_nan() || sigma <= 0.0 {
        let mut identity = vec![0.0; n];
        identity[0] = 1.0;
        return identity;
    }
    if sigma >= n as f64 {
        return vec![1.0 / n as f64; n];
    }
    let taps = gaussian_kernel(sigma);
    let radius = (taps.len() / 2) as isize;
    let mut folded = vec![0.0; n];
    for (tap, &weight) in taps.iter().enumerate() {
        folded[(tap as isize - radius).rem_euclid(n as isize) as usize] += weight;
    }
    folded
}

/// Separable Gaussian blur with periodic boundaries along every axis.
///
/// Each axis costs at most `n` taps per sample whatever `sigma` is.
#[must_use]
pub fn gaussian_blur(values: &[f64], shape: GridShape, sigma: f64) -> Vec<f64> {
    if sigma.is_nan() || sigma <= 0.0 {
        return values.to_vec();
    }
    let dims = shape.dims();
    let strides = shape.strides();
    let mut current = values.to_vec();
    let mut next = vec![0.0; values.len()];
    for (&n, &stride) in dims.iter().zip(&strides) {
        if n <= 1 {
            continue;
        }
        let kernel = periodic_gaussian_kernel(sigma, n);
        for (flat, out) in next.iter_mut().enumerate() {
            let coord = (flat / stride) % n;
            let base = flat - coord * stride;
            *out = kernel
                .iter()
                .enumerate()
                .filter(|&(_, &weight)| weight != 0.0)
                .map(|(offset, &weight)| weight * current[base + ((coord + offset) % n) * stride])
                .sum();
        }
        std::mem::swap(&mut current, &mut next);
    }
    current
}
