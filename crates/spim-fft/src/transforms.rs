use std::collections::{HashMap, VecDeque};
use std::f64::consts::PI;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;
use std::time::Instant;

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use spim_runtime::RuntimeMode;

use crate::plan::{
    LocalPlanCache, PlanCacheBackend, PlanCacheConfig, PlanFingerprint, PlanKey, PlanMetadata,
};
use crate::{Normalization, TransformKind};

/// Backends that can serve FFT requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BackendKind {
    /// O(n²) reference DFT. Slow, but trivially correct; used as a test oracle.
    NaiveDft,
    #[default]
    RustFft,
}

impl BackendKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NaiveDft => "naive_dft",
            Self::RustFft => "rustfft",
        }
    }

    fn instantiate(self) -> Box<dyn FftBackend> {
        match self {
            Self::NaiveDft => Box::new(NaiveDftBackend::default()),
            Self::RustFft => Box::new(RustFftBackend::default()),
        }
    }
}

/// A 1D complex transform kernel. Multi-dimensional transforms are composed
/// from it axis by axis, so a backend only has to provide the 1D case.
pub trait FftBackend: Send {
    fn kind(&self) -> BackendKind;

    /// Transform `data` in place without any normalization.
    fn transform_1d_unscaled(&mut self, data: &mut [Complex64], inverse: bool);
}

#[derive(Debug, Default)]
pub struct NaiveDftBackend {
    scratch: Vec<Complex64>,
}

impl FftBackend for NaiveDftBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::NaiveDft
    }

    fn transform_1d_unscaled(&mut self, data: &mut [Complex64], inverse: bool) {
        let n = data.len();
        if n == 0 {
            return;
        }

        let sign = if inverse { 1.0 } else { -1.0 };
        self.scratch.clear();
        self.scratch.resize(n, Complex64::new(0.0, 0.0));
        for (k, out) in self.scratch.iter_mut().enumerate() {
            let mut acc = Complex64::new(0.0, 0.0);
            for (t, &value) in data.iter().enumerate() {
                // reduce k*t mod n first so the angle stays small for large n
                let phase = ((k * t) % n) as f64;
                let angle = sign * 2.0 * PI * phase / (n as f64);
                acc += value * Complex64::from_polar(1.0, angle);
            }
            *out = acc;
        }
        data.copy_from_slice(&self.scratch);
    }
}

/// Most (length, direction) plans a [`RustFftBackend`] keeps alive at once.
pub const MAX_RUSTFFT_PLANS: usize = 64;

/// Backend built on `rustfft` planned kernels.
///
/// One planner serves every length, so twiddle tables and sub-plans are
/// shared between plans. Plans are created lazily per (length, direction);
/// once [`MAX_RUSTFFT_PLANS`] are held, the backend starts over with an empty
/// map and a fresh planner.
pub struct RustFftBackend {
    planner: FftPlanner<f64>,
    plans: HashMap<(usize, bool), Arc<dyn Fft<f64>>>,
    scratch: Vec<Complex64>,
}

impl Default for RustFftBackend {
    fn default() -> Self {
        Self {
            planner: FftPlanner::new(),
            plans: HashMap::new(),
            scratch: Vec::new(),
        }
    }
}

impl RustFftBackend {
    fn plan(&mut self, n: usize, inverse: bool) -> Arc<dyn Fft<f64>> {
        if let Some(plan) = self.plans.get(&(n, inverse)) {
            return Arc::clone(plan);
        }
        if self.plans.len() >= MAX_RUSTFFT_PLANS {
            self.plans.clear();
            self.planner = FftPlanner::new();
        }
        let plan = if inverse {
            self.planner.plan_fft_inverse(n)
        } else {
            self.planner.plan_fft_forward(n)
        };
        self.plans.insert((n, inverse), Arc::clone(&plan));
        plan
    }

    #[must_use]
    pub fn planned_lengths(&self) -> usize {
        self.plans.len()
    }
}

impl Debug for RustFftBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RustFftBackend")
            .field("planned", &self.plans.len())
            .field("scratch_len", &self.scratch.len())
            .finish()
    }
}

impl FftBackend for RustFftBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::RustFft
    }

    fn transform_1d_unscaled(&mut self, data: &mut [Complex64], inverse: bool) {
        if data.is_empty() {
            return;
        }
        let plan = self.plan(data.len(), inverse);
        let needed = plan.get_inplace_scratch_len();
        if self.scratch.len() < needed {
            self.scratch.resize(needed, Complex64::new(0.0, 0.0));
        }
        plan.process_with_scratch(data, &mut self.scratch[..needed]);
    }
}

/// Common options shared by FFT transform entrypoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FftOptions {
    pub mode: RuntimeMode,
    pub normalization: Normalization,
    pub backend: BackendKind,
    pub check_finite: bool,
    pub plan_cache: PlanCacheConfig,
    /// Maximum number of transform traces a context retains (oldest evicted).
    pub trace_capacity: usize,
}

impl Default for FftOptions {
    fn default() -> Self {
        Self {
            mode: RuntimeMode::Strict,
            normalization: Normalization::Backward,
            backend: BackendKind::RustFft,
            check_finite: false,
            plan_cache: PlanCacheConfig::default(),
            trace_capacity: 1024,
        }
    }
}

impl FftOptions {
    #[must_use]
    pub fn with_mode(mut self, mode: RuntimeMode) -> Self {
        self.mode = mode;
        self
    }

    #[must_use]
    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    #[must_use]
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    #[must_use]
    pub fn with_check_finite(mut self, check_finite: bool) -> Self {
        self.check_finite = check_finite;
        self
    }

    #[must_use]
    pub fn with_plan_cache(mut self, plan_cache: PlanCacheConfig) -> Self {
        self.plan_cache = plan_cache;
        self
    }

    #[must_use]
    pub fn with_trace_capacity(mut self, trace_capacity: usize) -> Self {
        self.trace_capacity = trace_capacity;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FftError {
    InvalidShape { detail: &'static str },
    LengthMismatch { expected: usize, actual: usize },
    NonPositiveSampleSpacing,
    NonFiniteInput,
}

impl Display for FftError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidShape { detail } => write!(f, "invalid shape: {detail}"),
            Self::LengthMismatch { expected, actual } => {
                write!(f, "length mismatch: expected {expected}, got {actual}")
            }
            Self::NonPositiveSampleSpacing => {
                write!(f, "sample spacing must be finite and greater than zero")
            }
            Self::NonFiniteInput => write!(f, "non-finite input rejected by policy"),
        }
    }
}

impl std::error::Error for FftError {}

/// One record per oracle call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransformTrace {
    pub operation_id: String,
    pub kind: TransformKind,
    pub direction: &'static str,
    pub shape: Vec<usize>,
    pub n: usize,
    pub backend: BackendKind,
    pub plan_cache_hit: bool,
    pub mode: RuntimeMode,
    pub timing_ns: u64,
}

impl TransformTrace {
    #[must_use]
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// Explicit Fourier transform context.
///
/// Owns the backend (and its plans), the plan bookkeeping cache and the trace
/// log. There is no process-wide state: create one context per run (or per
/// ensemble member) and drop it afterwards.
pub struct FftContext {
    options: FftOptions,
    backend: Box<dyn FftBackend>,
    plans: LocalPlanCache,
    traces: VecDeque<TransformTrace>,
    label: String,
    operation_counter: u64,
}

impl Debug for FftContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftContext")
            .field("options", &self.options)
            .field("backend", &self.backend.kind())
            .field("plans", &self.plans.len())
            .field("traces", &self.traces.len())
            .field("label", &self.label)
            .finish()
    }
}

impl Default for FftContext {
    fn default() -> Self {
        Self::new(FftOptions::default())
    }
}

impl FftContext {
    #[must_use]
    pub fn new(options: FftOptions) -> Self {
        Self {
            backend: options.backend.instantiate(),
            plans: LocalPlanCache::new(options.plan_cache.clone()),
            traces: VecDeque::new(),
            label: String::from("fft"),
            operation_counter: 0,
            options,
        }
    }

    /// Prefix used for trace operation ids (`"{label}-op-{counter}"`).
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub fn options(&self) -> &FftOptions {
        &self.options
    }

    #[must_use]
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    #[must_use]
    pub fn plan_cache_len(&self) -> usize {
        self.plans.len()
    }

    #[must_use]
    pub fn trace_len(&self) -> usize {
        self.traces.len()
    }

    /// Drain every recorded trace, oldest first.
    pub fn take_transform_traces(&mut self) -> Vec<TransformTrace> {
        self.traces.drain(..).collect()
    }

    /// 1D forward complex FFT.
    pub fn fft(&mut self, input: &[Complex64]) -> Result<Vec<Complex64>, FftError> {
        let mut data = input.to_vec();
        self.run(TransformKind::Fft, &mut data, &[input.len()])?;
        Ok(data)
    }

    /// 1D inverse complex FFT.
    pub fn ifft(&mut self, input: &[Complex64]) -> Result<Vec<Complex64>, FftError> {
        let mut data = input.to_vec();
        self.run(TransformKind::Ifft, &mut data, &[input.len()])?;
        Ok(data)
    }

    /// N-dimensional forward FFT over every axis of a row-major array.
    pub fn fftn(
        &mut self,
        input: &[Complex64],
        shape: &[usize],
    ) -> Result<Vec<Complex64>, FftError> {
        let mut data = input.to_vec();
        self.fftn_in_place(&mut data, shape)?;
        Ok(data)
    }

    /// N-dimensional inverse FFT over every axis of a row-major array.
    pub fn ifftn(
        &mut self,
        input: &[Complex64],
        shape: &[usize],
    ) -> Result<Vec<Complex64>, FftError> {
        let mut data = input.to_vec();
        self.ifftn_in_place(&mut data, shape)?;
        Ok(data)
    }

    pub fn fftn_in_place(
        &mut self,
        data: &mut [Complex64],
        shape: &[usize],
    ) -> Result<(), FftError> {
        self.run(TransformKind::Fftn, data, shape)
    }

    pub fn ifftn_in_place(
        &mut self,
        data: &mut [Complex64],
        shape: &[usize],
    ) -> Result<(), FftError> {
        self.run(TransformKind::Ifftn, data, shape)
    }

    fn run(
        &mut self,
        kind: TransformKind,
        data: &mut [Complex64],
        shape: &[usize],
    ) -> Result<(), FftError> {
        validate_shape(shape)?;
        let expected_len = checked_product(shape).ok_or(FftError::InvalidShape {
            detail: "nd shape product overflow",
        })?;
        if data.len() != expected_len {
            return Err(FftError::LengthMismatch {
                expected: expected_len,
                actual: data.len(),
            });
        }
        validate_finite_complex(data, &self.options)?;

        let key = PlanKey::new(kind, shape.to_vec(), self.options.normalization);
        let plan_cache_hit = self.touch_plan_cache(key);
        let inverse = kind.is_inverse();

        let started = Instant::now();
        for axis in 0..shape.len() {
            apply_axis_transform(self.backend.as_mut(), data, shape, axis, inverse);
        }
        apply_normalization(data, self.options.normalization, expected_len, inverse);
        let timing_ns = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);

        let trace = TransformTrace {
            operation_id: self.next_operation_id(),
            kind,
            direction: if inverse { "inverse" } else { "forward" },
            shape: shape.to_vec(),
            n: expected_len,
            backend: self.backend.kind(),
            plan_cache_hit,
            mode: self.options.mode,
            timing_ns,
        };
        self.record_trace(trace);
        Ok(())
    }

    fn touch_plan_cache(&mut self, key: PlanKey) -> bool {
        if self.plans.lookup(&key).is_some() {
            return true;
        }
        let fingerprint = PlanFingerprint::estimate(&key.shape);
        let _ = self.plans.store(PlanMetadata { key, fingerprint });
        false
    }

    fn next_operation_id(&mut self) -> String {
        self.operation_counter = self.operation_counter.wrapping_add(1);
        format!("{}-op-{:016x}", self.label, self.operation_counter)
    }

    fn record_trace(&mut self, trace: TransformTrace) {
        if self.options.trace_capacity == 0 {
            return;
        }
        if self.traces.len() == self.options.trace_capacity {
            let _ = self.traces.pop_front();
        }
        self.traces.push_back(trace);
    }
}

/// 1D forward complex FFT with a throwaway context.
pub fn fft(input: &[Complex64], options: &FftOptions) -> Result<Vec<Complex64>, FftError> {
    FftContext::new(options.clone()).fft(input)
}

/// 1D inverse complex FFT with a throwaway context.
pub fn ifft(input: &[Complex64], options: &FftOptions) -> Result<Vec<Complex64>, FftError> {
    FftContext::new(options.clone()).ifft(input)
}

/// 2D forward complex FFT via row/column decomposition.
pub fn fft2(
    input: &[Complex64],
    shape: (usize, usize),
    options: &FftOptions,
) -> Result<Vec<Complex64>, FftError> {
    FftContext::new(options.clone()).fftn(input, &[shape.0, shape.1])
}

/// 2D inverse complex FFT via row/column decomposition.
pub fn ifft2(
    input: &[Complex64],
    shape: (usize, usize),
    options: &FftOptions,
) -> Result<Vec<Complex64>, FftError> {
    FftContext::new(options.clone()).ifftn(input, &[shape.0, shape.1])
}

/// N-dimensional forward complex FFT.
pub fn fftn(
    input: &[Complex64],
    shape: &[usize],
    options: &FftOptions,
) -> Result<Vec<Complex64>, FftError> {
    FftContext::new(options.clone()).fftn(input, shape)
}

/// N-dimensional inverse complex FFT.
pub fn ifftn(
    input: &[Complex64],
    shape: &[usize],
    options: &FftOptions,
) -> Result<Vec<Complex64>, FftError> {
    FftContext::new(options.clone()).ifftn(input, shape)
}

fn apply_axis_transform(
    backend: &mut dyn FftBackend,
    data: &mut [Complex64],
    shape: &[usize],
    axis: usize,
    inverse: bool,
) {
    let axis_len = shape[axis];
    let stride = shape[axis + 1..].iter().product::<usize>().max(1);
    if axis_len <= 1 {
        return;
    }

    // Last axis: lines are contiguous and can be transformed in place.
    if stride == 1 {
        for line in data.chunks_exact_mut(axis_len) {
            backend.transform_1d_unscaled(line, inverse);
        }
        return;
    }

    let repeats = shape[..axis].iter().product::<usize>().max(1);
    let block = axis_len * stride;
    let mut scratch = vec![Complex64::new(0.0, 0.0); axis_len];
    for outer in 0..repeats {
        let outer_base = outer * block;
        for offset in 0..stride {
            for (index, slot) in scratch.iter_mut().enumerate() {
                *slot = data[outer_base + index * stride + offset];
            }
            backend.transform_1d_unscaled(&mut scratch, inverse);
            for (index, &value) in scratch.iter().enumerate() {
                data[outer_base + index * stride + offset] = value;
            }
        }
    }
}

fn validate_shape(shape: &[usize]) -> Result<(), FftError> {
    if shape.is_empty() {
        return Err(FftError::InvalidShape {
            detail: "shape cannot be empty",
        });
    }
    if shape.contains(&0) {
        return Err(FftError::InvalidShape {
            detail: "shape dimensions must be greater than zero",
        });
    }
    Ok(())
}

fn checked_product(shape: &[usize]) -> Option<usize> {
    shape
        .iter()
        .try_fold(1usize, |acc, &next| acc.checked_mul(next))
}

fn validate_finite_complex(input: &[Complex64], options: &FftOptions) -> Result<(), FftError> {
    let should_check = options.check_finite || options.mode.checks_finite();
    if should_check && input.iter().any(|value| !value.is_finite()) {
        return Err(FftError::NonFiniteInput);
    }
    Ok(())
}

fn normalization_scale(normalization: Normalization, n: usize, inverse: bool) -> f64 {
    if n == 0 {
        return 1.0;
    }
    let n_as_f64 = n as f64;
    match normalization {
        Normalization::Backward => {
            if inverse {
                1.0 / n_as_f64
            } else {
                1.0
            }
        }
        Normalization::Forward => {
            if inverse {
                1.0
            } else {
                1.0 / n_as_f64
            }
        }
        Normalization::Ortho => 1.0 / n_as_f64.sqrt(),
    }
}

fn apply_normalization(
    data: &mut [Complex64],
    normalization: Normalization,
    n: usize,
    inverse: bool,
) {
    let scale = normalization_scale(normalization, n, inverse);
    if (scale - 1.0).abs() <= f64::EPSILON {
        return;
    }
    for value in data.iter_mut() {
        *value *= scale;
    }
}
