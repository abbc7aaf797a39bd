use std::collections::VecDeque;

use spim_fft::{FftContext, FftOptions, Normalization, TransformTrace};
use spim_runtime::CancellationToken;

use crate::trace::IterationTrace;

/// Explicit state for one reconstruction run or one ensemble.
///
/// Holds what would otherwise be process-wide: the FFT plans, the random
/// seed, the cancellation flag and the trace logs. Create one per run (or per
/// ensemble, deriving members with [`PhasingContext::child`]) and drop it
/// afterwards.
#[derive(Debug)]
pub struct PhasingContext {
    fft: FftContext,
    seed: u64,
    cancel: CancellationToken,
    run_id: String,
    traces: VecDeque<IterationTrace>,
    trace_capacity: usize,
}

impl Default for PhasingContext {
    fn default() -> Self {
        Self::new(0)
    }
}

impl PhasingContext {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self::with_fft_options(seed, FftOptions::default())
    }

    /// Normalization is forced to `Ortho` so that real-space and
    /// Fourier-space errors are measured on the same scale.
    #[must_use]
    pub fn with_fft_options(seed: u64, options: FftOptions) -> Self {
        let options = options.with_normalization(Normalization::Ortho);
        let run_id = format!("run-{seed:x}");
        Self {
            trace_capacity: options.trace_capacity,
            fft: FftContext::new(options).with_label(run_id.clone()),
            seed,
            cancel: CancellationToken::new(),
            run_id,
            traces: VecDeque::new(),
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self.fft = FftContext::new(self.fft.options().clone()).with_label(self.run_id.clone());
        self
    }

    /// Independent context for ensemble member `index`: seed `seed + index`,
    /// the same cancellation flag, a fresh plan cache and empty traces.
    #[must_use]
    pub fn child(&self, index: usize) -> Self {
        let seed = self.seed.wrapping_add(index as u64);
        Self::with_fft_options(seed, self.fft.options().clone())
            .with_cancellation(self.cancel.clone())
            .with_run_id(format!("{}-{index}", self.run_id))
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    #[must_use]
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn fft_mut(&mut self) -> &mut FftContext {
        &mut self.fft
    }

    #[must_use]
    pub fn fft(&self) -> &FftContext {
        &self.fft
    }

    pub(crate) fn record(&mut self, trace: IterationTrace) {
        if self.trace_capacity == 0 {
            return;
        }
        if self.traces.len() == self.trace_capacity {
            let _ = self.traces.pop_front();
        }
        self.traces.push_back(trace);
    }

    /// Move another context's iteration traces to the end of this log.
    pub fn absorb(&mut self, other: &mut PhasingContext) {
        for trace in other.take_iteration_traces() {
            self.record(trace);
        }
    }

    #[must_use]
    pub fn iteration_trace_len(&self) -> usize {
        self.traces.len()
    }

    pub fn take_iteration_traces(&mut self) -> Vec<IterationTrace> {
        self.traces.drain(..).collect()
    }

    pub fn take_transform_traces(&mut self) -> Vec<TransformTrace> {
        self.fft.take_transform_traces()
    }
}
