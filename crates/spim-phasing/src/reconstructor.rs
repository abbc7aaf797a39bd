use std::f64::consts::TAU;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use spim_image::{ComplexImage, GridShape, MeasuredModulus, SupportMask};

use crate::algorithm::{Algorithm, difference_map_update, support_estimate};
use crate::config::{InitialPhase, ReconstructionConfig};
use crate::constraints::{apply_modulus_in_place, apply_support_in_place, fourier_error};
use crate::context::PhasingContext;
use crate::error::{PhasingError, PhasingResult};
use crate::trace::IterationTrace;

/// Relative rise an error must exceed to count towards divergence, so that
/// rounding noise on a stagnated run is not mistaken for growth.
const DIVERGENCE_RTOL: f64 = 1e-12;

/// Lifecycle of a reconstruction run.
///
/// `Initialized -> Iterating -> {Converged, BudgetExhausted, Diverged}`, plus
/// `Cancelled` when the context's token fires between iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Initialized,
    Iterating,
    Converged,
    BudgetExhausted,
    Diverged,
    Cancelled,
}

impl RunState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Converged | Self::BudgetExhausted | Self::Diverged | Self::Cancelled
        )
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::Iterating => "iterating",
            Self::Converged => "converged",
            Self::BudgetExhausted => "budget_exhausted",
            Self::Diverged => "diverged",
            Self::Cancelled => "cancelled",
        }
    }
}

impl Display for RunState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Output of a finished (or abandoned) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconstructionResult {
    /// Support-projected image of the last iteration.
    pub image: ComplexImage,
    /// Support in effect at the end of the run.
    pub support: SupportMask,
    /// Real-space error per iteration (the error history).
    pub real_errors: Vec<f64>,
    pub fourier_errors: Vec<f64>,
    pub support_sizes: Vec<usize>,
    pub iterations: usize,
    pub terminal_state: RunState,
    pub seed: u64,
}

impl ReconstructionResult {
    #[must_use]
    pub fn error_history(&self) -> &[f64] {
        &self.real_errors
    }

    #[must_use]
    pub fn final_error(&self) -> Option<f64> {
        self.real_errors.last().copied()
    }
}

/// A single reconstruction run driven one iteration at a time.
///
/// Each iteration computes `p = P_M x` through the context's FFT, records the
/// real-space error `||p - P_S p|| / ||p||` and the Fourier error, and then
/// forms the next iterate with the configured [`Algorithm`].
#[derive(Debug)]
pub struct Reconstructor<'ctx> {
    ctx: &'ctx mut PhasingContext,
    measured: Arc<MeasuredModulus>,
    support: SupportMask,
    config: ReconstructionConfig,
    shape: GridShape,
    current: Vec<Complex64>,
    projected: Vec<Complex64>,
    output: Vec<Complex64>,
    scratch: Vec<Complex64>,
    state: RunState,
    iteration: usize,
    real_errors: Vec<f64>,
    fourier_errors: Vec<f64>,
    support_sizes: Vec<usize>,
}

impl<'ctx> Reconstructor<'ctx> {
    /// Validate every input and form the starting image
    /// `P_S F^-1(m e^{i phi})`. Nothing is mutated if validation fails.
    pub fn new(
        measured: Arc<MeasuredModulus>,
        support: SupportMask,
        config: ReconstructionConfig,
        ctx: &'ctx mut PhasingContext,
    ) -> PhasingResult<Self> {
        config.validate()?;
        let shape = measured.shape();
        shape.validate()?;
        support.ensure_shape(shape)?;
        if support.is_empty() {
            return Err(PhasingError::EmptySupport);
        }
        if config.mode.checks_finite() {
            measured.ensure_finite()?;
        }
        let phases = initial_phases(&config.initial_phase, shape.len(), ctx.seed())?;

        let mut current = measured
            .amplitudes()
            .iter()
            .zip(measured.known())
            .zip(&phases)
            .map(|((&amplitude, &known), &phase)| {
                if known {
                    Complex64::from_polar(amplitude, phase)
                } else {
                    Complex64::new(0.0, 0.0)
                }
            })
            .collect::<Vec<_>>();
        ctx.fft_mut().ifftn_in_place(&mut current, shape.dims())?;
        apply_support_in_place(&mut current, &support, config.real_space);

        let scratch = if config.algorithm.needs_reflected_projection() {
            vec![Complex64::new(0.0, 0.0); shape.len()]
        } else {
            Vec::new()
        };
        log::debug!(
            "{}: starting {} on {shape} with {} support samples",
            ctx.run_id(),
            config.algorithm.name(),
            support.count()
        );
        Ok(Self {
            ctx,
            measured,
            support,
            shape,
            projected: vec![Complex64::new(0.0, 0.0); shape.len()],
            output: current.clone(),
            current,
            scratch,
            state: RunState::Initialized,
            iteration: 0,
            real_errors: Vec::new(),
            fourier_errors: Vec::new(),
            support_sizes: Vec::new(),
            config,
        })
    }

    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    #[must_use]
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    #[must_use]
    pub fn support(&self) -> &SupportMask {
        &self.support
    }

    #[must_use]
    pub fn real_errors(&self) -> &[f64] {
        &self.real_errors
    }

    #[must_use]
    pub fn config(&self) -> &ReconstructionConfig {
        &self.config
    }

    /// Copy of the current support-projected image.
    #[must_use]
    pub fn image(&self) -> ComplexImage {
        let mut image = ComplexImage::zeros(self.shape);
        image.data_mut().copy_from_slice(&self.output);
        image
    }

    /// Advance one iteration. A no-op once the run is terminal.
    pub fn step(&mut self) -> PhasingResult<RunState> {
        if self.state.is_terminal() {
            return Ok(self.state);
        }
        if self.ctx.is_cancelled() {
            self.state = RunState::Cancelled;
            log::warn!(
                "{}: cancelled after {} iterations",
                self.ctx.run_id(),
                self.iteration
            );
            return Ok(self.state);
        }

        let shape = self.shape;
        let constraint = self.config.real_space;

        self.projected.copy_from_slice(&self.current);
        self.ctx
            .fft_mut()
            .fftn_in_place(&mut self.projected, shape.dims())?;
        let fourier_err = fourier_error(&self.projected, &self.measured);
        apply_modulus_in_place(&mut self.projected, &self.measured);
        self.ctx
            .fft_mut()
            .ifftn_in_place(&mut self.projected, shape.dims())?;

        self.output.copy_from_slice(&self.projected);
        apply_support_in_place(&mut self.output, &self.support, constraint);
        let real_err = relative_residual(&self.projected, &self.output);

        match self.config.algorithm {
            Algorithm::DifferenceMap { beta } => self.difference_map_step(beta)?,
            rule => {
                let samples = self
                    .current
                    .iter_mut()
                    .zip(&self.projected)
                    .zip(self.support.as_slice());
                for ((x, &p), &inside) in samples {
                    *x = rule.update_sample(*x, p, inside, constraint);
                }
            }
        }
        if self.config.mode.checks_finite() && self.current.iter().any(|v| !v.is_finite()) {
            return Err(PhasingError::NonFiniteInput {
                message: format!("iterate became non-finite at iteration {}", self.iteration),
            });
        }

        self.real_errors.push(real_err);
        self.fourier_errors.push(fourier_err);
        self.support_sizes.push(self.support.count());
        self.iteration += 1;

        if let Some(shrink_wrap) = &self.config.shrink_wrap
            && shrink_wrap.is_due(self.iteration)
        {
            self.support = shrink_wrap.update(&self.output, shape, self.iteration)?;
            log::debug!(
                "{}: support updated at iteration {} (sigma {:.3}, {} samples)",
                self.ctx.run_id(),
                self.iteration,
                shrink_wrap.sigma_at(self.iteration),
                self.support.count()
            );
        }

        self.state = self.classify();
        let trace = IterationTrace {
            run_id: self.ctx.run_id().to_owned(),
            iteration: self.iteration,
            algorithm: self.config.algorithm.name(),
            real_error: real_err,
            fourier_error: fourier_err,
            support_size: self.support_sizes.last().copied().unwrap_or(0),
            state: self.state,
        };
        self.ctx.record(trace);
        self.log_terminal();
        Ok(self.state)
    }

    /// Iterate until a terminal state.
    pub fn run(&mut self) -> PhasingResult<RunState> {
        while !self.state.is_terminal() {
            self.step()?;
        }
        Ok(self.state)
    }

    #[must_use]
    pub fn finish(self) -> ReconstructionResult {
        ReconstructionResult {
            image: self.image(),
            support: self.support,
            real_errors: self.real_errors,
            fourier_errors: self.fourier_errors,
            support_sizes: self.support_sizes,
            iterations: self.iteration,
            terminal_state: self.state,
            seed: self.ctx.seed(),
        }
    }

    fn difference_map_step(&mut self, beta: f64) -> PhasingResult<()> {
        let constraint = self.config.real_space;
        let dims = self.shape.dims();
        let estimates = self
            .scratch
            .iter_mut()
            .zip(&self.current)
            .zip(self.support.as_slice());
        for ((estimate, &x), &inside) in estimates {
            *estimate = support_estimate(x, inside, constraint, beta);
        }
        self.ctx.fft_mut().fftn_in_place(&mut self.scratch, dims)?;
        apply_modulus_in_place(&mut self.scratch, &self.measured);
        self.ctx.fft_mut().ifftn_in_place(&mut self.scratch, dims)?;

        let samples = self
            .current
            .iter_mut()
            .zip(&self.projected)
            .zip(&self.scratch)
            .zip(self.support.as_slice());
        for (((x, &p), &reflected), &inside) in samples {
            *x = difference_map_update(*x, p, reflected, inside, constraint, beta);
        }
        Ok(())
    }

    fn classify(&self) -> RunState {
        let errors = &self.real_errors;
        let threshold = self.config.convergence_threshold;

        let window = self.config.convergence_window;
        if errors.len() >= window && errors[errors.len() - window..].iter().all(|&e| e < threshold)
        {
            return RunState::Converged;
        }

        let rising = self.config.divergence_window;
        if rising > 0
            && errors.len() > rising
            && errors.last().is_some_and(|&e| e >= threshold)
            && errors[errors.len() - rising - 1..]
                .windows(2)
                .all(|pair| pair[1] > pair[0] + DIVERGENCE_RTOL * pair[0].abs())
        {
            return RunState::Diverged;
        }

        if self.iteration >= self.config.max_iterations {
            return RunState::BudgetExhausted;
        }
        RunState::Iterating
    }

    fn log_terminal(&self) {
        let error = self.real_errors.last().copied().unwrap_or(f64::NAN);
        match self.state {
            RunState::Diverged => log::warn!(
                "{}: diverged after {} iterations (error {error:.3e})",
                self.ctx.run_id(),
                self.iteration
            ),
            RunState::Converged | RunState::BudgetExhausted => log::info!(
                "{}: {} after {} iterations (error {error:.3e})",
                self.ctx.run_id(),
                self.state,
                self.iteration
            ),
            _ => {}
        }
    }
}

/// Reconstruct to a terminal state with a fresh [`Reconstructor`].
pub fn reconstruct(
    measured: Arc<MeasuredModulus>,
    support: &SupportMask,
    config: &ReconstructionConfig,
    ctx: &mut PhasingContext,
) -> PhasingResult<ReconstructionResult> {
    let mut run = Reconstructor::new(measured, support.clone(), config.clone(), ctx)?;
    run.run()?;
    Ok(run.finish())
}

fn initial_phases(initial: &InitialPhase, len: usize, seed: u64) -> PhasingResult<Vec<f64>> {
    match initial {
        InitialPhase::Random => {
            let mut rng = StdRng::seed_from_u64(seed);
            Ok((0..len).map(|_| rng.random::<f64>() * TAU).collect())
        }
        InitialPhase::Zero => Ok(vec![0.0; len]),
        InitialPhase::Supplied(phases) => {
            if phases.len() != len {
                return Err(PhasingError::config(
                    "initial_phase",
                    format!("expected {len} phases, got {}", phases.len()),
                ));
            }
            Ok(phases.clone())
        }
    }
}

fn relative_residual(before: &[Complex64], after: &[Complex64]) -> f64 {
    let reference = spim_image::image::norm(before);
    if reference == 0.0 {
        return 0.0;
    }
    let residual = before
        .iter()
        .zip(after)
        .map(|(&a, &b)| (a - b).norm_sqr())
        .sum::<f64>()
        .sqrt();
    residual / reference
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use num_complex::Complex64;
    use spim_image::{GridShape, ImageError, MeasuredModulus, SupportMask};
    use spim_runtime::{CancellationToken, RuntimeMode};

    use super::{Reconstructor, RunState, reconstruct};
    use crate::{
        Algorithm, InitialPhase, PhasingContext, PhasingError, ReconstructionConfig, ShrinkWrap,
    };

    fn flat_modulus(n: usize) -> Arc<MeasuredModulus> {
        Arc::new(
            MeasuredModulus::from_amplitudes(GridShape::new_2d(n, n), vec![1.0; n * n])
                .expect("valid modulus"),
        )
    }

    fn corner_support(n: usize, side: usize) -> SupportMask {
        SupportMask::from_fn(GridShape::new_2d(n, n), |c| c[0] < side && c[1] < side)
    }

    #[test]
    fn initialized_run_reports_nothing_yet() {
        let mut ctx = PhasingContext::new(1);
        let run = Reconstructor::new(
            flat_modulus(8),
            corner_support(8, 4),
            ReconstructionConfig::default(),
            &mut ctx,
        )
        .expect("valid inputs");
        assert_eq!(run.state(), RunState::Initialized);
        assert_eq!(run.iteration(), 0);
        let result = run.finish();
        assert!(result.real_errors.is_empty());
        assert_eq!(result.terminal_state, RunState::Initialized);
        // the starting image already satisfies the support
        for (flat, value) in result.image.data().iter().enumerate() {
            if !result.support.contains(flat) {
                assert_eq!(*value, Complex64::new(0.0, 0.0));
            }
        }
    }

    #[test]
    fn budget_bounds_the_error_history() {
        let mut ctx = PhasingContext::new(5);
        let config = ReconstructionConfig::default()
            .with_max_iterations(12)
            .with_convergence(0.0, 1)
            .with_divergence_window(0);
        let result =
            reconstruct(flat_modulus(8), &corner_support(8, 3), &config, &mut ctx).expect("runs");
        assert_eq!(result.terminal_state, RunState::BudgetExhausted);
        assert_eq!(result.iterations, 12);
        assert_eq!(result.real_errors.len(), 12);
        assert_eq!(result.fourier_errors.len(), 12);
        assert_eq!(result.support_sizes, vec![9; 12]);
        assert_eq!(ctx.take_iteration_traces().len(), 12);
        assert_eq!(ctx.take_transform_traces().len(), 1 + 2 * 12);
    }

    #[test]
    fn consistent_object_converges() {
        // a point object: its modulus is flat, and a corner support holds it
        let mut ctx = PhasingContext::new(9);
        let config = ReconstructionConfig::default()
            .with_algorithm(Algorithm::ErrorReduction)
            .with_initial_phase(InitialPhase::Zero)
            .with_max_iterations(5)
            .with_convergence(1e-9, 2);
        let result =
            reconstruct(flat_modulus(8), &corner_support(8, 1), &config, &mut ctx).expect("runs");
        assert_eq!(result.terminal_state, RunState::Converged);
        assert_eq!(result.iterations, 2);
        assert!((result.image.data()[0] - Complex64::new(8.0, 0.0)).norm() < 1e-9);
    }

    fn watched_run(ctx: &mut PhasingContext) -> Reconstructor<'_> {
        let config = ReconstructionConfig::default()
            .with_max_iterations(1000)
            .with_convergence(1e-6, 1)
            .with_divergence_window(3);
        Reconstructor::new(flat_modulus(8), corner_support(8, 4), config, ctx)
            .expect("valid inputs")
    }

    #[test]
    fn strictly_rising_errors_diverge() {
        let mut ctx = PhasingContext::new(2);
        let mut run = watched_run(&mut ctx);
        run.iteration = 4;
        run.real_errors = vec![0.1, 0.2, 0.3, 0.4];
        assert_eq!(run.classify(), RunState::Diverged);

        // too short a history to judge
        run.real_errors = vec![0.2, 0.3, 0.4];
        assert_eq!(run.classify(), RunState::Iterating);
    }

    #[test]
    fn plateau_in_rising_errors_keeps_iterating() {
        let mut ctx = PhasingContext::new(2);
        let mut run = watched_run(&mut ctx);
        run.iteration = 4;
        run.real_errors = vec![0.1, 0.2, 0.2, 0.4];
        assert_eq!(run.classify(), RunState::Iterating);

        // rising below the threshold is not divergence
        run.real_errors = vec![1e-9, 2e-9, 3e-9, 4e-9];
        assert_eq!(run.classify(), RunState::Converged);
        run.config.convergence_window = 10;
        assert_eq!(run.classify(), RunState::Iterating);
    }

    #[test]
    fn cancelled_token_stops_before_the_next_iteration() {
        let token = CancellationToken::new();
        let mut ctx = PhasingContext::new(2).with_cancellation(token.clone());
        let mut run = Reconstructor::new(
            flat_modulus(8),
            corner_support(8, 4),
            ReconstructionConfig::default(),
            &mut ctx,
        )
        .expect("valid inputs");
        assert_eq!(run.step().expect("step"), RunState::Iterating);
        token.cancel();
        assert_eq!(run.run().expect("run"), RunState::Cancelled);
        let result = run.finish();
        assert_eq!(result.iterations, 1);
        assert_eq!(result.terminal_state, RunState::Cancelled);
    }

    #[test]
    fn step_after_terminal_is_a_noop() {
        let mut ctx = PhasingContext::new(2);
        let config = ReconstructionConfig::default().with_max_iterations(1);
        let mut run =
            Reconstructor::new(flat_modulus(4), corner_support(4, 2), config, &mut ctx)
                .expect("valid inputs");
        assert_eq!(run.run().expect("run"), RunState::BudgetExhausted);
        assert_eq!(run.step().expect("step"), RunState::BudgetExhausted);
        assert_eq!(run.iteration(), 1);
    }

    #[test]
    fn malformed_inputs_fail_before_any_transform() {
        let mut ctx = PhasingContext::new(0);
        let wrong = SupportMask::full(GridShape::new_2d(4, 8));
        let err = reconstruct(
            flat_modulus(8),
            &wrong,
            &ReconstructionConfig::default(),
            &mut ctx,
        )
        .expect_err("shape mismatch");
        assert_eq!(
            err,
            PhasingError::Image(ImageError::ShapeMismatch {
                expected: GridShape::new_2d(8, 8),
                actual: GridShape::new_2d(4, 8),
            })
        );
        let empty = SupportMask::empty(GridShape::new_2d(8, 8));
        assert_eq!(
            reconstruct(
                flat_modulus(8),
                &empty,
                &ReconstructionConfig::default(),
                &mut ctx
            ),
            Err(PhasingError::EmptySupport)
        );
        let short_phases = ReconstructionConfig::default()
            .with_initial_phase(InitialPhase::Supplied(vec![0.0; 3]));
        assert!(matches!(
            reconstruct(flat_modulus(8), &corner_support(8, 2), &short_phases, &mut ctx),
            Err(PhasingError::InvalidConfig {
                field: "initial_phase",
                ..
            })
        ));
        assert_eq!(ctx.take_transform_traces().len(), 0);
    }

    #[test]
    fn hardened_mode_rejects_non_finite_modulus() {
        let shape = GridShape::new_2d(4, 4);
        let mut amplitudes = vec![1.0; 16];
        amplitudes[5] = f64::INFINITY;
        let measured =
            Arc::new(MeasuredModulus::from_amplitudes(shape, amplitudes).expect("non-negative"));
        let config = ReconstructionConfig::default().with_mode(RuntimeMode::Hardened);
        let mut ctx = PhasingContext::new(0);
        assert!(matches!(
            reconstruct(measured, &SupportMask::full(shape), &config, &mut ctx),
            Err(PhasingError::Image(ImageError::NonFiniteInput { .. }))
        ));
    }

    #[test]
    fn shrink_wrap_updates_support_sizes() {
        let mut ctx = PhasingContext::new(4);
        let config = ReconstructionConfig::default()
            .with_max_iterations(10)
            .with_convergence(0.0, 1)
            .with_divergence_window(0)
            .with_shrink_wrap(ShrinkWrap::default().with_every(5).with_sigma(1.0, 1.0, 0));
        let result = reconstruct(
            flat_modulus(16),
            &SupportMask::full(GridShape::new_2d(16, 16)),
            &config,
            &mut ctx,
        )
        .expect("runs");
        assert_eq!(result.support_sizes[..5], [256; 5]);
        assert!(result.support.count() >= 1);
        assert_eq!(result.support_sizes[9], result.support_sizes[5]);
    }

    #[test]
    fn every_algorithm_runs_to_budget() {
        for algorithm in [
            Algorithm::ErrorReduction,
            Algorithm::HybridInputOutput { beta: 0.9 },
            Algorithm::Raar { beta: 0.87 },
            Algorithm::DifferenceMap { beta: 0.7 },
        ] {
            let mut ctx = PhasingContext::new(11);
            let config = ReconstructionConfig::default()
                .with_algorithm(algorithm)
                .with_max_iterations(20)
                .with_convergence(0.0, 1)
                .with_divergence_window(0);
            let result = reconstruct(flat_modulus(8), &corner_support(8, 4), &config, &mut ctx)
                .expect("runs");
            assert_eq!(result.iterations, 20, "{}", algorithm.name());
            assert!(result.real_errors.iter().all(|e| e.is_finite()));
            assert!(result.image.is_finite());
        }
    }
}
