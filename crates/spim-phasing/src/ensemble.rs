use std::sync::Arc;

use rayon::prelude::*;
use spim_image::{MeasuredModulus, SupportMask};

use crate::config::ReconstructionConfig;
use crate::context::PhasingContext;
use crate::error::{PhasingError, PhasingResult};
use crate::reconstructor::{ReconstructionResult, RunState, reconstruct};

/// Run `runs` independent reconstructions in parallel.
///
/// Member `i` runs in `ctx.child(i)` (seed `ctx.seed() + i`), so the ensemble
/// is reproducible regardless of thread scheduling. Only the measured modulus
/// is shared. Results come back in member order, and member iteration traces
/// are appended to `ctx` in that order.
pub fn reconstruct_ensemble(
    measured: Arc<MeasuredModulus>,
    support: &SupportMask,
    config: &ReconstructionConfig,
    ctx: &mut PhasingContext,
    runs: usize,
) -> PhasingResult<Vec<ReconstructionResult>> {
    config.validate()?;
    if runs == 0 {
        return Err(PhasingError::config(
            "runs",
            "an ensemble needs at least one member",
        ));
    }
    support.ensure_shape(measured.shape())?;

    let children = (0..runs).map(|index| ctx.child(index)).collect::<Vec<_>>();
    let outcomes = children
        .into_par_iter()
        .map(|mut child| {
            let result = reconstruct(Arc::clone(&measured), support, config, &mut child);
            (child, result)
        })
        .collect::<Vec<_>>();

    let mut results = Vec::with_capacity(runs);
    for (mut child, result) in outcomes {
        ctx.absorb(&mut child);
        results.push(result?);
    }
    log::info!(
        "{}: ensemble of {runs} finished ({} converged)",
        ctx.run_id(),
        results
            .iter()
            .filter(|r| r.terminal_state == RunState::Converged)
            .count()
    );
    Ok(results)
}
