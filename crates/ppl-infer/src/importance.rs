//! Scored model/guide trace pairs for downstream estimators.

use ppl_core::{is_validation_enabled, GraphType, PplError, RngHandle, Trace, Value};

use crate::checks::{check_model_guide_match, check_site_shape, prune_subsample_sites};
use crate::program::Program;
use crate::runtime::Runtime;

/// Runs `guide`, replays `model` against it and scores both traces.
///
/// Both programs run with plate broadcasting. When validation is enabled
/// the pair is checked for matching sites before pruning and every sample
/// site is shape checked after scoring. The model trace carries log
/// densities on all sample sites, the guide trace additionally carries
/// score parts.
pub fn build_importance_trace<M, G>(
    graph_type: GraphType,
    max_plate_nesting: usize,
    model: &M,
    guide: &G,
    args: &[Value],
    rng: &mut RngHandle,
) -> Result<(Trace, Trace), PplError>
where
    M: Program + ?Sized,
    G: Program + ?Sized,
{
    let guide_trace = Runtime::new(graph_type, rng)
        .broadcasting()
        .execute(guide, args)?;
    let model_trace = Runtime::new(graph_type, rng)
        .replaying(&guide_trace)
        .broadcasting()
        .execute(model, args)?;

    let validate = is_validation_enabled();
    if validate {
        check_model_guide_match(&model_trace, &guide_trace, max_plate_nesting)?;
    }

    let mut guide_trace = prune_subsample_sites(guide_trace);
    let mut model_trace = prune_subsample_sites(model_trace);

    model_trace.compute_log_prob()?;
    guide_trace.compute_score_parts()?;
    if validate {
        for site in model_trace.sample_sites().chain(guide_trace.sample_sites()) {
            check_site_shape(site, max_plate_nesting)?;
        }
    }
    tracing::trace!(
        model_sites = model_trace.len(),
        guide_sites = guide_trace.len(),
        "importance trace built"
    );
    Ok((model_trace, guide_trace))
}
