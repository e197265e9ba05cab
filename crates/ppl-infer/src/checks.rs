//! Structural and shape validation of model/guide trace pairs.

use std::collections::BTreeSet;

use ppl_core::errors::ErrorInfo;
use ppl_core::{PplError, Site, SiteKind, Trace};

/// Returns `trace` without its subsample bookkeeping sites.
pub fn prune_subsample_sites(mut trace: Trace) -> Trace {
    trace.retain(|site| site.kind() != SiteKind::Subsample);
    trace
}

/// Checks that the guide covers the model's latent sites and that shared
/// sites agree on their distribution shapes.
///
/// Every latent model site must appear in the guide. Plates present only in
/// the guide are reported as warnings.
pub fn check_model_guide_match(
    model: &Trace,
    guide: &Trace,
    max_plate_nesting: usize,
) -> Result<(), PplError> {
    let model_vars: BTreeSet<&str> = model
        .iter()
        .filter(|site| site.is_latent_sample())
        .map(Site::name)
        .collect();
    let guide_vars: BTreeSet<&str> = guide
        .sample_sites()
        .map(Site::name)
        .collect();

    let missing: Vec<&str> = model_vars
        .iter()
        .filter(|name| !guide_vars.contains(*name))
        .copied()
        .collect();
    if !missing.is_empty() {
        return Err(PplError::Mismatch(
            ErrorInfo::new("missing-guide-sites", "found vars in model but not guide")
                .with_context("sites", missing.join(","))
                .with_hint("sample every latent model site in the guide"),
        ));
    }
    let extra: Vec<&str> = guide_vars
        .iter()
        .filter(|name| !model_vars.contains(*name))
        .copied()
        .collect();
    if !extra.is_empty() {
        return Err(PplError::Mismatch(
            ErrorInfo::new("unexpected-guide-sites", "found vars in guide but not model")
                .with_context("sites", extra.join(",")),
        ));
    }

    for name in model_vars.intersection(&guide_vars) {
        let (Some(model_site), Some(guide_site)) = (model.get(name), guide.get(name)) else {
            continue;
        };
        let model_shape = trimmed_dist_shape(model_site, max_plate_nesting)?;
        let guide_shape = trimmed_dist_shape(guide_site, max_plate_nesting)?;
        if model_shape == guide_shape {
            continue;
        }
        let agrees = (0..model_shape.len().max(guide_shape.len())).all(|offset| {
            right_aligned(&model_shape, offset) == right_aligned(&guide_shape, offset)
        });
        if !agrees {
            return Err(PplError::Shape(
                ErrorInfo::new("model-guide-shape", "model and guide shapes disagree")
                    .with_context("site", *name)
                    .with_context("model", format!("{model_shape:?}"))
                    .with_context("guide", format!("{guide_shape:?}")),
            ));
        }
    }

    let model_plates: BTreeSet<&str> = model
        .iter()
        .filter(|site| site.kind() == SiteKind::Subsample)
        .map(Site::name)
        .collect();
    for site in guide.iter().filter(|site| site.kind() == SiteKind::Subsample) {
        if !model_plates.contains(site.name()) {
            tracing::warn!(plate = site.name(), "found plate statements in guide but not model");
        }
    }
    Ok(())
}

/// Checks that the per-element log density of `site` is laid out as its
/// enclosing plates declare.
///
/// Dims left of `max_plate_nesting` are ignored. Must run after the log
/// density has been computed.
pub fn check_site_shape(site: &Site, max_plate_nesting: usize) -> Result<(), PplError> {
    let log_prob = site.log_prob.as_ref().ok_or_else(|| {
        PplError::at_site("missing-log-prob", "log density has not been computed", site.name())
    })?;

    let mut expected: Vec<Option<usize>> = Vec::new();
    for frame in &site.cond_indep_stack {
        let Some(dim) = frame.dim else { continue };
        let from_right = dim.unsigned_abs();
        if expected.len() < from_right {
            let missing = from_right - expected.len();
            expected.splice(0..0, std::iter::repeat(None).take(missing));
        }
        let pos = expected.len() - from_right;
        if expected[pos].is_some() {
            return Err(PplError::Shape(
                ErrorInfo::new("dim-collision", "two plates claim the same dim")
                    .with_context("site", site.name())
                    .with_context("plate", frame.name.as_str())
                    .with_context("dim", dim.to_string())
                    .with_hint("try setting the dim argument of the other plates"),
            ));
        }
        expected[pos] = Some(frame.subsample_size);
    }
    if expected.len() > max_plate_nesting {
        return Err(PplError::Shape(
            ErrorInfo::new("plate-stack-overflow", "plate stack overflow")
                .with_context("site", site.name())
                .with_context("depth", expected.len().to_string())
                .with_hint(format!(
                    "try increasing max_plate_nesting to at least {}",
                    expected.len()
                )),
        ));
    }

    let mut actual = log_prob.shape();
    if actual.len() > max_plate_nesting {
        actual = &actual[actual.len() - max_plate_nesting..];
    }
    for offset in 0..actual.len().max(expected.len()) {
        let actual_size = right_aligned(actual, offset);
        let expected_size = if offset < expected.len() {
            expected[expected.len() - 1 - offset]
        } else {
            Some(1)
        };
        if let Some(expected_size) = expected_size {
            if expected_size != actual_size {
                return Err(PplError::Shape(
                    ErrorInfo::new("invalid-log-prob-shape", "invalid log_prob shape")
                        .with_context("site", site.name())
                        .with_context("expected", format_expected(&expected))
                        .with_context("actual", format!("{actual:?}"))
                        .with_hint(
                            "enclose the batched value in a plate or reinterpret batch dims \
                             with Independent",
                        ),
                ));
            }
        }
    }
    Ok(())
}

fn trimmed_dist_shape(site: &Site, max_plate_nesting: usize) -> Result<Vec<usize>, PplError> {
    let dist = site.require_dist()?;
    let shape = dist.shape();
    let keep = max_plate_nesting.saturating_add(dist.event_shape().len());
    if shape.len() > keep {
        return Ok(shape[shape.len() - keep..].to_vec());
    }
    Ok(shape)
}

/// Size at `offset` from the right, one when the shape is shorter.
fn right_aligned(shape: &[usize], offset: usize) -> usize {
    if offset < shape.len() {
        shape[shape.len() - 1 - offset]
    } else {
        1
    }
}

fn format_expected(expected: &[Option<usize>]) -> String {
    let dims: Vec<String> = expected
        .iter()
        .map(|size| size.map_or_else(|| "-1".to_string(), |size| size.to_string()))
        .collect();
    format!("[{}]", dims.join(", "))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ppl_core::{Bernoulli, CondIndepFrame, Value};

    use super::*;

    fn frame(name: &str, dim: isize, size: usize) -> CondIndepFrame {
        CondIndepFrame {
            name: name.to_string(),
            dim: Some(dim),
            size,
            subsample_size: size,
            counter: 0,
        }
    }

    fn scored(shape: &[usize], frames: Vec<CondIndepFrame>) -> Site {
        let mut site = Site::sample("x", Arc::new(Bernoulli::new(0.5).unwrap()));
        site.cond_indep_stack = frames;
        site.log_prob = Some(Value::filled(shape, -0.5));
        site
    }

    #[test]
    fn matching_plate_layout_passes() {
        let site = scored(&[3], vec![frame("data", -1, 3)]);
        check_site_shape(&site, 1).unwrap();
    }

    #[test]
    fn dims_left_of_nesting_bound_are_ignored() {
        let site = scored(&[7, 3], vec![frame("data", -1, 3)]);
        check_site_shape(&site, 1).unwrap();
    }

    #[test]
    fn collision_and_overflow_are_reported() {
        let site = scored(&[3], vec![frame("a", -1, 3), frame("b", -1, 3)]);
        assert_eq!(check_site_shape(&site, 2).unwrap_err().code(), "dim-collision");

        let site = scored(&[2, 3], vec![frame("a", -1, 3), frame("b", -2, 2)]);
        let err = check_site_shape(&site, 1).unwrap_err();
        assert_eq!(err.code(), "plate-stack-overflow");
        assert!(err.info().hint.as_deref().unwrap().contains("at least 2"));
    }

    #[test]
    fn misplaced_batch_dim_names_the_site() {
        let site = scored(&[4], vec![frame("data", -1, 3)]);
        let err = check_site_shape(&site, 1).unwrap_err();
        assert_eq!(err.code(), "invalid-log-prob-shape");
        assert_eq!(err.info().context.get("site").map(String::as_str), Some("x"));
    }
}
