use std::sync::Arc;

use ppl_core::{
    canonical_hash, Bernoulli, CondIndepFrame, Distribution, GraphType, Normal, Site, SiteKind,
    Trace, Value,
};
use proptest::prelude::*;

fn coin(p: f64) -> Arc<dyn Distribution> {
    Arc::new(Bernoulli::new(p).unwrap())
}

fn two_site_trace() -> Trace {
    let mut trace = Trace::new(GraphType::Flat);
    trace
        .add_site(Site::sample("a", coin(0.5)).with_value(Value::scalar(1.0)))
        .unwrap();
    trace
        .add_site(Site::sample("b", coin(0.3)).with_value(Value::scalar(0.0)))
        .unwrap();
    trace
}

#[test]
fn duplicate_names_are_rejected() {
    let mut trace = two_site_trace();
    let err = trace
        .add_site(Site::sample("a", coin(0.1)).with_value(Value::scalar(0.0)))
        .unwrap_err();
    assert_eq!(err.code(), "duplicate-site");
    assert_eq!(trace.len(), 2);
}

#[test]
fn mutating_a_copy_leaves_the_original_untouched() {
    let original = two_site_trace();
    let mut copy = original.clone();
    copy.site_mut("a").unwrap().value = Some(Value::scalar(0.0));
    copy.add_site(Site::sample("c", coin(0.9)).with_value(Value::scalar(1.0)))
        .unwrap();

    assert_eq!(original.len(), 2);
    assert_eq!(original.get("a").unwrap().value, Some(Value::scalar(1.0)));
    assert_eq!(copy.get("a").unwrap().value, Some(Value::scalar(0.0)));
    assert!(!original.contains("c"));
}

#[test]
fn removal_preserves_execution_order() {
    let mut trace = two_site_trace();
    trace
        .add_site(Site::new("idx", SiteKind::Subsample, false, None).with_value(Value::vector(vec![0.0])))
        .unwrap();
    trace
        .add_site(Site::sample("c", coin(0.2)).with_value(Value::scalar(1.0)))
        .unwrap();
    assert!(trace.remove("idx").is_some());
    assert_eq!(trace.names().collect::<Vec<_>>(), vec!["a", "b", "c"]);
}

#[test]
fn log_prob_is_scaled_and_summed() {
    let mut trace = two_site_trace();
    trace.site_mut("b").unwrap().scale = 2.0;
    trace.compute_log_prob().unwrap();

    let a = trace.get("a").unwrap().log_prob_sum.unwrap();
    let b = trace.get("b").unwrap().log_prob_sum.unwrap();
    assert!((a - 0.5f64.ln()).abs() < 1e-12);
    assert!((b - 2.0 * 0.7f64.ln()).abs() < 1e-12);
    assert!((trace.log_prob_sum().unwrap() - (a + b)).abs() < 1e-12);
}

#[test]
fn score_parts_split_by_reparameterisation() {
    let mut trace = Trace::new(GraphType::Flat);
    let normal: Arc<dyn Distribution> = Arc::new(Normal::new(0.0, 1.0).unwrap());
    trace
        .add_site(Site::sample("z", normal).with_value(Value::scalar(0.5)))
        .unwrap();
    trace
        .add_site(Site::sample("k", coin(0.25)).with_value(Value::scalar(1.0)))
        .unwrap();
    trace.compute_score_parts().unwrap();

    let z = trace.get("z").unwrap().score_parts.clone().unwrap();
    assert_eq!(z.score_function.sum(), 0.0);
    assert_eq!(z.entropy_term, z.log_prob);

    let k = trace.get("k").unwrap().score_parts.clone().unwrap();
    assert_eq!(k.entropy_term.sum(), 0.0);
    assert!((k.score_function.sum() - 0.25f64.ln()).abs() < 1e-12);
}

#[test]
fn dense_edges_skip_independent_slices() {
    let frame = |counter| CondIndepFrame {
        name: "data".to_string(),
        dim: None,
        size: 2,
        subsample_size: 2,
        counter,
    };
    let mut trace = Trace::new(GraphType::Dense);
    trace
        .add_site(Site::sample("global", coin(0.5)).with_value(Value::scalar(1.0)))
        .unwrap();
    for counter in 0..2 {
        let mut site = Site::sample(format!("x_{counter}"), coin(0.5)).with_value(Value::scalar(0.0));
        site.cond_indep_stack.push(frame(counter));
        trace.add_site(site).unwrap();
    }
    let edges = trace.edges();
    assert!(edges.contains(&("global".to_string(), "x_0".to_string())));
    assert!(edges.contains(&("global".to_string(), "x_1".to_string())));
    assert!(!edges.contains(&("x_0".to_string(), "x_1".to_string())));
    assert!(two_site_trace().edges().is_empty());
}

#[test]
fn canonical_hash_tracks_values() {
    let trace = two_site_trace();
    let mut other = trace.clone();
    assert_eq!(canonical_hash(&trace), canonical_hash(&other));
    other.site_mut("b").unwrap().value = Some(Value::scalar(1.0));
    assert_ne!(canonical_hash(&trace), canonical_hash(&other));
}

proptest! {
    #[test]
    fn forks_never_alias_their_parent(values in proptest::collection::vec(0u8..2, 1..8), flip in 0usize..8) {
        let mut parent = Trace::new(GraphType::Flat);
        for (idx, bit) in values.iter().enumerate() {
            parent
                .add_site(Site::sample(format!("s{idx}"), coin(0.5)).with_value(Value::scalar(f64::from(*bit))))
                .unwrap();
        }
        let before = canonical_hash(&parent);
        let mut fork = parent.clone();
        let target = format!("s{}", flip % values.len());
        let site = fork.site_mut(&target).unwrap();
        let old = site.value.as_ref().and_then(Value::as_scalar).unwrap();
        site.value = Some(Value::scalar(1.0 - old));
        prop_assert_eq!(before, canonical_hash(&parent));
        prop_assert_ne!(canonical_hash(&fork), canonical_hash(&parent));
    }
}
