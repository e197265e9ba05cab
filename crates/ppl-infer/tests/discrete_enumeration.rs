use std::collections::BTreeSet;
use std::sync::Arc;

use ppl_core::errors::ErrorInfo;
use ppl_core::{
    canonical_hash, Bernoulli, Categorical, EnumStrategy, GraphType, InferConfig, Normal,
    PplError, Trace, Value,
};
use ppl_infer::{
    annotate_enumeration, iterate_discrete_traces, program, Halt, Runtime, SampleOpts,
};
use proptest::prelude::*;

fn sequential() -> SampleOpts {
    SampleOpts::infer(InferConfig::enumerate(EnumStrategy::Sequential))
}

fn coin(rt: &mut Runtime<'_>, name: &str, p: f64) -> Result<Value, Halt> {
    rt.sample(name, Arc::new(Bernoulli::new(p)?), sequential())
}

fn scalar(trace: &Trace, name: &str) -> f64 {
    trace
        .get(name)
        .and_then(|site| site.value.as_ref())
        .and_then(Value::as_scalar)
        .unwrap()
}

fn collect(traces: impl Iterator<Item = Result<Trace, PplError>>) -> Vec<Trace> {
    traces.collect::<Result<Vec<_>, _>>().unwrap()
}

#[test]
fn two_coins_enumerate_in_reverse_support_order() {
    let model = program(|rt: &mut Runtime<'_>, _args: &[Value]| {
        coin(rt, "a", 0.5)?;
        coin(rt, "b", 0.3)?;
        Ok(())
    });
    let traces = collect(iterate_discrete_traces(GraphType::Flat, &model, &[], 0));
    let pairs: Vec<(f64, f64)> = traces
        .iter()
        .map(|trace| (scalar(trace, "a"), scalar(trace, "b")))
        .collect();
    assert_eq!(pairs, vec![(1.0, 1.0), (1.0, 0.0), (0.0, 1.0), (0.0, 0.0)]);
    for trace in &traces {
        let names: Vec<&str> = trace.names().collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(trace.get("a").unwrap().infer.enum_total, Some(2));
        assert_eq!(trace.get("b").unwrap().infer.enum_total, Some(2));
    }
}

proptest! {
    #[test]
    fn independent_binary_sites_cover_the_product_space(k in 0usize..7) {
        let model = program(move |rt: &mut Runtime<'_>, _args: &[Value]| {
            for idx in 0..k {
                coin(rt, &format!("x{idx}"), 0.5)?;
            }
            Ok(())
        });
        let traces = collect(iterate_discrete_traces(GraphType::Flat, &model, &[], 3));
        prop_assert_eq!(traces.len(), 1 << k);
        let outcomes: BTreeSet<Vec<u8>> = traces
            .iter()
            .map(|trace| {
                (0..k)
                    .map(|idx| scalar(trace, &format!("x{idx}")) as u8)
                    .collect()
            })
            .collect();
        prop_assert_eq!(outcomes.len(), 1 << k);
    }
}

#[test]
fn empty_support_yields_no_traces() {
    let model = program(|rt: &mut Runtime<'_>, _args: &[Value]| {
        rt.sample("c", Arc::new(Categorical::new(Vec::new())?), sequential())?;
        Ok(())
    });
    let mut traces = iterate_discrete_traces(GraphType::Flat, &model, &[], 0);
    assert!(traces.next().is_none());
    assert_eq!(traces.replays(), 1);
    assert_eq!(traces.pending(), 0);
}

#[test]
fn categorical_branches_follow_support_size() {
    let model = program(|rt: &mut Runtime<'_>, _args: &[Value]| {
        let die = rt.sample(
            "die",
            Arc::new(Categorical::new(vec![1.0, 1.0, 1.0])?),
            sequential(),
        )?;
        if die.as_scalar() == Some(2.0) {
            coin(rt, "bonus", 0.5)?;
        }
        Ok(())
    });
    let traces = collect(iterate_discrete_traces(GraphType::Flat, &model, &[], 0));
    // die = 2 forks again on the bonus coin.
    assert_eq!(traces.len(), 4);
    assert_eq!(scalar(&traces[0], "die"), 2.0);
    assert_eq!(scalar(&traces[0], "bonus"), 1.0);
    assert_eq!(scalar(&traces[1], "bonus"), 0.0);
    assert!(!traces[2].contains("bonus"));
    assert_eq!(scalar(&traces[3], "die"), 0.0);
}

#[test]
fn replay_errors_abort_the_search() {
    let model = program(|rt: &mut Runtime<'_>, _args: &[Value]| {
        let a = coin(rt, "a", 0.5)?;
        if a.as_scalar() == Some(1.0) {
            return Err(PplError::Program(ErrorInfo::new("model-failure", "boom")).into());
        }
        coin(rt, "b", 0.5)?;
        Ok(())
    });
    let mut traces = iterate_discrete_traces(GraphType::Flat, &model, &[], 0);
    let err = traces.next().unwrap().unwrap_err();
    assert_eq!(err.code(), "model-failure");
    assert_eq!(traces.pending(), 0);
    assert!(traces.next().is_none());
    assert!(traces.next().is_none());
}

#[test]
fn stopping_early_leaves_branches_unexplored() {
    let model = program(|rt: &mut Runtime<'_>, _args: &[Value]| {
        for idx in 0..10 {
            coin(rt, &format!("x{idx}"), 0.5)?;
        }
        Ok(())
    });
    let mut traces = iterate_discrete_traces(GraphType::Flat, &model, &[], 0);
    let first = traces.next().unwrap().unwrap();
    assert_eq!(first.len(), 10);
    assert_eq!(traces.replays(), 11);
    assert_eq!(traces.pending(), 10);
}

#[test]
fn continuous_sites_are_reproducible_per_seed() {
    let model = program(|rt: &mut Runtime<'_>, _args: &[Value]| {
        coin(rt, "a", 0.5)?;
        rt.sample("noise", Arc::new(Normal::new(0.0, 1.0)?), SampleOpts::default())?;
        Ok(())
    });
    let hashes = |seed| -> Vec<String> {
        collect(iterate_discrete_traces(GraphType::Flat, &model, &[], seed))
            .iter()
            .map(canonical_hash)
            .collect()
    };
    assert_eq!(hashes(7), hashes(7));
    assert_eq!(hashes(7).len(), 2);
}

#[test]
fn observed_and_parallel_sites_never_fork() {
    let model = program(|rt: &mut Runtime<'_>, _args: &[Value]| {
        rt.sample(
            "p",
            Arc::new(Bernoulli::new(0.5)?),
            SampleOpts::infer(InferConfig::enumerate(EnumStrategy::Parallel)),
        )?;
        let mut opts = sequential();
        opts.obs = Some(Value::scalar(1.0));
        rt.sample("o", Arc::new(Bernoulli::new(0.5)?), opts)?;
        Ok(())
    });
    let traces = collect(iterate_discrete_traces(GraphType::Flat, &model, &[], 0));
    assert_eq!(traces.len(), 1);
    assert_eq!(traces[0].get("p").unwrap().infer.enum_total, None);
}

#[test]
fn annotated_programs_are_enumerated() {
    let model = program(|rt: &mut Runtime<'_>, _args: &[Value]| {
        rt.sample("a", Arc::new(Bernoulli::new(0.5)?), SampleOpts::default())?;
        rt.sample("b", Arc::new(Bernoulli::new(0.5)?), SampleOpts::default())?;
        Ok(())
    });
    let annotated = annotate_enumeration(&model, "sequential", true).unwrap();
    let traces = collect(iterate_discrete_traces(GraphType::Dense, &annotated, &[], 0));
    assert_eq!(traces.len(), 4);
    assert!(traces
        .iter()
        .all(|trace| trace.graph_type() == GraphType::Dense));
    assert_eq!(traces[0].edges(), vec![("a".to_string(), "b".to_string())]);

    let unannotated = collect(iterate_discrete_traces(GraphType::Flat, &model, &[], 0));
    assert_eq!(unannotated.len(), 1);
}
