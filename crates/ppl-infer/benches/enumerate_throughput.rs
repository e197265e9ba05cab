use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use ppl_core::{Bernoulli, EnumStrategy, GraphType, InferConfig, Normal, RngHandle, Value};
use ppl_infer::{
    build_importance_trace, iterate_discrete_traces, program, Plate, Runtime, SampleOpts,
};

fn bench_enumerate(c: &mut Criterion) {
    let model = program(|rt: &mut Runtime<'_>, _args: &[Value]| {
        for idx in 0..8 {
            rt.sample(
                &format!("x{idx}"),
                Arc::new(Bernoulli::new(0.5)?),
                SampleOpts::infer(InferConfig::enumerate(EnumStrategy::Sequential)),
            )?;
        }
        Ok(())
    });

    c.bench_function("enumerate_eight_coins", |b| {
        b.iter(|| {
            let count = iterate_discrete_traces(GraphType::Flat, &model, &[], 1)
                .filter(|trace| trace.is_ok())
                .count();
            assert_eq!(count, 256);
        });
    });
}

fn bench_importance(c: &mut Criterion) {
    let model = program(|rt: &mut Runtime<'_>, _args: &[Value]| {
        rt.sample("z", Arc::new(Bernoulli::new(0.3)?), SampleOpts::default())?;
        rt.plate(Plate::new("data", 64), |rt, _indices| {
            rt.observe(
                "obs",
                Arc::new(Normal::new(0.0, 1.0)?),
                Value::vector(vec![0.25; 64]),
            )?;
            Ok(())
        })
    });
    let guide = program(|rt: &mut Runtime<'_>, _args: &[Value]| {
        rt.sample("z", Arc::new(Bernoulli::new(0.6)?), SampleOpts::default())?;
        Ok(())
    });

    c.bench_function("importance_plate_64", |b| {
        let mut rng = RngHandle::from_seed(3);
        b.iter(|| {
            build_importance_trace(GraphType::Flat, 1, &model, &guide, &[], &mut rng).unwrap();
        });
    });
}

criterion_group!(benches, bench_enumerate, bench_importance);
criterion_main!(benches);
