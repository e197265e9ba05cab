use std::sync::Arc;

use ppl_core::{
    Categorical, Distribution, EnumStrategy, GraphType, InferConfig, Normal, Site, Trace, Value,
};
use ppl_infer::{iter_discrete_extend, EnumerationPolicy, SequentialDiscrete};

fn base_trace() -> Trace {
    let mut trace = Trace::new(GraphType::Flat);
    trace
        .add_site(
            Site::sample("z", Arc::new(Normal::new(0.0, 1.0).unwrap()))
                .with_value(Value::scalar(0.25)),
        )
        .unwrap();
    trace
}

fn die() -> Site {
    Site::sample("a", Arc::new(Categorical::new(vec![0.2, 0.3, 0.5]).unwrap()))
        .with_infer(InferConfig::enumerate(EnumStrategy::Sequential))
}

fn forks(trace: &Trace, site: &Site) -> Vec<Trace> {
    iter_discrete_extend(trace, site)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn repeated_extension_produces_independent_forks() {
    let base = base_trace();
    let site = die();
    let mut first = forks(&base, &site);
    let second = forks(&base, &site);
    assert_eq!(first.len(), 3);
    assert_eq!(second.len(), 3);

    first[0].site_mut("a").unwrap().value = Some(Value::scalar(9.0));
    first[1].site_mut("z").unwrap().value = Some(Value::scalar(-1.0));
    first[2].site_mut("a").unwrap().infer.enum_total = Some(42);

    assert_eq!(second[0].get("a").unwrap().value, Some(Value::scalar(0.0)));
    assert_eq!(second[1].get("z").unwrap().value, Some(Value::scalar(0.25)));
    assert_eq!(second[2].get("a").unwrap().infer.enum_total, Some(3));
    assert_eq!(first[0].get("z").unwrap().value, Some(Value::scalar(0.25)));
    assert_eq!(first[2].get("z").unwrap().value, Some(Value::scalar(0.25)));
    assert_eq!(base.get("z").unwrap().value, Some(Value::scalar(0.25)));
    assert!(!base.contains("a"));
    assert_eq!(site.value, None);
    assert_eq!(site.infer.enum_total, None);
}

#[test]
fn forks_append_after_the_accumulated_sites() {
    let base = base_trace();
    for (idx, fork) in forks(&base, &die()).iter().enumerate() {
        let names: Vec<&str> = fork.names().collect();
        assert_eq!(names, vec!["z", "a"]);
        assert_eq!(fork.get("a").unwrap().value, Some(Value::scalar(idx as f64)));
    }
}

#[test]
fn extension_is_lazy_and_sized() {
    let base = base_trace();
    let mut iter = iter_discrete_extend(&base, &die()).unwrap();
    assert_eq!(iter.total(), 3);
    assert_eq!(iter.len(), 3);
    iter.next().unwrap().unwrap();
    assert_eq!(iter.len(), 2);
}

#[test]
fn expand_flag_controls_support_shape() {
    let base = Trace::new(GraphType::Flat);
    let dist = Categorical::new(vec![0.5, 0.5])
        .unwrap()
        .expand(&[3])
        .unwrap();

    let mut site = Site::sample("a", dist.clone())
        .with_infer(InferConfig::enumerate(EnumStrategy::Sequential));
    site.infer.expand = Some(false);
    let narrow = forks(&base, &site);
    assert_eq!(narrow[0].get("a").unwrap().value.as_ref().unwrap().shape(), &[1]);

    let site = Site::sample("a", dist).with_infer(InferConfig::enumerate(EnumStrategy::Sequential));
    let wide = SequentialDiscrete.extend(&base, &site).unwrap();
    assert_eq!(wide[1].get("a").unwrap().value, Some(Value::filled(&[3], 1.0)));
}

#[test]
fn extending_over_a_resolved_name_fails() {
    let mut base = base_trace();
    base.add_site(die().with_value(Value::scalar(1.0))).unwrap();
    let err = iter_discrete_extend(&base, &die()).unwrap_err();
    assert_eq!(err.code(), "duplicate-site");
}
