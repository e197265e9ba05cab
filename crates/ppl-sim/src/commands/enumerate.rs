use std::collections::BTreeMap;
use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use ppl_core::{canonical_hash, GraphType, PplError, Trace, Value};
use ppl_infer::iterate_discrete_traces;
use serde::Serialize;

use crate::models::ModelKind;

#[derive(Args, Debug)]
pub struct EnumerateArgs {
    /// Built-in model to enumerate.
    #[arg(long, value_enum)]
    pub model: ModelKind,
    /// Optional YAML run configuration.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Stop after this many traces (overrides `max_traces`).
    #[arg(long)]
    pub limit: Option<usize>,
    /// Master seed (overrides `seed_policy.master_seed`).
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Serialize)]
struct EnumerationReport {
    model: &'static str,
    label: Option<String>,
    seed: u64,
    graph_type: GraphType,
    replays: u64,
    truncated: bool,
    traces: Vec<TraceSummary>,
}

#[derive(Debug, Serialize)]
struct TraceSummary {
    hash: String,
    choices: BTreeMap<String, Value>,
    choice_log_prob: f64,
    log_joint: f64,
    weight: f64,
}

pub fn run(args: &EnumerateArgs) -> Result<(), Box<dyn Error>> {
    let config = super::load_config(args.config.as_deref())?;
    let seed = args.seed.unwrap_or(config.seed_policy.master_seed);
    let limit = args.limit.or(config.max_traces);
    let model = config.enumerate.to_config()?.apply(args.model.model());

    let mut traces = iterate_discrete_traces(config.graph_type, &model, &[], seed);
    let (collected, truncated) = take_traces(&mut traces, limit)?;
    let mut summaries = Vec::with_capacity(collected.len());
    for mut trace in collected {
        trace.compute_log_prob()?;
        let mut choices = BTreeMap::new();
        let mut choice_log_prob = 0.0;
        for site in trace.iter().filter(|site| site.infer.enum_total.is_some()) {
            choice_log_prob += site.log_prob_sum.unwrap_or(0.0);
            choices.insert(site.name().to_string(), site.require_value()?.clone());
        }
        summaries.push(TraceSummary {
            hash: canonical_hash(&trace),
            choices,
            choice_log_prob,
            log_joint: trace.log_prob_sum()?,
            weight: 0.0,
        });
    }
    normalise_weights(&mut summaries);
    tracing::info!(
        model = args.model.as_str(),
        traces = summaries.len(),
        replays = traces.replays(),
        "enumeration finished"
    );

    let report = EnumerationReport {
        model: args.model.as_str(),
        label: config.seed_policy.label.clone(),
        seed,
        graph_type: config.graph_type,
        replays: traces.replays(),
        truncated,
        traces: summaries,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Drains at most `limit` traces. The flag is set only when a further
/// trace exists past the limit.
fn take_traces<I>(traces: &mut I, limit: Option<usize>) -> Result<(Vec<Trace>, bool), PplError>
where
    I: Iterator<Item = Result<Trace, PplError>>,
{
    let mut taken = Vec::new();
    loop {
        let next = traces.next().transpose()?;
        let Some(trace) = next else {
            return Ok((taken, false));
        };
        if limit.is_some_and(|limit| taken.len() >= limit) {
            return Ok((taken, true));
        }
        taken.push(trace);
    }
}

/// Posterior weights proportional to the joint density of each trace.
fn normalise_weights(summaries: &mut [TraceSummary]) {
    let max = summaries
        .iter()
        .map(|summary| summary.log_joint)
        .fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return;
    }
    let total: f64 = summaries
        .iter()
        .map(|summary| (summary.log_joint - max).exp())
        .sum();
    for summary in summaries.iter_mut() {
        summary.weight = (summary.log_joint - max).exp() / total;
    }
}
