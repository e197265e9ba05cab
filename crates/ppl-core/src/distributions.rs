//! Distribution contract consumed by the enumeration engine, plus the small
//! family of concrete distributions shipped with it.

use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, PplError};
use crate::rng::RngHandle;
use crate::value::Value;

/// Default `expand` flag used when a site carries no explicit directive.
pub const EXPAND_DEFAULT: bool = true;

/// Serializable description of a distribution instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSpec {
    /// Family name.
    pub name: String,
    /// Named scalar or vector parameters.
    pub params: BTreeMap<String, Vec<f64>>,
    /// Batch shape of the instance.
    pub batch_shape: Vec<usize>,
    /// Event shape of the instance.
    pub event_shape: Vec<usize>,
}

/// Contract every site distribution satisfies.
pub trait Distribution: Debug + Send + Sync {
    /// Family name, used in records and diagnostics.
    fn name(&self) -> &'static str;

    /// Shape of independent, non-identical draws.
    fn batch_shape(&self) -> &[usize];

    /// Shape of a single event.
    fn event_shape(&self) -> &[usize] {
        &[]
    }

    /// Full sample shape (`batch_shape ++ event_shape`).
    fn shape(&self) -> Vec<usize> {
        let mut shape = self.batch_shape().to_vec();
        shape.extend_from_slice(self.event_shape());
        shape
    }

    /// Draws one sample of shape [`Distribution::shape`].
    fn sample(&self, rng: &mut RngHandle) -> Result<Value, PplError>;

    /// Log density of `value`; the result drops the event dimensions.
    fn log_prob(&self, value: &Value) -> Result<Value, PplError>;

    /// Whether samples are reparameterisable.
    fn has_rsample(&self) -> bool {
        false
    }

    /// Whether [`Distribution::enumerate_support`] is available.
    fn has_enumerate_support(&self) -> bool {
        false
    }

    /// Returns the ordered, finite support.
    ///
    /// With `expand` each value covers the full batch shape, otherwise every
    /// batch dimension has size one.
    fn enumerate_support(&self, expand: bool) -> Result<Vec<Value>, PplError> {
        let _ = expand;
        Err(PplError::Distribution(
            ErrorInfo::new("no-enumerate-support", "distribution cannot enumerate its support")
                .with_context("distribution", self.name()),
        ))
    }

    /// Returns a copy broadcast to `batch_shape`.
    fn expand(&self, batch_shape: &[usize]) -> Result<Arc<dyn Distribution>, PplError>;

    /// Serializable description.
    fn describe(&self) -> DistributionSpec;
}

/// Checks that `existing` broadcasts to `target` (right aligned, size one dims
/// stretch).
pub fn check_broadcast(
    name: &str,
    existing: &[usize],
    target: &[usize],
) -> Result<Vec<usize>, PplError> {
    if existing.len() > target.len() {
        return Err(broadcast_error(name, existing, target));
    }
    for (have, want) in existing.iter().rev().zip(target.iter().rev()) {
        if *have != 1 && have != want {
            return Err(broadcast_error(name, existing, target));
        }
    }
    Ok(target.to_vec())
}

fn broadcast_error(name: &str, existing: &[usize], target: &[usize]) -> PplError {
    PplError::Shape(
        ErrorInfo::new("expand-incompatible", "batch shape cannot be broadcast")
            .with_context("distribution", name)
            .with_context("batch_shape", format!("{existing:?}"))
            .with_context("target", format!("{target:?}")),
    )
}

fn support_values(batch_shape: &[usize], count: usize, expand: bool) -> Vec<Value> {
    let shape: Vec<usize> = if expand {
        batch_shape.to_vec()
    } else {
        vec![1; batch_shape.len()]
    };
    (0..count).map(|k| Value::filled(&shape, k as f64)).collect()
}

fn param_error(name: &str, message: &str, value: f64) -> PplError {
    PplError::Distribution(
        ErrorInfo::new("invalid-parameter", message)
            .with_context("distribution", name)
            .with_context("value", value.to_string()),
    )
}

/// Bernoulli distribution over `{0, 1}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bernoulli {
    probs: f64,
    batch_shape: Vec<usize>,
}

impl Bernoulli {
    /// Creates a scalar Bernoulli with success probability `probs`.
    pub fn new(probs: f64) -> Result<Self, PplError> {
        if !(0.0..=1.0).contains(&probs) {
            return Err(param_error("Bernoulli", "probability outside [0, 1]", probs));
        }
        Ok(Self {
            probs,
            batch_shape: Vec::new(),
        })
    }

    /// Success probability.
    pub fn probs(&self) -> f64 {
        self.probs
    }
}

impl Distribution for Bernoulli {
    fn name(&self) -> &'static str {
        "Bernoulli"
    }

    fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    fn sample(&self, rng: &mut RngHandle) -> Result<Value, PplError> {
        let count: usize = self.batch_shape.iter().product();
        let draws = (0..count)
            .map(|_| if rng.uniform() < self.probs { 1.0 } else { 0.0 })
            .collect();
        Value::from_vec(self.batch_shape.clone(), draws)
    }

    fn log_prob(&self, value: &Value) -> Result<Value, PplError> {
        let p = self.probs;
        Ok(value.map(|x| {
            if x == 1.0 {
                p.ln()
            } else if x == 0.0 {
                (1.0 - p).ln()
            } else {
                f64::NEG_INFINITY
            }
        }))
    }

    fn has_enumerate_support(&self) -> bool {
        true
    }

    fn enumerate_support(&self, expand: bool) -> Result<Vec<Value>, PplError> {
        Ok(support_values(&self.batch_shape, 2, expand))
    }

    fn expand(&self, batch_shape: &[usize]) -> Result<Arc<dyn Distribution>, PplError> {
        let batch_shape = check_broadcast(self.name(), &self.batch_shape, batch_shape)?;
        Ok(Arc::new(Self {
            probs: self.probs,
            batch_shape,
        }))
    }

    fn describe(&self) -> DistributionSpec {
        DistributionSpec {
            name: self.name().to_string(),
            params: BTreeMap::from([("probs".to_string(), vec![self.probs])]),
            batch_shape: self.batch_shape.clone(),
            event_shape: Vec::new(),
        }
    }
}

/// Categorical distribution over `{0, .., k - 1}`.
///
/// An empty probability vector is accepted and has an empty support.
#[derive(Debug, Clone, PartialEq)]
pub struct Categorical {
    probs: Vec<f64>,
    batch_shape: Vec<usize>,
}

impl Categorical {
    /// Creates a categorical from unnormalised non-negative weights.
    pub fn new(weights: Vec<f64>) -> Result<Self, PplError> {
        if let Some(bad) = weights.iter().copied().find(|w| !(w.is_finite() && *w >= 0.0)) {
            return Err(param_error("Categorical", "weights must be finite and non-negative", bad));
        }
        let total: f64 = weights.iter().sum();
        if !weights.is_empty() && total <= 0.0 {
            return Err(param_error("Categorical", "weights sum to zero", total));
        }
        Ok(Self {
            probs: weights.iter().map(|w| w / total).collect(),
            batch_shape: Vec::new(),
        })
    }

    /// Normalised category probabilities.
    pub fn probs(&self) -> &[f64] {
        &self.probs
    }

    fn draw(&self, rng: &mut RngHandle) -> f64 {
        let u = rng.uniform();
        let mut acc = 0.0;
        for (k, p) in self.probs.iter().enumerate() {
            acc += p;
            if u < acc {
                return k as f64;
            }
        }
        (self.probs.len() - 1) as f64
    }
}

impl Distribution for Categorical {
    fn name(&self) -> &'static str {
        "Categorical"
    }

    fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    fn sample(&self, rng: &mut RngHandle) -> Result<Value, PplError> {
        if self.probs.is_empty() {
            return Err(PplError::Distribution(
                ErrorInfo::new("empty-support", "cannot sample a categorical without categories")
                    .with_context("distribution", self.name()),
            ));
        }
        let count: usize = self.batch_shape.iter().product();
        let draws = (0..count).map(|_| self.draw(rng)).collect();
        Value::from_vec(self.batch_shape.clone(), draws)
    }

    fn log_prob(&self, value: &Value) -> Result<Value, PplError> {
        Ok(value.map(|x| {
            if x >= 0.0 && x.fract() == 0.0 {
                self.probs
                    .get(x as usize)
                    .map_or(f64::NEG_INFINITY, |p| p.ln())
            } else {
                f64::NEG_INFINITY
            }
        }))
    }

    fn has_enumerate_support(&self) -> bool {
        true
    }

    fn enumerate_support(&self, expand: bool) -> Result<Vec<Value>, PplError> {
        Ok(support_values(&self.batch_shape, self.probs.len(), expand))
    }

    fn expand(&self, batch_shape: &[usize]) -> Result<Arc<dyn Distribution>, PplError> {
        let batch_shape = check_broadcast(self.name(), &self.batch_shape, batch_shape)?;
        Ok(Arc::new(Self {
            probs: self.probs.clone(),
            batch_shape,
        }))
    }

    fn describe(&self) -> DistributionSpec {
        DistributionSpec {
            name: self.name().to_string(),
            params: BTreeMap::from([("probs".to_string(), self.probs.clone())]),
            batch_shape: self.batch_shape.clone(),
            event_shape: Vec::new(),
        }
    }
}

/// Univariate normal distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct Normal {
    loc: f64,
    scale: f64,
    batch_shape: Vec<usize>,
}

impl Normal {
    /// Creates a scalar normal with the given location and scale.
    pub fn new(loc: f64, scale: f64) -> Result<Self, PplError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(param_error("Normal", "scale must be positive", scale));
        }
        Ok(Self {
            loc,
            scale,
            batch_shape: Vec::new(),
        })
    }

    fn draw(&self, rng: &mut RngHandle) -> f64 {
        // Box-Muller; u1 is kept away from zero.
        let u1 = 1.0 - rng.uniform();
        let u2 = rng.uniform();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos();
        self.loc + self.scale * z
    }
}

impl Distribution for Normal {
    fn name(&self) -> &'static str {
        "Normal"
    }

    fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    fn sample(&self, rng: &mut RngHandle) -> Result<Value, PplError> {
        let count: usize = self.batch_shape.iter().product();
        let draws = (0..count).map(|_| self.draw(rng)).collect();
        Value::from_vec(self.batch_shape.clone(), draws)
    }

    fn log_prob(&self, value: &Value) -> Result<Value, PplError> {
        let norm = -self.scale.ln() - 0.5 * (2.0 * PI).ln();
        Ok(value.map(|x| {
            let z = (x - self.loc) / self.scale;
            norm - 0.5 * z * z
        }))
    }

    fn has_rsample(&self) -> bool {
        true
    }

    fn expand(&self, batch_shape: &[usize]) -> Result<Arc<dyn Distribution>, PplError> {
        let batch_shape = check_broadcast(self.name(), &self.batch_shape, batch_shape)?;
        Ok(Arc::new(Self {
            loc: self.loc,
            scale: self.scale,
            batch_shape,
        }))
    }

    fn describe(&self) -> DistributionSpec {
        DistributionSpec {
            name: self.name().to_string(),
            params: BTreeMap::from([
                ("loc".to_string(), vec![self.loc]),
                ("scale".to_string(), vec![self.scale]),
            ]),
            batch_shape: self.batch_shape.clone(),
            event_shape: Vec::new(),
        }
    }
}

/// Reinterprets the rightmost `reinterpreted` batch dimensions of a base
/// distribution as event dimensions.
#[derive(Debug, Clone)]
pub struct Independent {
    base: Arc<dyn Distribution>,
    reinterpreted: usize,
    batch_shape: Vec<usize>,
    event_shape: Vec<usize>,
}

impl Independent {
    /// Wraps `base`, moving `reinterpreted` batch dims into the event shape.
    pub fn new(base: Arc<dyn Distribution>, reinterpreted: usize) -> Result<Self, PplError> {
        let base_batch = base.batch_shape();
        if reinterpreted > base_batch.len() {
            return Err(PplError::Shape(
                ErrorInfo::new("reinterpret-overflow", "not enough batch dims to reinterpret")
                    .with_context("batch_shape", format!("{base_batch:?}"))
                    .with_context("reinterpreted", reinterpreted.to_string()),
            ));
        }
        let split = base_batch.len() - reinterpreted;
        let batch_shape = base_batch[..split].to_vec();
        let mut event_shape = base_batch[split..].to_vec();
        event_shape.extend_from_slice(base.event_shape());
        Ok(Self {
            base,
            reinterpreted,
            batch_shape,
            event_shape,
        })
    }
}

impl Distribution for Independent {
    fn name(&self) -> &'static str {
        "Independent"
    }

    fn batch_shape(&self) -> &[usize] {
        &self.batch_shape
    }

    fn event_shape(&self) -> &[usize] {
        &self.event_shape
    }

    fn sample(&self, rng: &mut RngHandle) -> Result<Value, PplError> {
        self.base.sample(rng)
    }

    fn log_prob(&self, value: &Value) -> Result<Value, PplError> {
        Ok(self.base.log_prob(value)?.sum_rightmost(self.reinterpreted))
    }

    fn has_rsample(&self) -> bool {
        self.base.has_rsample()
    }

    fn expand(&self, batch_shape: &[usize]) -> Result<Arc<dyn Distribution>, PplError> {
        let base_batch = self.base.batch_shape();
        let mut target = batch_shape.to_vec();
        target.extend_from_slice(&base_batch[base_batch.len() - self.reinterpreted..]);
        let base = self.base.expand(&target)?;
        Ok(Arc::new(Independent::new(base, self.reinterpreted)?))
    }

    fn describe(&self) -> DistributionSpec {
        let base = self.base.describe();
        let mut params = base.params;
        params.insert("reinterpreted".to_string(), vec![self.reinterpreted as f64]);
        DistributionSpec {
            name: format!("Independent({})", base.name),
            params,
            batch_shape: self.batch_shape.clone(),
            event_shape: self.event_shape.clone(),
        }
    }
}
