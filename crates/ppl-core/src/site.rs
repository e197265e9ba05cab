//! Sites: the named probabilistic events recorded in a [`crate::Trace`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::distributions::{Distribution, DistributionSpec};
use crate::errors::{ErrorInfo, PplError};
use crate::value::Value;

/// Kind tag of a site.
///
/// Observed sample statements are `Sample` sites with `is_observed` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SiteKind {
    /// Random choice or observation.
    Sample,
    /// Learnable parameter lookup.
    Param,
    /// Subsample indices recorded by a plate; pure bookkeeping.
    Subsample,
    /// Any other recorded event.
    Other,
}

impl SiteKind {
    /// Stable lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteKind::Sample => "sample",
            SiteKind::Param => "param",
            SiteKind::Subsample => "subsample",
            SiteKind::Other => "other",
        }
    }
}

/// Enumeration strategy requested for a discrete site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumStrategy {
    /// One full program replay per support value.
    Sequential,
    /// Vectorised enumeration, handled outside the sequential search.
    Parallel,
}

impl EnumStrategy {
    /// Stable lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnumStrategy::Sequential => "sequential",
            EnumStrategy::Parallel => "parallel",
        }
    }
}

impl fmt::Display for EnumStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnumStrategy {
    type Err = PplError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(EnumStrategy::Sequential),
            "parallel" => Ok(EnumStrategy::Parallel),
            other => Err(PplError::Config(
                ErrorInfo::new(
                    "invalid-strategy",
                    format!(
                        "Invalid default value. Expected 'sequential', 'parallel', or none, but got {other:?}"
                    ),
                )
                .with_context("value", other),
            )),
        }
    }
}

/// Inference directives attached to a site.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InferConfig {
    /// Requested enumeration strategy, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enumerate: Option<EnumStrategy>,
    /// Whether enumerated values are expanded to the full batch shape.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expand: Option<bool>,
    /// Support size recorded when the site was forked by enumeration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_total: Option<usize>,
    /// Directives this engine does not interpret.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl InferConfig {
    /// Directives requesting `strategy` enumeration.
    pub fn enumerate(strategy: EnumStrategy) -> Self {
        Self {
            enumerate: Some(strategy),
            ..Self::default()
        }
    }
}

/// One conditional-independence context entered through a plate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CondIndepFrame {
    /// Plate name.
    pub name: String,
    /// Batch dimension owned by the plate, counted from the right (negative).
    pub dim: Option<isize>,
    /// Full size of the plate.
    pub size: usize,
    /// Number of indices actually visited.
    pub subsample_size: usize,
    /// Slice counter of sequential plates; zero for vectorised plates.
    pub counter: usize,
}

/// Decomposed per-site score quantities used by gradient estimators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreParts {
    /// Scaled log density of the sampled value.
    pub log_prob: Value,
    /// Score-function term (non-reparameterised sites).
    pub score_function: Value,
    /// Entropy term (reparameterised sites).
    pub entropy_term: Value,
}

/// One probabilistic event of an execution.
///
/// `dist` and `is_observed` are fixed at construction; only the value,
/// directives and computed scores change afterwards.
#[derive(Debug, Clone)]
pub struct Site {
    name: String,
    kind: SiteKind,
    is_observed: bool,
    dist: Option<Arc<dyn Distribution>>,
    /// Realised outcome, once resolved.
    pub value: Option<Value>,
    /// Inference directives.
    pub infer: InferConfig,
    /// Enclosing plates, outermost first.
    pub cond_indep_stack: Vec<CondIndepFrame>,
    /// Multiplicative likelihood scale from subsampling.
    pub scale: f64,
    /// Per-element log density, filled by [`crate::Trace::compute_log_prob`].
    pub log_prob: Option<Value>,
    /// Scaled total log density.
    pub log_prob_sum: Option<f64>,
    /// Score decomposition, filled by [`crate::Trace::compute_score_parts`].
    pub score_parts: Option<ScoreParts>,
}

impl Site {
    /// Creates a latent sample site that has not been resolved yet.
    pub fn sample(name: impl Into<String>, dist: Arc<dyn Distribution>) -> Self {
        Self::new(name, SiteKind::Sample, false, Some(dist))
    }

    /// Creates an observed sample site holding `value`.
    pub fn observed(name: impl Into<String>, dist: Arc<dyn Distribution>, value: Value) -> Self {
        let mut site = Self::new(name, SiteKind::Sample, true, Some(dist));
        site.value = Some(value);
        site
    }

    /// Creates a site of arbitrary kind.
    pub fn new(
        name: impl Into<String>,
        kind: SiteKind,
        is_observed: bool,
        dist: Option<Arc<dyn Distribution>>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            is_observed,
            dist,
            value: None,
            infer: InferConfig::default(),
            cond_indep_stack: Vec::new(),
            scale: 1.0,
            log_prob: None,
            log_prob_sum: None,
            score_parts: None,
        }
    }

    /// Builder-style value setter.
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Builder-style directive setter.
    pub fn with_infer(mut self, infer: InferConfig) -> Self {
        self.infer = infer;
        self
    }

    /// Site name, unique within a trace.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind tag.
    pub fn kind(&self) -> SiteKind {
        self.kind
    }

    /// Whether the value was supplied as an observation.
    pub fn is_observed(&self) -> bool {
        self.is_observed
    }

    /// Distribution that produced or scores the value.
    pub fn dist(&self) -> Option<&Arc<dyn Distribution>> {
        self.dist.as_ref()
    }

    /// Whether this is a latent (non-observed) sample site.
    pub fn is_latent_sample(&self) -> bool {
        self.kind == SiteKind::Sample && !self.is_observed
    }

    /// Returns the value or a program error naming the site.
    pub fn require_value(&self) -> Result<&Value, PplError> {
        self.value
            .as_ref()
            .ok_or_else(|| PplError::at_site("unresolved-site", "site has no value", &self.name))
    }

    /// Returns the distribution or a program error naming the site.
    pub fn require_dist(&self) -> Result<&Arc<dyn Distribution>, PplError> {
        self.dist.as_ref().ok_or_else(|| {
            PplError::at_site("missing-distribution", "site has no distribution", &self.name)
        })
    }

    /// Serializable snapshot.
    pub fn record(&self) -> SiteRecord {
        SiteRecord {
            name: self.name.clone(),
            kind: self.kind,
            is_observed: self.is_observed,
            dist: self.dist.as_ref().map(|dist| dist.describe()),
            value: self.value.clone(),
            infer: self.infer.clone(),
            plates: self
                .cond_indep_stack
                .iter()
                .map(|frame| frame.name.clone())
                .collect(),
            scale: self.scale,
            log_prob_sum: self.log_prob_sum,
            score_parts: self.score_parts.clone(),
        }
    }
}

/// Serializable snapshot of a [`Site`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    /// Site name.
    pub name: String,
    /// Kind tag.
    pub kind: SiteKind,
    /// Observation flag.
    pub is_observed: bool,
    /// Distribution description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dist: Option<DistributionSpec>,
    /// Realised value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Inference directives.
    pub infer: InferConfig,
    /// Names of the enclosing plates.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plates: Vec<String>,
    /// Likelihood scale.
    pub scale: f64,
    /// Scaled log density, when computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_prob_sum: Option<f64>,
    /// Score decomposition, when computed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score_parts: Option<ScoreParts>,
}
