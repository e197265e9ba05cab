//! Ordered, append-only execution traces with copy-on-extend semantics.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::PplError;
use crate::site::{ScoreParts, Site, SiteKind, SiteRecord};
use crate::value::Value;

/// Graph representation recorded alongside a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphType {
    /// Plain sequence of sites.
    #[default]
    Flat,
    /// Sequence plus dependency edges between sample sites.
    Dense,
}

/// Ordered mapping from site name to [`Site`].
///
/// Cloning a trace is the structural copy used when forking: the site map is
/// copied while the sites themselves stay shared until one side mutates
/// them, at which point that side receives its own copy.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    graph_type: GraphType,
    sites: IndexMap<String, Arc<Site>>,
}

impl Trace {
    /// Creates an empty trace with the given graph representation.
    pub fn new(graph_type: GraphType) -> Self {
        Self {
            graph_type,
            sites: IndexMap::new(),
        }
    }

    /// Graph representation of this trace.
    pub fn graph_type(&self) -> GraphType {
        self.graph_type
    }

    /// Number of recorded sites.
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Whether no site has been recorded.
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Whether a site called `name` is present.
    pub fn contains(&self, name: &str) -> bool {
        self.sites.contains_key(name)
    }

    /// Looks up a site by name.
    pub fn get(&self, name: &str) -> Option<&Site> {
        self.sites.get(name).map(Arc::as_ref)
    }

    /// Mutable access to a site, copying it first if it is shared.
    pub fn site_mut(&mut self, name: &str) -> Option<&mut Site> {
        self.sites.get_mut(name).map(Arc::make_mut)
    }

    /// Sites in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &Site> + '_ {
        self.sites.values().map(Arc::as_ref)
    }

    /// Site names in execution order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.sites.keys().map(String::as_str)
    }

    /// Appends a site, rejecting duplicate names.
    pub fn add_site(&mut self, site: Site) -> Result<(), PplError> {
        if self.sites.contains_key(site.name()) {
            return Err(PplError::at_site(
                "duplicate-site",
                "site names must be unique within a trace",
                site.name(),
            ));
        }
        self.sites.insert(site.name().to_string(), Arc::new(site));
        Ok(())
    }

    /// Returns a copy of this trace with `site` appended.
    pub fn extended(&self, site: Site) -> Result<Trace, PplError> {
        let mut copy = self.clone();
        copy.add_site(site)?;
        Ok(copy)
    }

    /// Removes a site while preserving the order of the others.
    pub fn remove(&mut self, name: &str) -> Option<Site> {
        self.sites
            .shift_remove(name)
            .map(|site| Arc::try_unwrap(site).unwrap_or_else(|shared| (*shared).clone()))
    }

    /// Keeps only the sites matching `keep`.
    pub fn retain(&mut self, mut keep: impl FnMut(&Site) -> bool) {
        self.sites.retain(|_, site| keep(site.as_ref()));
    }

    /// Sample sites (latent and observed) in execution order.
    pub fn sample_sites(&self) -> impl Iterator<Item = &Site> + '_ {
        self.iter().filter(|site| site.kind() == SiteKind::Sample)
    }

    /// Names of latent sample sites.
    pub fn stochastic_nodes(&self) -> Vec<&str> {
        self.iter()
            .filter(|site| site.is_latent_sample())
            .map(Site::name)
            .collect()
    }

    /// Names of observed sample sites.
    pub fn observation_nodes(&self) -> Vec<&str> {
        self.sample_sites()
            .filter(|site| site.is_observed())
            .map(Site::name)
            .collect()
    }

    /// Fills `log_prob` and `log_prob_sum` on every sample site lacking them.
    pub fn compute_log_prob(&mut self) -> Result<(), PplError> {
        for site in self.sites.values_mut() {
            if site.kind() != SiteKind::Sample || site.log_prob.is_some() {
                continue;
            }
            let log_prob = site_log_prob(site.as_ref())?;
            let site = Arc::make_mut(site);
            site.log_prob_sum = Some(site.scale * log_prob.sum());
            site.log_prob = Some(log_prob);
        }
        Ok(())
    }

    /// Fills `score_parts` (and the log density) on every sample site.
    pub fn compute_score_parts(&mut self) -> Result<(), PplError> {
        for site in self.sites.values_mut() {
            if site.kind() != SiteKind::Sample || site.score_parts.is_some() {
                continue;
            }
            let log_prob = site_log_prob(site.as_ref())?;
            let reparameterised = site.require_dist()?.has_rsample();
            let site = Arc::make_mut(site);
            let scaled = log_prob.scale(site.scale);
            let parts = if reparameterised {
                ScoreParts {
                    score_function: scaled.zeros_like(),
                    entropy_term: scaled.clone(),
                    log_prob: scaled,
                }
            } else {
                ScoreParts {
                    score_function: scaled.clone(),
                    entropy_term: scaled.zeros_like(),
                    log_prob: scaled,
                }
            };
            site.log_prob_sum = Some(site.scale * log_prob.sum());
            site.log_prob = Some(log_prob);
            site.score_parts = Some(parts);
        }
        Ok(())
    }

    /// Total scaled log density over sample sites.
    ///
    /// Uses cached values where present and evaluates the rest on the fly.
    pub fn log_prob_sum(&self) -> Result<f64, PplError> {
        let mut total = 0.0;
        for site in self.sample_sites() {
            total += match site.log_prob_sum {
                Some(cached) => cached,
                None => site.scale * site_log_prob(site)?.sum(),
            };
        }
        Ok(total)
    }

    /// Dependency edges `(upstream, downstream)` for dense traces.
    ///
    /// Every earlier sample site feeds a later one unless both sit in
    /// different slices of a shared plate. Flat traces have no edges.
    pub fn edges(&self) -> Vec<(String, String)> {
        if self.graph_type == GraphType::Flat {
            return Vec::new();
        }
        let nodes: Vec<&Site> = self.sample_sites().collect();
        let mut edges = Vec::new();
        for (idx, node) in nodes.iter().enumerate() {
            for past in &nodes[..idx] {
                let independent = node
                    .cond_indep_stack
                    .iter()
                    .zip(past.cond_indep_stack.iter())
                    .any(|(query, target)| {
                        query.name == target.name && query.counter != target.counter
                    });
                if !independent {
                    edges.push((past.name().to_string(), node.name().to_string()));
                }
            }
        }
        edges
    }

    /// Serializable snapshot of every site.
    pub fn records(&self) -> Vec<SiteRecord> {
        self.iter().map(Site::record).collect()
    }
}

fn site_log_prob(site: &Site) -> Result<Value, PplError> {
    let dist = site.require_dist()?;
    let value = site.require_value()?;
    dist.log_prob(value)
        .map_err(|err| err.with_context("site", site.name()))
}
