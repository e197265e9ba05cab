//! Escape and extend rules of sequential discrete enumeration.

use std::vec::IntoIter;

use ppl_core::errors::ErrorInfo;
use ppl_core::{EnumStrategy, PplError, Site, SiteKind, Trace, Value, EXPAND_DEFAULT};

/// Decides when a replay suspends and how a suspended site forks.
pub trait EnumerationPolicy {
    /// Whether the replay must stop at `site` instead of sampling it.
    fn escape(&self, partial: &Trace, site: &Site) -> bool;

    /// Forks `trace` once per outcome of `site`, in push order.
    fn extend(&self, trace: &Trace, site: &Site) -> Result<Vec<Trace>, PplError>;
}

/// Forks on unresolved latent sites annotated `sequential`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequentialDiscrete;

impl EnumerationPolicy for SequentialDiscrete {
    fn escape(&self, partial: &Trace, site: &Site) -> bool {
        iter_discrete_escape(partial, site)
    }

    fn extend(&self, trace: &Trace, site: &Site) -> Result<Vec<Trace>, PplError> {
        iter_discrete_extend(trace, site)?.collect()
    }
}

/// True iff `site` is a latent sample site requesting sequential
/// enumeration that `partial` has not resolved yet.
pub fn iter_discrete_escape(partial: &Trace, site: &Site) -> bool {
    site.kind() == SiteKind::Sample
        && !site.is_observed()
        && site.infer.enumerate == Some(EnumStrategy::Sequential)
        && !partial.contains(site.name())
}

/// Lazily yields one copy of `trace` per support value of `site`.
///
/// The support is materialised up front so its size can be recorded on
/// every fork; the traces themselves are built on demand.
pub fn iter_discrete_extend<'t>(
    trace: &'t Trace,
    site: &Site,
) -> Result<DiscreteExtend<'t>, PplError> {
    let dist = site.require_dist()?;
    if !dist.has_enumerate_support() {
        return Err(PplError::Distribution(
            ErrorInfo::new(
                "no-enumerate-support",
                "sequential enumeration requires an enumerable distribution",
            )
            .with_context("site", site.name())
            .with_context("distribution", dist.name()),
        ));
    }
    if trace.contains(site.name()) {
        return Err(PplError::at_site(
            "duplicate-site",
            "cannot fork on a site the trace already holds",
            site.name(),
        ));
    }
    let expand = site.infer.expand.unwrap_or(EXPAND_DEFAULT);
    let support = dist
        .enumerate_support(expand)
        .map_err(|err| err.with_context("site", site.name()))?;
    Ok(DiscreteExtend {
        trace,
        site: site.clone(),
        total: support.len(),
        support: support.into_iter(),
    })
}

/// Iterator returned by [`iter_discrete_extend`].
#[derive(Debug)]
pub struct DiscreteExtend<'t> {
    trace: &'t Trace,
    site: Site,
    total: usize,
    support: IntoIter<Value>,
}

impl DiscreteExtend<'_> {
    /// Support size recorded on every fork.
    pub fn total(&self) -> usize {
        self.total
    }
}

impl Iterator for DiscreteExtend<'_> {
    type Item = Result<Trace, PplError>;

    fn next(&mut self) -> Option<Self::Item> {
        let value = self.support.next()?;
        let mut fork = self.site.clone();
        fork.infer.enum_total = Some(self.total);
        fork.value = Some(value);
        Some(self.trace.extended(fork))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.support.size_hint()
    }
}

impl ExactSizeIterator for DiscreteExtend<'_> {}
