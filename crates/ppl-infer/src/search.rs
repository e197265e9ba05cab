//! Depth-first exhaustive search over sequential discrete choices.
//!
//! The driver owns a LIFO stack of partial traces. Every pop replays the
//! program from the start with the partial trace forcing already-made
//! choices; a replay either completes (the trace is yielded) or escapes at
//! the first unresolved enumerable site, in which case one fork per support
//! value is pushed. Forks are pushed in support order, so the last support
//! value is explored first.

use std::iter::FusedIterator;

use ppl_core::{GraphType, PplError, RngHandle, Trace, Value};

use crate::policy::{EnumerationPolicy, SequentialDiscrete};
use crate::program::{Halt, Program};
use crate::runtime::Runtime;

/// Lazy iterator over every complete execution of a program.
///
/// Returned by [`iterate_discrete_traces`]. An error is yielded at most once;
/// the remaining work is discarded and the iterator is exhausted afterwards.
pub struct DiscreteTraces<'a, P: ?Sized, E = SequentialDiscrete> {
    program: &'a P,
    args: &'a [Value],
    graph_type: GraphType,
    policy: E,
    stack: Vec<Trace>,
    seed: u64,
    replays: u64,
}

/// Enumerates the complete traces of `program` by sequential replay.
///
/// Non-enumerated sites draw from a substream of `seed` derived from the
/// replay attempt, so the sequence is reproducible for a fixed seed.
pub fn iterate_discrete_traces<'a, P: Program + ?Sized>(
    graph_type: GraphType,
    program: &'a P,
    args: &'a [Value],
    seed: u64,
) -> DiscreteTraces<'a, P> {
    DiscreteTraces::with_policy(graph_type, program, args, seed, SequentialDiscrete)
}

impl<'a, P: Program + ?Sized, E: EnumerationPolicy> DiscreteTraces<'a, P, E> {
    /// Driver using a custom escape/extend policy.
    pub fn with_policy(
        graph_type: GraphType,
        program: &'a P,
        args: &'a [Value],
        seed: u64,
        policy: E,
    ) -> Self {
        Self {
            program,
            args,
            graph_type,
            policy,
            stack: vec![Trace::new(graph_type)],
            seed,
            replays: 0,
        }
    }

    /// Partial traces still waiting to be replayed.
    pub fn pending(&self) -> usize {
        self.stack.len()
    }

    /// Replay attempts performed so far.
    pub fn replays(&self) -> u64 {
        self.replays
    }

    fn replay(&mut self, partial: Trace) -> Result<Option<Trace>, PplError> {
        let attempt = self.replays;
        self.replays += 1;
        tracing::trace!(attempt, forced = partial.len(), "replaying partial trace");

        let mut rng = RngHandle::substream(self.seed, attempt);
        let forks = {
            let mut rt = Runtime::enumerating(self.graph_type, &partial, &self.policy, &mut rng);
            match self.program.run(&mut rt, self.args) {
                Ok(()) => {
                    let trace = rt.into_trace();
                    tracing::debug!(attempt, sites = trace.len(), "replay completed");
                    return Ok(Some(trace));
                }
                Err(Halt::Escape(site)) => {
                    let forks = self.policy.extend(rt.trace(), &site)?;
                    tracing::debug!(attempt, site = site.name(), forks = forks.len(), "replay escaped");
                    forks
                }
                Err(Halt::Error(err)) => return Err(err),
            }
        };
        self.stack.extend(forks);
        Ok(None)
    }
}

impl<P: Program + ?Sized, E: EnumerationPolicy> Iterator for DiscreteTraces<'_, P, E> {
    type Item = Result<Trace, PplError>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(partial) = self.stack.pop() {
            match self.replay(partial) {
                Ok(Some(trace)) => return Some(Ok(trace)),
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(dropped = self.stack.len(), error = %err, "search aborted");
                    self.stack.clear();
                    return Some(Err(err));
                }
            }
        }
        None
    }
}

impl<P: Program + ?Sized, E: EnumerationPolicy> FusedIterator for DiscreteTraces<'_, P, E> {}

impl<P: ?Sized, E> std::fmt::Debug for DiscreteTraces<'_, P, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscreteTraces")
            .field("graph_type", &self.graph_type)
            .field("pending", &self.stack.len())
            .field("seed", &self.seed)
            .field("replays", &self.replays)
            .finish()
    }
}
