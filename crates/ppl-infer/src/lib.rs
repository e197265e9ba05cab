#![deny(missing_docs)]

//! Sequential discrete enumeration over stochastic programs.
//!
//! Programs emit sites through a [`Runtime`]. [`iterate_discrete_traces`]
//! replays a program once per branch of its sequentially enumerated
//! choices, and [`build_importance_trace`] pairs a guide execution with a
//! model replayed against it.

pub mod annotate;
pub mod checks;
pub mod config;
pub mod importance;
pub mod policy;
pub mod program;
pub mod runtime;
pub mod search;

pub use annotate::{annotate_enumeration, parse_strategy, Annotated, EnumerateConfig};
pub use checks::{check_model_guide_match, check_site_shape, prune_subsample_sites};
pub use config::{EnumerateSection, RunConfig, SeedPolicy};
pub use importance::build_importance_trace;
pub use policy::{
    iter_discrete_escape, iter_discrete_extend, DiscreteExtend, EnumerationPolicy,
    SequentialDiscrete,
};
pub use program::{program, FnProgram, Halt, Program};
pub use runtime::{Plate, Runtime, SampleOpts};
pub use search::{iterate_discrete_traces, DiscreteTraces};
