#![deny(missing_docs)]

//! Core data types for the PPL enumeration engine: values, distributions,
//! sites and execution traces.

pub mod distributions;
pub mod errors;
mod hash;
pub mod rng;
pub mod site;
pub mod trace;
pub mod validation;
mod value;

pub use distributions::{
    Bernoulli, Categorical, Distribution, DistributionSpec, Independent, Normal, EXPAND_DEFAULT,
};
pub use errors::{ErrorInfo, PplError};
pub use hash::canonical_hash;
pub use rng::{derive_substream_seed, RngHandle};
pub use site::{
    CondIndepFrame, EnumStrategy, InferConfig, ScoreParts, Site, SiteKind, SiteRecord,
};
pub use trace::{GraphType, Trace};
pub use validation::{enable_validation, is_validation_enabled};
pub use value::Value;
