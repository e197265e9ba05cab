pub mod enumerate;
pub mod score;

use std::path::Path;

use ppl_core::PplError;
use ppl_infer::RunConfig;

/// Loads the optional run configuration and applies its validation flag.
fn load_config(path: Option<&Path>) -> Result<RunConfig, PplError> {
    let config = match path {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    config.apply_validation();
    tracing::debug!(
        graph_type = ?config.graph_type,
        max_plate_nesting = config.max_plate_nesting,
        validation = config.validation,
        "run configuration loaded"
    );
    Ok(config)
}
