//! Run configuration loaded from YAML.

use std::fs;
use std::path::Path;

use ppl_core::errors::ErrorInfo;
use ppl_core::{enable_validation, GraphType, PplError};
use serde::{Deserialize, Serialize};

use crate::annotate::{parse_strategy, EnumerateConfig};

/// YAML-configurable parameters of an enumeration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Graph representation recorded on every trace.
    #[serde(default)]
    pub graph_type: GraphType,
    /// Maximum plate nesting used by shape validation.
    #[serde(default = "default_max_plate_nesting")]
    pub max_plate_nesting: usize,
    /// Whether model/guide and shape validation run.
    #[serde(default = "default_validation")]
    pub validation: bool,
    /// Default enumeration directives applied to the model.
    #[serde(default)]
    pub enumerate: EnumerateSection,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Stop after this many traces (unbounded when absent).
    #[serde(default)]
    pub max_traces: Option<usize>,
}

fn default_max_plate_nesting() -> usize {
    1
}

fn default_validation() -> bool {
    true
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            graph_type: GraphType::default(),
            max_plate_nesting: default_max_plate_nesting(),
            validation: default_validation(),
            enumerate: EnumerateSection::default(),
            seed_policy: SeedPolicy::default(),
            max_traces: None,
        }
    }
}

impl RunConfig {
    /// Parses a YAML document, rejecting unknown enumeration strategies.
    pub fn from_yaml_str(contents: &str) -> Result<Self, PplError> {
        let config: RunConfig = serde_yaml::from_str(contents).map_err(|err| {
            PplError::Config(ErrorInfo::new("config-parse", err.to_string()))
        })?;
        config.enumerate.to_config()?;
        Ok(config)
    }

    /// Reads and parses a YAML file.
    pub fn load(path: &Path) -> Result<Self, PplError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            PplError::Serde(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&contents)
            .map_err(|err| err.with_context("path", path.display().to_string()))
    }

    /// Pushes the `validation` flag to the process-wide toggle.
    pub fn apply_validation(&self) {
        enable_validation(self.validation);
    }
}

/// Enumeration defaults in their textual form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumerateSection {
    /// `sequential`, `parallel` or `none`.
    #[serde(default = "default_strategy")]
    pub default: String,
    /// Whether enumerated values cover the full batch shape.
    #[serde(default = "default_expand")]
    pub expand: bool,
}

fn default_strategy() -> String {
    "sequential".to_string()
}

fn default_expand() -> bool {
    true
}

impl Default for EnumerateSection {
    fn default() -> Self {
        Self {
            default: default_strategy(),
            expand: default_expand(),
        }
    }
}

impl EnumerateSection {
    /// Validated directives.
    pub fn to_config(&self) -> Result<EnumerateConfig, PplError> {
        Ok(EnumerateConfig::new(parse_strategy(&self.default)?, self.expand))
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed used for the run.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label echoed in reports.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}
