//! Structured error types shared across PPL crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`PplError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (site names, shapes, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the enumeration engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum PplError {
    /// Invalid configuration values (enumeration strategy, expand flag, YAML).
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Model and guide traces disagree on their site sets.
    #[error("mismatch error: {0}")]
    Mismatch(ErrorInfo),
    /// Shape or plate-nesting violations at a site.
    #[error("shape error: {0}")]
    Shape(ErrorInfo),
    /// Distribution parameter, support or density errors.
    #[error("distribution error: {0}")]
    Distribution(ErrorInfo),
    /// Errors raised while executing a program (duplicate sites, bad replays).
    #[error("program error: {0}")]
    Program(ErrorInfo),
    /// Serialization and file errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl PplError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            PplError::Config(info)
            | PplError::Mismatch(info)
            | PplError::Shape(info)
            | PplError::Distribution(info)
            | PplError::Program(info)
            | PplError::Serde(info) => info,
        }
    }

    /// Shorthand for the stable error code.
    pub fn code(&self) -> &str {
        &self.info().code
    }

    /// Adds a context entry to the payload, keeping the error family.
    pub fn with_context(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        match self {
            PplError::Config(info) => PplError::Config(info.with_context(key, value)),
            PplError::Mismatch(info) => PplError::Mismatch(info.with_context(key, value)),
            PplError::Shape(info) => PplError::Shape(info.with_context(key, value)),
            PplError::Distribution(info) => PplError::Distribution(info.with_context(key, value)),
            PplError::Program(info) => PplError::Program(info.with_context(key, value)),
            PplError::Serde(info) => PplError::Serde(info.with_context(key, value)),
        }
    }

    /// Builds a program error naming the offending site.
    pub fn at_site(code: &str, message: impl Into<String>, site: &str) -> Self {
        PplError::Program(ErrorInfo::new(code, message).with_context("site", site))
    }
}
