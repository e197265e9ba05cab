//! Program wrapper that fills in default enumeration directives.

use ppl_core::errors::ErrorInfo;
use ppl_core::{EnumStrategy, PplError, Site, Value};

use crate::program::{Halt, Program};
use crate::runtime::Runtime;

/// Default enumeration directives applied by [`Annotated`] programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumerateConfig {
    default: Option<EnumStrategy>,
    expand: bool,
}

impl Default for EnumerateConfig {
    fn default() -> Self {
        Self {
            default: Some(EnumStrategy::Sequential),
            expand: true,
        }
    }
}

impl EnumerateConfig {
    /// Config requesting `default` (or no strategy) with the given expand flag.
    pub fn new(default: Option<EnumStrategy>, expand: bool) -> Self {
        Self { default, expand }
    }

    /// Parses the textual form used by configuration files.
    ///
    /// `default` must be `sequential`, `parallel` or `none`; `expand` must be
    /// `true` or `false`.
    pub fn parse(default: &str, expand: &str) -> Result<Self, PplError> {
        let default = parse_strategy(default)?;
        let expand = match expand {
            "true" => true,
            "false" => false,
            other => {
                return Err(PplError::Config(
                    ErrorInfo::new(
                        "invalid-expand",
                        format!("Invalid expand value. Expected true or false, but got {other:?}"),
                    )
                    .with_context("value", other),
                ))
            }
        };
        Ok(Self { default, expand })
    }

    /// Requested strategy, `None` for `none`.
    pub fn default_strategy(&self) -> Option<EnumStrategy> {
        self.default
    }

    /// Requested expand flag.
    pub fn expand(&self) -> bool {
        self.expand
    }

    /// Wraps `program` so its enumerable sites carry these directives.
    pub fn apply<P: Program>(self, program: P) -> Annotated<P> {
        Annotated {
            inner: program,
            config: self,
        }
    }

    /// Fills unset directives on latent sample sites with enumerable
    /// support. Explicit directives are never overwritten.
    pub(crate) fn annotate(&self, site: &mut Site) {
        if !site.is_latent_sample() {
            return;
        }
        let enumerable = site
            .dist()
            .map(|dist| dist.has_enumerate_support())
            .unwrap_or(false);
        if !enumerable {
            return;
        }
        site.infer.enumerate = site.infer.enumerate.or(self.default);
        site.infer.expand = Some(site.infer.expand.unwrap_or(self.expand));
    }
}

/// Parses `sequential`, `parallel` or `none`.
pub fn parse_strategy(raw: &str) -> Result<Option<EnumStrategy>, PplError> {
    match raw {
        "none" => Ok(None),
        other => other.parse().map(Some),
    }
}

/// Annotates every enumerable site of `program` with `default` and
/// `expand`, failing before wrapping when `default` is not recognised.
pub fn annotate_enumeration<P: Program>(
    program: P,
    default: &str,
    expand: bool,
) -> Result<Annotated<P>, PplError> {
    let default = parse_strategy(default)?;
    Ok(EnumerateConfig::new(default, expand).apply(program))
}

/// Program produced by [`annotate_enumeration`] or [`EnumerateConfig::apply`].
#[derive(Debug, Clone)]
pub struct Annotated<P> {
    inner: P,
    config: EnumerateConfig,
}

impl<P> Annotated<P> {
    /// Directives applied by this wrapper.
    pub fn config(&self) -> EnumerateConfig {
        self.config
    }

    /// Unwraps the original program.
    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: Program> Program for Annotated<P> {
    fn run(&self, rt: &mut Runtime<'_>, args: &[Value]) -> Result<(), Halt> {
        rt.push_annotation(self.config);
        let result = self.inner.run(rt, args);
        rt.pop_annotation();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_known_values() {
        let config = EnumerateConfig::parse("parallel", "false").unwrap();
        assert_eq!(config.default_strategy(), Some(EnumStrategy::Parallel));
        assert!(!config.expand());
        assert_eq!(
            EnumerateConfig::parse("none", "true").unwrap().default_strategy(),
            None
        );
    }

    #[test]
    fn parse_rejects_unknown_values() {
        let err = EnumerateConfig::parse("bogus", "true").unwrap_err();
        assert!(matches!(err, PplError::Config(_)));
        assert_eq!(err.code(), "invalid-strategy");

        let err = EnumerateConfig::parse("sequential", "yes").unwrap_err();
        assert_eq!(err.code(), "invalid-expand");
    }
}
