use ppl_core::errors::{ErrorInfo, PplError};

fn sample_info(code: &str, message: &str) -> ErrorInfo {
    ErrorInfo::new(code, message)
        .with_context("site", "z")
        .with_context("reason", "example")
}

#[test]
fn config_error_surface() {
    let err = PplError::Config(sample_info("invalid-strategy", "bogus strategy"));
    assert_eq!(err.code(), "invalid-strategy");
    assert!(err.info().context.contains_key("site"));
}

#[test]
fn shape_error_display_lists_context_and_hint() {
    let err = PplError::Shape(sample_info("plate-overflow", "too many plates").with_hint("raise the bound"));
    let text = err.to_string();
    assert!(text.starts_with("shape error: too many plates (code: plate-overflow)"));
    assert!(text.contains("site=z"));
    assert!(text.contains("hint: raise the bound"));
}

#[test]
fn with_context_keeps_family() {
    let err = PplError::Mismatch(ErrorInfo::new("missing-guide-site", "missing"))
        .with_context("site", "b");
    assert!(matches!(err, PplError::Mismatch(_)));
    assert_eq!(err.info().context.get("site").map(String::as_str), Some("b"));
}

#[test]
fn errors_serialize_with_family_tag() {
    let err = PplError::Program(ErrorInfo::new("duplicate-site", "dup"));
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["family"], "Program");
    assert_eq!(json["detail"]["code"], "duplicate-site");
}
