//! Process-wide switch gating model/guide and shape validation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

/// Environment variable consulted once for the initial setting.
pub const VALIDATION_ENV: &str = "PPL_VALIDATION";

fn flag() -> &'static AtomicBool {
    static FLAG: OnceLock<AtomicBool> = OnceLock::new();
    FLAG.get_or_init(|| {
        let enabled = match std::env::var(VALIDATION_ENV) {
            Ok(raw) => !matches!(raw.trim().to_ascii_lowercase().as_str(), "0" | "false" | "off"),
            Err(_) => true,
        };
        AtomicBool::new(enabled)
    })
}

/// Turns validation on or off for the whole process.
pub fn enable_validation(enabled: bool) {
    flag().store(enabled, Ordering::SeqCst);
}

/// Whether validation checks currently run.
pub fn is_validation_enabled() -> bool {
    flag().load(Ordering::SeqCst)
}
