//! Canonical content hashes of traces.

use sha2::{Digest, Sha256};

use crate::site::{InferConfig, SiteKind};
use crate::trace::{GraphType, Trace};
use crate::value::Value;

/// Computes the canonical structural hash of a trace.
///
/// Covers the graph type, and per site in execution order its name, kind,
/// observation flag, value and inference directives. Computed scores are
/// not part of the hash.
pub fn canonical_hash(trace: &Trace) -> String {
    let mut hasher = Sha256::new();
    match trace.graph_type() {
        GraphType::Flat => hasher.update(b"graph:flat"),
        GraphType::Dense => hasher.update(b"graph:dense"),
    }
    hasher.update((trace.len() as u64).to_le_bytes());
    for site in trace.iter() {
        update_str(site.name(), &mut hasher);
        encode_kind(site.kind(), &mut hasher);
        hasher.update([u8::from(site.is_observed())]);
        match &site.value {
            Some(value) => {
                hasher.update(b"value:some");
                encode_value(value, &mut hasher);
            }
            None => hasher.update(b"value:none"),
        }
        encode_infer(&site.infer, &mut hasher);
    }
    format!("{:x}", hasher.finalize())
}

fn encode_kind(kind: SiteKind, hasher: &mut Sha256) {
    hasher.update(b"kind:");
    hasher.update(kind.as_str().as_bytes());
}

fn encode_value(value: &Value, hasher: &mut Sha256) {
    hasher.update((value.rank() as u64).to_le_bytes());
    for dim in value.shape() {
        hasher.update((*dim as u64).to_le_bytes());
    }
    for entry in value.data() {
        hasher.update(entry.to_bits().to_le_bytes());
    }
}

fn encode_infer(infer: &InferConfig, hasher: &mut Sha256) {
    match infer.enumerate {
        Some(strategy) => {
            hasher.update(b"enumerate:");
            hasher.update(strategy.as_str().as_bytes());
        }
        None => hasher.update(b"enumerate:none"),
    }
    match infer.expand {
        Some(expand) => hasher.update([b'e', u8::from(expand)]),
        None => hasher.update(b"expand:none"),
    }
    match infer.enum_total {
        Some(total) => {
            hasher.update(b"total:");
            hasher.update((total as u64).to_le_bytes());
        }
        None => hasher.update(b"total:none"),
    }
    for (key, value) in &infer.extra {
        update_str(key, hasher);
        update_str(value, hasher);
    }
}

fn update_str(text: &str, hasher: &mut Sha256) {
    hasher.update((text.len() as u64).to_le_bytes());
    hasher.update(text.as_bytes());
}
