use crate::types::{ArtifactSpec, GoalHash};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};

/// Hex characters kept from each SHA-256 digest.
pub const HASH_LENGTH: usize = 20;

/// Placeholder for a dependency whose hash is not known yet.
pub const UNKNOWN_HASH: &str = "UNKNOWN";

/// Key-sorted, whitespace-free JSON so equal values always hash equally.
#[must_use]
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => value.to_string(),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        Value::Object(map) => {
            let sorted: BTreeMap<&String, String> = map
                .iter()
                .map(|(key, value)| (key, to_canonical_json(value)))
                .collect();
            let items: Vec<String> = sorted
                .into_iter()
                .map(|(key, value)| format!("{}:{value}", Value::String(key.clone())))
                .collect();
            format!("{{{}}}", items.join(","))
        }
    }
}

fn digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0x1f]);
    }
    let hex = format!("{:x}", hasher.finalize());
    hex.chars().take(HASH_LENGTH).collect()
}

/// Hash of the parts of a spec that define what gets built. Metadata is
/// excluded so annotations never invalidate cached results.
#[must_use]
pub fn compute_spec_hash(spec: &ArtifactSpec) -> String {
    let identity = json!({
        "id": spec.id(),
        "description": spec.description(),
        "contract": spec.contract(),
        "requires": spec.requires_ids(),
        "produces_file": spec.produces_file(),
        "domain_type": spec.domain_type(),
    });
    digest(&[&to_canonical_json(&identity)])
}

/// Hash of a spec together with the input hashes of its requirements, so a
/// change anywhere upstream changes every hash below it.
#[must_use]
pub fn compute_input_hash(spec: &ArtifactSpec, dependency_hashes: &HashMap<String, String>) -> String {
    let spec_hash = compute_spec_hash(spec);
    let mut parts = vec![spec_hash];
    parts.extend(spec.requires().iter().map(|required| {
        let hash = dependency_hashes
            .get(required)
            .map_or(UNKNOWN_HASH, String::as_str);
        format!("{required}={hash}")
    }));
    let borrowed: Vec<&str> = parts.iter().map(String::as_str).collect();
    digest(&borrowed)
}

/// Whitespace-insensitive at the edges; everything else is significant.
#[must_use]
pub fn compute_goal_hash(goal: &str) -> GoalHash {
    GoalHash::new(digest(&[goal.trim()]))
}
