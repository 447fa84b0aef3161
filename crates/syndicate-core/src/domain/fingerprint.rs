//! Job fingerprints: stable hash of type + canonicalized payload.

use sha2::{Digest, Sha256};

use super::job::JobType;

/// Compute the dedup fingerprint for a submission.
///
/// Canonicalization sorts object keys recursively so two payloads that
/// differ only in key order produce the same fingerprint.
pub fn fingerprint(job_type: &JobType, payload: &serde_json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(job_type.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical_json(payload).as_bytes());
    hex::encode(hasher.finalize())
}

/// Render a value as JSON with all object keys sorted.
///
/// serde_json's map preserves insertion order, so plain `to_string` is not
/// stable across callers building the same payload differently.
fn canonical_json(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        serde_json::Value::String(k.clone()),
                        canonical_json(&map[k])
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        serde_json::Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", rendered.join(","))
        }
        scalar => scalar.to_string(),
    }
}
