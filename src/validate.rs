//! Request validation and sanitation.
//!
//! Runs after admission and before call-data decoding. Inputs are either
//! rewritten in place with their sanitized forms or rejected with a list of
//! reasons that becomes the HTTP 400 `details` array. Nothing past this
//! point sees an unsanitized name or oversized payload.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::ens;
use crate::proto::{ComputeRequest, LookupRequest};

/// Upper bound on the serialized `data` field.
pub const MAX_DATA_BYTES: usize = 100 * 1024;

const MAX_NAME_LEN: usize = 255;
const MAX_PARAM_STRING_LEN: usize = 1000;

static ENS_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9-]+\.eth$").expect("Invalid regex for ENS name"));

static NODE_HEX_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{64}$").expect("Invalid regex for node hash"));

/// Validates a lookup body, rewriting sanitized fields in place.
pub fn validate_lookup(request: &mut LookupRequest) -> Result<(), Vec<String>> {
    let mut details = Vec::new();

    if let Some(node) = &request.node {
        if !is_valid_node(node) {
            details.push("Invalid node parameter".to_string());
        }
    }

    if let Some(name) = request.name.take() {
        let sanitized = sanitize_name(&name);
        if !is_valid_name(&sanitized) {
            details.push("Invalid ENS name".to_string());
        }
        request.name = Some(sanitized);
    }

    if let Some(data) = &request.data {
        if serialized_len(data) > MAX_DATA_BYTES {
            details.push("Request data too large (max 100KB)".to_string());
        }
    }

    if details.is_empty() { Ok(()) } else { Err(details) }
}

/// Validates a direct-compute body; `params` must be a mapping and its
/// string values are truncated and NUL-stripped in place.
pub fn validate_compute(request: &mut ComputeRequest) -> Result<(), Vec<String>> {
    let mut details = Vec::new();

    if let Some(params) = &mut request.params {
        sanitize_params(params, &mut details);
    }

    if details.is_empty() { Ok(()) } else { Err(details) }
}

/// A node is a 32-byte hex hash or a string the namehash algorithm accepts.
fn is_valid_node(node: &str) -> bool {
    NODE_HEX_REGEX.is_match(node) || ens::checked_namehash(node).is_ok()
}

fn sanitize_name(name: &str) -> String {
    name.replace('\0', "").trim().to_string()
}

fn is_valid_name(name: &str) -> bool {
    name.len() <= MAX_NAME_LEN && ENS_NAME_REGEX.is_match(name)
}

fn serialized_len(data: &Value) -> usize {
    serde_json::to_string(data).map_or(0, |s| s.len())
}

/// Mappings pass with their string values clamped; anything else is an error.
pub fn sanitize_params(params: &mut Value, details: &mut Vec<String>) {
    match params {
        Value::Object(map) => {
            for value in map.values_mut() {
                if let Value::String(s) = value {
                    if s.contains('\0') {
                        *s = s.replace('\0', "");
                    }
                    if s.chars().count() > MAX_PARAM_STRING_LEN {
                        *s = s.chars().take(MAX_PARAM_STRING_LEN).collect();
                    }
                }
            }
        }
        _ => details.push("Invalid params parameter".to_string()),
    }
}
