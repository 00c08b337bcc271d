//! Canonical envelope preimage.
//!
//! Produces the exact byte string whose keccak-256 hash is the envelope
//! digest. The on-chain verifier reconstructs this string from the decoded
//! wire tuple, so the rules here are a fixed contract: keys in ASCII order,
//! no whitespace, absent `cursor`/`prev_digest` as literal `null`, a present
//! `prev_digest` as a lower-case `0x` hex string, and full JSON string
//! escaping. This is distinct from the wire order used for ABI encoding.

use alloy_primitives::{B256, keccak256};
use std::fmt::Write;

use super::EnvelopeContent;

/// Serializes the content fields into the digest preimage.
///
/// Pure function: equal content always yields equal bytes, regardless of how
/// the source record was assembled.
pub fn canonical_preimage(content: &EnvelopeContent) -> Vec<u8> {
    let mut out = String::with_capacity(
        128 + content.name.len()
            + content.method.len()
            + content.params.len()
            + content.result.len()
            + content.meta.len(),
    );

    out.push_str("{\"cache_ttl\":");
    // u64 never needs leading-zero trimming.
    let _ = write!(out, "{}", content.cache_ttl);

    out.push_str(",\"cursor\":");
    match &content.cursor {
        Some(cursor) => push_json_string(&mut out, cursor),
        None => out.push_str("null"),
    }

    out.push_str(",\"meta\":");
    push_json_string(&mut out, &content.meta);

    out.push_str(",\"method\":");
    push_json_string(&mut out, &content.method);

    out.push_str(",\"name\":");
    push_json_string(&mut out, &content.name);

    out.push_str(",\"params\":");
    push_json_string(&mut out, &content.params);

    out.push_str(",\"prev_digest\":");
    match &content.prev_digest {
        Some(digest) => {
            out.push('"');
            let _ = write!(out, "0x{}", hex::encode(digest.as_slice()));
            out.push('"');
        }
        None => out.push_str("null"),
    }

    out.push_str(",\"result\":");
    push_json_string(&mut out, &content.result);

    out.push('}');
    out.into_bytes()
}

/// keccak-256 of the canonical preimage.
pub fn digest(content: &EnvelopeContent) -> B256 {
    keccak256(canonical_preimage(content))
}

/// Appends `s` as a JSON string literal, escaping exactly as `JSON.stringify`
/// and `serde_json` do: `"` and `\` get a backslash, the common control
/// characters use short escapes, remaining controls use `\u00XX`.
fn push_json_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
