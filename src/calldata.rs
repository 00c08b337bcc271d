//! Lookup call-data decoding.
//!
//! The `data` field of a lookup request arrives in one of three shapes: a
//! hex string carrying ABI-encoded `(string, bytes)` call data (the CCIP-Read
//! wire form), a JSON string, or an already-parsed JSON object. Each shape is
//! a [`CallData`] variant with its own decoder; anything empty or malformed
//! lands on [`CallData::Defaults`], which resolves to the `pricefeed` method
//! with empty params. The fall-through is deliberate and pinned by tests.

use alloy_primitives::Bytes;
use alloy_sol_types::SolValue;
use serde_json::{Map, Value};

/// Method used when the request carries no decodable call data.
pub const DEFAULT_METHOD: &str = "pricefeed";

/// A decoded lookup call: the registered method name and its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupCall {
    pub method: String,
    pub params: Map<String, Value>,
}

impl LookupCall {
    fn defaults() -> Self {
        Self {
            method: DEFAULT_METHOD.to_string(),
            params: Map::new(),
        }
    }
}

/// The three accepted shapes of the `data` field, plus the fall-through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallData {
    /// `0x`-prefixed ABI bytes: `(string method, bytes params_json)`.
    Hex(String),
    /// A JSON document in a string: `{"function": …, "params": …}`.
    JsonText(String),
    /// An already-parsed object with `function` and `params` fields.
    JsonObject(Map<String, Value>),
    /// Empty, missing, or unrecognizable input.
    Defaults,
}

impl CallData {
    /// Classifies the raw `data` value of a request body.
    pub fn classify(data: Option<&Value>) -> Self {
        match data {
            None | Some(Value::Null) => CallData::Defaults,
            Some(Value::String(s)) if s.is_empty() => CallData::Defaults,
            Some(Value::String(s)) if s.starts_with("0x") => CallData::Hex(s.clone()),
            Some(Value::String(s)) => CallData::JsonText(s.clone()),
            Some(Value::Object(map)) => CallData::JsonObject(map.clone()),
            Some(_) => CallData::Defaults,
        }
    }

    /// Resolves the variant to a concrete `(method, params)` pair, falling
    /// back to defaults on any decoding error.
    pub fn decode(self) -> LookupCall {
        match self {
            CallData::Hex(hex_text) => decode_abi(&hex_text).unwrap_or_else(LookupCall::defaults),
            CallData::JsonText(text) => serde_json::from_str::<Value>(&text)
                .ok()
                .as_ref()
                .and_then(Value::as_object)
                .and_then(decode_object)
                .unwrap_or_else(LookupCall::defaults),
            CallData::JsonObject(map) => {
                decode_object(&map).unwrap_or_else(LookupCall::defaults)
            }
            CallData::Defaults => LookupCall::defaults(),
        }
    }
}

/// ABI shape: first component the method name, second the UTF-8 bytes of a
/// JSON object that becomes the params map.
fn decode_abi(hex_text: &str) -> Option<LookupCall> {
    let raw = hex::decode(hex_text.strip_prefix("0x")?).ok()?;
    let (method, payload) = <(String, Bytes)>::abi_decode_params(&raw).ok()?;
    let params = match serde_json::from_slice::<Value>(&payload) {
        Ok(Value::Object(map)) => map,
        _ => return None,
    };
    Some(LookupCall { method, params })
}

fn decode_object(map: &Map<String, Value>) -> Option<LookupCall> {
    let method = map.get("function")?.as_str()?.to_string();
    let params = match map.get("params") {
        Some(Value::Object(params)) => params.clone(),
        None | Some(Value::Null) => Map::new(),
        Some(_) => return None,
    };
    Some(LookupCall { method, params })
}

/// Encodes a `(method, params_json)` pair into the ABI call-data form.
/// Verifier-side tooling and tests use this to produce `data` fields.
pub fn encode_abi(method: &str, params_json: &[u8]) -> String {
    let tuple = (method.to_string(), Bytes::from(params_json.to_vec()));
    format!("0x{}", hex::encode(tuple.abi_encode_params()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_abi_round_trip() {
        let data = encode_abi("pricefeed", b"{\"pair\":\"ethereum\"}");
        let call = CallData::classify(Some(&Value::String(data))).decode();
        assert_eq!(call.method, "pricefeed");
        assert_eq!(call.params.get("pair").unwrap(), "ethereum");
    }

    #[test]
    fn test_empty_and_missing_data_yield_defaults() {
        for data in [None, Some(Value::String(String::new())), Some(Value::Null)] {
            let call = CallData::classify(data.as_ref()).decode();
            assert_eq!(call.method, DEFAULT_METHOD);
            assert!(call.params.is_empty());
        }
    }

    #[test]
    fn test_json_text_shape() {
        let text = json!({"function": "daovotes", "params": {"proposal": 7}}).to_string();
        let call = CallData::classify(Some(&Value::String(text))).decode();
        assert_eq!(call.method, "daovotes");
        assert_eq!(call.params.get("proposal").unwrap(), 7);
    }

    #[test]
    fn test_object_shape() {
        let object = json!({"function": "nftfloor", "params": {"collection": "punks"}});
        let call = CallData::classify(Some(&object)).decode();
        assert_eq!(call.method, "nftfloor");
        assert_eq!(call.params.get("collection").unwrap(), "punks");
    }

    #[test]
    fn test_object_without_params_gets_empty_map() {
        let object = json!({"function": "pricefeed"});
        let call = CallData::classify(Some(&object)).decode();
        assert_eq!(call.method, "pricefeed");
        assert!(call.params.is_empty());
    }

    #[test]
    fn test_malformed_hex_falls_through_to_defaults() {
        for data in ["0xzz", "0x1234", "0x"] {
            let call = CallData::classify(Some(&Value::String(data.to_string()))).decode();
            assert_eq!(call.method, DEFAULT_METHOD);
            assert!(call.params.is_empty());
        }
    }

    #[test]
    fn test_malformed_json_text_falls_through_to_defaults() {
        let call =
            CallData::classify(Some(&Value::String("not json".to_string()))).decode();
        assert_eq!(call.method, DEFAULT_METHOD);
    }

    #[test]
    fn test_abi_payload_must_be_a_json_object() {
        let data = encode_abi("pricefeed", b"[1,2,3]");
        let call = CallData::classify(Some(&Value::String(data))).decode();
        assert_eq!(call.method, DEFAULT_METHOD);
        assert!(call.params.is_empty());
    }

    #[test]
    fn test_non_string_non_object_defaults() {
        let call = CallData::classify(Some(&json!(42))).decode();
        assert_eq!(call.method, DEFAULT_METHOD);
    }
}
