//! HTTP request and response bodies for the gateway endpoints.
//!
//! Shapes mirror what CCIP-Read clients and the SDK send: `POST /lookup`
//! bodies carry `{node, data, name?, useEnvelope?}`, `POST /compute` bodies
//! carry `{function, params}`. Responses are plain JSON with the ABI payload
//! in a 0x-prefixed `data` field.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::Envelope;
use crate::timestamp::UnixTimestamp;

/// Body of `POST /lookup`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LookupRequest {
    /// 32-byte node hash (`0x…`, 66 chars) or a name the namehash algorithm
    /// accepts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    /// Logical endpoint name carried into the envelope, e.g. `pricefeed.eth`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Call data: hex ABI bytes, a JSON string, or a JSON object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// The envelope path is taken unless this is the literal `false`.
    #[serde(
        default,
        rename = "useEnvelope",
        skip_serializing_if = "Option::is_none"
    )]
    pub use_envelope: Option<bool>,
}

impl LookupRequest {
    pub fn wants_envelope(&self) -> bool {
        self.use_envelope != Some(false)
    }
}

/// Body of `POST /lookup` responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupReply {
    /// ABI-encoded payload the on-chain verifier consumes.
    pub data: String,
    /// The signed envelope, absent on the legacy path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub envelope: Option<Envelope>,
}

/// Body of `POST /compute`: direct dispatch bypassing call-data decoding and
/// the envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeRequest {
    pub function: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeReply {
    pub result: Value,
    /// 65-byte signature over `keccak256(utf8(json(result)))`, hex-encoded.
    pub signature: String,
    /// Address the signature recovers to.
    pub signer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReply {
    pub status: String,
    pub signer: String,
    pub timestamp: UnixTimestamp,
    /// Seconds since the gateway started.
    pub uptime: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionsReply {
    pub functions: Vec<String>,
}
