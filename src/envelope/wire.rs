//! ABI wire encoding of signed envelopes.
//!
//! The wire order `(name, method, params, result, cursor, prev_digest, meta,
//! cache_ttl, digest, signature)` is what the on-chain verifier ABI-decodes;
//! it intentionally differs from the digest-canonical key order and the two
//! are never unified. Absent `cursor` travels as the empty string and absent
//! `prev_digest` as 32 zero bytes; those are on-wire conventions only, the
//! digest preimage keeps the literal `null`s.

use alloy_primitives::{B256, Bytes, U256, hex};
use alloy_sol_types::{SolValue, sol};

use super::Envelope;
use crate::signer::EnvelopeSignature;

sol! {
    /// Single-tuple envelope layout consumed by `abi.decode` on-chain.
    struct EnvelopeData {
        string name;
        string method;
        string params;
        string result;
        string cursor;
        bytes32 prevDigest;
        string meta;
        uint256 cacheTtl;
        bytes32 digest;
        bytes signature;
    }
}

impl From<&Envelope> for EnvelopeData {
    fn from(envelope: &Envelope) -> Self {
        EnvelopeData {
            name: envelope.name.clone(),
            method: envelope.method.clone(),
            params: envelope.params.clone(),
            result: envelope.result.clone(),
            cursor: envelope.cursor.clone().unwrap_or_default(),
            prevDigest: envelope.prev_digest.unwrap_or(B256::ZERO),
            meta: envelope.meta.clone(),
            cacheTtl: U256::from(envelope.cache_ttl),
            digest: envelope.digest,
            signature: Bytes::from(*envelope.signature.as_bytes()),
        }
    }
}

/// Encodes an envelope as a single ABI tuple.
pub fn encode(envelope: &Envelope) -> Vec<u8> {
    EnvelopeData::from(envelope).abi_encode()
}

pub fn encode_hex(envelope: &Envelope) -> String {
    format!("0x{}", hex::encode(encode(envelope)))
}

/// Decodes wire bytes back into the tuple layout. Used by verifier-side
/// tooling and round-trip tests.
pub fn decode(data: &[u8]) -> Result<EnvelopeData, alloy_sol_types::Error> {
    EnvelopeData::abi_decode(data)
}

/// Legacy response layout: `(bytes result_json_utf8, bytes signature)`,
/// encoded as two parameters the way pre-envelope verifiers expect.
pub fn encode_legacy(result_json: &[u8], signature: &EnvelopeSignature) -> Vec<u8> {
    let tuple = (
        Bytes::from(result_json.to_vec()),
        Bytes::from(*signature.as_bytes()),
    );
    tuple.abi_encode_params()
}

pub fn encode_legacy_hex(result_json: &[u8], signature: &EnvelopeSignature) -> String {
    format!("0x{}", hex::encode(encode_legacy(result_json, signature)))
}
