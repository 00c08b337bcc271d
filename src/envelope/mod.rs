//! The signed envelope returned by the gateway.
//!
//! An [`Envelope`] is built per lookup, signed once, and never mutated or
//! persisted afterwards; the HTTP response is the only copy. Construction
//! goes through [`EnvelopeBuilder`], which serializes structured inputs,
//! fills defaults, stamps the metadata, computes the canonical digest
//! ([`canonical`]) and obtains the EIP-191 signature from a
//! [`DigestSigner`](crate::signer::DigestSigner).

use alloy_primitives::B256;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::signer::{DigestSigner, EnvelopeSignature, SignerError};
use crate::timestamp::UnixTimestamp;

pub mod canonical;
pub mod wire;

/// Cache hint applied when the caller does not provide one, in seconds.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 30;

/// Upper bound on the serialized envelope, mirrored from the request-side
/// bound to avoid amplification.
pub const MAX_ENVELOPE_BYTES: usize = 100 * 1024;

/// Errors raised while assembling or signing an envelope.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// The canonical form exceeds [`MAX_ENVELOPE_BYTES`].
    #[error("Envelope exceeds {MAX_ENVELOPE_BYTES} bytes (got {0})")]
    TooLarge(usize),
    /// A structured input could not be serialized to JSON.
    #[error("Failed to serialize envelope {field}: {source}")]
    Serialize {
        field: &'static str,
        source: serde_json::Error,
    },
    /// System clock is unreadable; the meta timestamp cannot be stamped.
    #[error("Cannot read system clock")]
    Clock,
    #[error(transparent)]
    Signing(#[from] SignerError),
}

/// Content fields in digest-canonical terms: everything the digest covers,
/// i.e. the envelope minus `digest` and `signature`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeContent {
    pub name: String,
    pub method: String,
    pub params: String,
    pub result: String,
    pub cursor: Option<String>,
    pub prev_digest: Option<B256>,
    pub meta: String,
    pub cache_ttl: u64,
}

/// A complete, signed envelope satisfying the digest and signature
/// invariants. Field order here matches the wire order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub name: String,
    pub method: String,
    pub params: String,
    pub result: String,
    pub cursor: Option<String>,
    pub prev_digest: Option<B256>,
    pub meta: String,
    pub cache_ttl: u64,
    pub digest: B256,
    pub signature: EnvelopeSignature,
}

impl Envelope {
    /// Content view for digest recomputation.
    pub fn content(&self) -> EnvelopeContent {
        EnvelopeContent {
            name: self.name.clone(),
            method: self.method.clone(),
            params: self.params.clone(),
            result: self.result.clone(),
            cursor: self.cursor.clone(),
            prev_digest: self.prev_digest,
            meta: self.meta.clone(),
            cache_ttl: self.cache_ttl,
        }
    }

    /// Single-tuple ABI encoding in wire order, 0x-prefixed.
    pub fn wire_hex(&self) -> String {
        wire::encode_hex(self)
    }
}

/// Assembles and signs envelopes.
///
/// Structured `params`/`result` inputs are JSON-serialized by the builder;
/// string inputs pass through verbatim. The metadata always receives
/// `provider`, `version`, `nonce` (unique per build) and `timestamp`; tests
/// pin the last two via [`EnvelopeBuilder::nonce`] and
/// [`EnvelopeBuilder::timestamp`].
pub struct EnvelopeBuilder {
    name: String,
    method: String,
    params: Value,
    result: Value,
    cursor: Option<String>,
    prev_digest: Option<B256>,
    cache_ttl: Option<u64>,
    meta: serde_json::Map<String, Value>,
    provider: String,
    version: String,
    nonce: Option<String>,
    timestamp: Option<UnixTimestamp>,
}

impl EnvelopeBuilder {
    pub fn new(name: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method: method.into(),
            params: Value::Object(serde_json::Map::new()),
            result: Value::Null,
            cursor: None,
            prev_digest: None,
            cache_ttl: None,
            meta: serde_json::Map::new(),
            provider: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            nonce: None,
            timestamp: None,
        }
    }

    pub fn params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    pub fn result(mut self, result: Value) -> Self {
        self.result = result;
        self
    }

    pub fn cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    pub fn prev_digest(mut self, digest: B256) -> Self {
        self.prev_digest = Some(digest);
        self
    }

    pub fn cache_ttl(mut self, seconds: u64) -> Self {
        self.cache_ttl = Some(seconds);
        self
    }

    /// Extra metadata merged under the four mandatory fields.
    pub fn meta(mut self, extra: serde_json::Map<String, Value>) -> Self {
        self.meta = extra;
        self
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Pins the meta nonce. Without this a fresh 16-byte random hex nonce is
    /// stamped on every build.
    pub fn nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Pins the meta timestamp. Defaults to the current time.
    pub fn timestamp(mut self, timestamp: UnixTimestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Finalizes the content, digests it and signs the digest.
    pub async fn sign(self, signer: &dyn DigestSigner) -> Result<Envelope, EnvelopeError> {
        let content = self.into_content()?;

        let preimage_len = canonical::canonical_preimage(&content).len();
        if preimage_len > MAX_ENVELOPE_BYTES {
            return Err(EnvelopeError::TooLarge(preimage_len));
        }

        let digest = canonical::digest(&content);
        let signature = signer.sign_digest(&digest).await?;

        Ok(Envelope {
            name: content.name,
            method: content.method,
            params: content.params,
            result: content.result,
            cursor: content.cursor,
            prev_digest: content.prev_digest,
            meta: content.meta,
            cache_ttl: content.cache_ttl,
            digest,
            signature,
        })
    }

    fn into_content(self) -> Result<EnvelopeContent, EnvelopeError> {
        let params = stringify("params", self.params)?;
        let result = stringify("result", self.result)?;

        let nonce = self.nonce.unwrap_or_else(fresh_nonce);
        let timestamp = match self.timestamp {
            Some(ts) => ts,
            None => UnixTimestamp::try_now().map_err(|_| EnvelopeError::Clock)?,
        };

        let mut meta = self.meta;
        meta.insert("provider".to_string(), Value::String(self.provider));
        meta.insert("version".to_string(), Value::String(self.version));
        meta.insert("nonce".to_string(), Value::String(nonce));
        meta.insert(
            "timestamp".to_string(),
            Value::Number(timestamp.seconds_since_epoch().into()),
        );
        let meta = serde_json::to_string(&Value::Object(meta)).map_err(|source| {
            EnvelopeError::Serialize {
                field: "meta",
                source,
            }
        })?;

        Ok(EnvelopeContent {
            name: self.name,
            method: self.method,
            params,
            result,
            cursor: self.cursor,
            prev_digest: self.prev_digest,
            meta,
            cache_ttl: self.cache_ttl.unwrap_or(DEFAULT_CACHE_TTL_SECS),
        })
    }
}

fn stringify(field: &'static str, value: Value) -> Result<String, EnvelopeError> {
    match value {
        Value::String(s) => Ok(s),
        other => serde_json::to_string(&other)
            .map_err(|source| EnvelopeError::Serialize { field, source }),
    }
}

fn fresh_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signer::GatewayWallet;
    use alloy_primitives::{U256, keccak256};
    use serde_json::json;

    fn wallet() -> GatewayWallet {
        let mut key = [0u8; 32];
        key[31] = 1;
        GatewayWallet::new(B256::from(key)).unwrap()
    }

    fn builder() -> EnvelopeBuilder {
        EnvelopeBuilder::new("pricefeed.eth", "pricefeed")
            .result(json!({"pair": "ETH/USD", "price": 3120.23}))
    }

    #[tokio::test]
    async fn test_defaults() {
        let envelope = builder().sign(&wallet()).await.unwrap();
        assert_eq!(envelope.cache_ttl, DEFAULT_CACHE_TTL_SECS);
        assert_eq!(envelope.cursor, None);
        assert_eq!(envelope.prev_digest, None);
        assert_eq!(envelope.params, "{}");

        let meta: Value = serde_json::from_str(&envelope.meta).unwrap();
        assert_eq!(meta["provider"], env!("CARGO_PKG_NAME"));
        assert_eq!(meta["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(meta["nonce"].as_str().unwrap().len(), 32);
        assert!(meta["timestamp"].is_u64());
    }

    #[tokio::test]
    async fn test_digest_exactness() {
        let envelope = builder().sign(&wallet()).await.unwrap();
        assert_eq!(envelope.digest, canonical::digest(&envelope.content()));
    }

    #[tokio::test]
    async fn test_signature_recovers_configured_signer() {
        let wallet = wallet();
        let envelope = builder().sign(&wallet).await.unwrap();
        assert_eq!(
            envelope.signature.recover(&envelope.digest).unwrap(),
            wallet.address()
        );
    }

    #[tokio::test]
    async fn test_pinned_nonce_and_timestamp_give_identical_digests() {
        let first = builder()
            .nonce("00".repeat(16))
            .timestamp(UnixTimestamp(1_700_000_000))
            .sign(&wallet())
            .await
            .unwrap();
        let second = builder()
            .nonce("00".repeat(16))
            .timestamp(UnixTimestamp(1_700_000_000))
            .sign(&wallet())
            .await
            .unwrap();
        assert_eq!(first.digest, second.digest);
        assert_eq!(
            canonical::canonical_preimage(&first.content()),
            canonical::canonical_preimage(&second.content())
        );
    }

    #[tokio::test]
    async fn test_fresh_nonce_changes_digest() {
        let first = builder().sign(&wallet()).await.unwrap();
        let second = builder().sign(&wallet()).await.unwrap();
        assert_ne!(first.digest, second.digest);
    }

    #[tokio::test]
    async fn test_string_inputs_pass_through_unserialized() {
        let envelope = builder()
            .params(Value::String("{\"pair\":\"ethereum\"}".to_string()))
            .sign(&wallet())
            .await
            .unwrap();
        assert_eq!(envelope.params, "{\"pair\":\"ethereum\"}");
    }

    #[tokio::test]
    async fn test_oversized_envelope_is_rejected() {
        let result = builder()
            .result(Value::String("x".repeat(MAX_ENVELOPE_BYTES + 1)))
            .sign(&wallet())
            .await;
        assert!(matches!(result, Err(EnvelopeError::TooLarge(_))));
    }

    #[tokio::test]
    async fn test_wire_round_trip_preserves_digest() {
        let envelope = builder()
            .params(json!({"pair": "ethereum"}))
            .sign(&wallet())
            .await
            .unwrap();

        let decoded = wire::decode(&wire::encode(&envelope)).unwrap();
        let recomputed = canonical::digest(&EnvelopeContent {
            name: decoded.name,
            method: decoded.method,
            params: decoded.params,
            result: decoded.result,
            cursor: (!decoded.cursor.is_empty()).then_some(decoded.cursor),
            prev_digest: (decoded.prevDigest != B256::ZERO).then_some(decoded.prevDigest),
            meta: decoded.meta,
            cache_ttl: u64::try_from(decoded.cacheTtl).unwrap(),
        });
        assert_eq!(recomputed, envelope.digest);
        assert_eq!(decoded.digest, envelope.digest);
        assert_eq!(decoded.cacheTtl, U256::from(DEFAULT_CACHE_TTL_SECS));
    }

    #[tokio::test]
    async fn test_extra_meta_merged_under_mandatory_fields() {
        let mut extra = serde_json::Map::new();
        extra.insert("region".to_string(), Value::String("eu".to_string()));
        extra.insert("provider".to_string(), Value::String("spoof".to_string()));
        let envelope = builder().meta(extra).sign(&wallet()).await.unwrap();

        let meta: Value = serde_json::from_str(&envelope.meta).unwrap();
        assert_eq!(meta["region"], "eu");
        // Mandatory fields win over caller-supplied duplicates.
        assert_eq!(meta["provider"], env!("CARGO_PKG_NAME"));
    }

    #[test]
    fn test_canonical_digest_differs_from_wire_hash() {
        // The wire bytes are not the digest preimage; hashing them must not
        // reproduce the digest.
        let content = EnvelopeContent {
            name: "a.eth".into(),
            method: "m".into(),
            params: "{}".into(),
            result: "1".into(),
            cursor: None,
            prev_digest: None,
            meta: "{}".into(),
            cache_ttl: 30,
        };
        let envelope = Envelope {
            name: content.name.clone(),
            method: content.method.clone(),
            params: content.params.clone(),
            result: content.result.clone(),
            cursor: None,
            prev_digest: None,
            meta: content.meta.clone(),
            cache_ttl: 30,
            digest: canonical::digest(&content),
            signature: crate::signer::EnvelopeSignature([0u8; 65]),
        };
        assert_ne!(keccak256(wire::encode(&envelope)), envelope.digest);
    }
}
