//! Digest signing for lookup responses.
//!
//! The gateway signs the keccak-256 digest of every canonical envelope (and,
//! on the legacy path, the digest of the raw result bytes) with an EIP-191
//! "Ethereum Signed Message" wrapping, so the on-chain verifier can recover
//! the configured signer address via `ecrecover`.
//!
//! Signing is expressed through the [`DigestSigner`] trait so a software key
//! and a remote KMS client interchange without touching the pipeline. The
//! shipped implementation is [`GatewayWallet`], a thin wrapper over Alloy's
//! [`PrivateKeySigner`].

use alloy_primitives::{Address, B256, Signature, hex};
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors raised while loading the signing key or producing a signature.
#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    /// The configured private key could not be turned into a signer.
    /// Fatal at startup.
    #[error("Signing key unavailable: {0}")]
    KeyUnavailable(String),
    /// The signing operation itself failed.
    #[error("Signature generation failed: {0}")]
    Signature(String),
    /// A produced or received signature could not be parsed back.
    #[error("Malformed signature: {0}")]
    Malformed(String),
}

/// A 65-byte ECDSA signature in strict `r (32) ‖ s (32) ‖ v (1)` layout.
///
/// `v` is pinned to the Ethereum convention `{27, 28}` and `s` is low-S
/// normalized, so two libraries verifying the same envelope agree byte for
/// byte. Serialized as a 0x-prefixed hex string of 130 characters.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EnvelopeSignature(pub [u8; 65]);

impl EnvelopeSignature {
    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Recovers the address that EIP-191-signed the given 32-byte digest.
    pub fn recover(&self, digest: &B256) -> Result<Address, SignerError> {
        let signature = Signature::from_raw_array(&self.0)
            .map_err(|e| SignerError::Malformed(e.to_string()))?;
        signature
            .recover_address_from_msg(digest.as_slice())
            .map_err(|e| SignerError::Malformed(e.to_string()))
    }
}

impl<'de> Deserialize<'de> for EnvelopeSignature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;

        static SIG_REGEX: Lazy<Regex> = Lazy::new(|| {
            Regex::new(r"^0x[0-9a-fA-F]{130}$").expect("Invalid regex for envelope signature")
        });

        if SIG_REGEX.is_match(&s) {
            let bytes = hex::decode(s.trim_start_matches("0x"))
                .map_err(|_| Error::custom("Failed to decode signature hex string"))?;

            let array: [u8; 65] = bytes
                .try_into()
                .map_err(|_| Error::custom("Signature must be exactly 65 bytes"))?;

            Ok(EnvelopeSignature(array))
        } else {
            Err(Error::custom(
                "Invalid signature format: must be 0x-prefixed and 130 hex chars",
            ))
        }
    }
}

impl Serialize for EnvelopeSignature {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Signs 32-byte digests under the EIP-191 "Ethereum Signed Message" scheme.
///
/// `sign_digest(h)` must return a signature over
/// `keccak256("\x19Ethereum Signed Message:\n32" ‖ h)`.
#[async_trait]
pub trait DigestSigner: Send + Sync {
    /// The 20-byte address the verifier recovers from signatures.
    fn address(&self) -> Address;

    async fn sign_digest(&self, digest: &B256) -> Result<EnvelopeSignature, SignerError>;
}

/// Local software signer backed by a secp256k1 private key.
pub struct GatewayWallet {
    inner: PrivateKeySigner,
}

impl GatewayWallet {
    /// Builds a wallet from raw key bytes.
    ///
    /// # Errors
    ///
    /// [`SignerError::KeyUnavailable`] if the bytes are not a valid secp256k1
    /// scalar (zero or ≥ the curve order).
    pub fn new(key: B256) -> Result<Self, SignerError> {
        let inner = PrivateKeySigner::from_bytes(&key)
            .map_err(|e| SignerError::KeyUnavailable(e.to_string()))?;
        Ok(Self { inner })
    }
}

#[async_trait]
impl DigestSigner for GatewayWallet {
    fn address(&self) -> Address {
        self.inner.address()
    }

    async fn sign_digest(&self, digest: &B256) -> Result<EnvelopeSignature, SignerError> {
        // sign_message applies the EIP-191 prefix before hashing.
        let signature = self
            .inner
            .sign_message(digest.as_slice())
            .await
            .map_err(|e| SignerError::Signature(e.to_string()))?
            .normalized_s();

        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&signature.r().to_be_bytes::<32>());
        out[32..64].copy_from_slice(&signature.s().to_be_bytes::<32>());
        // Recovery id on the wire is 27/28, never 0/1.
        out[64] = 27 + signature.v() as u8;
        Ok(EnvelopeSignature(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{U256, keccak256};

    fn dev_wallet() -> GatewayWallet {
        let mut key = [0u8; 32];
        key[31] = 1;
        GatewayWallet::new(B256::from(key)).unwrap()
    }

    #[tokio::test]
    async fn test_signature_recovers_signer_address() {
        let wallet = dev_wallet();
        let digest = keccak256(b"payload");
        let signature = wallet.sign_digest(&digest).await.unwrap();
        let recovered = signature.recover(&digest).unwrap();
        assert_eq!(recovered, wallet.address());
    }

    #[tokio::test]
    async fn test_signature_layout_and_v() {
        let wallet = dev_wallet();
        let digest = keccak256(b"layout");
        let signature = wallet.sign_digest(&digest).await.unwrap();
        let v = signature.0[64];
        assert!(v == 27 || v == 28, "v must be 27 or 28, got {v}");
    }

    #[tokio::test]
    async fn test_signature_is_low_s() {
        // secp256k1 half order; s above it would be malleable.
        let half_order = U256::from_str_radix(
            "7fffffffffffffffffffffffffffffff5d576e7357a4501ddfe92f46681b20a0",
            16,
        )
        .unwrap();
        let wallet = dev_wallet();
        for seed in 0u8..8 {
            let digest = keccak256([seed]);
            let signature = wallet.sign_digest(&digest).await.unwrap();
            let s = U256::from_be_slice(&signature.0[32..64]);
            assert!(s <= half_order, "s not normalized for seed {seed}");
        }
    }

    #[tokio::test]
    async fn test_eip191_prefix_is_applied() {
        let wallet = dev_wallet();
        let digest = keccak256(b"prefixed");
        let signature = wallet.sign_digest(&digest).await.unwrap();

        let mut wrapped = Vec::new();
        wrapped.extend_from_slice(b"\x19Ethereum Signed Message:\n32");
        wrapped.extend_from_slice(digest.as_slice());
        let prehash = keccak256(&wrapped);

        let parsed = Signature::from_raw_array(&signature.0).unwrap();
        let recovered = parsed.recover_address_from_prehash(&prehash).unwrap();
        assert_eq!(recovered, wallet.address());
    }

    #[test]
    fn test_zero_key_is_rejected() {
        assert!(matches!(
            GatewayWallet::new(B256::ZERO),
            Err(SignerError::KeyUnavailable(_))
        ));
    }

    #[test]
    fn test_signature_serde_round_trip() {
        let signature = EnvelopeSignature([7u8; 65]);
        let json = serde_json::to_string(&signature).unwrap();
        assert!(json.starts_with("\"0x"));
        let back: EnvelopeSignature = serde_json::from_str(&json).unwrap();
        assert_eq!(back, signature);
    }

    #[test]
    fn test_signature_deserialize_rejects_bad_length() {
        let short = format!("\"0x{}\"", "ab".repeat(64));
        assert!(serde_json::from_str::<EnvelopeSignature>(&short).is_err());
    }
}
