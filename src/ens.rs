//! ENS name hashing.
//!
//! Implements the namehash algorithm from EIP-137: labels are hashed
//! right-to-left, each round combining the running node with the keccak-256
//! of the label. [`checked_namehash`] additionally normalizes and rejects
//! names the gateway will not serve (empty labels, non-ASCII, punctuation
//! beyond hyphen and underscore).

use alloy_primitives::{B256, keccak256};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum NamehashError {
    #[error("Empty label in name: {0}")]
    EmptyLabel(String),
    #[error("Disallowed character {1:?} in name: {0}")]
    DisallowedCharacter(String, char),
}

/// Raw namehash over an already-normalized name. Empty input hashes to the
/// zero node.
pub fn namehash(name: &str) -> B256 {
    let mut node = B256::ZERO;
    if name.is_empty() {
        return node;
    }
    for label in name.rsplit('.') {
        let label_hash = keccak256(label.as_bytes());
        node = keccak256([node.as_slice(), label_hash.as_slice()].concat());
    }
    node
}

/// Normalizes (trim + ASCII lowercase) and hashes, rejecting names the
/// algorithm does not accept.
pub fn checked_namehash(name: &str) -> Result<B256, NamehashError> {
    let normalized = name.trim().to_ascii_lowercase();
    for label in normalized.split('.') {
        if label.is_empty() {
            return Err(NamehashError::EmptyLabel(normalized));
        }
        if let Some(c) = label
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(NamehashError::DisallowedCharacter(normalized, c));
        }
    }
    Ok(namehash(&normalized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::b256;

    #[test]
    fn test_namehash_empty_is_zero() {
        assert_eq!(namehash(""), B256::ZERO);
    }

    #[test]
    fn test_namehash_eth() {
        // EIP-137 reference vector.
        assert_eq!(
            namehash("eth"),
            b256!("93cdeb708b7545dc668eb9280176169d1c33cfd8ed6f04690a0bcc88a93fc4ae")
        );
    }

    #[test]
    fn test_namehash_foo_eth() {
        // EIP-137 reference vector.
        assert_eq!(
            namehash("foo.eth"),
            b256!("de9b09fd7c5f901e23a3f19fecc54828e9c848539801e86591bd9801b019f84f")
        );
    }

    #[test]
    fn test_checked_namehash_normalizes_case_and_whitespace() {
        assert_eq!(
            checked_namehash("  FOO.eth ").unwrap(),
            namehash("foo.eth")
        );
    }

    #[test]
    fn test_checked_namehash_rejects_empty_labels() {
        assert!(matches!(
            checked_namehash("foo..eth"),
            Err(NamehashError::EmptyLabel(_))
        ));
        assert!(matches!(
            checked_namehash(""),
            Err(NamehashError::EmptyLabel(_))
        ));
        assert!(matches!(
            checked_namehash(".eth"),
            Err(NamehashError::EmptyLabel(_))
        ));
    }

    #[test]
    fn test_checked_namehash_rejects_punctuation() {
        assert!(matches!(
            checked_namehash("bad name!.eth"),
            Err(NamehashError::DisallowedCharacter(_, _))
        ));
    }
}
