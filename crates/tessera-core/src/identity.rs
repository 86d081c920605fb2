//! Account identities
//!
//! An [`AccountId`] is the ledger address of a signer. Accounts are supplied
//! by the wallet collaborator; Tessera never creates or destroys them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// 20-byte ledger address, displayed as `0x` + 40 lowercase hex chars
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub [u8; 20]);

impl AccountId {
    /// Length of an account address in bytes
    pub const LEN: usize = 20;

    /// Create an account from raw bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdentityError> {
        let array: [u8; Self::LEN] =
            bytes
                .try_into()
                .map_err(|_| IdentityError::InvalidLength {
                    expected: Self::LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self(array))
    }

    /// Derive a deterministic account from a label
    ///
    /// Used by simulations and tests in place of a wallet.
    pub fn from_label(label: &str) -> Self {
        let hash = blake3::hash(label.as_bytes());
        let mut bytes = [0u8; Self::LEN];
        bytes.copy_from_slice(&hash.as_bytes()[..Self::LEN]);
        Self(bytes)
    }

    /// Get the address bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Short display form for logging (`0x1a2b3c4d`)
    pub fn short_id(&self) -> String {
        format!("0x{}", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({}..)", self.short_id())
    }
}

impl FromStr for AccountId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(digits)
            .map_err(|e| IdentityError::InvalidFormat(format!("{s}: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_parse_roundtrip() {
        let account = AccountId::from_label("alice");
        let text = account.to_string();
        assert!(text.starts_with("0x"));
        assert_eq!(text.len(), 42);
        assert_eq!(text.parse::<AccountId>().unwrap(), account);
    }

    #[test]
    fn test_parse_is_case_insensitive_and_prefix_optional() {
        let lower = "0x00112233445566778899aabbccddeeff00112233";
        let upper = "00112233445566778899AABBCCDDEEFF00112233";
        assert_eq!(
            lower.parse::<AccountId>().unwrap(),
            upper.parse::<AccountId>().unwrap()
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!(
            "0x1234".parse::<AccountId>(),
            Err(IdentityError::InvalidLength { expected: 20, actual: 2 })
        ));
        assert!(matches!(
            "not-hex".parse::<AccountId>(),
            Err(IdentityError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_labels_are_distinct() {
        assert_ne!(AccountId::from_label("alice"), AccountId::from_label("bob"));
        assert_eq!(AccountId::from_label("alice"), AccountId::from_label("alice"));
    }

    #[test]
    fn test_short_id() {
        let account = AccountId([0xab; 20]);
        assert_eq!(account.short_id(), "0xabababab");
        assert!(format!("{:?}", account).contains("0xabababab"));
    }
}
