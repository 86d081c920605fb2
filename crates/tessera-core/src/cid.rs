//! Content identifiers
//!
//! A [`Cid`] is opaque to the ledger: whatever string the content store hands
//! back is what gets written on-chain. The one value with meaning is the
//! all-zero sentinel the contract returns for an account with no file.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Gateway used to render links when none is configured
pub const DEFAULT_GATEWAY: &str = "https://ipfs.io";

/// Textual form of the "no file set" sentinel: `0x` followed by 64 zeros
pub const EMPTY_CID: &str = concat!(
    "0x",
    "00000000", "00000000", "00000000", "00000000",
    "00000000", "00000000", "00000000", "00000000",
);

/// Content identifier returned by a content store
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cid(String);

impl Cid {
    /// Wrap an identifier string produced by a content store
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The "no file set" sentinel
    pub fn empty() -> Self {
        Self(EMPTY_CID.to_string())
    }

    /// Build an identifier from a 32-byte content digest
    ///
    /// The result has the same textual width as [`EMPTY_CID`].
    pub fn from_digest(digest: &[u8; 32]) -> Self {
        Self(format!("0x{}", hex::encode(digest)))
    }

    /// Identifier for a payload (BLAKE3 digest)
    pub fn for_content(payload: &[u8]) -> Self {
        Self::from_digest(blake3::hash(payload).as_bytes())
    }

    /// Get the identifier text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the all-zero sentinel (and for an empty string)
    pub fn is_empty_sentinel(&self) -> bool {
        self.0.is_empty() || self.0 == EMPTY_CID
    }

    /// Treat the sentinel as absent
    pub fn into_option(self) -> Option<Cid> {
        if self.is_empty_sentinel() {
            None
        } else {
            Some(self)
        }
    }

    /// Gateway link for this identifier (`{base}/ipfs/{cid}`)
    pub fn gateway_url(&self, base: &str) -> String {
        format!("{}/ipfs/{}", base.trim_end_matches('/'), self.0)
    }

    /// Short display form for logging
    pub fn short(&self) -> String {
        self.0.chars().take(10).collect()
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({})", self.short())
    }
}

impl From<&str> for Cid {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Cid {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
