//! Content reference types

use serde::{Deserialize, Serialize};
use tessera_core::Cid;

use crate::error::StorageError;

/// Reference to content-addressed blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    /// BLAKE3 hash of the content
    pub hash: [u8; 32],
    /// Size of the content in bytes
    pub size: u64,
}

impl ContentRef {
    /// Compute a content reference from data
    pub fn from_data(data: &[u8]) -> Self {
        let hash = blake3::hash(data);
        Self {
            hash: *hash.as_bytes(),
            size: data.len() as u64,
        }
    }

    /// Recover the hash named by a content identifier
    ///
    /// Only identifiers produced by [`ContentRef::cid`] can be parsed.
    pub fn hash_from_cid(cid: &Cid) -> Result<[u8; 32], StorageError> {
        let invalid = || StorageError::InvalidCid(cid.to_string());
        let hex_part = cid.as_str().strip_prefix("0x").ok_or_else(invalid)?;
        let bytes = hex::decode(hex_part).map_err(|_| invalid())?;
        bytes.try_into().map_err(|_| invalid())
    }

    /// Content identifier for this blob
    pub fn cid(&self) -> Cid {
        Cid::from_digest(&self.hash)
    }

    /// Get the hash as a hex string
    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash)
    }

    /// Get a short hash for display (first 8 chars)
    pub fn short_hash(&self) -> String {
        hex::encode(&self.hash[..4])
    }
}

impl std::fmt::Display for ContentRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentRef({}, {} bytes)", self.short_hash(), self.size)
    }
}
