//! Transaction hashes and receipts

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactId;

/// 32-byte transaction hash
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Short display form for logging
    pub fn short(&self) -> String {
        format!("0x{}", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({}..)", self.short())
    }
}

/// Proof that a transaction was mined and is durable
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    /// Block the transaction was included in
    pub block_number: u64,
    /// Set when the transaction created an artifact
    pub artifact_id: Option<ArtifactId>,
}
