//! Error types for Tessera collaborators

use thiserror::Error;

use crate::artifact::ArtifactId;

/// Errors related to account identities
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Invalid account format: {0}")]
    InvalidFormat(String),

    #[error("Invalid account length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}

/// Errors surfaced by a content store
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The content network could not be reached
    #[error("Content store unavailable: {0}")]
    Unavailable(String),

    /// The payload was refused (empty, oversized, malformed)
    #[error("Content store rejected payload: {0}")]
    Rejected(String),
}

/// Errors surfaced by a ledger client
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The signer refused to sign the transaction
    #[error("Signer rejected the transaction")]
    RejectedBySigner,

    /// The transaction was mined but reverted
    #[error("Transaction reverted: {0}")]
    Reverted(String),

    /// The referenced artifact does not exist
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(ArtifactId),

    /// Vote value outside {-1, 0, 1}
    #[error("Invalid vote value: {0}")]
    InvalidVoteValue(i64),

    /// The transaction left the mempool without being mined
    #[error("Transaction dropped before confirmation")]
    Dropped,

    /// The ledger node could not be reached
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}

/// A vote value outside the closed set {-1, 0, 1}
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Vote value {0} is outside {{-1, 0, 1}}")]
pub struct InvalidVoteValue(pub i64);

impl From<InvalidVoteValue> for LedgerError {
    fn from(err: InvalidVoteValue) -> Self {
        LedgerError::InvalidVoteValue(err.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_error_display() {
        let err = IdentityError::InvalidFormat("zz".to_string());
        assert!(format!("{}", err).contains("Invalid account format"));

        let err = IdentityError::InvalidLength {
            expected: 20,
            actual: 3,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("20"));
        assert!(msg.contains("3"));
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Unavailable("connection refused".to_string());
        assert!(format!("{}", err).contains("connection refused"));

        let err = StoreError::Rejected("empty payload".to_string());
        assert!(format!("{}", err).contains("rejected"));
    }

    #[test]
    fn test_ledger_error_display() {
        assert!(format!("{}", LedgerError::RejectedBySigner).contains("Signer rejected"));
        assert!(format!("{}", LedgerError::ArtifactNotFound(ArtifactId(7))).contains("#7"));
        assert!(format!("{}", LedgerError::Reverted("out of gas".into())).contains("out of gas"));
    }

    #[test]
    fn test_invalid_vote_conversion() {
        let err: LedgerError = InvalidVoteValue(2).into();
        assert_eq!(err, LedgerError::InvalidVoteValue(2));
        assert!(format!("{}", InvalidVoteValue(2)).contains("{-1, 0, 1}"));
    }
}
