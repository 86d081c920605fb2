//! Error taxonomy of the synchronization core
//!
//! Every failure is terminal for the operation that produced it and carries
//! enough structure ([`ErrorKind`] plus [`Stage`]) for a caller to decide
//! whether to retry without inspecting messages.

use serde::{Deserialize, Serialize};
use tessera_core::{AccountId, ArtifactId, InvalidVoteValue, LedgerError, StoreError};

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors surfaced by the orchestrators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    // ============================================================
    // Upload stage
    // ============================================================
    /// The content network could not be reached.
    #[error("Content store unavailable: {0}")]
    StoreUnavailable(String),

    /// The content store refused the payload.
    #[error("Content store rejected payload: {0}")]
    StoreRejected(String),

    /// The caller abandoned the upload before anything was submitted.
    #[error("Upload cancelled")]
    UploadCancelled,

    // ============================================================
    // Ledger stage
    // ============================================================
    /// The signer declined the transaction.
    #[error("Transaction rejected by signer")]
    TxRejectedBySigner,

    /// The transaction reverted, was dropped, or timed out.
    #[error("Transaction failed: {0}")]
    TxFailed(String),

    /// The referenced artifact does not exist.
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(ArtifactId),

    /// The ledger could not serve a read or accept a submission.
    #[error("Ledger unavailable: {0}")]
    LedgerUnavailable(String),

    // ============================================================
    // Local guards
    // ============================================================
    /// Vote value outside {-1, 0, 1}.
    #[error("Invalid vote value: {0}")]
    InvalidVoteValue(i64),

    /// Another registration for this account has not finished.
    #[error("Registration already in progress for {0}")]
    RegistrationInProgress(AccountId),
}

/// Field-less mirror of [`SyncError`] for matching and notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    StoreUnavailable,
    StoreRejected,
    UploadCancelled,
    TxRejectedBySigner,
    TxFailed,
    ArtifactNotFound,
    LedgerUnavailable,
    InvalidVoteValue,
    RegistrationInProgress,
}

/// Where in the upload-then-write pipeline an operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    /// Rejected locally before any network call.
    Validation,
    Upload,
    Ledger,
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            SyncError::StoreRejected(_) => ErrorKind::StoreRejected,
            SyncError::UploadCancelled => ErrorKind::UploadCancelled,
            SyncError::TxRejectedBySigner => ErrorKind::TxRejectedBySigner,
            SyncError::TxFailed(_) => ErrorKind::TxFailed,
            SyncError::ArtifactNotFound(_) => ErrorKind::ArtifactNotFound,
            SyncError::LedgerUnavailable(_) => ErrorKind::LedgerUnavailable,
            SyncError::InvalidVoteValue(_) => ErrorKind::InvalidVoteValue,
            SyncError::RegistrationInProgress(_) => ErrorKind::RegistrationInProgress,
        }
    }

    /// Pipeline stage of the failure; `None` for the in-flight guard.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            SyncError::StoreUnavailable(_)
            | SyncError::StoreRejected(_)
            | SyncError::UploadCancelled => Some(Stage::Upload),
            SyncError::TxRejectedBySigner
            | SyncError::TxFailed(_)
            | SyncError::ArtifactNotFound(_)
            | SyncError::LedgerUnavailable(_) => Some(Stage::Ledger),
            SyncError::InvalidVoteValue(_) => Some(Stage::Validation),
            SyncError::RegistrationInProgress(_) => None,
        }
    }

    /// Whether re-invoking the same operation unchanged may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::StoreUnavailable(_)
                | SyncError::TxFailed(_)
                | SyncError::LedgerUnavailable(_)
        )
    }
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(s) => SyncError::StoreUnavailable(s),
            StoreError::Rejected(s) => SyncError::StoreRejected(s),
        }
    }
}

impl From<LedgerError> for SyncError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::RejectedBySigner => SyncError::TxRejectedBySigner,
            LedgerError::Reverted(reason) => SyncError::TxFailed(reason),
            LedgerError::ArtifactNotFound(id) => SyncError::ArtifactNotFound(id),
            LedgerError::InvalidVoteValue(v) => SyncError::InvalidVoteValue(v),
            LedgerError::Dropped => SyncError::TxFailed("dropped".to_string()),
            LedgerError::Unavailable(s) => SyncError::LedgerUnavailable(s),
        }
    }
}

impl From<InvalidVoteValue> for SyncError {
    fn from(e: InvalidVoteValue) -> Self {
        SyncError::InvalidVoteValue(e.0)
    }
}
