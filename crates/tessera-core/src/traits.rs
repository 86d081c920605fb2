//! Collaborator traits
//!
//! The orchestration core talks to the outside world only through these
//! traits. Implementations are injected as `Arc<dyn ...>` with process-wide
//! lifetime.
//!
//! - [`ContentStore`]: content-addressed uploads
//! - [`LedgerClient`]: view calls and signed transactions against the contract
//! - [`PendingTx`]: a submitted transaction awaiting confirmation

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::artifact::{Artifact, ArtifactId, VoteValue};
use crate::cid::Cid;
use crate::error::{LedgerError, StoreError};
use crate::identity::AccountId;
use crate::tx::{Receipt, TxHash};

/// Progress of a single upload
///
/// An upload produces a finite sequence of `Chunk` events followed by exactly
/// one `Completed`. The sequence cannot be restarted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadProgress {
    Chunk { bytes_done: u64, total: u64 },
    Completed { cid: Cid },
}

/// Client for a content-addressed storage network
///
/// Uploading identical bytes twice must yield the identical [`Cid`], so
/// callers may retry without any deduplication of their own.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Upload a payload and return its identifier
    ///
    /// # Errors
    ///
    /// - [`StoreError::Unavailable`] if the network cannot be reached
    /// - [`StoreError::Rejected`] if the payload is invalid (e.g. empty)
    async fn upload(&self, payload: Bytes, name: &str) -> Result<Cid, StoreError>;

    /// Upload a payload, reporting progress on `progress`
    ///
    /// The default reports the whole payload as one chunk once `upload`
    /// returns. A dropped receiver never fails the upload.
    async fn upload_with_progress(
        &self,
        payload: Bytes,
        name: &str,
        progress: mpsc::UnboundedSender<UploadProgress>,
    ) -> Result<Cid, StoreError> {
        let total = payload.len() as u64;
        let cid = self.upload(payload, name).await?;
        let _ = progress.send(UploadProgress::Chunk {
            bytes_done: total,
            total,
        });
        let _ = progress.send(UploadProgress::Completed { cid: cid.clone() });
        Ok(cid)
    }
}

/// A submitted ledger transaction
///
/// Submission is irrevocable: the only way forward is to await confirmation
/// or failure.
#[async_trait]
pub trait PendingTx: Send {
    /// Hash of the submitted transaction
    fn hash(&self) -> TxHash;

    /// Wait until the transaction is mined
    ///
    /// Returns the receipt on success. Reverts surface as
    /// [`LedgerError::Reverted`] or a specific error such as
    /// [`LedgerError::ArtifactNotFound`].
    async fn confirm(self: Box<Self>) -> Result<Receipt, LedgerError>;
}

/// Client for the file/artifact contract, bound to one signer
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// The account this client signs as
    fn account(&self) -> AccountId;

    /// Height of the latest mined block
    async fn block_number(&self) -> Result<u64, LedgerError>;

    /// Current file of an account; the empty sentinel when none is set
    async fn get_file(&self, account: &AccountId) -> Result<Cid, LedgerError>;

    /// Snapshot of one artifact
    async fn get_artifact(&self, id: ArtifactId) -> Result<Artifact, LedgerError>;

    /// All artifacts in creation order
    async fn list_artifacts(&self) -> Result<Vec<Artifact>, LedgerError>;

    /// Point the signer's file record at `cid`
    async fn set_file(&self, cid: &Cid) -> Result<Box<dyn PendingTx>, LedgerError>;

    /// Create an artifact; the receipt carries the assigned id
    async fn add_artifact(&self, cid: &Cid) -> Result<Box<dyn PendingTx>, LedgerError>;

    /// Append a comment to an artifact
    async fn add_comment(
        &self,
        artifact: ArtifactId,
        cid: &Cid,
    ) -> Result<Box<dyn PendingTx>, LedgerError>;

    /// Cast or replace the signer's vote on an artifact
    async fn vote(
        &self,
        artifact: ArtifactId,
        value: VoteValue,
    ) -> Result<Box<dyn PendingTx>, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoStore;

    #[async_trait]
    impl ContentStore for EchoStore {
        async fn upload(&self, payload: Bytes, _name: &str) -> Result<Cid, StoreError> {
            Ok(Cid::for_content(&payload))
        }
    }

    /// Test that the collaborator traits are object-safe
    fn _assert_object_safe(_: &dyn ContentStore, _: &dyn LedgerClient, _: Box<dyn PendingTx>) {}

    #[tokio::test]
    async fn test_default_progress_sequence() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cid = EchoStore
            .upload_with_progress(Bytes::from_static(b"hello"), "note.txt", tx)
            .await
            .unwrap();

        assert_eq!(
            rx.recv().await,
            Some(UploadProgress::Chunk {
                bytes_done: 5,
                total: 5
            })
        );
        assert_eq!(rx.recv().await, Some(UploadProgress::Completed { cid }));
        assert_eq!(rx.recv().await, None);
    }
}
