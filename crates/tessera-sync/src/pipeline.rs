//! Steps shared by the orchestrators: upload, confirm, read through.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::warn;

use tessera_core::{
    AccountId, Artifact, ArtifactId, Cid, ContentStore, LedgerClient, PendingTx, Receipt,
    UploadProgress,
};

use crate::cache::ReflectionCache;
use crate::error::{Result, SyncError};
use crate::event::{Operation, OperationState};

/// Resolves once `cancel` flips to `true`; never if there is no signal.
async fn cancelled(cancel: &mut Option<watch::Receiver<bool>>) {
    match cancel {
        Some(rx) => {
            if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                // Sender gone without cancelling
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending::<()>().await,
    }
}

/// Upload `payload`, forwarding store progress as operation events.
///
/// Abandons the upload with [`SyncError::UploadCancelled`] if `cancel` fires
/// first.
pub(crate) async fn upload(
    store: &dyn ContentStore,
    payload: Bytes,
    name: &str,
    op: &Operation,
    mut cancel: Option<watch::Receiver<bool>>,
) -> Result<Cid> {
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let upload = store.upload_with_progress(payload, name, progress_tx);
    tokio::pin!(upload);

    let forward = |progress: UploadProgress| {
        if let UploadProgress::Chunk { bytes_done, total } = progress {
            op.emit(OperationState::UploadProgress {
                done: bytes_done,
                total,
            });
        }
    };

    loop {
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => return Err(SyncError::UploadCancelled),
            Some(progress) = progress_rx.recv() => forward(progress),
            result = &mut upload => {
                while let Ok(progress) = progress_rx.try_recv() {
                    forward(progress);
                }
                return result.map_err(SyncError::from);
            }
        }
    }
}

/// Await confirmation, bounded by `timeout`.
pub(crate) async fn confirm(pending: Box<dyn PendingTx>, timeout: Duration) -> Result<Receipt> {
    match tokio::time::timeout(timeout, pending.confirm()).await {
        Ok(result) => result.map_err(SyncError::from),
        Err(_) => Err(SyncError::TxFailed("timeout".to_string())),
    }
}

/// Wait for a spawned confirmation task.
pub(crate) async fn join<T>(handle: JoinHandle<Result<T>>) -> Result<T> {
    handle
        .await
        .map_err(|e| SyncError::TxFailed(format!("confirmation task failed: {e}")))?
}

/// Re-read the file of `account` and reflect it.
pub(crate) async fn refresh_file(
    ledger: &dyn LedgerClient,
    cache: &ReflectionCache,
    account: &AccountId,
) -> Result<Option<Cid>> {
    let block = ledger.block_number().await?;
    let cid = ledger.get_file(account).await?;
    Ok(cache.put_file(*account, cid, block))
}

/// Re-read one artifact and reflect it.
pub(crate) async fn refresh_artifact(
    ledger: &dyn LedgerClient,
    cache: &ReflectionCache,
    id: ArtifactId,
) -> Result<Artifact> {
    let block = ledger.block_number().await?;
    let artifact = ledger.get_artifact(id).await?;
    Ok(cache.put_artifact(artifact, block))
}

/// Re-read every artifact and reflect them all.
pub(crate) async fn refresh_artifacts(
    ledger: &dyn LedgerClient,
    cache: &ReflectionCache,
) -> Result<Vec<Artifact>> {
    let block = ledger.block_number().await?;
    let artifacts = ledger.list_artifacts().await?;
    Ok(artifacts
        .into_iter()
        .map(|artifact| cache.put_artifact(artifact, block))
        .collect())
}

/// Refresh after a confirmed artifact write.
///
/// The write is already durable, so a failed re-read only drops the stale
/// snapshot.
pub(crate) async fn reflect_confirmed_artifact(
    ledger: &dyn LedgerClient,
    cache: &ReflectionCache,
    id: ArtifactId,
) {
    if let Err(e) = refresh_artifact(ledger, cache, id).await {
        warn!(artifact = %id, error = %e, "Re-read after confirmation failed");
        cache.invalidate_artifact(id);
    }
}
