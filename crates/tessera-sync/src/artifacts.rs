//! Artifact and vote coordinator
//!
//! Creates artifacts, attaches comments, and submits votes. Nothing is
//! reflected before confirmation: after each confirmed write the affected
//! artifact is re-read from the ledger and its snapshot replaced whole.
//! There is no local tally arithmetic.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{Instrument, info, instrument, warn};

use tessera_core::{
    AccountId, Artifact, ArtifactId, ContentStore, LedgerClient, PendingTx, Receipt, VoteValue,
};

use crate::cache::ReflectionCache;
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::event::{EventBus, Operation, OperationKind, OperationState};
use crate::pipeline;

/// Result of [`ArtifactCoordinator::add_or_comment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactOutcome {
    /// A new artifact was created with a ledger-assigned id
    Created { id: ArtifactId, receipt: Receipt },
    /// A comment was appended to an existing artifact
    Commented { id: ArtifactId, receipt: Receipt },
}

impl ArtifactOutcome {
    pub fn artifact_id(&self) -> ArtifactId {
        match self {
            ArtifactOutcome::Created { id, .. } | ArtifactOutcome::Commented { id, .. } => *id,
        }
    }

    pub fn receipt(&self) -> &Receipt {
        match self {
            ArtifactOutcome::Created { receipt, .. }
            | ArtifactOutcome::Commented { receipt, .. } => receipt,
        }
    }
}

pub struct ArtifactCoordinator {
    account: AccountId,
    store: Arc<dyn ContentStore>,
    ledger: Arc<dyn LedgerClient>,
    cache: Arc<ReflectionCache>,
    events: EventBus,
    config: SyncConfig,
}

impl ArtifactCoordinator {
    pub fn new(
        store: Arc<dyn ContentStore>,
        ledger: Arc<dyn LedgerClient>,
        cache: Arc<ReflectionCache>,
        events: EventBus,
        config: SyncConfig,
    ) -> Self {
        Self {
            account: ledger.account(),
            store,
            ledger,
            cache,
            events,
            config,
        }
    }

    /// Upload `payload` and either create an artifact or comment on `target`.
    ///
    /// The choice is made once, from `target`. A target that does not exist
    /// fails with [`SyncError::ArtifactNotFound`], both before the upload and
    /// if it disappears by confirmation time.
    #[instrument(
        skip(self, payload),
        fields(account = %self.account.short_id(), size = payload.len(), op = tracing::field::Empty)
    )]
    pub async fn add_or_comment(
        &self,
        payload: Bytes,
        name: &str,
        target: Option<ArtifactId>,
    ) -> Result<ArtifactOutcome> {
        let kind = match target {
            Some(target) => OperationKind::AddComment { target },
            None => OperationKind::AddArtifact,
        };
        let op = self.events.begin(self.account, kind);
        tracing::Span::current().record("op", tracing::field::display(op.id()));

        if let Some(id) = target {
            // Read-only check; the cache is left alone
            if let Err(e) = self.ledger.get_artifact(id).await {
                return Err(fail(&op, e.into()));
            }
        }
        op.emit(OperationState::Uploading);

        let cid = match pipeline::upload(self.store.as_ref(), payload, name, &op, None).await {
            Ok(cid) => cid,
            Err(e) => return Err(fail(&op, e)),
        };

        let submitted = match target {
            Some(id) => self.ledger.add_comment(id, &cid).await,
            None => self.ledger.add_artifact(&cid).await,
        };
        let pending = submitted.map_err(|e| fail(&op, e.into()))?;

        let receipt = self.confirm_and_reflect(pending, op, target).await?;
        let outcome = match (target, receipt.artifact_id) {
            (Some(id), _) => ArtifactOutcome::Commented { id, receipt },
            (None, Some(id)) => ArtifactOutcome::Created { id, receipt },
            (None, None) => {
                return Err(SyncError::TxFailed(
                    "receipt carries no artifact id".to_string(),
                ));
            }
        };
        info!(artifact = %outcome.artifact_id(), "Artifact write confirmed");
        Ok(outcome)
    }

    /// Cast or replace this account's vote on `artifact`.
    ///
    /// `value` is checked against {-1, 0, 1} before any network call.
    #[instrument(skip(self), fields(account = %self.account.short_id(), op = tracing::field::Empty))]
    pub async fn submit_vote(&self, artifact: ArtifactId, value: i64) -> Result<Receipt> {
        let value = VoteValue::try_from(value)?;

        let op = self
            .events
            .begin(self.account, OperationKind::Vote { artifact, value });
        tracing::Span::current().record("op", tracing::field::display(op.id()));

        let pending = self
            .ledger
            .vote(artifact, value)
            .await
            .map_err(|e| fail(&op, e.into()))?;

        let receipt = self.confirm_and_reflect(pending, op, Some(artifact)).await?;
        info!(artifact = %artifact, %value, "Vote confirmed");
        Ok(receipt)
    }

    /// Snapshot of `id`, read through on a miss.
    pub async fn artifact(&self, id: ArtifactId) -> Result<Artifact> {
        match self.cache.artifact(id) {
            Some(artifact) => Ok(artifact),
            None => self.refresh_artifact(id).await,
        }
    }

    /// Re-read `id` from the ledger.
    pub async fn refresh_artifact(&self, id: ArtifactId) -> Result<Artifact> {
        pipeline::refresh_artifact(self.ledger.as_ref(), &self.cache, id).await
    }

    /// Every artifact in creation order, always read through.
    pub async fn list_artifacts(&self) -> Result<Vec<Artifact>> {
        pipeline::refresh_artifacts(self.ledger.as_ref(), &self.cache).await
    }

    /// Confirm in a spawned task, then reflect the affected artifact.
    async fn confirm_and_reflect(
        &self,
        pending: Box<dyn PendingTx>,
        op: Operation,
        target: Option<ArtifactId>,
    ) -> Result<Receipt> {
        let tx = pending.hash();
        op.emit(OperationState::Submitted { tx });

        let ledger = self.ledger.clone();
        let cache = self.cache.clone();
        let timeout = self.config.confirmation_timeout;
        let task = tokio::spawn(
            async move {
                let receipt = match pipeline::confirm(pending, timeout).await {
                    Ok(receipt) => receipt,
                    Err(e) => return Err(fail(&op, e)),
                };
                if let Some(id) = target.or(receipt.artifact_id) {
                    pipeline::reflect_confirmed_artifact(ledger.as_ref(), &cache, id).await;
                }
                op.emit(OperationState::Confirmed {
                    receipt: receipt.clone(),
                });
                Ok(receipt)
            }
            .in_current_span(),
        );

        pipeline::join(task).await
    }
}

fn fail(op: &Operation, e: SyncError) -> SyncError {
    warn!(op = %op.id(), error = %e, "Artifact operation failed");
    op.emit(OperationState::failed(&e));
    e
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_ledger::InMemoryChain;
    use tessera_storage::InMemoryContentStore;

    fn coordinator(chain: &InMemoryChain, label: &str) -> ArtifactCoordinator {
        ArtifactCoordinator::new(
            Arc::new(InMemoryContentStore::new()),
            Arc::new(chain.connect(AccountId::from_label(label))),
            Arc::new(ReflectionCache::new()),
            EventBus::new(64),
            SyncConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_create_then_comment() {
        let chain = InMemoryChain::default();
        let alice = coordinator(&chain, "alice");

        let created = alice
            .add_or_comment(Bytes::from_static(b"session notes"), "notes.md", None)
            .await
            .unwrap();
        let id = created.artifact_id();
        assert!(matches!(created, ArtifactOutcome::Created { .. }));

        let commented = alice
            .add_or_comment(Bytes::from_static(b"nice"), "comment.txt", Some(id))
            .await
            .unwrap();
        assert_eq!(commented.artifact_id(), id);

        let artifact = alice.artifact(id).await.unwrap();
        assert_eq!(artifact.comment_count(), 1);
        assert_eq!(artifact.owner, AccountId::from_label("alice"));
    }

    #[tokio::test]
    async fn test_invalid_vote_fails_before_network() {
        let chain = InMemoryChain::default();
        let alice = coordinator(&chain, "alice");

        let reads = chain.stats().reads();
        let err = alice.submit_vote(ArtifactId(0), 2).await.unwrap_err();
        assert_eq!(err, SyncError::InvalidVoteValue(2));
        assert_eq!(chain.stats().reads(), reads);
        assert_eq!(chain.stats().writes(), 0);
    }

    #[tokio::test]
    async fn test_vote_reflects_confirmed_tally() {
        let chain = InMemoryChain::default();
        let alice = coordinator(&chain, "alice");
        let bob = coordinator(&chain, "bob");

        let id = alice
            .add_or_comment(Bytes::from_static(b"artifact"), "a.txt", None)
            .await
            .unwrap()
            .artifact_id();

        alice.submit_vote(id, 1).await.unwrap();
        bob.submit_vote(id, -1).await.unwrap();
        bob.submit_vote(id, 0).await.unwrap();

        assert_eq!(alice.refresh_artifact(id).await.unwrap().vote_tally, 1);
        assert_eq!(bob.artifact(id).await.unwrap().vote_tally, 1);
    }
}
