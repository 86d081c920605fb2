//! Registration orchestrator
//!
//! Sequences `upload → setFile(cid) → confirm → reflect` for one account:
//!
//! ```text
//! Idle → Uploading → AwaitingConfirmation → Confirmed
//!           │                 │
//!           └──→ Failed ←─────┘
//! ```
//!
//! At most one registration per account is in flight, across every
//! orchestrator sharing the reflection cache; a second request is refused
//! with [`SyncError::RegistrationInProgress`]. The slot is free again before
//! `Confirmed` or `Failed` is published. `Uploading` can be
//! cancelled; `AwaitingConfirmation` cannot. Once the transaction is
//! submitted, confirmation runs in its own task, so the cache is updated
//! even if the caller stops waiting.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{Instrument, debug, info, instrument, warn};

use tessera_core::{AccountId, Cid, ContentStore, LedgerClient, Receipt, TxHash};

use crate::cache::ReflectionCache;
use crate::config::SyncConfig;
use crate::error::{ErrorKind, Result, Stage, SyncError};
use crate::event::{EventBus, Operation, OperationKind, OperationState};
use crate::pipeline;

/// Phase of the account's current (or last) registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationPhase {
    Idle,
    /// Uploading; abortable
    Uploading,
    /// Submitted, irrevocable
    AwaitingConfirmation { tx: TxHash },
    Confirmed { cid: Cid },
    Failed {
        stage: Option<Stage>,
        kind: ErrorKind,
    },
}

impl RegistrationPhase {
    fn failed(err: &SyncError) -> Self {
        RegistrationPhase::Failed {
            stage: err.stage(),
            kind: err.kind(),
        }
    }

    /// Whether a registration is currently running
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            RegistrationPhase::Uploading | RegistrationPhase::AwaitingConfirmation { .. }
        )
    }

    pub fn is_irrevocable(&self) -> bool {
        matches!(self, RegistrationPhase::AwaitingConfirmation { .. })
    }
}

/// Result of a confirmed registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub cid: Cid,
    pub receipt: Receipt,
}

struct Shared {
    phase: watch::Sender<RegistrationPhase>,
    /// Present only while the upload may still be abandoned
    cancel: Mutex<Option<watch::Sender<bool>>>,
}

/// Holds the account's registration slot in the reflection cache.
///
/// [`finish`](Self::finish) frees the slot before the terminal phase is
/// published. Dropping the guard mid-upload (caller gave up) fails the
/// operation as cancelled.
struct InFlightGuard {
    shared: Arc<Shared>,
    cache: Arc<ReflectionCache>,
    account: AccountId,
    op: Option<Operation>,
    released: bool,
}

impl InFlightGuard {
    fn acquire(
        shared: &Arc<Shared>,
        cache: &Arc<ReflectionCache>,
        account: AccountId,
    ) -> Option<Self> {
        cache.claim_registration(account).then(|| Self {
            shared: shared.clone(),
            cache: cache.clone(),
            account,
            op: None,
            released: false,
        })
    }

    fn attach(&mut self, op: Operation) {
        self.op = Some(op);
    }

    fn release(&mut self) {
        self.shared.cancel.lock().take();
        self.cache.release_registration(&self.account);
        self.released = true;
    }

    /// Free the slot, then publish `phase` and `state`.
    fn finish(mut self, phase: RegistrationPhase, state: OperationState) {
        self.release();
        self.shared.phase.send_replace(phase);
        if let Some(op) = self.op.take() {
            op.emit(state);
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.release();

        let abandoned = self.shared.phase.send_if_modified(|phase| {
            if *phase == RegistrationPhase::Uploading {
                *phase = RegistrationPhase::failed(&SyncError::UploadCancelled);
                true
            } else {
                false
            }
        });
        if !abandoned {
            return;
        }
        if let Some(op) = self.op.take() {
            debug!(op = %op.id(), "Registration dropped during upload");
            op.emit(OperationState::failed(&SyncError::UploadCancelled));
        }
    }
}

/// Registration orchestrator bound to the ledger client's account.
pub struct RegistrationOrchestrator {
    account: AccountId,
    store: Arc<dyn ContentStore>,
    ledger: Arc<dyn LedgerClient>,
    cache: Arc<ReflectionCache>,
    events: EventBus,
    config: SyncConfig,
    shared: Arc<Shared>,
}

impl RegistrationOrchestrator {
    pub fn new(
        store: Arc<dyn ContentStore>,
        ledger: Arc<dyn LedgerClient>,
        cache: Arc<ReflectionCache>,
        events: EventBus,
        config: SyncConfig,
    ) -> Self {
        let (phase, _) = watch::channel(RegistrationPhase::Idle);
        Self {
            account: ledger.account(),
            store,
            ledger,
            cache,
            events,
            config,
            shared: Arc::new(Shared {
                phase,
                cancel: Mutex::new(None),
            }),
        }
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn phase(&self) -> RegistrationPhase {
        self.shared.phase.borrow().clone()
    }

    pub fn watch_phase(&self) -> watch::Receiver<RegistrationPhase> {
        self.shared.phase.subscribe()
    }

    /// Abandon the running upload.
    ///
    /// Returns `false` if nothing is uploading, including when the
    /// transaction has already been submitted.
    pub fn cancel_upload(&self) -> bool {
        match self.shared.cancel.lock().as_ref() {
            Some(cancel) => {
                cancel.send_replace(true);
                true
            }
            None => false,
        }
    }

    fn set_phase(&self, phase: RegistrationPhase) {
        self.shared.phase.send_replace(phase);
    }

    /// Upload `payload` and point the account's file record at it.
    #[instrument(
        skip(self, payload),
        fields(account = %self.account.short_id(), size = payload.len(), op = tracing::field::Empty)
    )]
    pub async fn register_file(&self, payload: Bytes, name: &str) -> Result<Registration> {
        let mut guard = InFlightGuard::acquire(&self.shared, &self.cache, self.account)
            .ok_or(SyncError::RegistrationInProgress(self.account))?;

        let op = self.events.begin(self.account, OperationKind::Register);
        tracing::Span::current().record("op", tracing::field::display(op.id()));
        guard.attach(op.clone());

        let (cancel_tx, cancel_rx) = watch::channel(false);
        *self.shared.cancel.lock() = Some(cancel_tx);
        self.set_phase(RegistrationPhase::Uploading);
        op.emit(OperationState::Uploading);

        let uploaded = pipeline::upload(
            self.store.as_ref(),
            payload,
            name,
            &op,
            Some(cancel_rx),
        )
        .await;

        // Past this point the upload can no longer be abandoned
        let cancelled = self
            .shared
            .cancel
            .lock()
            .take()
            .is_some_and(|cancel| *cancel.borrow());
        let uploaded = match uploaded {
            Ok(_) if cancelled => Err(SyncError::UploadCancelled),
            other => other,
        };

        let cid = match uploaded {
            Ok(cid) => cid,
            Err(e) => {
                warn!(error = %e, "Registration upload failed");
                guard.finish(RegistrationPhase::failed(&e), OperationState::failed(&e));
                return Err(e);
            }
        };

        let pending = match self.ledger.set_file(&cid).await {
            Ok(pending) => pending,
            Err(e) => {
                let e = SyncError::from(e);
                warn!(error = %e, "setFile submission failed");
                guard.finish(RegistrationPhase::failed(&e), OperationState::failed(&e));
                return Err(e);
            }
        };

        let tx = pending.hash();
        self.set_phase(RegistrationPhase::AwaitingConfirmation { tx });
        op.emit(OperationState::Submitted { tx });

        let account = self.account;
        let cache = self.cache.clone();
        let timeout = self.config.confirmation_timeout;
        let task = tokio::spawn(
            async move {
                match pipeline::confirm(pending, timeout).await {
                    Ok(receipt) => {
                        cache.put_file(account, cid.clone(), receipt.block_number);
                        info!(cid = %cid.short(), block = receipt.block_number, "File registered");
                        guard.finish(
                            RegistrationPhase::Confirmed { cid: cid.clone() },
                            OperationState::Confirmed {
                                receipt: receipt.clone(),
                            },
                        );
                        Ok(Registration { cid, receipt })
                    }
                    Err(e) => {
                        warn!(error = %e, "setFile did not confirm");
                        guard.finish(RegistrationPhase::failed(&e), OperationState::failed(&e));
                        Err(e)
                    }
                }
            }
            .in_current_span(),
        );

        pipeline::join(task).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_ledger::{ChainConfig, InMemoryChain};
    use tessera_storage::InMemoryContentStore;

    fn orchestrator(
        store: Arc<InMemoryContentStore>,
        chain: &InMemoryChain,
    ) -> RegistrationOrchestrator {
        let ledger = Arc::new(chain.connect(AccountId::from_label("alice")));
        RegistrationOrchestrator::new(
            store,
            ledger,
            Arc::new(ReflectionCache::new()),
            EventBus::new(64),
            SyncConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_phase_follows_registration() {
        let store = Arc::new(InMemoryContentStore::new());
        let chain = InMemoryChain::default();
        let orchestrator = orchestrator(store, &chain);
        assert_eq!(orchestrator.phase(), RegistrationPhase::Idle);

        let registration = orchestrator
            .register_file(Bytes::from_static(b"hello"), "note.txt")
            .await
            .unwrap();

        assert_eq!(
            orchestrator.phase(),
            RegistrationPhase::Confirmed {
                cid: registration.cid.clone()
            }
        );
        assert_eq!(
            orchestrator.cache.file(&orchestrator.account()),
            Some(Some(registration.cid))
        );
    }

    #[tokio::test]
    async fn test_cancel_only_while_uploading() {
        let store = Arc::new(InMemoryContentStore::new());
        store.pause();
        let chain = InMemoryChain::new(ChainConfig::manual());
        let orchestrator = Arc::new(orchestrator(store.clone(), &chain));
        assert!(!orchestrator.cancel_upload());

        let mut phase = orchestrator.watch_phase();
        let task = tokio::spawn({
            let orchestrator = orchestrator.clone();
            async move {
                orchestrator
                    .register_file(Bytes::from_static(b"draft"), "draft.txt")
                    .await
            }
        });
        phase
            .wait_for(|p| *p == RegistrationPhase::Uploading)
            .await
            .unwrap();

        assert!(orchestrator.cancel_upload());
        let err = task.await.unwrap().unwrap_err();
        assert_eq!(err, SyncError::UploadCancelled);
        assert_eq!(chain.stats().writes(), 0);
        assert_eq!(
            orchestrator.phase(),
            RegistrationPhase::Failed {
                stage: Some(Stage::Upload),
                kind: ErrorKind::UploadCancelled
            }
        );

        // Slot released
        store.resume();
        let task = tokio::spawn({
            let orchestrator = orchestrator.clone();
            async move {
                orchestrator
                    .register_file(Bytes::from_static(b"final"), "final.txt")
                    .await
            }
        });
        phase
            .wait_for(|p| p.is_irrevocable())
            .await
            .unwrap();
        assert!(!orchestrator.cancel_upload());

        chain.mine_block();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_dropped_caller_fails_operation_and_releases_slot() {
        let store = Arc::new(InMemoryContentStore::new());
        store.pause();
        let chain = InMemoryChain::default();
        let orchestrator = orchestrator(store.clone(), &chain);
        let mut events = orchestrator.events.subscribe();

        let attempt = orchestrator.register_file(Bytes::from_static(b"x"), "x");
        let timed_out =
            tokio::time::timeout(std::time::Duration::from_millis(20), attempt).await;
        assert!(timed_out.is_err());
        assert_eq!(
            orchestrator.phase(),
            RegistrationPhase::Failed {
                stage: Some(Stage::Upload),
                kind: ErrorKind::UploadCancelled
            }
        );
        assert!(!orchestrator.cache.is_registering(&orchestrator.account()));

        let first = events.recv().await.unwrap();
        assert_eq!(first.state, OperationState::Uploading);
        let terminal = loop {
            let event = events.recv().await.unwrap();
            if event.state.is_terminal() {
                break event;
            }
        };
        assert_eq!(terminal.op, first.op);
        assert_eq!(
            terminal.state,
            OperationState::Failed {
                stage: Some(Stage::Upload),
                kind: ErrorKind::UploadCancelled
            }
        );
        assert_eq!(chain.stats().writes(), 0);

        store.resume();
        assert!(
            orchestrator
                .register_file(Bytes::from_static(b"x"), "x")
                .await
                .is_ok()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_slot_free_once_terminal_phase_is_visible() {
        let store = Arc::new(InMemoryContentStore::new());
        let chain = InMemoryChain::default();
        let orchestrator = Arc::new(orchestrator(store, &chain));
        let mut phase = orchestrator.watch_phase();

        for round in 0..200u32 {
            let payload = Bytes::from(format!("round {round}"));
            let expected = Cid::for_content(&payload);
            let task = tokio::spawn({
                let orchestrator = orchestrator.clone();
                let payload = payload.clone();
                async move { orchestrator.register_file(payload, "r.txt").await }
            });
            phase
                .wait_for(|p| *p == RegistrationPhase::Confirmed { cid: expected.clone() })
                .await
                .unwrap();

            // The slot is already free when Confirmed is observed
            assert!(!orchestrator.cache.is_registering(&orchestrator.account()));
            task.await.unwrap().unwrap();
        }
    }
}
