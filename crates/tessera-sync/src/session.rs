//! Session facade
//!
//! One [`Session`] per active account. It owns the account's orchestrators,
//! the notification bus, and a handle on the reflection cache, which may be
//! shared with sessions of other accounts in the same process.

use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use tokio::sync::{broadcast, watch};
use tracing::{debug, instrument};

use tessera_core::{AccountId, Artifact, ArtifactId, Cid, ContentStore, LedgerClient, Receipt};

use crate::artifacts::{ArtifactCoordinator, ArtifactOutcome};
use crate::cache::ReflectionCache;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::event::{EventBus, SyncEvent, broadcast_to_stream};
use crate::pipeline;
use crate::registration::{Registration, RegistrationOrchestrator, RegistrationPhase};

/// Presentation-layer entry point for one account.
///
/// # Example
///
/// ```ignore
/// let session = Session::open(store, ledger, SyncConfig::default()).await?;
///
/// let registration = session.register_file(b"hello".to_vec(), "note.txt").await?;
/// assert_eq!(
///     session.current_file(&session.account()).await?,
///     Some(registration.cid)
/// );
/// ```
pub struct Session {
    account: AccountId,
    ledger: Arc<dyn LedgerClient>,
    cache: Arc<ReflectionCache>,
    events: EventBus,
    config: SyncConfig,
    registration: RegistrationOrchestrator,
    artifacts: ArtifactCoordinator,
}

impl Session {
    /// Open a session with its own reflection cache.
    pub async fn open(
        store: Arc<dyn ContentStore>,
        ledger: Arc<dyn LedgerClient>,
        config: SyncConfig,
    ) -> Result<Self> {
        Self::open_with_cache(store, ledger, config, Arc::new(ReflectionCache::new())).await
    }

    /// Open a session over a shared reflection cache.
    ///
    /// Reads the account's current file once to seed the cache.
    #[instrument(skip_all, fields(account = %ledger.account().short_id()))]
    pub async fn open_with_cache(
        store: Arc<dyn ContentStore>,
        ledger: Arc<dyn LedgerClient>,
        config: SyncConfig,
        cache: Arc<ReflectionCache>,
    ) -> Result<Self> {
        let account = ledger.account();
        let events = EventBus::new(config.event_channel_capacity);

        let seeded = pipeline::refresh_file(ledger.as_ref(), &cache, &account).await?;
        debug!(file = ?seeded, "Seeded reflection cache");

        Ok(Self {
            account,
            registration: RegistrationOrchestrator::new(
                store.clone(),
                ledger.clone(),
                cache.clone(),
                events.clone(),
                config.clone(),
            ),
            artifacts: ArtifactCoordinator::new(
                store,
                ledger.clone(),
                cache.clone(),
                events.clone(),
                config.clone(),
            ),
            ledger,
            cache,
            events,
            config,
        })
    }

    pub fn account(&self) -> AccountId {
        self.account
    }

    pub fn cache(&self) -> &Arc<ReflectionCache> {
        &self.cache
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    // ============================================================
    // Files
    // ============================================================

    /// Upload `payload` and make it this account's current file.
    pub async fn register_file(
        &self,
        payload: impl Into<Bytes>,
        name: &str,
    ) -> Result<Registration> {
        self.registration
            .register_file(payload.into(), name)
            .await
    }

    /// Last confirmed file of `account`; `None` when no file is set.
    pub async fn current_file(&self, account: &AccountId) -> Result<Option<Cid>> {
        match self.cache.file(account) {
            Some(cid) => Ok(cid),
            None => self.refresh_file(account).await,
        }
    }

    /// Re-read `account`'s file, e.g. after a write issued elsewhere.
    pub async fn refresh_file(&self, account: &AccountId) -> Result<Option<Cid>> {
        pipeline::refresh_file(self.ledger.as_ref(), &self.cache, account).await
    }

    pub fn registration_phase(&self) -> RegistrationPhase {
        self.registration.phase()
    }

    pub fn watch_registration(&self) -> watch::Receiver<RegistrationPhase> {
        self.registration.watch_phase()
    }

    /// Abandon a running registration upload; `false` once submitted.
    pub fn cancel_registration_upload(&self) -> bool {
        self.registration.cancel_upload()
    }

    // ============================================================
    // Artifacts
    // ============================================================

    /// Create an artifact, or comment on `target` when one is given.
    pub async fn add_or_comment_artifact(
        &self,
        payload: impl Into<Bytes>,
        name: &str,
        target: Option<ArtifactId>,
    ) -> Result<ArtifactOutcome> {
        self.artifacts
            .add_or_comment(payload.into(), name, target)
            .await
    }

    /// Vote `value` ∈ {-1, 0, 1} on `artifact`, replacing any earlier vote.
    pub async fn submit_vote(&self, artifact: ArtifactId, value: i64) -> Result<Receipt> {
        self.artifacts.submit_vote(artifact, value).await
    }

    pub async fn list_artifacts(&self) -> Result<Vec<Artifact>> {
        self.artifacts.list_artifacts().await
    }

    pub async fn artifact(&self, id: ArtifactId) -> Result<Artifact> {
        self.artifacts.artifact(id).await
    }

    pub async fn refresh_artifact(&self, id: ArtifactId) -> Result<Artifact> {
        self.artifacts.refresh_artifact(id).await
    }

    // ============================================================
    // Notifications
    // ============================================================

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Notifications as a stream; lagged gaps are skipped.
    pub fn events(&self) -> Pin<Box<dyn Stream<Item = SyncEvent> + Send>> {
        broadcast_to_stream(self.events.subscribe())
    }

    /// Gateway link for `cid`.
    pub fn gateway_url(&self, cid: &Cid) -> String {
        cid.gateway_url(&self.config.gateway_base)
    }
}
