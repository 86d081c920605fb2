//! In-memory chain
//!
//! Simulates the contract behind a mempool so tests can observe the gap
//! between submission and confirmation.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tessera_ledger::{ChainConfig, InMemoryChain, MiningMode};
//!
//! let chain = InMemoryChain::new(ChainConfig::manual());
//! let alice = chain.connect(AccountId::from_label("alice"));
//!
//! let pending = alice.set_file(&"bafy123".into()).await?;
//! chain.mine_block();
//! let receipt = pending.confirm().await?;
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tracing::{debug, instrument, warn};

use tessera_core::{
    AccountId, Artifact, ArtifactId, Cid, LedgerClient, LedgerError, PendingTx, Receipt, TxHash,
    VoteValue,
};

use crate::contract::{ContractCall, ContractState};

/// When submitted transactions get mined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MiningMode {
    /// Every submission is mined in its own block immediately
    #[default]
    Instant,
    /// Transactions wait in the mempool until [`InMemoryChain::mine_block`]
    Manual,
}

/// Configuration for an in-memory chain
#[derive(Debug, Clone, Default)]
pub struct ChainConfig {
    pub mining: MiningMode,
}

impl ChainConfig {
    pub fn instant() -> Self {
        Self {
            mining: MiningMode::Instant,
        }
    }

    pub fn manual() -> Self {
        Self {
            mining: MiningMode::Manual,
        }
    }
}

/// Call counters, for asserting which requests reached the chain
#[derive(Debug, Default)]
pub struct ChainStats {
    reads: AtomicU64,
    writes: AtomicU64,
}

impl ChainStats {
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

struct QueuedTx {
    hash: TxHash,
    signer: AccountId,
    call: ContractCall,
    forced_revert: Option<String>,
    reply: oneshot::Sender<Result<Receipt, LedgerError>>,
}

struct ChainInner {
    state: ContractState,
    mempool: VecDeque<QueuedTx>,
    block_number: u64,
    nonces: HashMap<AccountId, u64>,
    mining: MiningMode,
    reject_next_signature: bool,
    revert_next: Option<String>,
}

/// Shared in-memory chain
///
/// Cloning yields another handle to the same chain.
#[derive(Clone)]
pub struct InMemoryChain {
    inner: Arc<Mutex<ChainInner>>,
    stats: Arc<ChainStats>,
    pending_tx: Arc<watch::Sender<usize>>,
}

impl Default for InMemoryChain {
    fn default() -> Self {
        Self::new(ChainConfig::default())
    }
}

impl InMemoryChain {
    pub fn new(config: ChainConfig) -> Self {
        let (pending_tx, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(ChainInner {
                state: ContractState::new(),
                mempool: VecDeque::new(),
                block_number: 0,
                nonces: HashMap::new(),
                mining: config.mining,
                reject_next_signature: false,
                revert_next: None,
            })),
            stats: Arc::new(ChainStats::default()),
            pending_tx: Arc::new(pending_tx),
        }
    }

    /// Client that signs as `account`
    pub fn connect(&self, account: AccountId) -> InMemoryLedgerClient {
        InMemoryLedgerClient {
            chain: self.clone(),
            account,
        }
    }

    pub fn stats(&self) -> &ChainStats {
        &self.stats
    }

    pub fn block_number(&self) -> u64 {
        self.inner.lock().block_number
    }

    pub fn set_mining_mode(&self, mining: MiningMode) {
        self.inner.lock().mining = mining;
    }

    /// Number of transactions waiting to be mined
    pub fn pending_count(&self) -> usize {
        self.inner.lock().mempool.len()
    }

    /// Wait until at least `count` transactions sit in the mempool
    pub async fn until_pending(&self, count: usize) {
        let mut rx = self.pending_tx.subscribe();
        // The sender lives as long as `self`, so this cannot fail
        let _ = rx.wait_for(|pending| *pending >= count).await;
    }

    /// The signer refuses the next submitted transaction
    pub fn reject_next_signature(&self) {
        self.inner.lock().reject_next_signature = true;
    }

    /// The next submitted transaction reverts with `reason` when mined
    pub fn revert_next(&self, reason: impl Into<String>) {
        self.inner.lock().revert_next = Some(reason.into());
    }

    /// Mine every queued transaction into one block
    ///
    /// Transactions execute in submission order. Returns how many were mined.
    pub fn mine_block(&self) -> usize {
        let mut inner = self.inner.lock();
        let mined = Self::mine_locked(&mut inner);
        self.pending_tx.send_replace(inner.mempool.len());
        mined
    }

    fn mine_locked(inner: &mut ChainInner) -> usize {
        if inner.mempool.is_empty() {
            return 0;
        }
        inner.block_number += 1;
        let block_number = inner.block_number;
        let mut mined = 0;

        while let Some(tx) = inner.mempool.pop_front() {
            let outcome = match tx.forced_revert {
                Some(reason) => Err(LedgerError::Reverted(reason)),
                None => inner.state.apply(tx.signer, &tx.call),
            };
            let result = outcome.map(|artifact_id| Receipt {
                tx_hash: tx.hash,
                block_number,
                artifact_id,
            });
            match &result {
                Ok(_) => debug!(tx = %tx.hash.short(), method = tx.call.method(), block_number, "Mined transaction"),
                Err(e) => warn!(tx = %tx.hash.short(), method = tx.call.method(), error = %e, "Transaction reverted"),
            }
            // The submitter may have stopped waiting; the state change stands
            let _ = tx.reply.send(result);
            mined += 1;
        }

        mined
    }

    #[instrument(skip(self, signer, call), fields(signer = %signer.short_id(), method = call.method()))]
    fn submit(&self, signer: AccountId, call: ContractCall) -> Result<InMemoryPendingTx, LedgerError> {
        self.stats.writes.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.inner.lock();

        if std::mem::take(&mut inner.reject_next_signature) {
            debug!("Signer rejected transaction");
            return Err(LedgerError::RejectedBySigner);
        }

        let nonce = {
            let entry = inner.nonces.entry(signer).or_insert(0);
            let nonce = *entry;
            *entry += 1;
            nonce
        };
        let hash = call.tx_hash(&signer, nonce);
        let (reply, receipt_rx) = oneshot::channel();
        let forced_revert = inner.revert_next.take();

        inner.mempool.push_back(QueuedTx {
            hash,
            signer,
            call,
            forced_revert,
            reply,
        });
        debug!(tx = %hash.short(), nonce, "Submitted transaction");

        if inner.mining == MiningMode::Instant {
            Self::mine_locked(&mut inner);
        }
        self.pending_tx.send_replace(inner.mempool.len());

        Ok(InMemoryPendingTx { hash, receipt_rx })
    }

    fn read<T>(&self, f: impl FnOnce(&ContractState) -> T) -> T {
        self.stats.reads.fetch_add(1, Ordering::SeqCst);
        f(&self.inner.lock().state)
    }
}

/// Handle to a transaction in an [`InMemoryChain`] mempool
pub struct InMemoryPendingTx {
    hash: TxHash,
    receipt_rx: oneshot::Receiver<Result<Receipt, LedgerError>>,
}

#[async_trait]
impl PendingTx for InMemoryPendingTx {
    fn hash(&self) -> TxHash {
        self.hash
    }

    async fn confirm(self: Box<Self>) -> Result<Receipt, LedgerError> {
        self.receipt_rx.await.map_err(|_| LedgerError::Dropped)?
    }
}

/// [`LedgerClient`] bound to one signer of an [`InMemoryChain`]
#[derive(Clone)]
pub struct InMemoryLedgerClient {
    chain: InMemoryChain,
    account: AccountId,
}

impl InMemoryLedgerClient {
    pub fn chain(&self) -> &InMemoryChain {
        &self.chain
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedgerClient {
    fn account(&self) -> AccountId {
        self.account
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        Ok(self.chain.block_number())
    }

    async fn get_file(&self, account: &AccountId) -> Result<Cid, LedgerError> {
        Ok(self.chain.read(|state| state.file(account)))
    }

    async fn get_artifact(&self, id: ArtifactId) -> Result<Artifact, LedgerError> {
        self.chain.read(|state| state.artifact(id))
    }

    async fn list_artifacts(&self) -> Result<Vec<Artifact>, LedgerError> {
        Ok(self.chain.read(|state| state.artifacts()))
    }

    async fn set_file(&self, cid: &Cid) -> Result<Box<dyn PendingTx>, LedgerError> {
        let pending = self
            .chain
            .submit(self.account, ContractCall::SetFile { cid: cid.clone() })?;
        Ok(Box::new(pending))
    }

    async fn add_artifact(&self, cid: &Cid) -> Result<Box<dyn PendingTx>, LedgerError> {
        let pending = self
            .chain
            .submit(self.account, ContractCall::AddArtifact { cid: cid.clone() })?;
        Ok(Box::new(pending))
    }

    async fn add_comment(
        &self,
        artifact: ArtifactId,
        cid: &Cid,
    ) -> Result<Box<dyn PendingTx>, LedgerError> {
        let pending = self.chain.submit(
            self.account,
            ContractCall::AddComment {
                artifact,
                cid: cid.clone(),
            },
        )?;
        Ok(Box::new(pending))
    }

    async fn vote(
        &self,
        artifact: ArtifactId,
        value: VoteValue,
    ) -> Result<Box<dyn PendingTx>, LedgerError> {
        let pending = self
            .chain
            .submit(self.account, ContractCall::Vote { artifact, value })?;
        Ok(Box::new(pending))
    }
}
