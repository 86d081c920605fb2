//! State-transition notifications
//!
//! Every orchestrated operation gets an [`OperationId`] and publishes one
//! [`SyncEvent`] per transition on a broadcast channel. Slow subscribers
//! lose old events (`Lagged`) but never hold an operation back.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use tessera_core::{AccountId, ArtifactId, Receipt, TxHash, VoteValue};

use crate::error::{ErrorKind, Stage, SyncError};

/// Session-local, monotonically increasing operation number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationId(pub u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// What an operation does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    Register,
    AddArtifact,
    AddComment { target: ArtifactId },
    Vote { artifact: ArtifactId, value: VoteValue },
}

/// Transition an operation went through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationState {
    /// Upload started; still abortable
    Uploading,
    UploadProgress { done: u64, total: u64 },
    /// Transaction submitted; irrevocable from here on
    Submitted { tx: TxHash },
    Confirmed { receipt: Receipt },
    Failed {
        stage: Option<Stage>,
        kind: ErrorKind,
    },
}

impl OperationState {
    pub fn failed(err: &SyncError) -> Self {
        OperationState::Failed {
            stage: err.stage(),
            kind: err.kind(),
        }
    }

    /// Whether no further events follow for this operation
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OperationState::Confirmed { .. } | OperationState::Failed { .. }
        )
    }
}

/// A state-transition notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncEvent {
    pub op: OperationId,
    pub account: AccountId,
    pub kind: OperationKind,
    pub state: OperationState,
}

/// Broadcast hub shared by the orchestrators of one session.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
    next_op: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            tx,
            next_op: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    /// Allocate an id for a new operation.
    pub fn begin(&self, account: AccountId, kind: OperationKind) -> Operation {
        let op = OperationId(self.next_op.fetch_add(1, Ordering::SeqCst));
        Operation {
            bus: self.clone(),
            op,
            account,
            kind,
        }
    }

    fn publish(&self, event: SyncEvent) {
        // No subscribers is not an error
        let _ = self.tx.send(event);
    }
}

/// Emitter bound to one operation.
#[derive(Debug, Clone)]
pub struct Operation {
    bus: EventBus,
    op: OperationId,
    account: AccountId,
    kind: OperationKind,
}

impl Operation {
    pub fn id(&self) -> OperationId {
        self.op
    }

    pub fn emit(&self, state: OperationState) {
        debug!(op = %self.op, account = %self.account.short_id(), ?state, "Transition");
        self.bus.publish(SyncEvent {
            op: self.op,
            account: self.account,
            kind: self.kind.clone(),
            state,
        });
    }
}

/// Convert a broadcast receiver into an async Stream.
///
/// Lagged gaps are skipped; the stream ends when every sender is gone.
pub fn broadcast_to_stream<T: Clone + Send + 'static>(
    mut rx: broadcast::Receiver<T>,
) -> Pin<Box<dyn Stream<Item = T> + Send>> {
    Box::pin(async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(item) => yield item,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
