//! # Tessera Sync
//!
//! The content-registration synchronization core.
//!
//! Ties an off-chain upload (payload → cid) to an on-chain write
//! (cid → ledger record) and keeps a local reflection of confirmed ledger
//! state for read paths.
//!
//! ## Guarantees
//!
//! - The reflection cache only ever holds values read from the ledger or
//!   confirmed by a receipt; a failed write leaves it exactly as it was
//! - One registration in flight per account
//! - No silent retries; every error carries a kind and a stage
//! - Vote values are validated before any network call
//!
//! ## Components
//!
//! - [`RegistrationOrchestrator`]: `upload → setFile → confirm → reflect`
//! - [`ArtifactCoordinator`]: artifacts, comments, and votes
//! - [`ReflectionCache`]: block-versioned account → file and id → artifact
//! - [`Session`]: the facade the presentation layer talks to
//!
//! State transitions are published as [`SyncEvent`]s.

pub mod artifacts;
pub mod cache;
pub mod config;
pub mod error;
pub mod event;
mod pipeline;
pub mod registration;
pub mod session;

pub use artifacts::{ArtifactCoordinator, ArtifactOutcome};
pub use cache::ReflectionCache;
pub use config::SyncConfig;
pub use error::{ErrorKind, Result, Stage, SyncError};
pub use event::{
    EventBus, Operation, OperationId, OperationKind, OperationState, SyncEvent,
    broadcast_to_stream,
};
pub use registration::{Registration, RegistrationOrchestrator, RegistrationPhase};
pub use session::Session;
