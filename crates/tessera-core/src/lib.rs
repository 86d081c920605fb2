//! # Tessera Core
//!
//! Core types, collaborator traits, and errors shared by every Tessera crate.
//!
//! Tessera ties an off-chain content-addressing step (payload → [`Cid`]) to an
//! on-chain state mutation (cid → ledger record). The crates above this one
//! orchestrate that sequence; this crate only defines the vocabulary and the
//! seams where the outside world plugs in.
//!
//! ## Key Traits
//!
//! - [`ContentStore`]: Upload a payload to a content-addressed network
//! - [`LedgerClient`]: Read and write the on-chain file/artifact contract
//! - [`PendingTx`]: A submitted transaction that must be awaited to confirmation
//!
//! ## Key Types
//!
//! - [`AccountId`]: Ledger identity of a signer
//! - [`Cid`]: Opaque content identifier, with the all-zero "no file" sentinel
//! - [`Artifact`], [`Comment`], [`VoteValue`]: The session artifact model
//! - [`Receipt`], [`TxHash`]: Confirmation data surfaced by the ledger

pub mod artifact;
pub mod cid;
pub mod error;
pub mod identity;
pub mod traits;
pub mod tx;

// Re-export main types
pub use artifact::*;
pub use cid::*;
pub use error::*;
pub use identity::*;
pub use traits::*;
pub use tx::*;
