//! Ledger clients for the Tessera file/artifact contract
//!
//! Both implementations enforce the same [`ContractState`] rules:
//!
//! - [`InMemoryChain`]: a simulated chain with a mempool, instant or manual
//!   mining, and failure injection for tests
//! - [`RedbLedger`]: a durable single-node ledger backed by redb, used by the CLI

pub mod chain;
pub mod contract;
pub mod persistent;

pub use chain::{
    ChainConfig, ChainStats, InMemoryChain, InMemoryLedgerClient, InMemoryPendingTx, MiningMode,
};
pub use contract::{ArtifactRecord, ContractCall, ContractState};
pub use persistent::{MinedTx, RedbLedger, RedbLedgerClient, RedbLedgerConfig};
