//! # Tessera Storage
//!
//! Content store clients for Tessera.
//!
//! ## Features
//!
//! - **InMemoryContentStore**: DashMap-backed store with failure injection,
//!   artificial latency and a pause gate, for tests and simulations
//! - **BlobStore**: file-based content-addressed storage (BLAKE3, sharded
//!   directories, atomic writes, hash verification on load)
//! - **BlobContentStore**: [`ContentStore`] over a [`BlobStore`], with a
//!   sidecar index of upload names
//!
//! Both stores derive the [`Cid`](tessera_core::Cid) from the BLAKE3 digest
//! of the payload, so identical bytes always map to the identical identifier.
//!
//! ## Example
//!
//! ```rust,ignore
//! use bytes::Bytes;
//! use tessera_core::ContentStore;
//! use tessera_storage::InMemoryContentStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = InMemoryContentStore::new();
//!     let cid = store.upload(Bytes::from_static(b"hello"), "note.txt").await.unwrap();
//!     assert_eq!(store.get(&cid).unwrap(), Bytes::from_static(b"hello"));
//! }
//! ```

pub mod blobs;
pub mod error;
pub mod memory;

// Re-exports
pub use blobs::{BlobContentStore, BlobStore, BlobStoreConfig, ContentRef, NameEntry};
pub use error::StorageError;
pub use memory::InMemoryContentStore;

// Re-export the trait this crate implements
pub use tessera_core::ContentStore;
