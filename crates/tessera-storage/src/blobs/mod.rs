//! Content-addressed blob storage
//!
//! File-based storage for uploaded payloads, hashed with BLAKE3.

mod content_ref;
mod content_store;
mod store;

pub use content_ref::ContentRef;
pub use content_store::{BlobContentStore, NameEntry};
pub use store::{BlobStore, BlobStoreConfig};
