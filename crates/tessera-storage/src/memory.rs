//! In-memory content store
//!
//! Suitable for testing and simulation environments. Besides plain storage it
//! can simulate an unreachable network, slow chunked uploads, and uploads
//! that hang until released.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

use tessera_core::{Cid, ContentStore, StoreError, UploadProgress};

/// In-memory implementation of [`ContentStore`]
///
/// Uses `DashMap` for concurrent access. Cloning is not supported; share it
/// behind an `Arc`.
#[derive(Debug)]
pub struct InMemoryContentStore {
    /// Stored payloads by content identifier
    blobs: DashMap<Cid, Bytes>,
    /// Name given at the most recent upload of each payload
    names: DashMap<Cid, String>,
    /// Number of upload attempts that reached the store
    uploads: AtomicUsize,
    available: AtomicBool,
    chunk_size: Option<usize>,
    chunk_delay: Option<Duration>,
    /// `true` while uploads are held before completion
    paused: watch::Sender<bool>,
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryContentStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            blobs: DashMap::new(),
            names: DashMap::new(),
            uploads: AtomicUsize::new(0),
            available: AtomicBool::new(true),
            chunk_size: None,
            chunk_delay: None,
            paused,
        }
    }

    /// Report progress every `chunk_size` bytes
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size.max(1));
        self
    }

    /// Sleep for `delay` after every chunk
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Simulate the network going down or coming back
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Hold every upload before it completes until [`resume`](Self::resume)
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    /// Release held uploads
    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// Number of upload calls that reached the store
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    /// Number of distinct payloads stored
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }

    pub fn get(&self, cid: &Cid) -> Option<Bytes> {
        self.blobs.get(cid).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, cid: &Cid) -> bool {
        self.blobs.contains_key(cid)
    }

    pub fn name_of(&self, cid: &Cid) -> Option<String> {
        self.names.get(cid).map(|entry| entry.value().clone())
    }

    async fn wait_until_released(&self) -> Result<(), StoreError> {
        let mut rx = self.paused.subscribe();
        rx.wait_for(|paused| !*paused)
            .await
            .map_err(|_| StoreError::Unavailable("store shut down".to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn upload(&self, payload: Bytes, name: &str) -> Result<Cid, StoreError> {
        let (tx, _rx) = mpsc::unbounded_channel();
        self.upload_with_progress(payload, name, tx).await
    }

    async fn upload_with_progress(
        &self,
        payload: Bytes,
        name: &str,
        progress: mpsc::UnboundedSender<UploadProgress>,
    ) -> Result<Cid, StoreError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);

        if !self.available.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("content network unreachable".into()));
        }
        if payload.is_empty() {
            return Err(StoreError::Rejected("empty payload".into()));
        }

        let total = payload.len() as u64;
        let chunk_size = self.chunk_size.unwrap_or(payload.len());
        let mut bytes_done = 0u64;
        for chunk in payload.chunks(chunk_size) {
            bytes_done += chunk.len() as u64;
            trace!(name, bytes_done, total, "Upload chunk");
            let _ = progress.send(UploadProgress::Chunk { bytes_done, total });
            if let Some(delay) = self.chunk_delay {
                tokio::time::sleep(delay).await;
            }
        }

        self.wait_until_released().await?;

        let cid = Cid::for_content(&payload);
        self.blobs.insert(cid.clone(), payload);
        self.names.insert(cid.clone(), name.to_string());
        debug!(name, cid = %cid.short(), size = total, "Stored payload");

        let _ = progress.send(UploadProgress::Completed { cid: cid.clone() });
        Ok(cid)
    }
}
