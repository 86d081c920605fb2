//! [`ContentStore`] over a local [`BlobStore`]
//!
//! Upload names are not part of the content address, so they are kept in a
//! sidecar `names.json` next to the blobs.

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use tessera_core::{Cid, ContentStore, StoreError, UploadProgress};

use super::content_ref::ContentRef;
use super::store::{BlobStore, BlobStoreConfig};
use crate::error::StorageError;

const NAME_INDEX_FILE: &str = "names.json";

/// Bytes hashed between two progress events
const PROGRESS_CHUNK: usize = 64 * 1024;

/// Name index entry for one stored blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameEntry {
    /// Name given at the most recent upload
    pub name: String,
    pub size: u64,
    pub stored_at: DateTime<Utc>,
}

/// File-backed content store
pub struct BlobContentStore {
    blobs: BlobStore,
    index_path: PathBuf,
    names: Mutex<BTreeMap<Cid, NameEntry>>,
}

impl BlobContentStore {
    /// Open the store, loading the name index if one exists
    pub async fn open(config: BlobStoreConfig) -> Result<Self, StorageError> {
        let index_path = config.base_dir.join(NAME_INDEX_FILE);
        let blobs = BlobStore::new(config).await?;

        let names = match fs::read(&index_path).await {
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            blobs,
            index_path,
            names: Mutex::new(names),
        })
    }

    pub fn blob_store(&self) -> &BlobStore {
        &self.blobs
    }

    /// Load a payload by content identifier
    pub async fn load(&self, cid: &Cid) -> Result<Bytes, StorageError> {
        let hash = ContentRef::hash_from_cid(cid)?;
        self.blobs.load(&hash).await
    }

    pub fn entry(&self, cid: &Cid) -> Option<NameEntry> {
        self.names.lock().get(cid).cloned()
    }

    /// All indexed blobs, ordered by cid
    pub fn entries(&self) -> Vec<(Cid, NameEntry)> {
        self.names
            .lock()
            .iter()
            .map(|(cid, entry)| (cid.clone(), entry.clone()))
            .collect()
    }

    async fn record_name(&self, cid: &Cid, name: &str, size: u64) -> Result<(), StorageError> {
        let encoded = {
            let mut names = self.names.lock();
            names.insert(
                cid.clone(),
                NameEntry {
                    name: name.to_string(),
                    size,
                    stored_at: Utc::now(),
                },
            );
            serde_json::to_vec_pretty(&*names)?
        };

        let temp_path = self.index_path.with_extension("json.tmp");
        fs::write(&temp_path, encoded).await?;
        fs::rename(&temp_path, &self.index_path).await?;
        Ok(())
    }
}

#[async_trait]
impl ContentStore for BlobContentStore {
    async fn upload(&self, payload: Bytes, name: &str) -> Result<Cid, StoreError> {
        let (tx, _rx) = mpsc::unbounded_channel();
        self.upload_with_progress(payload, name, tx).await
    }

    #[instrument(skip(self, payload, progress), fields(size = payload.len()))]
    async fn upload_with_progress(
        &self,
        payload: Bytes,
        name: &str,
        progress: mpsc::UnboundedSender<UploadProgress>,
    ) -> Result<Cid, StoreError> {
        let total = payload.len() as u64;
        self.blobs.check_payload(total)?;

        let mut hasher = blake3::Hasher::new();
        let mut bytes_done = 0u64;
        for chunk in payload.chunks(PROGRESS_CHUNK) {
            hasher.update(chunk);
            bytes_done += chunk.len() as u64;
            let _ = progress.send(UploadProgress::Chunk { bytes_done, total });
        }
        let expected = Cid::from_digest(hasher.finalize().as_bytes());

        let content_ref = self.blobs.store(&payload).await?;
        let cid = content_ref.cid();
        debug_assert_eq!(cid, expected);

        self.record_name(&cid, name, total).await?;
        info!(cid = %cid.short(), "Uploaded blob");

        let _ = progress.send(UploadProgress::Completed { cid: cid.clone() });
        Ok(cid)
    }
}

impl std::fmt::Debug for BlobContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobContentStore")
            .field("base_dir", &self.blobs.config().base_dir)
            .field("indexed", &self.names.lock().len())
            .finish()
    }
}
