//! Sharded on-disk blob directory
//!
//! Blobs live at `{base_dir}/{h[0..2]}/{h[2..4]}/{h}` where `h` is the hex
//! BLAKE3 digest. Writes go through a `.partial` file and a rename, so a
//! blob path either holds the full payload or does not exist.

use std::io::ErrorKind;
use std::path::PathBuf;

use bytes::Bytes;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

use super::content_ref::ContentRef;
use crate::error::StorageError;

#[derive(Debug, Clone)]
pub struct BlobStoreConfig {
    pub base_dir: PathBuf,
    /// Directory levels of two hex chars each
    pub shard_depth: u8,
    /// Largest accepted payload in bytes
    pub max_blob_size: u64,
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("./tessera-data/blobs"),
            shard_depth: 2,
            max_blob_size: 100 * 1024 * 1024,
        }
    }
}

/// Content-addressed blob directory
#[derive(Debug)]
pub struct BlobStore {
    config: BlobStoreConfig,
}

impl BlobStore {
    pub async fn new(config: BlobStoreConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.base_dir).await?;
        info!(path = %config.base_dir.display(), "Opened blob directory");
        Ok(Self { config })
    }

    pub fn config(&self) -> &BlobStoreConfig {
        &self.config
    }

    /// Reject sizes the store never accepts, before any bytes are written
    pub fn check_payload(&self, size: u64) -> Result<(), StorageError> {
        match size {
            0 => Err(StorageError::EmptyPayload),
            size if size > self.config.max_blob_size => Err(StorageError::CapacityExceeded {
                size,
                max: self.config.max_blob_size,
            }),
            _ => Ok(()),
        }
    }

    /// Write `data` unless an identical blob is already present.
    #[instrument(skip_all, fields(size = data.len()))]
    pub async fn store(&self, data: &[u8]) -> Result<ContentRef, StorageError> {
        self.check_payload(data.len() as u64)?;
        let content_ref = ContentRef::from_data(data);
        let path = self.path_of(&content_ref.hash);

        if fs::try_exists(&path).await? {
            debug!(hash = %content_ref.short_hash(), "Blob present, skipping write");
            return Ok(content_ref);
        }

        if let Some(shard) = path.parent() {
            fs::create_dir_all(shard).await?;
        }
        let partial = path.with_extension("partial");
        fs::write(&partial, data).await?;
        fs::rename(&partial, &path).await?;

        debug!(hash = %content_ref.short_hash(), "Wrote blob");
        Ok(content_ref)
    }

    /// Read a blob back, checking it still hashes to `hash`.
    pub async fn load(&self, hash: &[u8; 32]) -> Result<Bytes, StorageError> {
        let data = match fs::read(self.path_of(hash)).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::not_found(hex::encode(hash)));
            }
            Err(e) => return Err(e.into()),
        };

        if blake3::hash(&data).as_bytes() != hash {
            warn!(hash = %hex::encode(hash), "Blob on disk is corrupt");
            return Err(StorageError::HashMismatch(hex::encode(hash)));
        }
        Ok(Bytes::from(data))
    }

    fn path_of(&self, hash: &[u8; 32]) -> PathBuf {
        let name = hex::encode(hash);
        let mut path = self.config.base_dir.clone();
        for shard in name.as_bytes().chunks(2).take(self.config.shard_depth as usize) {
            // Hex digits are ASCII
            path.push(String::from_utf8_lossy(shard).as_ref());
        }
        path.push(&name);
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn blob_store(temp: &TempDir, max_blob_size: u64) -> BlobStore {
        BlobStore::new(BlobStoreConfig {
            base_dir: temp.path().join("blobs"),
            max_blob_size,
            ..Default::default()
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_blob_lands_in_shard_directory() {
        let temp = TempDir::new().unwrap();
        let store = blob_store(&temp, 1024).await;

        let stored = store.store(b"hello").await.unwrap();
        let hex = stored.hash_hex();
        let expected = temp
            .path()
            .join("blobs")
            .join(&hex[0..2])
            .join(&hex[2..4])
            .join(&hex);
        assert!(expected.is_file());
        assert_eq!(stored.size, 5);
        assert_eq!(&store.load(&stored.hash).await.unwrap()[..], b"hello");
    }

    #[tokio::test]
    async fn test_identical_payloads_share_one_blob() {
        let temp = TempDir::new().unwrap();
        let store = blob_store(&temp, 1024).await;

        let first = store.store(b"same bytes").await.unwrap();
        let second = store.store(b"same bytes").await.unwrap();
        store.store(b"other bytes").await.unwrap();

        assert_eq!(first, second);
        let path = store.path_of(&first.hash);
        assert!(path.is_file());
        assert!(!path.with_extension("partial").exists());
    }

    #[tokio::test]
    async fn test_corrupt_blob_is_detected() {
        let temp = TempDir::new().unwrap();
        let store = blob_store(&temp, 1024).await;

        let stored = store.store(b"original").await.unwrap();
        fs::write(store.path_of(&stored.hash), b"tampered").await.unwrap();

        assert!(matches!(
            store.load(&stored.hash).await,
            Err(StorageError::HashMismatch(_))
        ));
    }

    #[tokio::test]
    async fn test_payload_limits() {
        let temp = TempDir::new().unwrap();
        let store = blob_store(&temp, 8).await;

        assert!(matches!(store.store(b"").await, Err(StorageError::EmptyPayload)));
        assert!(matches!(
            store.store(b"too large for this").await,
            Err(StorageError::CapacityExceeded { max: 8, .. })
        ));
        let fits = store.store(b"fits").await.unwrap();
        assert!(store.path_of(&fits.hash).is_file());
        // Only the accepted payload created a shard
        let shards = std::fs::read_dir(temp.path().join("blobs")).unwrap().count();
        assert_eq!(shards, 1);
    }

    #[tokio::test]
    async fn test_load_missing() {
        let temp = TempDir::new().unwrap();
        let store = blob_store(&temp, 1024).await;
        assert!(matches!(
            store.load(&[7u8; 32]).await,
            Err(StorageError::NotFound(_))
        ));
    }
}
