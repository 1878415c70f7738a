use std::{collections::HashMap, io::ErrorKind, path::{Component, Path, PathBuf}};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub const DEFAULT_UPLOAD_NAME: &str = "image.png";
pub const DEFAULT_CONTENT_TYPE: &str = "image/png";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid storage key: {0}")] InvalidKey(String),
    #[error("storage write failed: {0}")] Io(#[from] std::io::Error),
    #[error("storage metadata failed: {0}")] Metadata(#[from] serde_json::Error),
}

/// Metadata stored next to each blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMeta {
    pub content_type: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Bytes, meta: BlobMeta) -> Result<(), StorageError>;

    /// `Ok(None)` when nothing is stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<(Bytes, BlobMeta)>, StorageError>;
}

/// Last path segment of a client-supplied filename, split on `/` and `\`.
fn base_name(filename: &str) -> Option<&str> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or_default();
    match name {
        "" | "." | ".." => None,
        name => Some(name),
    }
}

/// `uploads/{unix-millis}-{filename}`
pub fn upload_key(now: DateTime<Utc>, filename: Option<&str>) -> String {
    let name = filename.and_then(base_name).unwrap_or(DEFAULT_UPLOAD_NAME);
    format!("uploads/{}-{}", now.timestamp_millis(), name)
}

pub fn public_link(base_url: &str, key: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), key)
}

/// Writes blobs under a root directory, with a `.meta.json` sidecar per key.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let rel = Path::new(key);
        let clean = !key.is_empty() && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(rel))
    }

    fn sidecar(path: &Path) -> PathBuf {
        let mut sidecar = path.as_os_str().to_os_string();
        sidecar.push(".meta.json");
        PathBuf::from(sidecar)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: Bytes, meta: BlobMeta) -> Result<(), StorageError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;
        tokio::fs::write(Self::sidecar(&path), serde_json::to_vec(&meta)?).await?;

        info!("💾 Stored {} bytes at {}", bytes.len(), key);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<(Bytes, BlobMeta)>, StorageError> {
        let path = self.resolve(key)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let meta = match tokio::fs::read(Self::sidecar(&path)).await {
            Ok(raw) => serde_json::from_slice(&raw)?,
            Err(e) if e.kind() == ErrorKind::NotFound => BlobMeta { content_type: DEFAULT_CONTENT_TYPE.to_string() },
            Err(e) => return Err(e.into()),
        };
        Ok(Some((bytes, meta)))
    }
}

/// Keeps blobs in process memory; contents are lost on restart.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, (Bytes, BlobMeta)>>,
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: Bytes, meta: BlobMeta) -> Result<(), StorageError> {
        info!("💾 Stored {} bytes in memory at {}", bytes.len(), key);
        self.blobs.write().insert(key.to_string(), (bytes, meta));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<(Bytes, BlobMeta)>, StorageError> {
        Ok(self.blobs.read().get(key).cloned())
    }
}
