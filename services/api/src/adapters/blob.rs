//! services/api/src/adapters/blob.rs
//!
//! A filesystem implementation of the `BlobStorageService` port. Each blob is
//! stored at `{root}/{key}` with a `{key}.meta.json` sidecar that records its
//! content type and custom metadata.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use study_planner_core::ports::{BlobStorageService, PortError, PortResult, StoredBlob};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Serialize, Deserialize)]
struct BlobMeta {
    content_type: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// Stores blobs in a directory tree and hands out URLs served by `/blobs/{*key}`.
#[derive(Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }

    /// Creates the root directory so the first upload does not race on it.
    pub async fn ensure_root(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.root).await
    }

    pub fn url_for(&self, key: &str) -> String {
        format!("{}/blobs/{}", self.public_base_url, key)
    }

    fn paths(&self, key: &str) -> PortResult<(PathBuf, PathBuf)> {
        validate_key(key)?;
        let data = self.root.join(key);
        let meta = self.root.join(format!("{key}.meta.json"));
        Ok((data, meta))
    }
}

/// Keys are relative, `/`-separated paths without `.` or `..` segments.
pub fn validate_key(key: &str) -> PortResult<()> {
    let clean = !key.is_empty()
        && !key.ends_with(".meta.json")
        && key
            .split('/')
            .all(|s| !s.is_empty() && s != "." && s != ".." && !s.contains('\\'));
    if clean {
        Ok(())
    } else {
        Err(PortError::NotFound(format!("Invalid blob key '{}'", key)))
    }
}

/// A unique sibling of `path`, built from its full file name.
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{name}.{}.tmp", Uuid::new_v4().simple()))
}

async fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let tmp = temp_path(path);
    let mut file = fs::File::create(&tmp).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(&tmp, path).await
}

fn io_error(key: &str, e: std::io::Error) -> PortError {
    if e.kind() == std::io::ErrorKind::NotFound {
        PortError::NotFound(format!("Blob {} not found", key))
    } else {
        PortError::Unexpected(e.to_string())
    }
}

#[async_trait]
impl BlobStorageService for FsBlobStore {
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        metadata: &HashMap<String, String>,
    ) -> PortResult<String> {
        let (data_path, meta_path) = self.paths(key)?;
        debug!(key = %key, size = data.len(), "blob_store: put");

        let meta = serde_json::to_vec(&BlobMeta {
            content_type: content_type.to_string(),
            metadata: metadata.clone(),
        })
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        write_atomic(&data_path, data).await.map_err(|e| {
            warn!(key = %key, error = %e, "blob_store: write failed");
            io_error(key, e)
        })?;
        write_atomic(&meta_path, &meta)
            .await
            .map_err(|e| io_error(key, e))?;

        Ok(self.url_for(key))
    }

    async fn get(&self, key: &str) -> PortResult<StoredBlob> {
        let (data_path, meta_path) = self.paths(key)?;
        let data = fs::read(&data_path).await.map_err(|e| io_error(key, e))?;
        let content_type = match fs::read(&meta_path).await {
            Ok(raw) => serde_json::from_slice::<BlobMeta>(&raw)
                .map(|m| m.content_type)
                .unwrap_or_else(|_| "application/octet-stream".to_string()),
            Err(_) => "application/octet-stream".to_string(),
        };
        Ok(StoredBlob { data, content_type })
    }

    async fn delete(&self, key: &str) -> PortResult<()> {
        let (data_path, meta_path) = self.paths(key)?;
        fs::remove_file(&data_path)
            .await
            .map_err(|e| io_error(key, e))?;
        if let Err(e) = fs::remove_file(&meta_path).await {
            debug!(key = %key, error = %e, "blob_store: metadata sidecar already gone");
        }
        Ok(())
    }
}
