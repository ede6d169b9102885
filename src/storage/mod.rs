//! Object storage backends for uploaded PDFs.
//!
//! The upload workflow only needs four primitives: write an object, read its
//! metadata back without the body, delete it, and derive its public URL.
//! Two backends implement them:
//! - [`s3::S3ObjectStore`] for AWS S3 (or any S3-compatible endpoint)
//! - [`local::LocalObjectStore`] for development, storing payloads on disk

pub mod local;
pub mod s3;

use crate::config::StorageConfig;
use async_trait::async_trait;
use bytes::Bytes;
use std::{io, sync::Arc};
use thiserror::Error;

const MAX_OBJECT_KEY_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("invalid object key `{0}`")]
    InvalidKey(String),
    #[error("S3 error: {0}")]
    S3(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Attributes returned by a metadata-only read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Content length as reported by the backend.
    pub size: u64,
    pub content_type: Option<String>,
}

/// What the backend reported after accepting a write.
#[derive(Debug, Clone, Default)]
pub struct PutOutcome {
    pub etag: Option<String>,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `body` under `key`, replacing any existing object.
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> StorageResult<PutOutcome>;

    /// Metadata-only read of an object.
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta>;

    /// Full read of an object.
    async fn get(&self, key: &str) -> StorageResult<(ObjectMeta, Bytes)>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Cheap connectivity check used by the readiness probe.
    async fn check(&self) -> StorageResult<()>;

    /// Deterministic public URL of `key`. No signing, no expiry.
    fn public_url(&self, key: &str) -> String;

    /// Short backend name for logs and probes.
    fn name(&self) -> &'static str;

    /// Whether objects are served by this service under `/files/{key}`.
    fn serves_files(&self) -> bool {
        false
    }
}

/// Build the configured backend.
pub async fn from_config(cfg: &StorageConfig) -> anyhow::Result<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match cfg {
        StorageConfig::Local {
            dir,
            public_base_url,
        } => Arc::new(local::LocalObjectStore::create(dir.clone(), public_base_url.clone()).await?),
        StorageConfig::S3 {
            bucket,
            region,
            access_key_id,
            secret_access_key,
            endpoint,
        } => Arc::new(
            s3::S3ObjectStore::new(
                bucket,
                region,
                access_key_id.clone(),
                secret_access_key.clone(),
                endpoint.clone(),
            )
            .await,
        ),
    };
    tracing::info!(backend = store.name(), "object storage initialised");
    Ok(store)
}

/// Basic key validation to avoid trivial path traversal vectors.
///
/// Rejects empty or oversized keys, keys that begin with `/`, keys containing
/// `..`, backslashes or control characters.
pub fn ensure_key_safe(key: &str) -> StorageResult<()> {
    let invalid = key.is_empty()
        || key.len() > MAX_OBJECT_KEY_LEN
        || key.starts_with('/')
        || key.contains("..")
        || key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\');
    if invalid {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_nested_keys() {
        assert!(ensure_key_safe("promotions/1700000000000-abc-flyer.pdf").is_ok());
    }

    #[test]
    fn rejects_traversal_and_control_bytes() {
        for key in ["", "/etc/passwd", "promotions/../secret", "a\\b", "a\nb"] {
            assert!(
                matches!(ensure_key_safe(key), Err(StorageError::InvalidKey(_))),
                "{key:?}"
            );
        }
        assert!(ensure_key_safe(&"k".repeat(MAX_OBJECT_KEY_LEN + 1)).is_err());
    }
}
