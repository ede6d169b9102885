//! Upload-and-verify workflow.
//!
//! A payload is only reported as stored once both boundaries agree with the
//! size the client declared:
//! 1. the bytes this server actually received, checked before any write;
//! 2. the content length object storage reports for the written key,
//!    checked with a metadata-only read right after the write.
//!
//! Either mismatch fails the upload. A mismatch at (2) leaves the written
//! object in place; callers that abandon a verified object later use
//! [`UploadService::discard`].

use crate::storage::{ObjectStore, StorageError};
use bytes::Bytes;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

const DEFAULT_CONTENT_TYPE: &str = "application/pdf";
const MAX_FILE_NAME_LEN: usize = 200;

/// A file payload as received from the client, fully buffered.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub file_name: String,
    pub content_type: Option<String>,
    /// Byte length the client claims to have sent.
    pub declared_size: u64,
    pub bytes: Bytes,
}

/// A verified object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
    pub size: u64,
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("File upload truncated on server (before storage)")]
    TruncatedBeforeStorage { declared: u64, received: u64 },
    #[error("File upload truncated in storage")]
    TruncatedInStorage { declared: u64, stored: u64 },
    #[error("File upload failed")]
    Storage(#[from] StorageError),
}

#[derive(Clone)]
pub struct UploadService {
    store: Arc<dyn ObjectStore>,
}

impl UploadService {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Store `file` under `folder` and verify what storage kept.
    pub async fn upload_and_verify(
        &self,
        file: &IncomingFile,
        folder: &str,
    ) -> Result<StoredObject, UploadError> {
        let received = file.bytes.len() as u64;
        if received != file.declared_size {
            tracing::error!(
                file_name = %file.file_name,
                declared_size = file.declared_size,
                received_size = received,
                "upload truncated before storage"
            );
            return Err(UploadError::TruncatedBeforeStorage {
                declared: file.declared_size,
                received,
            });
        }

        let key = object_key(folder, &file.file_name, Utc::now().timestamp_millis(), Uuid::new_v4());
        let content_type = file
            .content_type
            .as_deref()
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE);

        let outcome = self
            .store
            .put(&key, file.bytes.clone(), content_type)
            .await
            .inspect_err(|err| tracing::error!(key = %key, "object write failed: {}", err))?;

        let meta = self
            .store
            .head(&key)
            .await
            .inspect_err(|err| tracing::error!(key = %key, "object read-back failed: {}", err))?;

        if meta.size != file.declared_size {
            tracing::error!(
                file_name = %file.file_name,
                key = %key,
                declared_size = file.declared_size,
                stored_size = meta.size,
                "upload truncated in storage"
            );
            return Err(UploadError::TruncatedInStorage {
                declared: file.declared_size,
                stored: meta.size,
            });
        }

        tracing::info!(
            key = %key,
            size = meta.size,
            etag = outcome.etag.as_deref().unwrap_or(""),
            backend = self.store.name(),
            "upload verified"
        );

        Ok(StoredObject {
            url: self.store.public_url(&key),
            key,
            size: meta.size,
        })
    }

    /// Best-effort removal of an object nobody will reference. Failures are
    /// logged, never returned.
    pub async fn discard(&self, key: &str) {
        match self.store.delete(key).await {
            Ok(()) => tracing::info!(key = %key, "discarded orphaned upload"),
            Err(err) => tracing::warn!(key = %key, "failed to discard orphaned upload: {}", err),
        }
    }
}

/// `{folder}/{epoch-millis}-{uuid}-{sanitized file name}`.
pub fn object_key(folder: &str, file_name: &str, epoch_millis: i64, id: Uuid) -> String {
    format!(
        "{}/{}-{}-{}",
        folder.trim_matches('/'),
        epoch_millis,
        id.simple(),
        sanitize_file_name(file_name)
    )
}

/// Reduce a client-supplied file name to a safe key segment.
pub fn sanitize_file_name(name: &str) -> String {
    let mut cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    while cleaned.contains("..") {
        cleaned = cleaned.replace("..", ".");
    }
    cleaned = cleaned.trim_start_matches('.').to_string();
    // all ASCII at this point, so byte truncation stays on a char boundary
    cleaned.truncate(MAX_FILE_NAME_LEN);
    if cleaned.is_empty() {
        cleaned.push_str("file");
    }
    cleaned
}
