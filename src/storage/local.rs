//! Local-disk object storage.
//!
//! Payloads are sharded beneath `base_path/{shard}/{shard}/{key}` so no single
//! directory grows unbounded. Writes go to a temporary file that is fsynced and
//! renamed into place, so a reader never observes a partial object.

use super::{ObjectMeta, ObjectStore, PutOutcome, StorageError, StorageResult, ensure_key_safe};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    /// Base directory on disk where object payloads are stored.
    base_path: PathBuf,
    /// Prefix for public URLs, without trailing slash.
    public_base_url: String,
}

impl LocalObjectStore {
    /// Create the store, making sure `base_path` exists.
    pub async fn create(
        base_path: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> io::Result<Self> {
        let base_path = base_path.into();
        if !base_path.exists() {
            fs::create_dir_all(&base_path).await?;
            tracing::info!("Created storage directory at {}", base_path.display());
        }
        Ok(Self {
            base_path,
            public_base_url: public_base_url.into(),
        })
    }

    /// Two-level shard identifiers: the first two bytes of MD5(key) as
    /// lowercase hex (00-ff).
    fn object_shards(key: &str) -> (String, String) {
        let digest = md5::compute(key);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Fully-qualified payload path. Parent directories may not exist yet.
    fn object_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(key);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    /// Remove empty directories from `start` up to (not including) the base.
    async fn prune_empty_dirs(&self, start: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(&self.base_path) && current != self.base_path {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }

    fn not_found_or_io(key: &str, err: io::Error) -> StorageError {
        if err.kind() == ErrorKind::NotFound {
            StorageError::NotFound(key.to_string())
        } else {
            StorageError::Io(err)
        }
    }

    fn guess_content_type(key: &str) -> Option<String> {
        mime_guess::from_path(key).first().map(|m| m.to_string())
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, body: Bytes, _content_type: &str) -> StorageResult<PutOutcome> {
        ensure_key_safe(key)?;

        let file_path = self.object_path(key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::other("object path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;

        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let write = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(&body).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, &file_path).await
        };
        if let Err(err) = write.await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        Ok(PutOutcome {
            etag: Some(format!("{:x}", md5::compute(&body))),
        })
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        ensure_key_safe(key)?;
        let meta = fs::metadata(self.object_path(key))
            .await
            .map_err(|err| Self::not_found_or_io(key, err))?;
        if !meta.is_file() {
            return Err(StorageError::NotFound(key.to_string()));
        }
        Ok(ObjectMeta {
            size: meta.len(),
            content_type: Self::guess_content_type(key),
        })
    }

    async fn get(&self, key: &str) -> StorageResult<(ObjectMeta, Bytes)> {
        ensure_key_safe(key)?;
        let bytes = fs::read(self.object_path(key))
            .await
            .map_err(|err| Self::not_found_or_io(key, err))?;
        let meta = ObjectMeta {
            size: bytes.len() as u64,
            content_type: Self::guess_content_type(key),
        };
        Ok((meta, Bytes::from(bytes)))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(StorageError::Io(err)),
        }
        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent).await;
        }
        Ok(())
    }

    /// Best-effort write/read/delete of a probe file under the base path.
    async fn check(&self) -> StorageResult<()> {
        let tmp_path = self.base_path.join(format!(".readyz-{}", Uuid::new_v4()));
        fs::write(&tmp_path, b"readyz").await?;
        let read = fs::read(&tmp_path).await;
        let _ = fs::remove_file(&tmp_path).await;
        if read? != b"readyz" {
            return Err(StorageError::Io(io::Error::other("file content mismatch")));
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    fn name(&self) -> &'static str {
        "local"
    }

    fn serves_files(&self) -> bool {
        true
    }
}
