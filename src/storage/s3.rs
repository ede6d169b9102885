//! S3-compatible object storage using the AWS SDK.

use super::{ObjectMeta, ObjectStore, PutOutcome, StorageError, StorageResult};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{Client, config::Credentials, error::SdkError, primitives::ByteStream};
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use tracing::instrument;

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    /// Custom endpoint (MinIO etc.); `None` means AWS.
    endpoint: Option<String>,
}

impl std::fmt::Debug for S3ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ObjectStore")
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl S3ObjectStore {
    /// Create a client for `bucket`.
    ///
    /// With an explicit key pair the client signs with it; otherwise the AWS
    /// default credential chain is used. A custom endpoint switches to
    /// path-style addressing, which S3-compatible services expect.
    pub async fn new(
        bucket: &str,
        region: &str,
        access_key_id: Option<String>,
        secret_access_key: Option<String>,
        endpoint: Option<String>,
    ) -> Self {
        let endpoint = endpoint.map(|url| {
            let url = url.trim_end_matches('/');
            if url.starts_with("http://") || url.starts_with("https://") {
                url.to_string()
            } else {
                format!("http://{}", url)
            }
        });

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));
        if let (Some(key_id), Some(secret)) = (access_key_id, secret_access_key) {
            loader = loader.credentials_provider(Credentials::new(
                key_id,
                secret,
                None,
                None,
                "sales-pdf-config",
            ));
        }
        if let Some(url) = &endpoint {
            loader = loader.endpoint_url(url);
        }
        let shared = loader.load().await;

        let mut s3_config = aws_sdk_s3::config::Builder::from(&shared);
        if endpoint.is_some() {
            s3_config = s3_config.force_path_style(true);
        }

        Self {
            client: Client::from_conf(s3_config.build()),
            bucket: bucket.to_string(),
            endpoint,
        }
    }

    /// Convert an SDK error, mapping HTTP 404 to `NotFound`.
    fn map_sdk_error<E>(err: SdkError<E>, key: &str) -> StorageError
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        if let SdkError::ServiceError(ref service_err) = err
            && service_err.raw().status().as_u16() == 404
        {
            return StorageError::NotFound(key.to_string());
        }
        StorageError::S3(Box::new(err))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self, body), fields(backend = "s3", size = body.len()))]
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> StorageResult<PutOutcome> {
        // S3 recomputes the digest and rejects the write when the body it
        // received does not match.
        let content_md5 = general_purpose::STANDARD.encode(md5::compute(&body).0);
        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .content_length(body.len() as i64)
            .content_md5(content_md5)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, key))?;

        Ok(PutOutcome {
            etag: output.e_tag().map(|tag| tag.trim_matches('"').to_string()),
        })
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, key))?;

        Ok(ObjectMeta {
            size: output.content_length().unwrap_or(0).max(0) as u64,
            content_type: output.content_type().map(str::to_string),
        })
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn get(&self, key: &str) -> StorageResult<(ObjectMeta, Bytes)> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, key))?;

        let content_type = output.content_type().map(str::to_string);
        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::S3(Box::new(e)))?
            .into_bytes();

        let meta = ObjectMeta {
            size: bytes.len() as u64,
            content_type,
        };
        Ok((meta, bytes))
    }

    #[instrument(skip(self), fields(backend = "s3"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, key))?;
        Ok(())
    }

    async fn check(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| Self::map_sdk_error(e, &self.bucket))?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => format!("{}/{}/{}", endpoint, self.bucket, key),
            None => format!("https://{}.s3.amazonaws.com/{}", self.bucket, key),
        }
    }

    fn name(&self) -> &'static str {
        "s3"
    }
}
