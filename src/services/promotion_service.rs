//! Promotion records: list, create (upload + insert), delete.

use crate::{
    models::promotion::{Promotion, PromotionType},
    services::upload_service::{IncomingFile, UploadError, UploadService},
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Storage folder every promotion PDF is written under.
pub const UPLOAD_FOLDER: &str = "promotions";
pub const DEFAULT_TITLE: &str = "Untitled";

#[derive(Debug, Error)]
pub enum PromotionError {
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("promotion `{0}` not found")]
    NotFound(Uuid),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type PromotionResult<T> = Result<T, PromotionError>;

/// A validated create request.
#[derive(Debug)]
pub struct NewPromotion {
    pub kind: PromotionType,
    pub title: Option<String>,
    pub file: IncomingFile,
}

#[derive(Clone)]
pub struct PromotionService {
    db: Arc<SqlitePool>,
    uploads: UploadService,
}

impl PromotionService {
    pub fn new(db: Arc<SqlitePool>, uploads: UploadService) -> Self {
        Self { db, uploads }
    }

    /// All records, newest first.
    pub async fn list(&self) -> PromotionResult<Vec<Promotion>> {
        let rows = sqlx::query_as::<_, Promotion>(
            "SELECT id, type, title, file_path, created_at
             FROM promotions
             ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(&*self.db)
        .await?;
        Ok(rows)
    }

    /// Upload and verify the file, then insert the record.
    ///
    /// The record is only written after verification succeeds. If the insert
    /// fails, the uploaded object is discarded before the error is returned.
    pub async fn create(&self, new: NewPromotion) -> PromotionResult<Promotion> {
        let stored = self.uploads.upload_and_verify(&new.file, UPLOAD_FOLDER).await?;

        let title = new
            .title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        let inserted = sqlx::query_as::<_, Promotion>(
            "INSERT INTO promotions (id, type, title, file_path, created_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id, type, title, file_path, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(new.kind)
        .bind(&title)
        .bind(&stored.url)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await;

        match inserted {
            Ok(record) => {
                tracing::info!(
                    id = %record.id,
                    kind = %record.kind,
                    key = %stored.key,
                    size = stored.size,
                    "promotion created"
                );
                Ok(record)
            }
            Err(err) => {
                tracing::error!(key = %stored.key, "promotion insert failed: {}", err);
                self.uploads.discard(&stored.key).await;
                Err(PromotionError::Database(err))
            }
        }
    }

    /// Delete the record. The stored PDF is left in place.
    pub async fn delete(&self, id: Uuid) -> PromotionResult<()> {
        let result = sqlx::query("DELETE FROM promotions WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(PromotionError::NotFound(id));
        }
        tracing::info!(id = %id, "promotion deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        storage::ObjectStore,
        test_utils::{MemoryObjectStore, test_pool},
    };
    use bytes::Bytes;
    use chrono::{Duration, TimeZone};

    fn service(db: Arc<SqlitePool>, store: Arc<MemoryObjectStore>) -> PromotionService {
        PromotionService::new(db, UploadService::new(store))
    }

    fn pdf(size: usize) -> IncomingFile {
        IncomingFile {
            file_name: "catalog.pdf".into(),
            content_type: Some("application/pdf".into()),
            declared_size: size as u64,
            bytes: Bytes::from(vec![1u8; size]),
        }
    }

    async fn row_count(db: &SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM promotions")
            .fetch_one(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_defaults_title_and_points_at_object() {
        let db = Arc::new(test_pool().await);
        let store = Arc::new(MemoryObjectStore::default());
        let promotions = service(db.clone(), store.clone());

        let record = promotions
            .create(NewPromotion {
                kind: PromotionType::Advertisement,
                title: Some(String::new()),
                file: pdf(64),
            })
            .await
            .unwrap();

        assert_eq!(record.title, DEFAULT_TITLE);
        assert_eq!(record.kind, PromotionType::Advertisement);
        let key = store.keys().pop().unwrap();
        assert_eq!(record.file_path, store.public_url(&key));
        assert_eq!(row_count(&db).await, 1);
    }

    #[tokio::test]
    async fn insert_failure_discards_uploaded_object() {
        let db = Arc::new(test_pool().await);
        let store = Arc::new(MemoryObjectStore::default());
        let promotions = service(db.clone(), store.clone());
        sqlx::query("DROP TABLE promotions").execute(&*db).await.unwrap();

        let err = promotions
            .create(NewPromotion {
                kind: PromotionType::Promotion,
                title: Some("Summer".into()),
                file: pdf(32),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, PromotionError::Database(_)));
        assert_eq!(store.put_calls(), 1);
        assert_eq!(store.object_count(), 0);
    }

    #[tokio::test]
    async fn verification_failure_writes_no_row() {
        let db = Arc::new(test_pool().await);
        let store = Arc::new(MemoryObjectStore::default());
        store.truncate_writes_by(1);
        let promotions = service(db.clone(), store.clone());

        let err = promotions
            .create(NewPromotion {
                kind: PromotionType::BannerBack,
                title: None,
                file: pdf(32),
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            PromotionError::Upload(UploadError::TruncatedInStorage { .. })
        ));
        assert_eq!(row_count(&db).await, 0);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let db = Arc::new(test_pool().await);
        let promotions = service(db.clone(), Arc::new(MemoryObjectStore::default()));

        let base = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        for (title, offset_ms) in [("b", 1500), ("a", 0), ("d", 86_400_000), ("c", 1501)] {
            sqlx::query(
                "INSERT INTO promotions (id, type, title, file_path, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4())
            .bind(PromotionType::Promotion)
            .bind(title)
            .bind(format!("https://bucket.s3.amazonaws.com/promotions/{title}.pdf"))
            .bind(base + Duration::milliseconds(offset_ms))
            .execute(&*db)
            .await
            .unwrap();
        }

        let listed = promotions.list().await.unwrap();
        let titles: Vec<_> = listed.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["d", "c", "b", "a"]);
        assert!(listed.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[tokio::test]
    async fn delete_removes_row_but_keeps_object() {
        let db = Arc::new(test_pool().await);
        let store = Arc::new(MemoryObjectStore::default());
        let promotions = service(db.clone(), store.clone());
        let record = promotions
            .create(NewPromotion {
                kind: PromotionType::BannerFront,
                title: Some("Front".into()),
                file: pdf(16),
            })
            .await
            .unwrap();

        promotions.delete(record.id).await.unwrap();
        assert_eq!(row_count(&db).await, 0);
        assert_eq!(store.object_count(), 1);

        assert!(matches!(
            promotions.delete(record.id).await,
            Err(PromotionError::NotFound(_))
        ));
    }
}
