//! HTTP handlers for `/api/non-product-pages`.
//!
//! Create buffers the multipart `file` part, validates the form and hands the
//! payload to `PromotionService`, which uploads, verifies and then inserts.

use crate::{
    errors::AppError,
    models::promotion::{Promotion, PromotionType},
    services::{
        promotion_service::{NewPromotion, PromotionError},
        upload_service::IncomingFile,
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{
        Multipart, Query, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub id: Option<String>,
}

/// Raw form fields, collected before any validation.
#[derive(Default)]
struct CreateForm {
    kind: Option<String>,
    title: Option<String>,
    size: Option<String>,
    file: Option<FilePart>,
}

struct FilePart {
    file_name: Option<String>,
    content_type: Option<String>,
    content_length: Option<u64>,
    bytes: bytes::Bytes,
}

/// `GET /api/non-product-pages`
pub async fn list_promotions(State(state): State<AppState>) -> Result<Json<Vec<Promotion>>, AppError> {
    state.promotions.list().await.map(Json).map_err(|e| {
        tracing::error!("GET /api/non-product-pages failed: {}", e);
        AppError::internal("Failed to fetch items")
    })
}

/// `POST /api/non-product-pages` (multipart: `file`, `type`, `title`, optional `size`)
pub async fn create_promotion(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
    // Every malformed or oversized body is a 400 with a JSON error.
    let multipart = multipart.map_err(|e| {
        tracing::debug!("rejected multipart request: {}", e);
        AppError::bad_request(e.body_text())
    })?;
    let form = read_form(multipart).await.map_err(|e| {
        tracing::debug!(status = %e.status(), "rejected multipart body: {}", e);
        AppError::bad_request(e.body_text())
    })?;

    let kind = form
        .kind
        .as_deref()
        .and_then(|raw| raw.parse::<PromotionType>().ok())
        .ok_or_else(|| AppError::bad_request("Invalid type"))?;

    let Some(part) = form.file.filter(|f| {
        !(f.bytes.is_empty() && f.file_name.as_deref().is_none_or(str::is_empty))
    }) else {
        return Err(AppError::bad_request("PDF file is required"));
    };

    let received = part.bytes.len() as u64;
    let declared_size = match form.size.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| AppError::bad_request("Invalid size"))?,
        None => part.content_length.unwrap_or(received),
    };

    let file = IncomingFile {
        file_name: part.file_name.unwrap_or_else(|| "upload.pdf".into()),
        content_type: part.content_type,
        declared_size,
        bytes: part.bytes,
    };
    tracing::info!(
        file_name = %file.file_name,
        declared_size = file.declared_size,
        received_size = received,
        content_type = file.content_type.as_deref().unwrap_or(""),
        "uploading PDF"
    );

    let record = state
        .promotions
        .create(NewPromotion {
            kind,
            title: form.title,
            file,
        })
        .await
        .map_err(|e| match e {
            PromotionError::Upload(err) => AppError::bad_request(err.to_string()),
            other => {
                tracing::error!("POST /api/non-product-pages failed: {}", other);
                AppError::bad_request("Failed to create")
            }
        })?;

    Ok((StatusCode::CREATED, Json(record)))
}

/// `DELETE /api/non-product-pages?id=<id>`
pub async fn delete_promotion(
    State(state): State<AppState>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Some(raw) = params.id.filter(|id| !id.trim().is_empty()) else {
        return Err(AppError::bad_request("ID required"));
    };

    let id = Uuid::parse_str(raw.trim()).map_err(|_| {
        tracing::error!(id = %raw, "DELETE /api/non-product-pages failed: malformed id");
        AppError::internal("Failed to delete")
    })?;

    state.promotions.delete(id).await.map_err(|e| {
        tracing::error!("DELETE /api/non-product-pages failed: {}", e);
        AppError::internal("Failed to delete")
    })?;

    Ok(Json(json!({ "ok": true })))
}

async fn read_form(mut multipart: Multipart) -> Result<CreateForm, MultipartError> {
    let mut form = CreateForm::default();
    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("type") => form.kind = Some(field.text().await?),
            Some("title") => form.title = Some(field.text().await?),
            Some("size") => form.size = Some(field.text().await?),
            Some("file") => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let content_length = field
                    .headers()
                    .get(header::CONTENT_LENGTH)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok());
                let bytes = field.bytes().await?;
                form.file = Some(FilePart {
                    file_name,
                    content_type,
                    content_length,
                    bytes,
                });
            }
            _ => {}
        }
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use crate::{
        models::promotion::Promotion,
        test_utils::{MemoryObjectStore, create_test_app, create_test_app_with_store},
    };
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use serde_json::{Value, json};
    use std::sync::Arc;

    fn pdf_part(len: usize) -> Part {
        Part::bytes(vec![0x25u8; len])
            .file_name("Spring Promo.pdf")
            .mime_type("application/pdf")
    }

    async fn promotion_rows(app: &crate::test_utils::TestApp) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM promotions")
            .fetch_one(&*app.state.db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_then_list() {
        let app = create_test_app().await;

        let response = app
            .server
            .post("/api/non-product-pages")
            .multipart(
                MultipartForm::new()
                    .add_text("type", "BANNER_FRONT")
                    .add_text("title", "Spring Promo")
                    .add_part("file", pdf_part(2048)),
            )
            .await;
        response.assert_status(StatusCode::CREATED);
        let created: Value = response.json();
        assert_eq!(created["type"], "banner_front");
        assert_eq!(created["title"], "Spring Promo");
        assert!(
            created["filePath"]
                .as_str()
                .unwrap()
                .starts_with("https://test-bucket.s3.amazonaws.com/promotions/")
        );
        assert!(created.get("createdAt").is_some());

        let listed: Vec<Promotion> = app.server.get("/api/non-product-pages").await.json();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Spring Promo");
    }

    #[tokio::test]
    async fn truncated_upload_is_rejected_without_side_effects() {
        let app = create_test_app().await;

        let response = app
            .server
            .post("/api/non-product-pages")
            .multipart(
                MultipartForm::new()
                    .add_text("type", "banner_front")
                    .add_text("title", "Spring Promo")
                    .add_text("size", "120000")
                    .add_part("file", pdf_part(119_000)),
            )
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "File upload truncated on server (before storage)" }));
        assert_eq!(app.store.put_calls(), 0);
        assert_eq!(app.store.object_count(), 0);
        assert_eq!(promotion_rows(&app).await, 0);
    }

    #[tokio::test]
    async fn storage_truncation_is_a_client_error() {
        let store = Arc::new(MemoryObjectStore::default());
        store.truncate_writes_by(100);
        let app = create_test_app_with_store(store).await;

        let response = app
            .server
            .post("/api/non-product-pages")
            .multipart(
                MultipartForm::new()
                    .add_text("type", "promotion")
                    .add_part("file", pdf_part(1000)),
            )
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "File upload truncated in storage" }));
        assert_eq!(app.store.object_count(), 1);
        assert_eq!(promotion_rows(&app).await, 0);
    }

    #[tokio::test]
    async fn invalid_type_touches_nothing() {
        let app = create_test_app().await;

        for kind in ["flyer", "", "banner front"] {
            let response = app
                .server
                .post("/api/non-product-pages")
                .multipart(
                    MultipartForm::new()
                        .add_text("type", kind)
                        .add_part("file", pdf_part(64)),
                )
                .await;
            response.assert_status(StatusCode::BAD_REQUEST);
            response.assert_json(&json!({ "error": "Invalid type" }));
        }

        // type is checked before the file
        let response = app
            .server
            .post("/api/non-product-pages")
            .multipart(MultipartForm::new().add_text("title", "no type, no file"))
            .await;
        response.assert_json(&json!({ "error": "Invalid type" }));

        assert_eq!(app.store.put_calls(), 0);
        assert_eq!(app.store.head_calls(), 0);
        assert_eq!(promotion_rows(&app).await, 0);
    }

    #[tokio::test]
    async fn non_multipart_body_gets_json_error() {
        let app = create_test_app().await;
        let response = app
            .server
            .post("/api/non-product-pages")
            .json(&json!({ "type": "promotion" }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
        assert_eq!(app.store.put_calls(), 0);
    }

    #[tokio::test]
    async fn oversized_upload_is_a_client_error() {
        let app = create_test_app().await;
        let response = app
            .server
            .post("/api/non-product-pages")
            .multipart(
                MultipartForm::new()
                    .add_text("type", "promotion")
                    .add_part("file", pdf_part(5 * 1024 * 1024)),
            )
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["error"].as_str().is_some());
        assert_eq!(app.store.put_calls(), 0);
        assert_eq!(promotion_rows(&app).await, 0);
    }

    #[tokio::test]
    async fn missing_file_is_rejected() {
        let app = create_test_app().await;
        let response = app
            .server
            .post("/api/non-product-pages")
            .multipart(MultipartForm::new().add_text("type", "advertisement"))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "PDF file is required" }));
    }

    #[tokio::test]
    async fn non_numeric_size_is_rejected() {
        let app = create_test_app().await;
        let response = app
            .server
            .post("/api/non-product-pages")
            .multipart(
                MultipartForm::new()
                    .add_text("type", "advertisement")
                    .add_text("size", "lots")
                    .add_part("file", pdf_part(10)),
            )
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(app.store.put_calls(), 0);
    }

    #[tokio::test]
    async fn failed_insert_removes_the_object() {
        let app = create_test_app().await;
        sqlx::query("DROP TABLE promotions")
            .execute(&*app.state.db)
            .await
            .unwrap();

        let response = app
            .server
            .post("/api/non-product-pages")
            .multipart(
                MultipartForm::new()
                    .add_text("type", "banner_back")
                    .add_part("file", pdf_part(256)),
            )
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "Failed to create" }));
        assert_eq!(app.store.put_calls(), 1);
        assert_eq!(app.store.object_count(), 0);
    }

    #[tokio::test]
    async fn list_failure_is_a_server_error() {
        let app = create_test_app().await;
        sqlx::query("DROP TABLE promotions")
            .execute(&*app.state.db)
            .await
            .unwrap();

        let response = app.server.get("/api/non-product-pages").await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        response.assert_json(&json!({ "error": "Failed to fetch items" }));
    }

    #[tokio::test]
    async fn delete_by_id() {
        let app = create_test_app().await;
        let created: Promotion = app
            .server
            .post("/api/non-product-pages")
            .multipart(
                MultipartForm::new()
                    .add_text("type", "promotion")
                    .add_part("file", pdf_part(32)),
            )
            .await
            .json();

        let response = app
            .server
            .delete("/api/non-product-pages")
            .add_query_param("id", created.id)
            .await;
        response.assert_status_ok();
        response.assert_json(&json!({ "ok": true }));
        assert_eq!(promotion_rows(&app).await, 0);

        let again = app
            .server
            .delete("/api/non-product-pages")
            .add_query_param("id", created.id)
            .await;
        again.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        again.assert_json(&json!({ "error": "Failed to delete" }));
    }

    #[tokio::test]
    async fn delete_requires_id() {
        let app = create_test_app().await;

        let response = app.server.delete("/api/non-product-pages").await;
        response.assert_status(StatusCode::BAD_REQUEST);
        response.assert_json(&json!({ "error": "ID required" }));

        let malformed = app
            .server
            .delete("/api/non-product-pages")
            .add_query_param("id", "not-a-uuid")
            .await;
        malformed.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    }
}
