//! Serves stored objects when the backend has no public endpoint of its own.

use crate::{errors::AppError, state::AppState, storage::StorageError};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};

/// `GET /files/{*key}`
pub async fn get_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    if !state.store.serves_files() {
        return Err(AppError::not_found("Not found"));
    }

    let (meta, bytes) = state.store.get(&key).await.map_err(|e| match e {
        StorageError::NotFound(_) | StorageError::InvalidKey(_) => AppError::not_found("Not found"),
        other => {
            tracing::error!(key = %key, "failed to read object: {}", other);
            AppError::internal("Failed to read file")
        }
    })?;

    let content_type = meta
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or(HeaderValue::from_static("application/octet-stream"));

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(meta.size));
    Ok(response)
}

#[cfg(test)]
mod tests {
    use crate::{
        routes::routes,
        services::email_service::EmailService,
        state::AppState,
        storage::{ObjectStore, local::LocalObjectStore},
        test_utils::{create_test_app, test_config, test_pool},
    };
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use bytes::Bytes;
    use std::sync::Arc;

    #[tokio::test]
    async fn local_backend_serves_stored_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_config(dir.path().to_path_buf());
        let store = Arc::new(
            LocalObjectStore::create(dir.path().join("objects"), "http://localhost/files")
                .await
                .unwrap(),
        );
        store
            .put("promotions/a.pdf", Bytes::from_static(b"%PDF-1.7"), "application/pdf")
            .await
            .unwrap();
        let email = EmailService::new(&cfg.email).unwrap();
        let state = AppState::new(&cfg, Arc::new(test_pool().await), store, email);
        let server = TestServer::new(routes(state, cfg.max_upload_bytes)).unwrap();

        let response = server.get("/files/promotions/a.pdf").await;
        response.assert_status_ok();
        assert_eq!(response.header("content-type"), "application/pdf");
        assert_eq!(&response.as_bytes()[..], b"%PDF-1.7");

        server
            .get("/files/promotions/missing.pdf")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn remote_backends_do_not_serve_files() {
        let app = create_test_app().await;
        app.server
            .get("/files/promotions/anything.pdf")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
