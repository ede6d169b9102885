//! Shared fixtures for unit and handler tests.

use crate::{
    config::{AppConfig, AuthConfig, EmailConfig, EmailTransportConfig, StorageConfig},
    db,
    models::user::{Role, User},
    routes::routes,
    services::email_service::EmailService,
    state::AppState,
    storage::{ObjectMeta, ObjectStore, PutOutcome, StorageError, StorageResult},
};
use async_trait::async_trait;
use axum_test::TestServer;
use bytes::Bytes;
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::{
    collections::BTreeMap,
    path::PathBuf,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
    },
};
use tempfile::TempDir;

/// In-memory object store with switchable faults.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, (Bytes, String)>>,
    puts: AtomicUsize,
    heads: AtomicUsize,
    truncate_by: AtomicU64,
    fail_deletes: AtomicBool,
}

impl MemoryObjectStore {
    pub fn put_calls(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn head_calls(&self) -> usize {
        self.heads.load(Ordering::SeqCst)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn content_type_of(&self, key: &str) -> Option<String> {
        self.objects.lock().unwrap().get(key).map(|(_, ct)| ct.clone())
    }

    /// Keep `n` fewer bytes than each write delivers, like a proxy cutting
    /// the body short.
    pub fn truncate_writes_by(&self, n: u64) {
        self.truncate_by.store(n, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> StorageResult<PutOutcome> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        let cut = (self.truncate_by.load(Ordering::SeqCst) as usize).min(body.len());
        let kept = body.slice(..body.len() - cut);
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (kept, content_type.to_string()));
        Ok(PutOutcome::default())
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        self.heads.fetch_add(1, Ordering::SeqCst);
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(bytes, ct)| ObjectMeta {
                size: bytes.len() as u64,
                content_type: Some(ct.clone()),
            })
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    async fn get(&self, key: &str) -> StorageResult<(ObjectMeta, Bytes)> {
        let meta = self.head(key).await?;
        let bytes = self.objects.lock().unwrap()[key].0.clone();
        Ok((meta, bytes))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("injected delete failure")));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }

    async fn check(&self) -> StorageResult<()> {
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://test-bucket.s3.amazonaws.com/{}", key)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Fresh in-memory database with the schema applied.
///
/// A single connection that never expires, so every query sees the same
/// `:memory:` database.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

pub fn test_config(email_dir: PathBuf) -> AppConfig {
    AppConfig {
        host: "127.0.0.1".into(),
        port: 0,
        database_url: "sqlite::memory:".into(),
        max_upload_bytes: 4 * 1024 * 1024,
        storage: StorageConfig::Local {
            dir: email_dir.join("objects"),
            public_base_url: "http://localhost/files".into(),
        },
        auth: AuthConfig {
            jwt_secret: "test-secret-key-for-testing-only".into(),
            session_ttl_hours: 1,
        },
        email: EmailConfig {
            transport: EmailTransportConfig::File {
                dir: email_dir.join("emails"),
            },
            from: None,
            app_base_url: "http://localhost:3000".into(),
        },
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
    pub store: Arc<MemoryObjectStore>,
    pub dir: TempDir,
}

impl TestApp {
    /// Number of `.eml` files the file transport has written.
    pub fn emails_sent(&self) -> usize {
        std::fs::read_dir(self.dir.path().join("emails"))
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .filter(|e| e.path().extension().is_some_and(|ext| ext == "eml"))
                    .count()
            })
            .unwrap_or(0)
    }
}

/// Full router over an in-memory database and object store.
pub async fn create_test_app() -> TestApp {
    create_test_app_with_store(Arc::new(MemoryObjectStore::default())).await
}

pub async fn create_test_app_with_store(store: Arc<MemoryObjectStore>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let cfg = test_config(dir.path().to_path_buf());
    let db = Arc::new(test_pool().await);
    let email = EmailService::new(&cfg.email).unwrap();
    let state = AppState::new(&cfg, db, store.clone(), email);
    let server = TestServer::new(routes(state.clone(), cfg.max_upload_bytes)).unwrap();
    TestApp {
        server,
        state,
        store,
        dir,
    }
}

pub async fn create_user(state: &AppState, email: &str, role: Role) -> User {
    state.users.create(email, role).await.unwrap()
}

/// Session token for `user`, ready for `authorization_bearer`.
pub fn session_token(state: &AppState, user: &User) -> String {
    state.tokens.issue_session(user.id).unwrap()
}
