#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use sendhooks_api::config::ServerConfig;
use sendhooks_api::router::build_app_router;
use sendhooks_api::service::HookQueryService;
use sendhooks_api::state::AppState;
use sendhooks_core::hook::{HookRecord, HookStatus};
use sendhooks_db::{CreateOutcome, HookStore, MemoryHookStore, StoreError};
use tower::ServiceExt;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
    }
}

/// Build the full application router, middleware included, over `store`.
pub fn build_test_app(store: Arc<dyn HookStore>) -> Router {
    let config = test_config();
    let state = AppState {
        hooks: HookQueryService::new(store),
    };
    build_app_router(state, &config)
}

/// Router over a memory store pre-filled with `records`.
pub async fn app_with(records: Vec<HookRecord>) -> Router {
    let store = Arc::new(MemoryHookStore::new());
    for record in records {
        store.create(record).await.unwrap();
    }
    build_test_app(store)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// `GET uri`, asserting the status and returning the parsed body.
pub async fn get_json(app: Router, uri: &str, expected: StatusCode) -> serde_json::Value {
    let response = get(app, uri).await;
    assert_eq!(response.status(), expected, "GET {uri}");
    body_json(response).await
}

pub fn hook(id: &str, status: HookStatus, day: u32, error: Option<&str>) -> HookRecord {
    HookRecord {
        id: id.to_string(),
        status,
        created: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
        delivered: None,
        error: error.map(str::to_string),
    }
}

// ---------------------------------------------------------------------------
// BrokenStore
// ---------------------------------------------------------------------------

/// Store whose every operation fails.
pub struct BrokenStore;

#[async_trait]
impl HookStore for BrokenStore {
    async fn create(&self, _record: HookRecord) -> Result<CreateOutcome, StoreError> {
        Err(StoreError::InvalidRow("password=hunter2".into()))
    }

    async fn find_all(&self) -> Result<Vec<HookRecord>, StoreError> {
        Err(StoreError::InvalidRow("password=hunter2".into()))
    }

    async fn find_by_id(&self, _id: &str) -> Result<Option<HookRecord>, StoreError> {
        Err(StoreError::InvalidRow("password=hunter2".into()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Err(StoreError::InvalidRow("unreachable".into()))
    }
}
