//! Common Test Utilities for Integration Tests
//!
//! Shared helpers used across integration test modules.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde::de::DeserializeOwned;
use signage_server::{
    LockedFs, SlideAppState, SlideLimits, SlideStore, SlideUpdate, StaticUserDirectory,
    slide_routes,
};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;
use tower_http::cors::{Any, CorsLayer};

/// A slide store in a temporary directory plus a router serving it
pub struct TestApp {
    pub router: Router,
    pub store: Arc<SlideStore>,
    _dir: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = SlideStore::with_parts(
            &dir.path().join("slides"),
            SlideLimits::default(),
            Arc::new(StaticUserDirectory::new(["admin", "user"])),
            Arc::new(LockedFs),
        )
        .expect("Failed to open slide store");
        let store = Arc::new(store);

        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let router = Router::new()
            .nest(
                "/api",
                slide_routes(SlideAppState {
                    store: Arc::clone(&store),
                }),
            )
            .layer(cors);

        Self {
            router,
            store,
            _dir: dir,
        }
    }

    /// Send a request and parse the JSON response body, if any
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, Option<T>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(serde_json::to_vec(&json).unwrap()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request");
        let status = response.status();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read response body");
        (status, serde_json::from_slice(&body).ok())
    }
}

/// Request body for a valid slide
pub fn slide_body(name: &str, index: i64) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "index": index,
        "time": 5000,
        "owner": "admin",
        "markup": format!("[h1]{name}[/h1]"),
        "enabled": true,
    })
}

/// Valid field values for direct store use
pub fn slide_update(name: &str, index: i64) -> SlideUpdate {
    SlideUpdate {
        name: name.to_string(),
        index,
        time: 5000,
        owner: "admin".to_string(),
        markup: String::new(),
        enabled: true,
        expires: false,
        expire_t: 0,
    }
}

/// Initialize test logging for detailed output
pub fn init_test_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signage_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
