use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use signage_server::config::Config;
use signage_server::slide::{SlideAppState, SlideStore, slide_routes};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application start time for uptime calculation
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Ensure a directory exists, creating it if necessary.
/// Returns true if directory exists and is empty.
fn ensure_directory(path: &Path, name: &str) -> std::io::Result<bool> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
        info!("Created {} directory: {:?}", name, path);
        Ok(true) // newly created, so empty
    } else if path.is_dir() {
        let is_empty = path.read_dir()?.next().is_none();
        Ok(is_empty)
    } else {
        Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} path {:?} exists but is not a directory", name, path),
        ))
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    slides: usize,
    uptime_seconds: u64,
}

async fn health(State(state): State<SlideAppState>) -> (axum::http::StatusCode, Json<HealthResponse>) {
    let uptime = START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0);

    // Storage is healthy if the slide directory can be listed
    let store = Arc::clone(&state.store);
    let listed = tokio::task::spawn_blocking(move || store.list_ids())
        .await
        .ok()
        .and_then(Result::ok);

    let (status, http_status, slides) = match listed {
        Some(ids) => ("healthy", axum::http::StatusCode::OK, ids.len()),
        None => (
            "degraded",
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            0,
        ),
    };

    (
        http_status,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            slides,
            uptime_seconds: uptime,
        }),
    )
}

/// Prometheus metrics handle for exposing metrics in Prometheus format
static PROMETHEUS_HANDLE: std::sync::OnceLock<PrometheusHandle> = std::sync::OnceLock::new();

/// Endpoint to expose metrics in Prometheus format
async fn prometheus_metrics() -> impl IntoResponse {
    PROMETHEUS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Record server start time
    START_TIME.set(Instant::now()).ok();

    // Initialize Prometheus metrics recorder (must be done before any metrics are recorded)
    let prometheus_handle = PrometheusBuilder::new().install_recorder()?;
    PROMETHEUS_HANDLE.set(prometheus_handle).ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "signage=debug,signage_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = Config::from_env();
    info!(
        "Loaded configuration: host={}, port={}",
        config.host, config.port
    );

    // Ensure data directories exist (auto-create for dev-friendly startup)
    match ensure_directory(&config.storage.users_dir, "users") {
        Ok(true) => warn!(
            "Users directory {:?} is empty - slides can't be saved until a user exists",
            config.storage.users_dir
        ),
        Ok(false) => {}
        Err(e) => warn!(
            "Failed to create users directory {:?}: {}",
            config.storage.users_dir, e
        ),
    }

    let store = SlideStore::open(&config.storage, config.limits)?;
    info!("Using slide storage at {:?}", store.root());

    // Repair any index damage left by an interrupted pass
    let store = Arc::new(store);
    let startup_store = Arc::clone(&store);
    tokio::task::spawn_blocking(move || startup_store.reindex(None)).await??;

    let slide_state = SlideAppState { store };

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics/prometheus", get(prometheus_metrics))
        .with_state(slide_state.clone())
        .nest("/api", slide_routes(slide_state))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Signage server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
