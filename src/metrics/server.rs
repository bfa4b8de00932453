//! Prometheus exporter for the camera session.
//!
//! `/metrics` serves the registry in text format. `/health` answers 200
//! while the camera is configured or streaming, and 503 otherwise.

use crate::control::SessionState;
use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

/// Errors raised while running the exporter.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("failed to bind to address: {0}")]
    Bind(#[from] std::io::Error),

    /// The HTTP server stopped with an error.
    #[error("server error: {0}")]
    Server(String),
}

/// Where the exporter listens.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Listen address.
    pub bind_addr: SocketAddr,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self::with_port(9090)
    }
}

impl MetricsServerConfig {
    /// Listens on every interface at `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
        }
    }
}

/// Registry plus the last camera state reported to it.
pub struct MetricsState {
    registry: MetricsRegistry,
    session_state: SessionState,
}

impl MetricsState {
    /// Publishes a snapshot to the registry and remembers its session state.
    pub fn update(&mut self, snapshot: &MetricsSnapshot) {
        self.registry.update(snapshot);
        self.session_state = snapshot.session_state;
    }

    /// Camera state from the latest snapshot.
    pub fn session_state(&self) -> SessionState {
        self.session_state
    }

    /// Whether the camera can deliver frames (configured or streaming).
    pub fn camera_ready(&self) -> bool {
        matches!(
            self.session_state,
            SessionState::Configured | SessionState::Running
        )
    }
}

type SharedState = Arc<RwLock<MetricsState>>;

/// Exporter bound to one [`MetricsRegistry`].
pub struct MetricsServer {
    config: MetricsServerConfig,
    state: SharedState,
}

impl MetricsServer {
    /// Wraps `registry`; the camera starts out reported as uninitialized.
    pub fn new(config: MetricsServerConfig, registry: MetricsRegistry) -> Self {
        let state = MetricsState {
            registry,
            session_state: SessionState::Uninitialized,
        };
        Self {
            config,
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Handle used by the control loop to push snapshots.
    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    /// Serves until the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Metrics server listening");

        axum::serve(listener, router(self.state))
            .await
            .map_err(|e| ServerError::Server(e.to_string()))
    }
}

fn router(state: SharedState) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn metrics_handler(State(state): State<SharedState>) -> impl IntoResponse {
    match state.read().await.registry.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {}", e),
        ),
    }
}

async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let state = state.read().await;
    let camera = state.session_state();
    if state.camera_ready() {
        (StatusCode::OK, format!("OK: camera {camera}"))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("camera {camera}"),
        )
    }
}
