// HTTP + WebSocket routes

mod http;
pub mod messages;
mod ws;

use axum::{Router, routing::get};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize};
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

use crate::alerts::Thresholds;
use crate::config::AppConfig;
use crate::docker_repo::DockerRepo;
use crate::host_repo::HostRepo;
use crate::models::RuntimeEvent;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) docker_repo: Arc<DockerRepo>,
    pub(crate) host_repo: Arc<HostRepo>,
    pub(crate) thresholds: Thresholds,
    pub(crate) events_tx: broadcast::Sender<RuntimeEvent>,
    pub(crate) config: AppConfig,
    pub(crate) conn_seq: Arc<AtomicU64>,
    pub(crate) open_terminals: Arc<AtomicUsize>,
}

pub fn app(
    docker_repo: Arc<DockerRepo>,
    host_repo: Arc<HostRepo>,
    events_tx: broadcast::Sender<RuntimeEvent>,
    config: AppConfig,
) -> Router {
    let state = AppState {
        docker_repo,
        host_repo,
        thresholds: Thresholds::from(&config.monitoring),
        events_tx,
        config,
        conn_seq: Arc::new(AtomicU64::new(0)),
        open_terminals: Arc::new(AtomicUsize::new(0)),
    };
    Router::new()
        .route("/health", get(http::health_handler)) // GET /health
        .route("/version", get(http::version_handler)) // GET /version
        .route("/ws", get(ws::ws_gateway)) // WS /ws
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
