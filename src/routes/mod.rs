// Status API: last-known host records and host actions over HTTP, live tick reports over WebSocket

mod http;
mod ws;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};

use crate::config::AppConfig;
use crate::models::TickReport;
use crate::remote::CommandExecutor;
use crate::store::SnapshotStore;

pub use http::{NAME, VERSION};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) stats_tx: broadcast::Sender<TickReport>,
    pub(crate) store: SnapshotStore,
    pub(crate) ws_stats_connections: Arc<AtomicUsize>,
    pub(crate) config: Arc<AppConfig>,
    pub(crate) executor: Arc<dyn CommandExecutor>,
}

pub fn app(
    stats_tx: broadcast::Sender<TickReport>,
    store: SnapshotStore,
    ws_stats_connections: Arc<AtomicUsize>,
    config: AppConfig,
    executor: Arc<dyn CommandExecutor>,
) -> Router {
    let state = AppState {
        stats_tx,
        store,
        ws_stats_connections,
        config: Arc::new(config),
        executor,
    };
    Router::new()
        .route("/", get(|| async { "vserver-stats: polling hosts over SSH" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/api/hosts", get(http::hosts_handler)) // GET /api/hosts
        .route("/api/hosts/{name}", get(http::host_handler)) // GET /api/hosts/{name}
        .route(
            "/api/hosts/{name}/actions/{action}",
            post(http::action_handler),
        ) // POST /api/hosts/{name}/actions/{action}
        .route("/api/config", get(http::config_handler)) // GET /api/config
        .route("/ws/stats", get(ws::ws_stats)) // WS /ws/stats
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}
