//! Gateway
//!
//! The real-time boundary of the relay: a WebSocket endpoint speaking the
//! JSON event protocol, plus read-only HTTP routes for diagnostics. Clients
//! (dispatch UI, courier apps) connect to `/ws`; everything they may observe
//! is broadcast from here.

pub mod events;
mod ws;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State, WebSocketUpgrade},
    http::HeaderValue,
    response::IntoResponse,
    routing::get,
};
use tokio::sync::{RwLock, mpsc};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::{Config, TransportMode};
use crate::jobs::JobStore;
use crate::router::{ContactRouter, ProvisionPolicy};
use crate::tracking::LocationTracker;
use crate::transport::{LogTransport, TransportHandle};

/// Shared state behind the gateway: the router core, its collaborators, and
/// the connected socket clients.
pub struct GatewayState {
    pub router: Arc<ContactRouter>,
    pub jobs: Arc<JobStore>,
    pub tracker: Arc<LocationTracker>,
    pub transport: Arc<TransportHandle>,
    allowed_origins: Vec<String>,
    clients: RwLock<HashMap<String, mpsc::UnboundedSender<String>>>,
}

impl GatewayState {
    pub fn new(
        router: Arc<ContactRouter>,
        jobs: Arc<JobStore>,
        tracker: Arc<LocationTracker>,
        transport: Arc<TransportHandle>,
    ) -> Self {
        Self {
            router,
            jobs,
            tracker,
            transport,
            allowed_origins: Vec::new(),
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Assemble the full state from configuration: build the job store, seed
    /// it, wire the router with the configured policy, and attach the
    /// configured transport.
    pub async fn from_config(config: &Config) -> anyhow::Result<Arc<Self>> {
        let jobs = Arc::new(JobStore::new());
        if let Some(ref seed_file) = config.jobs.seed_file {
            if seed_file.exists() {
                jobs.load_seed_file(seed_file)
                    .await
                    .with_context(|| format!("Failed to load seed file: {:?}", seed_file))?;
            } else {
                tracing::warn!("gateway: seed file not found, starting empty: {:?}", seed_file);
            }
        }

        let router = Arc::new(
            ContactRouter::new(ProvisionPolicy::from_config(&config.router))
                .with_lookup(jobs.clone()),
        );
        router.reset(&jobs.seed_pairs().await).await;

        let transport = Arc::new(TransportHandle::new());
        match config.transport.mode {
            TransportMode::Log => transport.set_connected(Arc::new(LogTransport)).await,
            TransportMode::None => {
                tracing::info!("gateway: no transport configured, deliveries will be unsent");
            }
        }

        let mut state = Self::new(router, jobs, Arc::new(LocationTracker::new()), transport);
        state.allowed_origins = config.gateway.allowed_origins.clone();
        Ok(Arc::new(state))
    }

    pub(crate) async fn register_client(&self, conn_id: &str, tx: mpsc::UnboundedSender<String>) {
        let mut clients = self.clients.write().await;
        clients.insert(conn_id.to_string(), tx);
        tracing::info!("gateway: client {} connected ({} total)", conn_id, clients.len());
    }

    pub(crate) async fn remove_client(&self, conn_id: &str) {
        let mut clients = self.clients.write().await;
        clients.remove(conn_id);
        tracing::info!("gateway: client {} disconnected ({} total)", conn_id, clients.len());
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Serialize once, fan out to every connected client. Closed clients are
    /// dropped from the map on the way.
    pub async fn broadcast(&self, event: &str, payload: serde_json::Value) {
        let text = events::frame(event, payload);
        let mut clients = self.clients.write().await;
        clients.retain(|conn_id, tx| {
            let alive = tx.send(text.clone()).is_ok();
            if !alive {
                tracing::debug!("gateway: dropping closed client {}", conn_id);
            }
            alive
        });
        tracing::debug!("gateway: broadcast {} to {} client(s)", event, clients.len());
    }
}

/// Build the gateway router (shared between production startup and tests).
pub fn build_app(state: Arc<GatewayState>) -> Router {
    let cors = cors_layer(&state.allowed_origins);

    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_upgrade_handler))
        .route("/api/bindings", get(bindings_handler))
        .route("/api/jobs", get(jobs_handler))
        .route("/api/jobs/{job_id}/history", get(history_handler))
        .route(
            "/api/courier/{courier_id}/location",
            get(courier_location_handler),
        )
        .layer(cors)
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("gateway: invalid CORS origin ignored: {}", origin);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the gateway HTTP + WebSocket server.
pub async fn serve(config: &Config) -> anyhow::Result<()> {
    let state = GatewayState::from_config(config).await?;
    let addr = format!("{}:{}", config.gateway.bind, config.gateway.port);
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind gateway to {}", addr))?;
    tracing::info!("gateway: listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::VERSION,
    }))
}

async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<GatewayState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws::handle_connection(socket, state))
}

async fn bindings_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(state.router.bindings().await)
}

async fn jobs_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(state.jobs.list().await)
}

async fn history_handler(
    Path(job_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
) -> impl IntoResponse {
    Json(state.router.get_history(&job_id).await)
}

async fn courier_location_handler(
    Path(courier_id): Path<String>,
    State(state): State<Arc<GatewayState>>,
) -> impl IntoResponse {
    match state.tracker.get(&courier_id).await {
        Some(loc) => Json(serde_json::json!({
            "success": true,
            "courier_id": courier_id,
            "location": loc.location,
            "timestamp": loc.timestamp,
        })),
        None => Json(serde_json::json!({
            "success": false,
            "error": "courier location not found",
        })),
    }
}
