use std::{sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use ftb_core::{
    config::Config,
    memory::ConversationMemory,
    ports::{BackendPort, MessagingPort},
    security::RateLimiter,
};

use crate::handlers::{self, Ack};
use crate::update::WebhookUpdate;

// Background sweep of idle last-seen timestamps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(600);
const SWEEP_IDLE_AFTER: Duration = Duration::from_secs(3_600);

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub messenger: Arc<dyn MessagingPort>,
    pub backend: Arc<dyn BackendPort>,
    pub memory: Arc<ConversationMemory>,
    pub rate_limiter: Arc<RateLimiter>,
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/telegram/webhook", post(telegram_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    spawn_rate_limit_sweeper(state.rate_limiter.clone());

    let addr = state.cfg.bind_addr;
    let listener = TcpListener::bind(addr).await?;
    info!("ftb listening on {addr}");
    info!(
        "backend configured: {}, allowed users: {}",
        state.backend.is_configured(),
        if state.cfg.allowed_user_ids.is_empty() {
            "all".to_string()
        } else {
            state.cfg.allowed_user_ids.len().to_string()
        },
    );

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("ftb shut down");
    Ok(())
}

fn spawn_rate_limit_sweeper(rate_limiter: Arc<RateLimiter>) {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SWEEP_INTERVAL);
        tick.tick().await; // the first tick fires immediately
        loop {
            tick.tick().await;
            let evicted = rate_limiter.sweep_idle(SWEEP_IDLE_AFTER);
            if evicted > 0 {
                debug!("evicted {evicted} idle rate-limit entries");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    backend_configured: bool,
}

/// Static reflection of configuration; no liveness probe of the backend.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        backend_configured: state.backend.is_configured(),
    })
}

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Bridge ativo." }))
}

/// The webhook always acknowledges with 200: a malformed or unrecognized body
/// is an ignored event, never an HTTP error, so Telegram does not retry.
async fn telegram_webhook(State(state): State<Arc<AppState>>, body: Bytes) -> Json<Ack> {
    let update = serde_json::from_slice::<WebhookUpdate>(&body).unwrap_or_default();
    Json(handlers::process_update(&state, update).await)
}
