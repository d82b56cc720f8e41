use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    routing::get,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::assistant::{AssistantClient, OpenAiAssistants, PollSettings};
use crate::config::AppConfig;
use crate::session::ThreadStore;
use crate::webhook;
use crate::whatsapp::WhatsAppClient;

/// Largest webhook body the relay buffers. Larger events are acknowledged and dropped.
pub const MAX_WEBHOOK_BODY: usize = 2 * 1024 * 1024;

/// Timeout applied to every outbound API request.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;

    let backend = OpenAiAssistants::connect(&config.assistant, http.clone()).await?;
    info!(
        name: "assistant.config.loaded",
        base_url = %config.assistant.base_url,
        assistant_id = %backend.assistant_id(),
        poll_interval_ms = config.assistant.poll_interval_ms,
        run_timeout_secs = config.assistant.run_timeout_secs,
        "Assistant configuration loaded"
    );

    let assistant = AssistantClient::new(
        Arc::new(backend),
        ThreadStore::new(),
        PollSettings::from_config(&config.assistant),
    );
    let whatsapp = Arc::new(WhatsAppClient::new(&config.whatsapp, http));

    let state = AppState {
        config: Arc::clone(&config),
        assistant,
        whatsapp,
    };

    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Build the relay's router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route(
            "/webhook",
            get(webhook::verify_webhook)
                .post(webhook::receive_webhook)
                .layer(DefaultBodyLimit::max(MAX_WEBHOOK_BODY)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Informational Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Response from the home endpoint.
#[derive(Debug, Serialize)]
struct HomeResponse {
    message: &'static str,
    status: &'static str,
    version: &'static str,
}

/// Response from the health endpoint.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    /// RFC 3339 UTC time of the check.
    timestamp: String,
    /// Senders with an assistant thread.
    threads_count: usize,
}

/// GET / - Service banner.
async fn home() -> Json<HomeResponse> {
    Json(HomeResponse {
        message: "WhatsApp Bot with OpenAI Assistant",
        status: "running",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /health - Liveness probe.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
        threads_count: state.assistant.threads().len(),
    })
}
