//! `/webhook` route handlers.

use axum::{
    body::Bytes,
    extract::{
        Query, State,
        rejection::{BytesRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::{error, info, warn};

use super::payload::{InboundMessage, WebhookPayload};
use crate::AppState;
use crate::error::RelayError;

/// Query parameters of the subscription handshake.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Check a subscription handshake and return the challenge to echo.
pub fn verify(
    expected_token: &str,
    mode: Option<&str>,
    token: Option<&str>,
    challenge: Option<&str>,
) -> Result<String, RelayError> {
    match (mode, token, challenge) {
        (Some("subscribe"), Some(token), Some(challenge)) if token == expected_token => {
            Ok(challenge.to_string())
        }
        _ => Err(RelayError::VerificationMismatch),
    }
}

/// GET /webhook - Subscription handshake.
///
/// Echoes `hub.challenge` with 200, or answers 403 with an empty body.
pub async fn verify_webhook(
    State(state): State<AppState>,
    params: Result<Query<VerifyParams>, QueryRejection>,
) -> Response {
    let params = params.map(|Query(params)| params).unwrap_or_default();

    match verify(
        &state.config.whatsapp.verify_token,
        params.mode.as_deref(),
        params.verify_token.as_deref(),
        params.challenge.as_deref(),
    ) {
        Ok(challenge) => {
            info!(name: "webhook.verified", "Webhook subscription verified");
            (StatusCode::OK, challenge).into_response()
        }
        Err(err) => {
            warn!(name: "webhook.verify.rejected", mode = ?params.mode, "{err}");
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// POST /webhook - Inbound events.
///
/// Always answers `200 OK`, including for bodies the framework refuses to
/// buffer. Processing runs on its own task so that neither a panic nor the
/// platform dropping the connection can change that.
pub async fn receive_webhook(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> (StatusCode, &'static str) {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!(
                name: "webhook.payload.malformed",
                status = %rejection.status(),
                "{}",
                rejection.body_text()
            );
            return (StatusCode::OK, "OK");
        }
    };

    let task = tokio::spawn(async move { process(&state, &body).await });
    if let Err(err) = task.await {
        error!(name: "webhook.process.aborted", error = %err, "Webhook processing aborted");
    }
    (StatusCode::OK, "OK")
}

/// Relay every customer message in `body`. Never fails.
pub async fn process(state: &AppState, body: &[u8]) {
    let payload = match WebhookPayload::from_slice(body) {
        Ok(payload) => payload,
        Err(err) => {
            let err = RelayError::from(err);
            warn!(name: "webhook.payload.malformed", bytes = body.len(), "{err}");
            return;
        }
    };

    for message in payload.inbound_messages() {
        relay_message(state, &message).await;
    }
}

async fn relay_message(state: &AppState, message: &InboundMessage) {
    info!(
        name: "webhook.message.received",
        sender = %message.sender,
        contact = message.contact_name.as_deref().unwrap_or("Unknown"),
        message_id = %message.message_id,
        timestamp = %message.timestamp,
        "Received message"
    );

    let reply = match state.assistant.reply(&message.sender, &message.text).await {
        Ok(reply) => reply,
        Err(err) => {
            warn!(
                name: "assistant.reply.failed",
                sender = %message.sender,
                error = %err,
                "Assistant could not answer, sending fallback"
            );
            state.config.relay.fallback_message.clone()
        }
    };

    if let Err(err) = state.whatsapp.send_text(&message.sender, &reply).await {
        error!(
            name: "whatsapp.delivery.failed",
            recipient = %message.sender,
            error = %err,
            "Failed to deliver reply"
        );
    }
}
