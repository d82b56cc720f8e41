//! Error taxonomy for the relay.
//!
//! Only [`RelayError::VerificationMismatch`] ever reaches an HTTP client. Every
//! other variant is raised inside webhook processing, logged, and absorbed so
//! the platform always sees `200 OK`.

use axum::http::StatusCode;

/// Errors that can occur while verifying or relaying a webhook.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The subscription handshake did not carry the expected mode/token.
    #[error("webhook verification failed")]
    VerificationMismatch,

    /// The POST body was not a WhatsApp Cloud API event.
    #[error("malformed webhook payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    /// The assistant run ended in a non-success terminal state.
    #[error("assistant run ended with status `{status}`")]
    AssistantRunFailed {
        /// Terminal status reported by the backend.
        status: String,
    },

    /// The assistant run did not finish within the wait budget.
    #[error("assistant run did not finish within {waited_secs}s")]
    AssistantTimeout {
        /// Budget that was exhausted, in seconds.
        waited_secs: u64,
    },

    /// The WhatsApp Graph API refused the outbound message.
    #[error("WhatsApp delivery failed with {status}: {body}")]
    DeliveryFailure {
        /// HTTP status returned by the Graph API.
        status: StatusCode,
        /// Response body, kept for the log line.
        body: String,
    },

    /// A backend answered with a shape we cannot use.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Transport-level HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
