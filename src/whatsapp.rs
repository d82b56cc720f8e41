//! WhatsApp Business Cloud API client.
//!
//! Outbound only: inbound messages arrive through the webhook.

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::config::WhatsAppConfig;
use crate::error::RelayError;

/// Something that can deliver a text message to a WhatsApp user.
#[async_trait]
pub trait MessageSender: Send + Sync + std::fmt::Debug {
    /// Send `text` to `recipient` in a single API call. No retries.
    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), RelayError>;
}

/// Body of a Graph API `/{phone_number_id}/messages` text request.
#[derive(Debug, Serialize)]
struct TextMessageRequest<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextBody<'a>,
}

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

impl<'a> TextMessageRequest<'a> {
    fn new(to: &'a str, body: &'a str) -> Self {
        Self {
            messaging_product: "whatsapp",
            to,
            kind: "text",
            text: TextBody { body },
        }
    }
}

/// Graph API client bound to one business phone number.
#[derive(Clone)]
pub struct WhatsAppClient {
    http: reqwest::Client,
    messages_url: String,
    access_token: String,
}

impl std::fmt::Debug for WhatsAppClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppClient")
            .field("messages_url", &self.messages_url)
            .finish_non_exhaustive()
    }
}

impl WhatsAppClient {
    #[must_use]
    pub fn new(config: &WhatsAppConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            messages_url: format!(
                "{}/{}/messages",
                config.api_base_url.trim_end_matches('/'),
                config.phone_number_id
            ),
            access_token: config.access_token.clone(),
        }
    }
}

#[async_trait]
impl MessageSender for WhatsAppClient {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), RelayError> {
        let response = self
            .http
            .post(&self.messages_url)
            .bearer_auth(&self.access_token)
            .json(&TextMessageRequest::new(recipient, text))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::DeliveryFailure { status, body });
        }

        info!(name: "whatsapp.message.sent", recipient = %recipient, "Message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_message_request_shape() {
        let body = serde_json::to_value(TextMessageRequest::new("+15551234567", "Hello")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "messaging_product": "whatsapp",
                "to": "+15551234567",
                "type": "text",
                "text": { "body": "Hello" }
            })
        );
    }

    #[test]
    fn test_messages_url_ignores_trailing_slash() {
        let config = WhatsAppConfig {
            access_token: "token".to_string(),
            phone_number_id: "1234".to_string(),
            verify_token: "verify".to_string(),
            api_base_url: "https://graph.facebook.com/v22.0/".to_string(),
        };
        let client = WhatsAppClient::new(&config, reqwest::Client::new());
        assert_eq!(
            client.messages_url,
            "https://graph.facebook.com/v22.0/1234/messages"
        );
    }
}
