//! WhatsApp Cloud API webhook event schema.
//!
//! Only the parts the relay reads are modelled; everything else in the
//! payload is ignored by serde.

use serde::Deserialize;
use tracing::debug;

/// `object` value of WhatsApp Business events.
pub const WHATSAPP_OBJECT: &str = "whatsapp_business_account";

/// Top-level webhook POST body.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub messages: Vec<WebhookMessage>,
    /// Delivery/read receipts for messages we sent.
    #[serde(default)]
    pub statuses: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub wa_id: String,
    #[serde(default)]
    pub profile: Option<Profile>,
}

#[derive(Debug, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookMessage {
    pub from: String,
    pub id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextContent>,
}

#[derive(Debug, Deserialize)]
pub struct TextContent {
    pub body: String,
}

/// A customer text message, ready to hand to the assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// WhatsApp id (phone number) of the customer.
    pub sender: String,
    pub text: String,
    pub message_id: String,
    /// Unix seconds, as sent by WhatsApp.
    pub timestamp: String,
    /// Profile name from the `contacts` array, when present.
    pub contact_name: Option<String>,
}

impl WebhookPayload {
    /// Parse a raw POST body.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Extract the customer text messages carried by this event.
    ///
    /// Returns nothing for non-WhatsApp objects, non-`messages` fields and
    /// status callbacks. Non-text messages are skipped.
    #[must_use]
    pub fn inbound_messages(&self) -> Vec<InboundMessage> {
        if self.object != WHATSAPP_OBJECT {
            debug!(object = %self.object, "Ignoring non-WhatsApp webhook object");
            return Vec::new();
        }

        let mut inbound = Vec::new();
        for change in self.entry.iter().flat_map(|entry| &entry.changes) {
            if change.field != "messages" {
                continue;
            }
            let value = &change.value;
            if !value.statuses.is_empty() {
                debug!(count = value.statuses.len(), "Received WhatsApp status update");
            }

            for message in &value.messages {
                let Some(text) = &message.text else {
                    debug!(
                        message_id = %message.id,
                        kind = %message.kind,
                        "Skipping non-text message"
                    );
                    continue;
                };
                inbound.push(InboundMessage {
                    sender: message.from.clone(),
                    text: text.body.clone(),
                    message_id: message.id.clone(),
                    timestamp: message.timestamp.clone(),
                    contact_name: value.contact_name(&message.from),
                });
            }
        }
        inbound
    }
}

impl ChangeValue {
    fn contact_name(&self, wa_id: &str) -> Option<String> {
        self.contacts
            .iter()
            .find(|c| c.wa_id == wa_id)
            .and_then(|c| c.profile.as_ref())
            .and_then(|p| p.name.clone())
    }
}
