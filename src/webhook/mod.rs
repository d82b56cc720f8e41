//! WhatsApp webhook: subscription handshake and message routing.
//!
//! # Flow
//!
//! 1. `GET /webhook` answers the Meta subscription challenge ([`verify`]).
//! 2. `POST /webhook` parses the event ([`WebhookPayload`]), and for each
//!    customer text message asks the assistant and sends the reply back.
//!    The platform always gets `200 OK`.

mod handler;
mod payload;

pub use handler::{VerifyParams, process, receive_webhook, verify, verify_webhook};
pub use payload::{InboundMessage, WHATSAPP_OBJECT, WebhookPayload};
