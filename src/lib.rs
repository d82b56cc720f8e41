//! WhatsApp ⇄ `OpenAI` Assistant relay
//!
//! Receives WhatsApp Business webhook events, forwards customer text to an
//! `OpenAI` Assistant thread kept per sender, and sends the assistant's reply
//! back over WhatsApp.
//!
//! # Architecture
//!
//! - **Server**: Axum HTTP server exposing `/`, `/health` and `/webhook`
//! - **Webhook**: subscription handshake and message routing
//! - **Assistant**: thread reuse and bounded run polling over the Assistants API
//! - **WhatsApp**: outbound text messages through the Graph API
//!
//! # Modules
//!
//! - [`assistant`]: assistant backend trait, `OpenAI` implementation, polling client
//! - [`config`]: layered startup configuration
//! - [`session`]: sender to thread mapping
//! - [`webhook`]: payload schema and route handlers
//! - [`whatsapp`]: Graph API client

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod assistant;
pub mod config;
pub mod error;
pub mod server;
pub mod session;
pub mod webhook;
pub mod whatsapp;

use std::sync::Arc;

use assistant::AssistantClient;
use config::AppConfig;
use whatsapp::MessageSender;

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Configuration loaded at startup.
    pub config: Arc<AppConfig>,
    /// Assistant client, owner of the sender to thread mapping.
    pub assistant: AssistantClient,
    /// Outbound WhatsApp transport.
    pub whatsapp: Arc<dyn MessageSender>,
}
