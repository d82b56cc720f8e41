//! `OpenAI` Assistants API (v2) backend.
//!
//! Implements [`AssistantBackend`] over plain REST calls against
//! `/v1/threads`, `/v1/threads/{id}/messages` and `/v1/threads/{id}/runs`.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::info;

use super::{AssistantBackend, Run};
use crate::config::AssistantConfig;
use crate::error::RelayError;
use crate::session::ThreadId;

/// Header that opts into the v2 Assistants API.
const BETA_HEADER: (&str, &str) = ("OpenAI-Beta", "assistants=v2");

/// Object returned by every create call; only the id matters here.
#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ThreadMessage {
    role: String,
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: TextValue,
    },
    /// Images, files and anything else the relay cannot forward as text.
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct TextValue {
    value: String,
}

/// HTTP client for the `OpenAI` Assistants API.
#[derive(Clone)]
pub struct OpenAiAssistants {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    assistant_id: String,
}

impl std::fmt::Debug for OpenAiAssistants {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAssistants")
            .field("base_url", &self.base_url)
            .field("assistant_id", &self.assistant_id)
            .finish_non_exhaustive()
    }
}

impl OpenAiAssistants {
    /// Build the backend, creating an assistant when none is configured.
    pub async fn connect(
        config: &AssistantConfig,
        http: reqwest::Client,
    ) -> Result<Self, RelayError> {
        let mut backend = Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            assistant_id: String::new(),
        };

        backend.assistant_id = match config.assistant_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => backend.create_assistant(config).await?,
        };
        Ok(backend)
    }

    /// Identifier of the assistant every run is started with.
    #[must_use]
    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }

    async fn create_assistant(&self, config: &AssistantConfig) -> Result<String, RelayError> {
        let body = json!({
            "model": config.model,
            "name": config.name,
            "instructions": config.instructions,
        });
        let created: Created = send_json(self.request(Method::POST, "/assistants").json(&body)).await?;

        info!(
            name: "assistant.created",
            assistant_id = %created.id,
            assistant_name = %config.name,
            "No assistant id configured, created one; set OPENAI_ASSISTANT_ID to reuse it"
        );
        Ok(created.id)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .header(BETA_HEADER.0, BETA_HEADER.1)
    }
}

#[async_trait]
impl AssistantBackend for OpenAiAssistants {
    async fn create_thread(&self) -> Result<ThreadId, RelayError> {
        let created: Created = send_json(self.request(Method::POST, "/threads").json(&json!({}))).await?;
        Ok(ThreadId::new(created.id))
    }

    async fn add_user_message(&self, thread: &ThreadId, text: &str) -> Result<(), RelayError> {
        let path = format!("/threads/{thread}/messages");
        let body = json!({ "role": "user", "content": text });
        let _: Created = send_json(self.request(Method::POST, &path).json(&body)).await?;
        Ok(())
    }

    async fn start_run(&self, thread: &ThreadId) -> Result<Run, RelayError> {
        let path = format!("/threads/{thread}/runs");
        let body = json!({ "assistant_id": self.assistant_id });
        send_json(self.request(Method::POST, &path).json(&body)).await
    }

    async fn get_run(&self, thread: &ThreadId, run_id: &str) -> Result<Run, RelayError> {
        let path = format!("/threads/{thread}/runs/{run_id}");
        send_json(self.request(Method::GET, &path)).await
    }

    async fn cancel_run(&self, thread: &ThreadId, run_id: &str) -> Result<(), RelayError> {
        let path = format!("/threads/{thread}/runs/{run_id}/cancel");
        let _: Run = send_json(self.request(Method::POST, &path)).await?;
        Ok(())
    }

    async fn latest_reply(
        &self,
        thread: &ThreadId,
        run_id: &str,
    ) -> Result<Option<String>, RelayError> {
        let path = format!("/threads/{thread}/messages");
        let list: MessageList = send_json(
            self.request(Method::GET, &path)
                .query(&[("order", "desc"), ("run_id", run_id)]),
        )
        .await?;
        Ok(newest_assistant_text(&list))
    }
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, RelayError> {
    let response = request.send().await?.error_for_status()?;
    Ok(response.json().await?)
}

/// Text of the first assistant message in a newest-first listing.
fn newest_assistant_text(list: &MessageList) -> Option<String> {
    let message = list.data.iter().find(|m| m.role == "assistant")?;
    let parts: Vec<&str> = message
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.value.as_str()),
            ContentBlock::Other => None,
        })
        .collect();

    let text = parts.join("\n");
    (!text.trim().is_empty()).then_some(text)
}
