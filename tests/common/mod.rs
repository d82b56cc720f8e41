#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use wa_assistant_relay::AppState;
use wa_assistant_relay::assistant::{AssistantBackend, AssistantClient, PollSettings, Run, RunStatus};
use wa_assistant_relay::config::{
    AppConfig, AssistantConfig, RelayConfig, ServerConfig, WhatsAppConfig,
};
use wa_assistant_relay::error::RelayError;
use wa_assistant_relay::server::router;
use wa_assistant_relay::session::{ThreadId, ThreadStore};
use wa_assistant_relay::whatsapp::MessageSender;

pub const VERIFY_TOKEN: &str = "verify-me";
pub const FALLBACK: &str = "Sorry, something went wrong.";

pub fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
        },
        whatsapp: WhatsAppConfig {
            access_token: "wa-token".to_string(),
            phone_number_id: "106540352242922".to_string(),
            verify_token: VERIFY_TOKEN.to_string(),
            api_base_url: "http://127.0.0.1:9".to_string(),
        },
        assistant: AssistantConfig {
            api_key: "sk-test".to_string(),
            assistant_id: Some("asst_test".to_string()),
            name: "WhatsApp Assistant".to_string(),
            instructions: "You are a helpful assistant.".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            poll_interval_ms: 5,
            run_timeout_secs: 1,
        },
        relay: RelayConfig {
            fallback_message: FALLBACK.to_string(),
        },
    }
}

/// How the stub assistant's runs behave.
#[derive(Debug, Clone)]
pub enum RunScript {
    /// Complete after one poll with this reply.
    Reply(String),
    /// Stay `in_progress` forever.
    NeverFinishes,
    /// End in the given terminal status.
    Ends(RunStatus),
}

#[derive(Debug)]
pub struct StubAssistant {
    script: RunScript,
    create_delay: Duration,
    pub threads_created: AtomicUsize,
    /// (thread, text) for every posted user message.
    pub posted: Mutex<Vec<(String, String)>>,
    /// Ids of runs the relay gave up on.
    pub cancelled: Mutex<Vec<String>>,
}

impl StubAssistant {
    pub fn new(script: RunScript) -> Self {
        Self {
            script,
            create_delay: Duration::ZERO,
            threads_created: AtomicUsize::new(0),
            posted: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(text: &str) -> Self {
        Self::new(RunScript::Reply(text.to_string()))
    }

    pub fn with_create_delay(mut self, delay: Duration) -> Self {
        self.create_delay = delay;
        self
    }
}

#[async_trait]
impl AssistantBackend for StubAssistant {
    async fn create_thread(&self) -> Result<ThreadId, RelayError> {
        tokio::time::sleep(self.create_delay).await;
        let n = self.threads_created.fetch_add(1, Ordering::SeqCst);
        Ok(ThreadId::new(format!("thread_{n}")))
    }

    async fn add_user_message(&self, thread: &ThreadId, text: &str) -> Result<(), RelayError> {
        self.posted
            .lock()
            .unwrap()
            .push((thread.to_string(), text.to_string()));
        Ok(())
    }

    async fn start_run(&self, _thread: &ThreadId) -> Result<Run, RelayError> {
        Ok(Run {
            id: "run_1".to_string(),
            status: RunStatus::Queued,
        })
    }

    async fn get_run(&self, _thread: &ThreadId, run_id: &str) -> Result<Run, RelayError> {
        let status = match &self.script {
            RunScript::Reply(_) => RunStatus::Completed,
            RunScript::NeverFinishes => RunStatus::InProgress,
            RunScript::Ends(status) => *status,
        };
        Ok(Run {
            id: run_id.to_string(),
            status,
        })
    }

    async fn cancel_run(&self, _thread: &ThreadId, run_id: &str) -> Result<(), RelayError> {
        self.cancelled.lock().unwrap().push(run_id.to_string());
        Ok(())
    }

    async fn latest_reply(
        &self,
        _thread: &ThreadId,
        _run_id: &str,
    ) -> Result<Option<String>, RelayError> {
        Ok(match &self.script {
            RunScript::Reply(text) => Some(text.clone()),
            _ => None,
        })
    }
}

/// Sender that records deliveries, optionally failing every one of them.
#[derive(Debug, Default)]
pub struct RecordingSender {
    fail: bool,
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingSender {
    pub fn failing() -> Self {
        Self {
            fail: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_text(&self, recipient: &str, text: &str) -> Result<(), RelayError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), text.to_string()));
        if self.fail {
            return Err(RelayError::DeliveryFailure {
                status: StatusCode::UNAUTHORIZED,
                body: r#"{"error":{"message":"Invalid OAuth access token"}}"#.to_string(),
            });
        }
        Ok(())
    }
}

pub struct Harness {
    pub app: Router,
    pub state: AppState,
    pub assistant: Arc<StubAssistant>,
    pub sender: Arc<RecordingSender>,
}

pub fn harness(assistant: StubAssistant, sender: RecordingSender) -> Harness {
    let config = Arc::new(test_config());
    let assistant = Arc::new(assistant);
    let sender = Arc::new(sender);

    let state = AppState {
        assistant: AssistantClient::new(
            Arc::clone(&assistant) as Arc<dyn AssistantBackend>,
            ThreadStore::new(),
            PollSettings::from_config(&config.assistant),
        ),
        whatsapp: Arc::clone(&sender) as Arc<dyn MessageSender>,
        config,
    };

    Harness {
        app: router(state.clone()),
        state,
        assistant,
        sender,
    }
}

/// Send one request through the router and collect status and body.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

pub fn post_webhook(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// A WhatsApp text-message event from `from`.
pub fn text_event(from: &str, body: &str) -> serde_json::Value {
    serde_json::json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "102290129340398",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {
                        "display_phone_number": "15550783881",
                        "phone_number_id": "106540352242922"
                    },
                    "contacts": [{ "profile": { "name": "Test Customer" }, "wa_id": from }],
                    "messages": [{
                        "from": from,
                        "id": format!("wamid.{body}"),
                        "timestamp": "1749416383",
                        "type": "text",
                        "text": { "body": body }
                    }]
                }
            }]
        }]
    })
}
