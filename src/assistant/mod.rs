//! Assistant conversation client.
//!
//! [`AssistantBackend`] is the transport seam: one method per Assistants API
//! call. [`AssistantClient`] builds the relay's behaviour on top of it:
//! thread reuse through the [`ThreadStore`], and the bounded run-poll loop.
//!
//! # Backends
//!
//! - [`OpenAiAssistants`]: `OpenAI` Assistants API v2 over HTTP

pub mod openai;

pub use openai::OpenAiAssistants;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::AssistantConfig;
use crate::error::RelayError;
use crate::session::{ThreadId, ThreadStore};

/// Lifecycle state of an assistant run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Cancelling,
    RequiresAction,
    Completed,
    Failed,
    Cancelled,
    Expired,
    Incomplete,
    /// A status this relay does not know about; treated as still running.
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// Whether the run will not change state any more.
    ///
    /// `requires_action` counts as terminal: the relay registers no tools, so
    /// nothing will ever submit the outputs the run is waiting for.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed
                | Self::Failed
                | Self::Cancelled
                | Self::Expired
                | Self::Incomplete
                | Self::RequiresAction
        )
    }

    /// Wire name of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Cancelling => "cancelling",
            Self::RequiresAction => "requires_action",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Incomplete => "incomplete",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one assistant run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Run {
    /// Backend run identifier.
    pub id: String,
    /// Current status.
    pub status: RunStatus,
}

/// Raw Assistants API operations.
#[async_trait]
pub trait AssistantBackend: Send + Sync + fmt::Debug {
    /// Create an empty conversation thread.
    async fn create_thread(&self) -> Result<ThreadId, RelayError>;

    /// Append a user message to `thread`.
    async fn add_user_message(&self, thread: &ThreadId, text: &str) -> Result<(), RelayError>;

    /// Start the configured assistant on `thread`.
    async fn start_run(&self, thread: &ThreadId) -> Result<Run, RelayError>;

    /// Fetch the current state of a run.
    async fn get_run(&self, thread: &ThreadId, run_id: &str) -> Result<Run, RelayError>;

    /// Ask the backend to stop a run the relay no longer waits for.
    async fn cancel_run(&self, thread: &ThreadId, run_id: &str) -> Result<(), RelayError>;

    /// Text of the newest assistant message produced by `run_id`, if any.
    async fn latest_reply(
        &self,
        thread: &ThreadId,
        run_id: &str,
    ) -> Result<Option<String>, RelayError>;
}

/// Run polling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Delay between two status checks.
    pub interval: Duration,
    /// Total time a run may take before the relay gives up on it.
    pub budget: Duration,
}

impl PollSettings {
    #[must_use]
    pub fn from_config(config: &AssistantConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.poll_interval_ms),
            budget: Duration::from_secs(config.run_timeout_secs),
        }
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            budget: Duration::from_secs(30),
        }
    }
}

/// Thread-aware assistant client shared by all webhook requests.
#[derive(Debug, Clone)]
pub struct AssistantClient {
    backend: Arc<dyn AssistantBackend>,
    threads: ThreadStore,
    poll: PollSettings,
}

impl AssistantClient {
    #[must_use]
    pub fn new(backend: Arc<dyn AssistantBackend>, threads: ThreadStore, poll: PollSettings) -> Self {
        Self {
            backend,
            threads,
            poll,
        }
    }

    /// The sender to thread mapping used by this client.
    #[must_use]
    pub fn threads(&self) -> &ThreadStore {
        &self.threads
    }

    /// Return the sender's thread, creating it on the backend on first contact.
    pub async fn get_or_create_thread(&self, sender: &str) -> Result<ThreadId, RelayError> {
        self.threads
            .get_or_try_create(sender, || async {
                let thread = self.backend.create_thread().await?;
                info!(
                    name: "assistant.thread.created",
                    sender = %sender,
                    thread_id = %thread,
                    "Created assistant thread"
                );
                Ok::<_, RelayError>(thread)
            })
            .await
    }

    /// Post `text` on `thread`, run the assistant and return its reply.
    pub async fn ask(&self, thread: &ThreadId, text: &str) -> Result<String, RelayError> {
        self.backend.add_user_message(thread, text).await?;
        let run = self.backend.start_run(thread).await?;
        debug!(thread_id = %thread, run_id = %run.id, "Assistant run started");

        let budget = self.poll.budget;
        let run_id = run.id.clone();
        let run = match tokio::time::timeout(budget, self.wait_for_terminal(thread, run)).await {
            Ok(run) => run?,
            Err(_elapsed) => {
                warn!(
                    name: "assistant.run.timeout",
                    thread_id = %thread,
                    run_id = %run_id,
                    budget_secs = budget.as_secs(),
                    "Assistant run exceeded wait budget"
                );
                // An abandoned active run would make the thread reject the
                // sender's next message.
                self.cancel_abandoned(thread, &run_id).await;
                return Err(RelayError::AssistantTimeout {
                    waited_secs: budget.as_secs(),
                });
            }
        };

        if run.status != RunStatus::Completed {
            warn!(
                name: "assistant.run.failed",
                thread_id = %thread,
                run_id = %run.id,
                status = %run.status,
                "Assistant run did not complete"
            );
            return Err(RelayError::AssistantRunFailed {
                status: run.status.to_string(),
            });
        }

        self.backend
            .latest_reply(thread, &run.id)
            .await?
            .ok_or_else(|| {
                RelayError::UnexpectedResponse(format!(
                    "run {} completed without an assistant message",
                    run.id
                ))
            })
    }

    /// Full turn for one inbound message: thread lookup, then [`Self::ask`].
    ///
    /// Turns from the same sender are serialized.
    pub async fn reply(&self, sender: &str, text: &str) -> Result<String, RelayError> {
        let _turn = self.threads.lock_turn(sender).await;
        let thread = self.get_or_create_thread(sender).await?;
        self.ask(&thread, text).await
    }

    async fn cancel_abandoned(&self, thread: &ThreadId, run_id: &str) {
        match self.backend.cancel_run(thread, run_id).await {
            Ok(()) => info!(
                name: "assistant.run.cancelled",
                thread_id = %thread,
                run_id = %run_id,
                "Cancelled abandoned assistant run"
            ),
            Err(err) => warn!(
                name: "assistant.run.cancel_failed",
                thread_id = %thread,
                run_id = %run_id,
                error = %err,
                "Could not cancel abandoned assistant run"
            ),
        }
    }

    async fn wait_for_terminal(&self, thread: &ThreadId, mut run: Run) -> Result<Run, RelayError> {
        while !run.status.is_terminal() {
            tokio::time::sleep(self.poll.interval).await;
            run = self.backend.get_run(thread, &run.id).await?;
            debug!(run_id = %run.id, status = %run.status, "Polled assistant run");
        }
        Ok(run)
    }
}
