//! Sender to assistant-thread mapping.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, OnceCell};

/// Identifier of a conversation thread on the assistant backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    /// Wrap a backend-issued thread identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-sender state.
///
/// `thread` is set at most once. `turn` serializes assistant turns for the
/// sender, since a thread cannot accept a new message while a run is active.
#[derive(Debug, Default)]
struct ThreadSlot {
    thread: OnceCell<ThreadId>,
    turn: Arc<AsyncMutex<()>>,
}

/// Thread-safe, in-memory map from WhatsApp sender to assistant thread.
///
/// Entries are never evicted. The first thread recorded for a sender wins.
#[derive(Debug, Clone, Default)]
pub struct ThreadStore {
    inner: Arc<ThreadStoreInner>,
}

#[derive(Debug, Default)]
struct ThreadStoreInner {
    slots: Mutex<HashMap<String, Arc<ThreadSlot>>>,
}

impl ThreadStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Arc<ThreadSlot>>> {
        self.inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch the slot for `sender`, creating an empty one under the map lock.
    fn slot(&self, sender: &str) -> Arc<ThreadSlot> {
        Arc::clone(self.slots().entry(sender.to_string()).or_default())
    }

    /// Get the thread mapped to `sender`, if any.
    #[must_use]
    pub fn get(&self, sender: &str) -> Option<ThreadId> {
        self.slots()
            .get(sender)
            .and_then(|slot| slot.thread.get().cloned())
    }

    /// Record `thread` for `sender` unless one is already mapped.
    ///
    /// Returns `false` when the write was ignored because the sender already
    /// has a thread, or one is being created for it.
    pub fn put(&self, sender: &str, thread: ThreadId) -> bool {
        match self.slot(sender).thread.set(thread) {
            Ok(()) => true,
            Err(err) => {
                tracing::debug!(sender = %sender, reason = %err, "Ignoring thread for mapped sender");
                false
            }
        }
    }

    /// Return the thread for `sender`, running `create` if there is none yet.
    ///
    /// Concurrent callers for the same sender wait on a single `create`; if it
    /// fails the sender stays unmapped and the error is returned to the caller
    /// that ran it. Callers for other senders are not blocked.
    pub async fn get_or_try_create<F, Fut, E>(&self, sender: &str, create: F) -> Result<ThreadId, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ThreadId, E>>,
    {
        let slot = self.slot(sender);
        let thread = slot.thread.get_or_try_init(create).await?;
        Ok(thread.clone())
    }

    /// Acquire the turn lock for `sender`.
    ///
    /// Held for the duration of one message/run/reply cycle.
    pub async fn lock_turn(&self, sender: &str) -> OwnedMutexGuard<()> {
        let turn = Arc::clone(&self.slot(sender).turn);
        turn.lock_owned().await
    }

    /// Number of senders with a mapped thread.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots()
            .values()
            .filter(|slot| slot.thread.initialized())
            .count()
    }

    /// Whether no sender has a mapped thread yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
