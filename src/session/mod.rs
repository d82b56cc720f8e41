//! Conversation continuity across webhook deliveries.
//!
//! Each WhatsApp sender is mapped to one assistant thread for the lifetime of
//! the process, so the assistant keeps the context of earlier messages.
//!
//! # Example
//!
//! ```rust
//! use wa_assistant_relay::session::{ThreadId, ThreadStore};
//!
//! let store = ThreadStore::new();
//! assert!(store.put("+15551234567", ThreadId::new("thread_abc")));
//! assert!(!store.put("+15551234567", ThreadId::new("thread_xyz")));
//!
//! assert_eq!(store.get("+15551234567").unwrap().as_str(), "thread_abc");
//! ```

mod thread;

pub use thread::{ThreadId, ThreadStore};
