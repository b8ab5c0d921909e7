//! Conversation Session
//!
//! The only shared mutable state across the messaging components, owned
//! explicitly and passed to each of them: the currently-open conversation
//! pointer, the set of conversations cleared in this session, and the
//! message draft buffer. All three are written only by explicit user actions
//! (open, select, type), never by background events.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Default)]
struct SessionInner {
    open: Option<Uuid>,
    cleared: HashSet<Uuid>,
    draft: String,
}

/// Per-client session state for the messaging core
#[derive(Default)]
pub struct ConversationSession {
    inner: Mutex<SessionInner>,
}

impl ConversationSession {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The currently-open conversation, if any
    pub fn open_conversation(&self) -> Option<Uuid> {
        self.lock().open
    }

    /// Point the session at a conversation
    pub fn set_open(&self, conversation_id: Uuid) {
        self.lock().open = Some(conversation_id);
    }

    /// Whether this conversation is the open one
    ///
    /// In-flight completions check this at application time, not at the time
    /// the operation started, so they never mutate state for a conversation
    /// the user has navigated away from.
    pub fn is_open(&self, conversation_id: Uuid) -> bool {
        self.lock().open == Some(conversation_id)
    }

    /// Clear the open pointer
    pub fn clear_open(&self) {
        self.lock().open = None;
    }

    /// Clear the open pointer only if it matches; returns whether it did
    pub fn clear_open_if(&self, conversation_id: Uuid) -> bool {
        let mut inner = self.lock();
        if inner.open == Some(conversation_id) {
            inner.open = None;
            true
        } else {
            false
        }
    }

    /// Record that the user has seen this conversation in this session
    pub fn mark_cleared(&self, conversation_id: Uuid) {
        self.lock().cleared.insert(conversation_id);
    }

    /// Whether the conversation was cleared in this session
    pub fn is_cleared(&self, conversation_id: Uuid) -> bool {
        self.lock().cleared.contains(&conversation_id)
    }

    /// Forget the cleared flag (used when the conversation is deleted)
    pub fn unmark_cleared(&self, conversation_id: Uuid) {
        self.lock().cleared.remove(&conversation_id);
    }

    /// Current draft text
    pub fn draft(&self) -> String {
        self.lock().draft.clone()
    }

    /// Replace the draft text
    pub fn set_draft(&self, draft: impl Into<String>) {
        self.lock().draft = draft.into();
    }

    /// Take the draft, leaving it empty
    pub fn take_draft(&self) -> String {
        std::mem::take(&mut self.lock().draft)
    }
}
