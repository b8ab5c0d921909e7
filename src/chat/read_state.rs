//! Read-State Tracker
//!
//! "read" is a server-confirmed boolean, but the UI must show zero unread
//! the instant a conversation is opened. The tracker runs a small per
//! conversation state machine:
//!
//! ```text
//! Unseen -> MarkingInFlight -> Settled
//! ```
//!
//! Entering `MarkingInFlight` fires the mark-as-read write and starts a
//! suppression window. While the window is open the directory forces the
//! conversation's unread count to zero instead of trusting a possibly-stale
//! server count. When the window elapses the state settles and refreshes
//! trust the server again.
//!
//! A failed read-write is logged and swallowed; the next open re-attempts
//! the marking, so the server converges without a retry loop here.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use uuid::Uuid;

use crate::store::MessagingStore;

/// Per-conversation marking state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMark {
    /// No marking attempted this session
    Unseen,
    /// A mark-as-read write is outstanding; unread counts are suppressed
    MarkingInFlight,
    /// The suppression window elapsed; server counts are trusted
    Settled,
}

struct Slot {
    mark: ReadMark,
    /// Bumped on every re-arm so a stale settle timer cannot close a newer window
    epoch: u64,
}

/// Tracks read-marking state per conversation
pub struct ReadStateTracker {
    states: Mutex<HashMap<Uuid, Slot>>,
    window: Duration,
}

impl ReadStateTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            window,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Slot>> {
        self.states.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current state for a conversation
    pub fn state(&self, conversation_id: Uuid) -> ReadMark {
        self.lock()
            .get(&conversation_id)
            .map(|s| s.mark)
            .unwrap_or(ReadMark::Unseen)
    }

    /// Whether the directory must force this conversation's unread count to zero
    pub fn is_suppressed(&self, conversation_id: Uuid) -> bool {
        self.state(conversation_id) == ReadMark::MarkingInFlight
    }

    /// Open a conversation: issue the bulk mark-as-read write and arm the
    /// suppression window. Fire-and-forget; write failures are logged.
    pub fn begin_marking(
        self: &Arc<Self>,
        store: Arc<dyn MessagingStore>,
        conversation_id: Uuid,
        reader_id: Uuid,
    ) {
        self.arm(conversation_id);
        tokio::spawn(async move {
            match store.mark_conversation_read(conversation_id, reader_id).await {
                Ok(affected) => {
                    tracing::debug!(
                        "[ReadState] Marked {} messages read in {}",
                        affected,
                        conversation_id
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "[ReadState] mark-as-read failed for {}: {}",
                        conversation_id,
                        e
                    );
                }
            }
        });
    }

    /// A message arrived while the conversation is open and its individual
    /// read-write has been issued elsewhere; re-arm the window only.
    pub fn note_arrival(self: &Arc<Self>, conversation_id: Uuid) {
        self.arm(conversation_id);
    }

    /// Enter `MarkingInFlight` and spawn the settle timer for this epoch
    fn arm(self: &Arc<Self>, conversation_id: Uuid) {
        let epoch = {
            let mut states = self.lock();
            let slot = states.entry(conversation_id).or_insert(Slot {
                mark: ReadMark::Unseen,
                epoch: 0,
            });
            slot.mark = ReadMark::MarkingInFlight;
            slot.epoch += 1;
            slot.epoch
        };

        let tracker = Arc::clone(self);
        let window = self.window;
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            let mut states = tracker.lock();
            if let Some(slot) = states.get_mut(&conversation_id) {
                if slot.epoch == epoch && slot.mark == ReadMark::MarkingInFlight {
                    slot.mark = ReadMark::Settled;
                }
            }
        });
    }

    /// Forget a conversation's state (used when it is deleted)
    pub fn forget(&self, conversation_id: Uuid) {
        self.lock().remove(&conversation_id);
    }
}
