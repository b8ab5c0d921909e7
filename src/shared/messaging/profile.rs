//! Profile Snapshot
//!
//! Messaging owns only the user identifier; display attributes belong to the
//! profile subsystem and cross the boundary as a read-only snapshot.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Read-only view of another subsystem's profile row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileSnapshot {
    /// The profile owner's user ID
    pub user_id: Uuid,
    /// Display name shown in conversation lists and message bubbles
    pub display_name: String,
    /// Unique handle (e.g. "@peregrina")
    pub handle: String,
    /// Avatar image URL, if the user set one
    pub avatar_url: Option<String>,
}

impl ProfileSnapshot {
    /// Build a snapshot with just the required fields
    pub fn new(user_id: Uuid, display_name: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            handle: handle.into(),
            avatar_url: None,
        }
    }
}
