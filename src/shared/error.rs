//! Error Types
//!
//! Two layers of errors: `StoreError` at the store boundary and `ChatError`
//! at the component boundary. Store and push-channel failures are caught at
//! the component that issued them; nothing propagates into shared local state.
//!
//! # Thread Safety
//!
//! All error types are `Send + Sync` and can cross task boundaries.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by a `MessagingStore` implementation
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    /// A query or statement failed
    #[error("store query failed: {message}")]
    Query {
        /// Human-readable error message
        message: String,
    },

    /// A row the operation required does not exist
    #[error("row not found: {what}")]
    NotFound {
        /// What was being looked up
        what: String,
    },

    /// The store does not provide this operation; callers with a fallback
    /// path (conversation creation) switch to it on this variant
    #[error("operation not supported by this store: {operation}")]
    Unsupported {
        /// The missing operation
        operation: &'static str,
    },

    /// A row could not be decoded into its typed DTO
    #[error("row decode failed: {message}")]
    Decode {
        /// Human-readable error message
        message: String,
    },
}

impl StoreError {
    /// Create a new query error
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
        }
    }

    /// Create a new not-found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Create a new unsupported-operation error
    pub fn unsupported(operation: &'static str) -> Self {
        Self::Unsupported { operation }
    }

    /// Create a new decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::query(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::decode(format!("JSON error: {}", err))
    }
}

/// Errors surfaced to callers of the messaging components
#[derive(Debug, Error)]
pub enum ChatError {
    /// Send was called with content that is empty after trimming
    #[error("message content is empty")]
    EmptyMessage,

    /// Send was called with no conversation open
    #[error("no conversation is open")]
    NoOpenConversation,

    /// The user is not a participant of the conversation
    #[error("user {user_id} is not a participant of conversation {conversation_id}")]
    NotAParticipant {
        user_id: Uuid,
        conversation_id: Uuid,
    },

    /// Conversation creation failed; no usable conversation id exists
    #[error("conversation creation failed: {message}")]
    CreationFailed {
        /// Human-readable error message
        message: String,
    },

    /// Invalid configuration value
    #[error("invalid configuration: {message}")]
    Config {
        /// Human-readable error message
        message: String,
    },

    /// A store operation failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ChatError {
    /// Create a new creation-failed error
    pub fn creation_failed(message: impl std::fmt::Display) -> Self {
        Self::CreationFailed {
            message: message.to_string(),
        }
    }

    /// Create a new configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
