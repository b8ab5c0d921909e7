//! Messaging Data Structures
//!
//! Typed DTOs for the messaging core. Row shapes coming back from the store
//! are parsed into these types at the boundary so the rest of the core never
//! sees loose, schema-drifting rows.

pub mod conversation;
pub mod message;
pub mod profile;

pub use conversation::{other_user, ConversationRow, ConversationSummary, ParticipantRow};
pub use message::{DeliveryState, MessageRow, NewMessage, StreamMessage};
pub use profile::ProfileSnapshot;
