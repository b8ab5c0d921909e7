//! Shared Types
//!
//! Types used across the store, realtime, and chat layers: typed DTOs, the
//! row-change event shape, configuration, and the error taxonomy.

pub mod config;
pub mod error;
pub mod event;
pub mod messaging;

pub use config::ChatConfig;
pub use error::{ChatError, StoreError};
pub use event::{ChangeEvent, ChangeOp, Relation};
