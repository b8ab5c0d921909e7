//! Realtime Push Channel
//!
//! Client-side view of the platform's row-change push channel: a broadcast
//! of `ChangeEvent`s and filtered subscriptions over it. At-least-once
//! delivery; no ordering guarantee across subscriptions.

pub mod broadcast;
pub mod subscription;

pub use broadcast::{broadcast_change, change_channel, ChangeBroadcast};
pub use subscription::{ChangeFilter, Subscription};
