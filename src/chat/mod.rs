//! Messaging Core
//!
//! The five components of the direct-messaging subsystem and the facade the
//! UI layer drives them through. All shared mutable session state lives in
//! [`ConversationSession`], passed explicitly to every component.

pub mod client;
pub mod directory;
pub mod read_state;
pub mod resolver;
pub mod send;
pub mod session;
pub mod stream;

pub use client::ChatClient;
pub use directory::ConversationDirectory;
pub use read_state::{ReadMark, ReadStateTracker};
pub use resolver::ConversationResolver;
pub use send::OptimisticSendPipeline;
pub use session::ConversationSession;
pub use stream::MessageStream;
