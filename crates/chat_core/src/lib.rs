//! Core types for the conversation branching engine: message nodes, chat
//! sessions and the externally observable payload shapes.

pub mod message;
pub mod payloads;
pub mod session;

pub use message::{MessageNode, MessageStatus, Role};
pub use payloads::{
    HistoryResponse, MessageSummary, SessionSummary, SiblingsResponse, StreamFragment,
};
pub use session::ChatSession;
