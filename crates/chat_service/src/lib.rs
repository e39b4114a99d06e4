//! External operations layer for the conversation branching engine.
//!
//! Wraps [`branch_manager`] behind the operation surface a transport layer
//! would expose: session management, message creation, history, branch
//! switching, sibling navigation and streamed (re)generation. Identifiers
//! cross this boundary only through the [`IdCodec`] collaborator; model
//! text arrives only through the [`TextProducer`] collaborator.

pub mod codec;
pub mod config;
pub mod error;
pub mod logging;
pub mod producer;
pub mod service;
pub mod streaming;

pub use codec::{CodecError, IdCodec, PlainIdCodec};
pub use config::ServiceConfig;
pub use error::ServiceError;
pub use logging::init_tracing;
pub use producer::{ProducerError, TextProducer, TextStream};
pub use service::ChatService;
pub use streaming::FragmentStream;
