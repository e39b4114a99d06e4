//! Model collaborator boundary.

use async_trait::async_trait;
use branch_manager::ChatMessage;
use futures::stream::BoxStream;
use thiserror::Error;

#[derive(Error, Debug)]
#[error("text producer failed: {0}")]
pub struct ProducerError(pub String);

/// Ordered sequence of content fragments from the model.
pub type TextStream = BoxStream<'static, Result<String, ProducerError>>;

/// The language-model collaborator: turns an ordered role/content context
/// into an ordered stream of text fragments. Vendor, transport and retry
/// details all live behind this trait.
#[async_trait]
pub trait TextProducer: Send + Sync {
    async fn produce(&self, context: Vec<ChatMessage>) -> Result<TextStream, ProducerError>;
}
