//! Chat operations service

use std::sync::Arc;

use branch_manager::BranchService;
use chat_core::{
    ChatSession, HistoryResponse, MessageNode, MessageSummary, Role, SessionSummary,
    SiblingsResponse,
};
use message_store::NodeStore;
use uuid::Uuid;

use crate::codec::{IdCodec, PlainIdCodec};
use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};
use crate::producer::TextProducer;

/// Longest stored session title; anything longer is clipped with an
/// ellipsis.
const MAX_TITLE_CHARS: usize = 255;

/// The operation surface a transport layer calls into.
///
/// Holds the branch service (the sole tree mutator), the model and
/// id-codec collaborators and the service configuration. All state lives
/// in the node store; the service itself is cheaply cloneable.
pub struct ChatService<S> {
    branches: BranchService<S>,
    store: Arc<S>,
    producer: Arc<dyn TextProducer>,
    codec: Arc<dyn IdCodec>,
    config: ServiceConfig,
}

impl<S> Clone for ChatService<S> {
    fn clone(&self) -> Self {
        Self {
            branches: self.branches.clone(),
            store: Arc::clone(&self.store),
            producer: Arc::clone(&self.producer),
            codec: Arc::clone(&self.codec),
            config: self.config.clone(),
        }
    }
}

impl<S: NodeStore> ChatService<S> {
    pub fn new(store: Arc<S>, producer: Arc<dyn TextProducer>) -> Self {
        Self::with_config(store, producer, ServiceConfig::default())
    }

    pub fn with_config(
        store: Arc<S>,
        producer: Arc<dyn TextProducer>,
        config: ServiceConfig,
    ) -> Self {
        let branches = BranchService::new(Arc::clone(&store))
            .with_max_conflict_retries(config.max_conflict_retries);
        Self {
            branches,
            store,
            producer,
            codec: Arc::new(PlainIdCodec),
            config,
        }
    }

    /// Swap in the embedding application's id obfuscation scheme.
    pub fn with_codec(mut self, codec: Arc<dyn IdCodec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn branches(&self) -> &BranchService<S> {
        &self.branches
    }

    pub(crate) fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub(crate) fn producer(&self) -> &Arc<dyn TextProducer> {
        &self.producer
    }

    pub(crate) fn codec(&self) -> &Arc<dyn IdCodec> {
        &self.codec
    }

    pub(crate) fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub(crate) fn decode_id(&self, value: &str) -> Result<Uuid> {
        self.codec
            .decode(value)
            .map_err(|err| ServiceError::InvalidIdentifier(err.to_string()))
    }

    // ---- Sessions -------------------------------------------------------

    pub async fn create_session(&self, title: Option<&str>) -> Result<SessionSummary> {
        let session = self
            .store
            .create_session(title.map(clip_title))
            .await
            .map_err(ServiceError::from)?;
        tracing::info!(session_id = %session.id, "ChatService: session created");
        Ok(self.session_summary(&session))
    }

    pub async fn rename_session(&self, chat_id: &str, title: &str) -> Result<SessionSummary> {
        let session_id = self.decode_id(chat_id)?;
        let title = clip_title(title);
        let session = self
            .store
            .update_session(session_id, move |record| {
                record.session.title = Some(title.clone());
                Ok(record.session.clone())
            })
            .await
            .map_err(ServiceError::from)?;
        Ok(self.session_summary(&session))
    }

    /// All sessions, most recently active first.
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let sessions = self.store.list_sessions().await.map_err(ServiceError::from)?;
        Ok(sessions
            .iter()
            .map(|session| self.session_summary(session))
            .collect())
    }

    pub async fn delete_session(&self, chat_id: &str) -> Result<()> {
        let session_id = self.decode_id(chat_id)?;
        self.store
            .delete_session(session_id)
            .await
            .map_err(ServiceError::from)
    }

    // ---- Messages -------------------------------------------------------

    /// Store a user message. Without a `chat_id` a fresh session is
    /// created, titled from the message. Without a `parent_id` the message
    /// goes under the session's current tip; the tip of an empty session is
    /// the root.
    pub async fn create_message(
        &self,
        chat_id: Option<&str>,
        content: &str,
        parent_id: Option<&str>,
    ) -> Result<MessageSummary> {
        let session_id = match chat_id {
            Some(value) => self.decode_id(value)?,
            None => {
                let session = self
                    .store
                    .create_session(Some(clip_title(content)))
                    .await
                    .map_err(ServiceError::from)?;
                tracing::info!(session_id = %session.id, "ChatService: session created for first message");
                session.id
            }
        };

        let parent_id = match parent_id {
            Some(value) => Some(self.decode_id(value)?),
            None => {
                self.store
                    .read_session(session_id)
                    .await
                    .map_err(ServiceError::from)?
                    .session
                    .current_node_id
            }
        };

        let node = self
            .branches
            .add_message(session_id, Role::User, content, parent_id)
            .await?;
        Ok(self.message_summary(&node))
    }

    /// The active branch of a session, oldest first, capped at the
    /// configured history window.
    pub async fn get_history(&self, chat_id: &str) -> Result<HistoryResponse> {
        let session_id = self.decode_id(chat_id)?;
        let nodes = self.branches.active_branch(session_id).await?;
        Ok(self.history_response(session_id, nodes))
    }

    /// Make `target`'s branch active and return the new history.
    pub async fn switch_branch(&self, chat_id: &str, target_id: &str) -> Result<HistoryResponse> {
        let session_id = self.decode_id(chat_id)?;
        let target_id = self.decode_id(target_id)?;
        let nodes = self.branches.switch_branch(session_id, target_id).await?;
        Ok(self.history_response(session_id, nodes))
    }

    /// Version navigation data for one message's sibling group.
    pub async fn get_siblings(&self, chat_id: &str, message_id: &str) -> Result<SiblingsResponse> {
        let session_id = self.decode_id(chat_id)?;
        let node_id = self.decode_id(message_id)?;
        let info = self.branches.siblings_info(session_id, node_id).await?;
        Ok(SiblingsResponse {
            current_version: info.current_version,
            total_versions: info.total_versions,
            sibling_ids: info
                .sibling_ids
                .iter()
                .map(|id| self.codec.encode(*id))
                .collect(),
        })
    }

    /// Cut an in-flight generation short. The node keeps the content that
    /// arrived and is marked interrupted; the tree stays consistent.
    pub async fn stop_streaming(&self, chat_id: &str, message_id: &str) -> Result<MessageSummary> {
        let session_id = self.decode_id(chat_id)?;
        let node_id = self.decode_id(message_id)?;
        tracing::info!(session_id = %session_id, node_id = %node_id, "ChatService: stopping generation");
        let node = self.branches.interrupt_message(session_id, node_id).await?;
        Ok(self.message_summary(&node))
    }

    // ---- Payload assembly ----------------------------------------------

    pub(crate) fn message_summary(&self, node: &MessageNode) -> MessageSummary {
        MessageSummary {
            message_id: self.codec.encode(node.id),
            chat_id: self.codec.encode(node.session_id),
            role: node.role,
            content: node.content.clone(),
            created_at: node.created_at,
            parent_id: node.parent_id.map(|id| self.codec.encode(id)),
            current_version: node.current_version,
            total_versions: node.total_versions,
        }
    }

    fn session_summary(&self, session: &ChatSession) -> SessionSummary {
        SessionSummary {
            chat_id: self.codec.encode(session.id),
            title: session.title.clone(),
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }

    fn history_response(&self, session_id: Uuid, nodes: Vec<MessageNode>) -> HistoryResponse {
        let start = nodes.len().saturating_sub(self.config.history_limit);
        HistoryResponse {
            chat_id: self.codec.encode(session_id),
            messages: nodes[start..]
                .iter()
                .map(|node| self.message_summary(node))
                .collect(),
        }
    }
}

/// Clip a title to the stored maximum, the way the session listing
/// expects it.
fn clip_title(title: &str) -> String {
    if title.chars().count() > MAX_TITLE_CHARS {
        let mut clipped: String = title.chars().take(MAX_TITLE_CHARS - 3).collect();
        clipped.push_str("...");
        clipped
    } else {
        title.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_title_keeps_short_titles() {
        assert_eq!(clip_title("hello"), "hello");
    }

    #[test]
    fn test_clip_title_truncates_long_titles() {
        let long = "x".repeat(400);
        let clipped = clip_title(&long);
        assert_eq!(clipped.chars().count(), MAX_TITLE_CHARS);
        assert!(clipped.ends_with("..."));
    }
}
