//! Streamed (re)generation of assistant replies.
//!
//! The assistant node is created first, through the same atomic unit as
//! any other message, so its `(parent, current_version, total_versions)`
//! triple is fixed before any content exists. Every fragment of the
//! response then carries that triple together with the accumulated
//! content. A producer failure marks the node interrupted and surfaces an
//! upstream-generation error without touching the rest of the tree.

use std::pin::Pin;
use std::sync::Arc;

use async_stream::stream;
use branch_manager::{context_for, BranchError, BranchService};
use chat_core::{Role, StreamFragment};
use futures::Stream;
use futures_util::StreamExt;
use message_store::{NodeStore, StoreError};
use uuid::Uuid;

use crate::error::{Result, ServiceError};
use crate::service::ChatService;

/// Stream of response fragments, ending with a `done` fragment or one
/// terminal error.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<StreamFragment>> + Send>>;

impl<S: NodeStore + 'static> ChatService<S> {
    /// Generate an assistant reply below `parent_id` (default: the
    /// session's current tip) and stream its fragments.
    pub async fn stream_reply(
        &self,
        chat_id: &str,
        parent_id: Option<&str>,
    ) -> Result<FragmentStream> {
        let session_id = self.decode_id(chat_id)?;
        let parent_id = match parent_id {
            Some(value) => Some(self.decode_id(value)?),
            None => {
                self.store()
                    .read_session(session_id)
                    .await
                    .map_err(ServiceError::from)?
                    .session
                    .current_node_id
            }
        };
        self.generate(session_id, parent_id).await
    }

    /// Produce a fresh take on an assistant reply.
    ///
    /// The regenerated-from message is only validated, never altered or
    /// removed; the new reply is a sibling under the explicitly supplied
    /// parent. Omitting the parent is a caller error.
    pub async fn regenerate(
        &self,
        chat_id: &str,
        target_message_id: &str,
        parent_id: Option<&str>,
    ) -> Result<FragmentStream> {
        let session_id = self.decode_id(chat_id)?;
        let target_id = self.decode_id(target_message_id)?;
        let parent_id = parent_id.ok_or_else(|| {
            ServiceError::InvalidRequest("parentId is required for regeneration".to_string())
        })?;
        let parent_id = self.decode_id(parent_id)?;

        let record = self
            .store()
            .read_session(session_id)
            .await
            .map_err(ServiceError::from)?;
        let target = match record.node(target_id) {
            Some(target) => target,
            None => {
                return Err(match self.store().locate_node(target_id).await {
                    Ok(owner) if owner != session_id => StoreError::CrossSessionReference {
                        node_id: target_id,
                        session_id,
                    }
                    .into(),
                    _ => StoreError::NodeNotFound(target_id).into(),
                });
            }
        };
        if target.role != Role::Assistant {
            return Err(ServiceError::InvalidRequest(
                "only assistant messages can be regenerated".to_string(),
            ));
        }

        tracing::info!(
            session_id = %session_id,
            target_id = %target_id,
            parent_id = %parent_id,
            "ChatService: regenerating"
        );
        self.generate(session_id, Some(parent_id)).await
    }

    async fn generate(&self, session_id: Uuid, parent_id: Option<Uuid>) -> Result<FragmentStream> {
        let node = self
            .branches()
            .begin_assistant_message(session_id, parent_id)
            .await?;

        let record = self
            .store()
            .read_session(session_id)
            .await
            .map_err(ServiceError::from)?;
        let context = match parent_id {
            Some(parent) => context_for(&record, parent, self.config().history_limit)?,
            None => Vec::new(),
        };

        let branches = self.branches().clone();
        let producer = Arc::clone(self.producer());
        let node_id = node.id;
        let mut fragment = StreamFragment {
            message_id: self.codec().encode(node.id),
            chat_id: self.codec().encode(session_id),
            role: Role::Assistant,
            content: String::new(),
            parent_id: node.parent_id.map(|id| self.codec().encode(id)),
            current_version: node.current_version,
            total_versions: node.total_versions,
            done: false,
        };

        let stream = stream! {
            let mut deltas = match producer.produce(context).await {
                Ok(deltas) => deltas,
                Err(err) => {
                    mark_interrupted(&branches, session_id, node_id).await;
                    yield Err(ServiceError::Branch(
                        BranchError::UpstreamGenerationFailure(err.to_string()),
                    ));
                    return;
                }
            };

            while let Some(next) = deltas.next().await {
                let delta = match next {
                    Ok(delta) => delta,
                    Err(err) => {
                        mark_interrupted(&branches, session_id, node_id).await;
                        yield Err(ServiceError::Branch(
                            BranchError::UpstreamGenerationFailure(err.to_string()),
                        ));
                        return;
                    }
                };

                match branches.append_content(session_id, node_id, delta).await {
                    Ok(accumulated) => {
                        fragment.content = accumulated;
                        yield Ok(fragment.clone());
                    }
                    // The node left its streaming state under us, i.e. the
                    // generation was stopped from outside. End cleanly.
                    Err(BranchError::Store(StoreError::Validation(_))) => break,
                    Err(err) => {
                        yield Err(ServiceError::from(err));
                        return;
                    }
                }
            }

            match branches.finalize_message(session_id, node_id).await {
                Ok(finished) => {
                    fragment.content = finished.content;
                    fragment.done = true;
                    yield Ok(fragment);
                }
                // Already stopped or interrupted: report what we have.
                Err(BranchError::Store(StoreError::Validation(_))) => {
                    fragment.done = true;
                    yield Ok(fragment);
                }
                Err(err) => {
                    yield Err(ServiceError::from(err));
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Best-effort interrupt marking; the generation error is what the caller
/// needs to see, not a secondary bookkeeping failure.
async fn mark_interrupted<S: NodeStore>(
    branches: &BranchService<S>,
    session_id: Uuid,
    node_id: Uuid,
) {
    if let Err(err) = branches.interrupt_message(session_id, node_id).await {
        tracing::warn!(
            session_id = %session_id,
            node_id = %node_id,
            error = %err,
            "ChatService: failed to mark interrupted message"
        );
    }
}
