//! Context projection for the model collaborator.

use chat_core::Role;
use message_store::SessionRecord;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::resolver;

/// One entry of the ordered role/content sequence fed to the model.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Project the branch up to and including `node_id` into role/content
/// pairs, chronological order. Regeneration uses this to build context for
/// a chosen ancestor rather than the session tip. Only the most recent
/// `limit` entries are kept.
pub fn context_for(record: &SessionRecord, node_id: Uuid, limit: usize) -> Result<Vec<ChatMessage>> {
    let chain = resolver::ancestor_chain(record, node_id)?;
    let start = chain.len().saturating_sub(limit);
    Ok(chain[start..]
        .iter()
        .map(|node| ChatMessage {
            role: node.role,
            content: node.content.clone(),
        })
        .collect())
}

/// Same projection from the session's current tip; empty when the session
/// has no messages yet.
pub fn context_for_session(record: &SessionRecord, limit: usize) -> Result<Vec<ChatMessage>> {
    match record.session.current_node_id {
        None => Ok(Vec::new()),
        Some(tip) => context_for(record, tip, limit),
    }
}
