//! Branch mutation service

use std::sync::Arc;

use chat_core::{MessageNode, MessageStatus, Role};
use chrono::Utc;
use message_store::{NodeStore, SessionRecord, StoreError};
use uuid::Uuid;

use crate::error::{BranchError, Result};
use crate::resolver;

/// Version navigation data for one sibling group, used by clients to
/// render "< i/N >" controls and pick switch targets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SiblingsInfo {
    pub current_version: u32,
    pub total_versions: u32,
    /// Group members ordered by version rank.
    pub sibling_ids: Vec<Uuid>,
}

/// The sole mutator of conversation trees.
///
/// Every mutation runs as one closure inside [`NodeStore::update_session`],
/// so sibling counters, active-child pointers and the session anchor are
/// only ever visible together. Store-level write conflicts are retried a
/// bounded number of times before surfacing as `ConcurrentModification`.
pub struct BranchService<S> {
    store: Arc<S>,
    max_conflict_retries: usize,
}

impl<S> Clone for BranchService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            max_conflict_retries: self.max_conflict_retries,
        }
    }
}

impl<S: NodeStore> BranchService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            max_conflict_retries: 3,
        }
    }

    pub fn with_max_conflict_retries(mut self, retries: usize) -> Self {
        self.max_conflict_retries = retries;
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run one atomic unit, retrying transparently on write conflicts.
    async fn mutate<T, F>(&self, session_id: Uuid, apply: F) -> Result<T>
    where
        T: Send + 'static,
        F: Fn(&mut SessionRecord) -> message_store::Result<T> + Clone + Send + 'static,
    {
        let mut attempt = 0usize;
        loop {
            match self.store.update_session(session_id, apply.clone()).await {
                Err(StoreError::Conflict(id)) => {
                    if attempt >= self.max_conflict_retries {
                        return Err(BranchError::ConcurrentModification(id));
                    }
                    attempt += 1;
                    tracing::warn!(
                        session_id = %session_id,
                        attempt,
                        max = self.max_conflict_retries,
                        "BranchService: retrying after concurrent write"
                    );
                }
                other => return other.map_err(BranchError::from),
            }
        }
    }

    /// Turn a `NodeNotFound` into `CrossSessionReference` when the node
    /// exists but under a different session.
    async fn refine_node_error(&self, session_id: Uuid, err: BranchError) -> BranchError {
        let BranchError::Store(StoreError::NodeNotFound(node_id)) = err else {
            return err;
        };
        match self.store.locate_node(node_id).await {
            Ok(owner) if owner != session_id => {
                BranchError::Store(StoreError::CrossSessionReference {
                    node_id,
                    session_id,
                })
            }
            _ => BranchError::Store(StoreError::NodeNotFound(node_id)),
        }
    }

    /// Append a message node under `parent_id` (or as a root when none).
    ///
    /// One atomic unit: counts the sibling group, inserts the node with the
    /// next version rank, bumps `total_versions` on every existing member,
    /// points the parent's active child at the new node and moves the
    /// session anchor onto it.
    pub async fn add_message(
        &self,
        session_id: Uuid,
        role: Role,
        content: impl Into<String>,
        parent_id: Option<Uuid>,
    ) -> Result<MessageNode> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(BranchError::EmptyMessageContent);
        }
        tracing::info!(
            session_id = %session_id,
            role = ?role,
            parent_id = ?parent_id,
            content_len = content.len(),
            "BranchService: adding message"
        );

        let result = self
            .mutate(session_id, move |record| {
                insert_node(record, role, content.clone(), parent_id, MessageStatus::Complete)
            })
            .await;
        match result {
            Err(err) => Err(self.refine_node_error(session_id, err).await),
            ok => ok,
        }
    }

    /// Create an assistant node whose content will arrive by streaming.
    ///
    /// Same atomic unit as [`Self::add_message`], with empty content and
    /// `streaming` status: the version triple is fixed here, before any
    /// content exists, so every fragment of the response can carry it.
    pub async fn begin_assistant_message(
        &self,
        session_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> Result<MessageNode> {
        tracing::info!(
            session_id = %session_id,
            parent_id = ?parent_id,
            "BranchService: beginning streamed assistant message"
        );

        let result = self
            .mutate(session_id, move |record| {
                insert_node(
                    record,
                    Role::Assistant,
                    String::new(),
                    parent_id,
                    MessageStatus::Streaming,
                )
            })
            .await;
        match result {
            Err(err) => Err(self.refine_node_error(session_id, err).await),
            ok => ok,
        }
    }

    /// Append a delta to a node still under construction. Returns the
    /// accumulated content.
    pub async fn append_content(
        &self,
        session_id: Uuid,
        node_id: Uuid,
        delta: impl Into<String>,
    ) -> Result<String> {
        let delta = delta.into();
        self.mutate(session_id, move |record| {
            let node = record
                .node_mut(node_id)
                .ok_or(StoreError::NodeNotFound(node_id))?;
            if !node.is_streaming() {
                return Err(StoreError::Validation(format!(
                    "content of {node_id} is no longer writable"
                )));
            }
            node.content.push_str(&delta);
            Ok(node.content.clone())
        })
        .await
    }

    /// Close construction: the node's content is final from here on.
    pub async fn finalize_message(&self, session_id: Uuid, node_id: Uuid) -> Result<MessageNode> {
        self.mutate(session_id, move |record| {
            let node = record
                .node_mut(node_id)
                .ok_or(StoreError::NodeNotFound(node_id))?;
            if !node.is_streaming() {
                return Err(StoreError::Validation(format!(
                    "message {node_id} is not streaming"
                )));
            }
            node.status = MessageStatus::Complete;
            Ok(node.clone())
        })
        .await
    }

    /// Mark a streaming node as cut short. The partial content stays in
    /// the tree; sibling counters and pointers already account for the
    /// node, so the tree remains consistent. Idempotent on nodes that are
    /// already terminal.
    pub async fn interrupt_message(&self, session_id: Uuid, node_id: Uuid) -> Result<MessageNode> {
        self.mutate(session_id, move |record| {
            let node = record
                .node_mut(node_id)
                .ok_or(StoreError::NodeNotFound(node_id))?;
            if node.is_streaming() {
                node.status = MessageStatus::Interrupted;
            }
            Ok(node.clone())
        })
        .await
    }

    /// The active branch: root-to-tip chain above `current_node`, empty
    /// for a session with no messages.
    pub async fn active_branch(&self, session_id: Uuid) -> Result<Vec<MessageNode>> {
        let record = self.store.read_session(session_id).await?;
        match record.session.current_node_id {
            None => Ok(Vec::new()),
            Some(tip) => Ok(resolver::ancestor_chain(&record, tip)?
                .into_iter()
                .cloned()
                .collect()),
        }
    }

    /// Make `target`'s branch the active one and return the new branch.
    ///
    /// Repoints the fork's active child at `target` (root targets have no
    /// pointer to update), walks down the recorded frontier, anchors
    /// `current_node` on the leaf. Idempotent.
    pub async fn switch_branch(
        &self,
        session_id: Uuid,
        target_id: Uuid,
    ) -> Result<Vec<MessageNode>> {
        tracing::info!(
            session_id = %session_id,
            target_id = %target_id,
            "BranchService: switching branch"
        );

        let result = self
            .mutate(session_id, move |record| {
                let parent_id = record.require_node(target_id)?.parent_id;
                if let Some(parent_id) = parent_id {
                    let parent = record
                        .node_mut(parent_id)
                        .ok_or(StoreError::NodeNotFound(parent_id))?;
                    parent.active_child_id = Some(target_id);
                }

                let leaf_id = resolver::frontier_leaf(record, target_id)?.id;
                record.session.current_node_id = Some(leaf_id);

                let branch = resolver::ancestor_chain(record, leaf_id)?;
                Ok(branch.into_iter().cloned().collect())
            })
            .await;
        match result {
            Err(err) => Err(self.refine_node_error(session_id, err).await),
            ok => ok,
        }
    }

    /// Version navigation data for `node_id`'s sibling group.
    pub async fn siblings_info(&self, session_id: Uuid, node_id: Uuid) -> Result<SiblingsInfo> {
        let record = self.store.read_session(session_id).await?;
        let node = match record.require_node(node_id) {
            Ok(node) => node,
            Err(err) => return Err(self.refine_node_error(session_id, err.into()).await),
        };

        let group = record.sibling_group(node.parent_id, node.role);
        Ok(SiblingsInfo {
            current_version: node.current_version,
            total_versions: node.total_versions,
            sibling_ids: group.iter().map(|sibling| sibling.id).collect(),
        })
    }

    /// Start a regenerated assistant reply: a fresh sibling under
    /// `parent_id`, never a mutation of any existing node. The parent must
    /// be supplied explicitly; content arrives through streaming appends.
    pub async fn regenerate(
        &self,
        session_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> Result<MessageNode> {
        let parent_id = parent_id.ok_or_else(|| {
            BranchError::Store(StoreError::Validation(
                "regeneration requires an explicit parent".to_string(),
            ))
        })?;
        self.begin_assistant_message(session_id, Some(parent_id)).await
    }
}

/// The shared insert step behind `add_message` and
/// `begin_assistant_message`. Runs inside the store's atomic unit.
fn insert_node(
    record: &mut SessionRecord,
    role: Role,
    content: String,
    parent_id: Option<Uuid>,
    status: MessageStatus,
) -> message_store::Result<MessageNode> {
    if let Some(parent_id) = parent_id {
        record.require_node(parent_id)?;
    }

    let group_ids: Vec<Uuid> = record
        .sibling_group(parent_id, role)
        .iter()
        .map(|node| node.id)
        .collect();
    let version = group_ids.len() as u32 + 1;

    let node = MessageNode {
        id: Uuid::new_v4(),
        session_id: record.session.id,
        role,
        content,
        parent_id,
        active_child_id: None,
        current_version: version,
        total_versions: version,
        status,
        created_at: Utc::now(),
    };

    for sibling_id in &group_ids {
        if let Some(sibling) = record.node_mut(*sibling_id) {
            sibling.total_versions = version;
        }
    }
    if let Some(parent_id) = parent_id {
        if let Some(parent) = record.node_mut(parent_id) {
            parent.active_child_id = Some(node.id);
        }
    }
    record.session.current_node_id = Some(node.id);
    record.nodes.insert(node.id, node.clone());

    tracing::debug!(
        session_id = %record.session.id,
        node_id = %node.id,
        version = version,
        "BranchService: node inserted"
    );
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use message_store::MemoryNodeStore;
    use message_store::NodeStore as _;

    fn service() -> BranchService<MemoryNodeStore> {
        BranchService::new(Arc::new(MemoryNodeStore::new()))
    }

    #[tokio::test]
    async fn test_rejects_blank_content() {
        let service = service();
        let session = service.store().create_session(None).await.unwrap();

        let result = service
            .add_message(session.id, Role::User, "   ", None)
            .await;
        assert!(matches!(result, Err(BranchError::EmptyMessageContent)));
    }

    #[tokio::test]
    async fn test_regenerate_requires_explicit_parent() {
        let service = service();
        let session = service.store().create_session(None).await.unwrap();

        let result = service.regenerate(session.id, None).await;
        assert!(matches!(
            result,
            Err(BranchError::Store(StoreError::Validation(_)))
        ));
    }

    #[tokio::test]
    async fn test_append_rejected_after_finalize() {
        let service = service();
        let session = service.store().create_session(None).await.unwrap();

        let node = service
            .begin_assistant_message(session.id, None)
            .await
            .unwrap();
        service
            .append_content(session.id, node.id, "partial")
            .await
            .unwrap();
        service.finalize_message(session.id, node.id).await.unwrap();

        let result = service.append_content(session.id, node.id, "more").await;
        assert!(matches!(
            result,
            Err(BranchError::Store(StoreError::Validation(_)))
        ));
    }

    #[tokio::test]
    async fn test_interrupt_is_idempotent() {
        let service = service();
        let session = service.store().create_session(None).await.unwrap();

        let node = service
            .begin_assistant_message(session.id, None)
            .await
            .unwrap();
        let first = service
            .interrupt_message(session.id, node.id)
            .await
            .unwrap();
        assert_eq!(first.status, MessageStatus::Interrupted);

        let second = service
            .interrupt_message(session.id, node.id)
            .await
            .unwrap();
        assert_eq!(second.status, MessageStatus::Interrupted);
    }

    #[tokio::test]
    async fn test_cross_session_target_is_reported() {
        let service = service();
        let session = service.store().create_session(None).await.unwrap();
        let other = service.store().create_session(None).await.unwrap();

        let foreign = service
            .add_message(other.id, Role::User, "Hi", None)
            .await
            .unwrap();

        let result = service.switch_branch(session.id, foreign.id).await;
        assert!(matches!(
            result,
            Err(BranchError::Store(StoreError::CrossSessionReference { .. }))
        ));
    }
}
