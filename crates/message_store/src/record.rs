use std::collections::HashMap;

use chat_core::{ChatSession, MessageNode, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, StoreError};

/// One session's state: the anchor plus the flat pool of message nodes.
///
/// The pool is the single source of truth for the tree; `parent_id` and
/// `active_child_id` on the nodes are id-valued edges into it.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SessionRecord {
    pub session: ChatSession,
    pub nodes: HashMap<Uuid, MessageNode>,
}

impl SessionRecord {
    pub fn new(session: ChatSession) -> Self {
        Self {
            session,
            nodes: HashMap::new(),
        }
    }

    pub fn node(&self, id: Uuid) -> Option<&MessageNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: Uuid) -> Option<&mut MessageNode> {
        self.nodes.get_mut(&id)
    }

    pub fn require_node(&self, id: Uuid) -> Result<&MessageNode> {
        self.node(id).ok_or(StoreError::NodeNotFound(id))
    }

    /// Members of the sibling group `(parent, role)`, ordered by version
    /// rank. `created_at` only breaks ties between equal ranks, which the
    /// service mutations never produce.
    pub fn sibling_group(&self, parent_id: Option<Uuid>, role: Role) -> Vec<&MessageNode> {
        let mut group: Vec<&MessageNode> = self
            .nodes
            .values()
            .filter(|node| node.parent_id == parent_id && node.role == role)
            .collect();
        group.sort_by_key(|node| (node.current_version, node.created_at));
        group
    }

    /// Direct children of a node, regardless of role.
    pub fn children_of(&self, id: Uuid) -> Vec<&MessageNode> {
        self.nodes
            .values()
            .filter(|node| node.parent_id == Some(id))
            .collect()
    }
}
