//! Pure traversal over a session record.

use chat_core::MessageNode;
use message_store::{Result, SessionRecord, StoreError};
use uuid::Uuid;

/// Chain from the root down to `node_id` inclusive, chronological order.
///
/// Follows `parent_id` upward and reverses; O(depth). Errors with
/// `NodeNotFound` when the starting node is absent from the record.
pub fn ancestor_chain(record: &SessionRecord, node_id: Uuid) -> Result<Vec<&MessageNode>> {
    let mut chain = Vec::new();
    let mut cursor = Some(node_id);

    while let Some(id) = cursor {
        let node = record.require_node(id)?;
        chain.push(node);
        if chain.len() > record.nodes.len() {
            // A parent cycle cannot be built through the service; treat it
            // as corrupted storage rather than looping forever.
            debug_assert!(false, "cycle in parent chain at {id}");
            return Err(StoreError::Validation(format!(
                "parent chain of {node_id} does not terminate"
            )));
        }
        cursor = node.parent_id;
    }

    chain.reverse();
    Ok(chain)
}

/// Terminal node reached by following `active_child_id` downward from
/// `node_id`; `node_id`'s own node when it has no active child.
///
/// The recorded pointers are followed faithfully even when they lead into a
/// branch that is not the deepest one in the subtree.
pub fn frontier_leaf(record: &SessionRecord, node_id: Uuid) -> Result<&MessageNode> {
    let mut node = record.require_node(node_id)?;
    let mut hops = 0usize;

    while let Some(child_id) = node.active_child_id {
        let child = record
            .node(child_id)
            .ok_or(StoreError::InvalidActiveChild {
                node_id: node.id,
                child_id,
            })?;
        if child.parent_id != Some(node.id) {
            return Err(StoreError::InvalidActiveChild {
                node_id: node.id,
                child_id,
            });
        }
        node = child;
        hops += 1;
        if hops > record.nodes.len() {
            debug_assert!(false, "cycle in active-child chain at {child_id}");
            return Err(StoreError::Validation(format!(
                "active-child chain of {node_id} does not terminate"
            )));
        }
    }

    Ok(node)
}
