use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Author of a message node.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Construction state of a node's content.
///
/// Content is only writable while the node is `Streaming`; once it reaches
/// `Complete` or `Interrupted` it never changes again. `Interrupted` marks a
/// response whose generation failed or was cancelled mid-stream, with
/// whatever content had arrived by then.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Complete,
    Streaming,
    Interrupted,
}

/// A node in the conversation tree, stored in the session's node pool.
///
/// `parent_id` and `active_child_id` are id-valued edges into the same pool;
/// no node owns another. The tree only grows: nodes are created by
/// message-send or regeneration and never deleted.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MessageNode {
    pub id: Uuid,
    pub session_id: Uuid,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    /// Which direct child is currently shown below this node, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_child_id: Option<Uuid>,
    /// 1-based rank of this node among its sibling group. Assigned at
    /// creation and never renumbered.
    pub current_version: u32,
    /// Size of the sibling group, duplicated on every member.
    pub total_versions: u32,
    #[serde(default)]
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
}

impl MessageNode {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Whether content may still be appended.
    pub fn is_streaming(&self) -> bool {
        self.status == MessageStatus::Streaming
    }
}
