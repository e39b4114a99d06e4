use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat session: owns the whole message tree and anchors the presently
/// displayed branch through `current_node_id`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ChatSession {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Tip of the presently displayed branch, or none for an empty session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_node_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    pub fn new(title: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            current_node_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record that the session was mutated.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
