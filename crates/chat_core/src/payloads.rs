//! Externally observable payload shapes.
//!
//! Every message-bearing payload carries `parentId`, `currentVersion` and
//! `totalVersions` next to the usual role/content/identifier fields, so a
//! client can render "< i/N >" version controls and address branch
//! switches. Identifiers are the opaque strings produced by the service
//! boundary's id codec, never raw storage ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::Role;

/// One message of the active branch, as returned by send/history/switch
/// responses.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    pub message_id: String,
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub parent_id: Option<String>,
    pub current_version: u32,
    pub total_versions: u32,
}

/// The active branch of a session, root first.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub chat_id: String,
    pub messages: Vec<MessageSummary>,
}

/// Version navigation data for one sibling group.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SiblingsResponse {
    pub current_version: u32,
    pub total_versions: u32,
    /// Group members ordered by their version rank.
    pub sibling_ids: Vec<String>,
}

/// One fragment of an in-progress assistant response.
///
/// `content` is the accumulated text so far. The
/// `(parent_id, current_version, total_versions)` triple is fixed when the
/// node is created, before any content exists, and is identical on every
/// fragment of one response.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StreamFragment {
    pub message_id: String,
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    pub parent_id: Option<String>,
    pub current_version: u32,
    pub total_versions: u32,
    pub done: bool,
}

/// Session listing entry, ordered by recency in listings.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub chat_id: String,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_uses_camel_case_keys() {
        let summary = MessageSummary {
            message_id: "m1".to_string(),
            chat_id: "c1".to_string(),
            role: Role::User,
            content: "Hi".to_string(),
            created_at: Utc::now(),
            parent_id: None,
            current_version: 1,
            total_versions: 1,
        };

        let value = serde_json::to_value(&summary).unwrap();
        assert_eq!(value["messageId"], "m1");
        assert_eq!(value["currentVersion"], 1);
        assert_eq!(value["totalVersions"], 1);
        assert!(value["parentId"].is_null());
    }

    #[test]
    fn test_fragment_carries_version_triple() {
        let fragment = StreamFragment {
            message_id: "m2".to_string(),
            chat_id: "c1".to_string(),
            role: Role::Assistant,
            content: "Hel".to_string(),
            parent_id: Some("m1".to_string()),
            current_version: 2,
            total_versions: 2,
            done: false,
        };

        let value = serde_json::to_value(&fragment).unwrap();
        assert_eq!(value["parentId"], "m1");
        assert_eq!(value["currentVersion"], 2);
        assert_eq!(value["totalVersions"], 2);
        assert_eq!(value["done"], false);
    }
}
