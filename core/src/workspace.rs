use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    document::{Document, FIELD_MEMBER_USER_IDS, FieldMap, epoch},
    ids::{UserId, WorkspaceId},
};

/// One shared workspace. `member_user_ids` is an ordered list treated as a
/// set: no duplicates, and every document the workspace owns carries a copy
/// of it as its access-control stamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceRecord {
    pub id: WorkspaceId,
    #[serde(default)]
    pub member_user_ids: Vec<UserId>,
    #[serde(default = "epoch")]
    pub created_date: DateTime<Utc>,
}

impl WorkspaceRecord {
    pub fn from_document(doc: &Document) -> anyhow::Result<Self> {
        doc.decode()
    }

    pub fn contains_member(&self, user_id: &UserId) -> bool {
        self.member_user_ids.iter().any(|member| member == user_id)
    }

    pub fn member_count(&self) -> usize {
        self.member_user_ids.len()
    }

    /// Field map for creating a fresh single-member workspace. The store
    /// assigns the id and timestamps.
    pub fn insert_fields(initial_member: &UserId) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert(
            FIELD_MEMBER_USER_IDS.to_owned(),
            json!([initial_member.as_str()]),
        );
        fields
    }
}
