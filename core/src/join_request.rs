use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    document::{Document, FIELD_WORKSPACE_ID, FieldMap, epoch},
    ids::{JoinRequestId, UserId, WorkspaceId},
};

/// A pending ask by a non-member to be added to a workspace. Consumed
/// (deleted) by the approval transaction; persists until then.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequestRecord {
    pub id: JoinRequestId,
    pub workspace_id: WorkspaceId,
    pub user_id: UserId,
    #[serde(default = "epoch")]
    pub created_date: DateTime<Utc>,
}

impl JoinRequestRecord {
    pub fn from_document(doc: &Document) -> Result<Self> {
        doc.decode()
    }

    /// Field map for filing a new request. The store assigns id and
    /// timestamps.
    pub fn insert_fields(workspace_id: &WorkspaceId, user_id: &UserId) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert(FIELD_WORKSPACE_ID.to_owned(), json!(workspace_id.as_str()));
        fields.insert("userId".to_owned(), json!(user_id.as_str()));
        fields
    }
}
