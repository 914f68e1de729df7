use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value as JsonValue};

use crate::ids::DocumentId;

pub const COLLECTION_WORKSPACES: &str = "workspaces";
pub const COLLECTION_PROPERTIES: &str = "properties";
pub const COLLECTION_TAGS: &str = "tags";
pub const COLLECTION_JOIN_REQUESTS: &str = "joinRequests";

pub const FIELD_ID: &str = "id";
pub const FIELD_NAME: &str = "name";
pub const FIELD_MEMBER_USER_IDS: &str = "memberUserIds";
pub const FIELD_WORKSPACE_ID: &str = "workspaceId";
pub const FIELD_CREATED_DATE: &str = "createdDate";
pub const FIELD_UPDATED_DATE: &str = "updatedDate";

pub type FieldMap = Map<String, JsonValue>;

/// Raw unit of storage: a document id plus its JSON field map. The id is the
/// collection key and is not duplicated inside `fields`; decoding injects it
/// so record types can carry their own `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub fields: FieldMap,
}

impl Document {
    pub fn new(id: impl Into<DocumentId>, fields: FieldMap) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&JsonValue> {
        self.fields.get(name)
    }

    pub fn string_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(JsonValue::as_str)
    }

    /// Members of the document's `memberUserIds` array, empty when the field
    /// is missing or malformed.
    pub fn member_user_ids(&self) -> Vec<String> {
        self.fields
            .get(FIELD_MEMBER_USER_IDS)
            .and_then(JsonValue::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(JsonValue::as_str)
                    .map(ToOwned::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let mut object = self.fields.clone();
        object.insert(FIELD_ID.to_owned(), JsonValue::String(self.id.to_string()));
        serde_json::from_value(JsonValue::Object(object))
            .with_context(|| format!("failed to decode document {}", self.id))
    }
}

pub(crate) fn epoch() -> DateTime<Utc> {
    DateTime::<Utc>::UNIX_EPOCH
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct NamedRecord {
        id: String,
        name: String,
    }

    #[test]
    fn decode_injects_document_id() {
        let mut fields = FieldMap::new();
        fields.insert("name".to_owned(), json!("balcony"));
        let doc = Document::new("tag-1", fields);

        let record: NamedRecord = doc.decode().expect("decode record");
        assert_eq!(
            record,
            NamedRecord {
                id: "tag-1".to_owned(),
                name: "balcony".to_owned()
            }
        );
    }

    #[test]
    fn member_user_ids_tolerates_missing_field() {
        let doc = Document::new("p-1", FieldMap::new());
        assert!(doc.member_user_ids().is_empty());

        let mut fields = FieldMap::new();
        fields.insert(FIELD_MEMBER_USER_IDS.to_owned(), json!(["u1", 42, "u2"]));
        let doc = Document::new("p-2", fields);
        assert_eq!(doc.member_user_ids(), vec!["u1".to_owned(), "u2".to_owned()]);
    }
}
