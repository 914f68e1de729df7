use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{
    document::{Document, FieldMap},
    ids::{TagId, UserId},
    rating::Rating,
};

/// A reusable label attached to listings. Name uniqueness inside a workspace
/// is a soft invariant: only the merge-import path deduplicates by name, the
/// write path does not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagRecord {
    pub id: TagId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rating: Rating,
    #[serde(default)]
    pub member_user_ids: Vec<UserId>,
}

impl TagRecord {
    pub fn from_document(doc: &Document) -> Result<Self> {
        doc.decode()
    }

    pub fn to_input(&self) -> TagInput {
        TagInput {
            name: self.name.clone(),
            rating: self.rating,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rating: Rating,
}

impl TagInput {
    pub fn new(name: impl Into<String>, rating: Rating) -> Self {
        Self {
            name: name.into(),
            rating,
        }
    }

    pub fn to_fields(&self) -> Result<FieldMap> {
        match serde_json::to_value(self)? {
            JsonValue::Object(map) => Ok(map),
            other => bail!("tag input serialized to non-object value: {other:?}"),
        }
    }
}
