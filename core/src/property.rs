use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{
    document::{Document, FieldMap, epoch},
    ids::{PropertyId, TagId, UserId},
    rating::{PropertyKind, Rating},
};

/// A stored listing. Ownership is expressed through `member_user_ids`, the
/// membership stamp copied from the owning workspace at creation time, not
/// through a workspace foreign key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyRecord {
    pub id: PropertyId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_contact: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub size: f64,
    #[serde(default)]
    pub bedrooms: u32,
    #[serde(default)]
    pub bathrooms: u32,
    #[serde(default, rename = "type")]
    pub kind: PropertyKind,
    #[serde(default)]
    pub rating: Rating,
    #[serde(default)]
    pub tag_ids: Vec<TagId>,
    #[serde(default)]
    pub member_user_ids: Vec<UserId>,
    #[serde(default = "epoch")]
    pub created_date: DateTime<Utc>,
    #[serde(default = "epoch")]
    pub updated_date: DateTime<Utc>,
}

impl PropertyRecord {
    pub fn from_document(doc: &Document) -> Result<Self> {
        doc.decode()
    }

    /// The editable portion of the record, as the write service accepts it.
    pub fn to_input(&self) -> PropertyInput {
        PropertyInput {
            title: self.title.clone(),
            location: self.location.clone(),
            link: self.link.clone(),
            agent_contact: self.agent_contact.clone(),
            price: self.price,
            size: self.size,
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            kind: self.kind,
            rating: self.rating,
            tag_ids: self.tag_ids.clone(),
        }
    }
}

/// Scalar listing fields plus tag references: the user-editable slice of a
/// property. Membership and timestamps are stamped by the write path, never
/// supplied by callers. Optional fields serialize as explicit nulls, so an
/// update carrying `None` clears the stored value instead of retaining it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub agent_contact: Option<String>,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub size: f64,
    #[serde(default)]
    pub bedrooms: u32,
    #[serde(default)]
    pub bathrooms: u32,
    #[serde(default, rename = "type")]
    pub kind: PropertyKind,
    #[serde(default)]
    pub rating: Rating,
    #[serde(default)]
    pub tag_ids: Vec<TagId>,
}

impl PropertyInput {
    /// Serialize into a store field map (scalars + tagIds only).
    pub fn to_fields(&self) -> Result<FieldMap> {
        match serde_json::to_value(self)? {
            JsonValue::Object(map) => Ok(map),
            other => bail!("property input serialized to non-object value: {other:?}"),
        }
    }
}
