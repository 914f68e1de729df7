use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::{
    document::{Document, FieldMap},
    ids::DocumentId,
};

pub mod memory;

/// Default per-commit operation cap, matching the batch limit of the hosted
/// backends this layer is written against.
pub const DEFAULT_MAX_BATCH_OPS: usize = 500;

/// Predicate for queries and live subscriptions. The store evaluates these
/// server-side; `matches` is the shared reference evaluation backends may
/// reuse.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryFilter {
    /// Every document in the collection.
    All,
    /// `field` is an array containing `value`.
    ArrayContains { field: String, value: String },
    /// `field` equals `value`.
    FieldEquals { field: String, value: JsonValue },
}

impl QueryFilter {
    pub fn array_contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::ArrayContains {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn field_equals(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::FieldEquals {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            QueryFilter::All => true,
            QueryFilter::ArrayContains { field, value } => doc
                .field(field)
                .and_then(JsonValue::as_array)
                .is_some_and(|values| {
                    values
                        .iter()
                        .any(|entry| entry.as_str() == Some(value.as_str()))
                }),
            QueryFilter::FieldEquals { field, value } => {
                doc.field(field) == Some(value)
            }
        }
    }
}

/// One operation inside an atomic batch.
#[derive(Debug, Clone)]
pub enum BatchOp {
    Insert {
        collection: String,
        fields: FieldMap,
    },
    Update {
        collection: String,
        id: DocumentId,
        fields: FieldMap,
    },
    /// Append `values` not already present to an array field, preserving
    /// order. Set semantics: existing entries are never duplicated.
    ArrayUnion {
        collection: String,
        id: DocumentId,
        field: String,
        values: Vec<String>,
    },
    /// Remove every occurrence of `values` from an array field.
    ArrayRemove {
        collection: String,
        id: DocumentId,
        field: String,
        values: Vec<String>,
    },
    Delete {
        collection: String,
        id: DocumentId,
    },
}

/// An ordered set of operations committed all-or-nothing. Stores advertise
/// their capacity through [`DocumentStore::max_batch_ops`]; oversized batches
/// are rejected without applying anything.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, collection: impl Into<String>, fields: FieldMap) -> &mut Self {
        self.ops.push(BatchOp::Insert {
            collection: collection.into(),
            fields,
        });
        self
    }

    pub fn update(
        &mut self,
        collection: impl Into<String>,
        id: DocumentId,
        fields: FieldMap,
    ) -> &mut Self {
        self.ops.push(BatchOp::Update {
            collection: collection.into(),
            id,
            fields,
        });
        self
    }

    pub fn array_union(
        &mut self,
        collection: impl Into<String>,
        id: DocumentId,
        field: impl Into<String>,
        values: Vec<String>,
    ) -> &mut Self {
        self.ops.push(BatchOp::ArrayUnion {
            collection: collection.into(),
            id,
            field: field.into(),
            values,
        });
        self
    }

    pub fn array_remove(
        &mut self,
        collection: impl Into<String>,
        id: DocumentId,
        field: impl Into<String>,
        values: Vec<String>,
    ) -> &mut Self {
        self.ops.push(BatchOp::ArrayRemove {
            collection: collection.into(),
            id,
            field: field.into(),
            values,
        });
        self
    }

    pub fn delete(&mut self, collection: impl Into<String>, id: DocumentId) -> &mut Self {
        self.ops.push(BatchOp::Delete {
            collection: collection.into(),
            id,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

/// Handle on a live query. The current result set is delivered immediately
/// after subscribing, then the full set again after every mutation of the
/// collection. Dropping the handle (or calling [`cancel`](Self::cancel))
/// synchronously deregisters the store-side listener: no snapshot is
/// delivered afterwards.
pub struct SnapshotListener {
    rx: mpsc::UnboundedReceiver<Vec<Document>>,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl SnapshotListener {
    pub fn new(
        rx: mpsc::UnboundedReceiver<Vec<Document>>,
        cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            rx,
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Next full snapshot, or `None` once the store side has gone away.
    pub async fn recv(&mut self) -> Option<Vec<Document>> {
        self.rx.recv().await
    }

    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for SnapshotListener {
    fn drop(&mut self) {
        self.release();
    }
}

/// Remote multi-tenant document database: collection-level CRUD,
/// array-contains filtering, live-snapshot subscriptions, and atomic batch
/// writes. Inserts assign the document id and stamp `createdDate` and
/// `updatedDate` when the caller did not provide them; updates merge fields
/// and refresh `updatedDate`. Query results preserve the store's insertion
/// order.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn insert(&self, collection: &str, fields: FieldMap) -> Result<DocumentId>;

    async fn update(&self, collection: &str, id: &DocumentId, fields: FieldMap) -> Result<()>;

    async fn delete(&self, collection: &str, id: &DocumentId) -> Result<()>;

    async fn fetch(&self, collection: &str, id: &DocumentId) -> Result<Option<Document>>;

    async fn query(&self, collection: &str, filter: &QueryFilter) -> Result<Vec<Document>>;

    async fn subscribe(&self, collection: &str, filter: QueryFilter) -> Result<SnapshotListener>;

    /// Upper bound on operations per atomic commit. Batches above this are
    /// rejected before any write is applied.
    fn max_batch_ops(&self) -> usize;

    async fn commit(&self, batch: WriteBatch) -> Result<()>;
}

pub type DocumentStoreRef = Arc<dyn DocumentStore>;
