use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde_json::Value as JsonValue;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use super::{
    BatchOp, DEFAULT_MAX_BATCH_OPS, DocumentStore, QueryFilter, SnapshotListener, WriteBatch,
};
use crate::{
    config::SyncConfig,
    document::{Document, FIELD_CREATED_DATE, FIELD_UPDATED_DATE, FieldMap},
    ids::DocumentId,
};

/// In-process reference backend. Collections are insertion-ordered vectors
/// behind a single mutex; listener snapshots are recomputed after every
/// mutation and delivered only when the result set changed. Commits are
/// staged on a copy of the state, so a failed batch leaves nothing behind.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<StoreState>>,
    max_batch_ops: usize,
}

struct StoreState {
    collections: HashMap<String, Vec<Document>>,
    listeners: HashMap<u64, ListenerEntry>,
    next_listener_id: u64,
    commit_fault: Option<usize>,
}

struct ListenerEntry {
    collection: String,
    filter: QueryFilter,
    tx: mpsc::UnboundedSender<Vec<Document>>,
    last: Vec<Document>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_max_batch_ops(DEFAULT_MAX_BATCH_OPS)
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::with_max_batch_ops(config.max_batch_ops)
    }

    pub fn with_max_batch_ops(max_batch_ops: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreState {
                collections: HashMap::new(),
                listeners: HashMap::new(),
                next_listener_id: 0,
                commit_fault: None,
            })),
            max_batch_ops,
        }
    }

    /// Arms a one-shot fault: the next commit errors after staging
    /// `after_ops` operations, leaving the visible state untouched.
    pub fn fail_next_commit_after(&self, after_ops: usize) {
        self.inner.lock().commit_fault = Some(after_ops);
    }

    /// Copy of every collection, for fixtures and state assertions.
    pub fn dump(&self) -> HashMap<String, Vec<Document>> {
        self.inner.lock().collections.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreState {
    fn docs(&self, collection: &str) -> &[Document] {
        self.collections
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn notify(&mut self, collection: &str) {
        let docs = self.collections.get(collection).cloned().unwrap_or_default();
        let mut dead = Vec::new();
        for (id, entry) in self.listeners.iter_mut() {
            if entry.collection != collection {
                continue;
            }
            let snapshot: Vec<Document> = docs
                .iter()
                .filter(|doc| entry.filter.matches(doc))
                .cloned()
                .collect();
            if snapshot == entry.last {
                continue;
            }
            if entry.tx.send(snapshot.clone()).is_err() {
                dead.push(*id);
                continue;
            }
            entry.last = snapshot;
        }
        for id in dead {
            self.listeners.remove(&id);
        }
    }
}

fn now_stamp() -> JsonValue {
    JsonValue::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn insert_document(
    collections: &mut HashMap<String, Vec<Document>>,
    collection: &str,
    mut fields: FieldMap,
) -> DocumentId {
    let id = DocumentId::new(Uuid::new_v4().to_string());
    fields
        .entry(FIELD_CREATED_DATE.to_owned())
        .or_insert_with(now_stamp);
    fields
        .entry(FIELD_UPDATED_DATE.to_owned())
        .or_insert_with(now_stamp);
    collections
        .entry(collection.to_owned())
        .or_default()
        .push(Document::new(id.clone(), fields));
    id
}

fn document_mut<'a>(
    collections: &'a mut HashMap<String, Vec<Document>>,
    collection: &str,
    id: &DocumentId,
) -> Result<&'a mut Document> {
    let Some(doc) = collections
        .get_mut(collection)
        .and_then(|docs| docs.iter_mut().find(|doc| &doc.id == id))
    else {
        bail!("no document {id} in collection {collection}");
    };
    Ok(doc)
}

fn update_document(
    collections: &mut HashMap<String, Vec<Document>>,
    collection: &str,
    id: &DocumentId,
    fields: FieldMap,
) -> Result<()> {
    let doc = document_mut(collections, collection, id)?;
    for (key, value) in fields {
        doc.fields.insert(key, value);
    }
    doc.fields
        .insert(FIELD_UPDATED_DATE.to_owned(), now_stamp());
    Ok(())
}

fn mutate_array(
    collections: &mut HashMap<String, Vec<Document>>,
    collection: &str,
    id: &DocumentId,
    field: &str,
    apply: impl FnOnce(&mut Vec<JsonValue>),
) -> Result<()> {
    let doc = document_mut(collections, collection, id)?;
    let mut entries = doc
        .fields
        .get(field)
        .and_then(JsonValue::as_array)
        .cloned()
        .unwrap_or_default();
    apply(&mut entries);
    doc.fields.insert(field.to_owned(), JsonValue::Array(entries));
    Ok(())
}

fn delete_document(
    collections: &mut HashMap<String, Vec<Document>>,
    collection: &str,
    id: &DocumentId,
) {
    if let Some(docs) = collections.get_mut(collection) {
        docs.retain(|doc| &doc.id != id);
    }
}

/// Applies one batch operation and reports the collection it touched.
fn apply_op(collections: &mut HashMap<String, Vec<Document>>, op: &BatchOp) -> Result<String> {
    match op {
        BatchOp::Insert { collection, fields } => {
            insert_document(collections, collection, fields.clone());
            Ok(collection.clone())
        }
        BatchOp::Update {
            collection,
            id,
            fields,
        } => {
            update_document(collections, collection, id, fields.clone())?;
            Ok(collection.clone())
        }
        BatchOp::ArrayUnion {
            collection,
            id,
            field,
            values,
        } => {
            mutate_array(collections, collection, id, field, |entries| {
                for value in values {
                    let present = entries
                        .iter()
                        .any(|entry| entry.as_str() == Some(value.as_str()));
                    if !present {
                        entries.push(JsonValue::String(value.clone()));
                    }
                }
            })?;
            Ok(collection.clone())
        }
        BatchOp::ArrayRemove {
            collection,
            id,
            field,
            values,
        } => {
            mutate_array(collections, collection, id, field, |entries| {
                entries.retain(|entry| {
                    entry
                        .as_str()
                        .is_none_or(|text| !values.iter().any(|value| value == text))
                });
            })?;
            Ok(collection.clone())
        }
        BatchOp::Delete { collection, id } => {
            delete_document(collections, collection, id);
            Ok(collection.clone())
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, collection: &str, fields: FieldMap) -> Result<DocumentId> {
        let mut state = self.inner.lock();
        let id = insert_document(&mut state.collections, collection, fields);
        state.notify(collection);
        Ok(id)
    }

    async fn update(&self, collection: &str, id: &DocumentId, fields: FieldMap) -> Result<()> {
        let mut state = self.inner.lock();
        update_document(&mut state.collections, collection, id, fields)?;
        state.notify(collection);
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &DocumentId) -> Result<()> {
        let mut state = self.inner.lock();
        delete_document(&mut state.collections, collection, id);
        state.notify(collection);
        Ok(())
    }

    async fn fetch(&self, collection: &str, id: &DocumentId) -> Result<Option<Document>> {
        let state = self.inner.lock();
        Ok(state.docs(collection).iter().find(|doc| &doc.id == id).cloned())
    }

    async fn query(&self, collection: &str, filter: &QueryFilter) -> Result<Vec<Document>> {
        let state = self.inner.lock();
        Ok(state
            .docs(collection)
            .iter()
            .filter(|doc| filter.matches(doc))
            .cloned()
            .collect())
    }

    async fn subscribe(&self, collection: &str, filter: QueryFilter) -> Result<SnapshotListener> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.inner.lock();
        let snapshot: Vec<Document> = state
            .docs(collection)
            .iter()
            .filter(|doc| filter.matches(doc))
            .cloned()
            .collect();
        let _ = tx.send(snapshot.clone());
        let listener_id = state.next_listener_id;
        state.next_listener_id += 1;
        state.listeners.insert(
            listener_id,
            ListenerEntry {
                collection: collection.to_owned(),
                filter,
                tx,
                last: snapshot,
            },
        );
        drop(state);

        let inner = Arc::clone(&self.inner);
        Ok(SnapshotListener::new(rx, move || {
            inner.lock().listeners.remove(&listener_id);
        }))
    }

    fn max_batch_ops(&self) -> usize {
        self.max_batch_ops
    }

    async fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.len() > self.max_batch_ops {
            bail!(
                "batch of {} operations exceeds the limit of {}",
                batch.len(),
                self.max_batch_ops
            );
        }
        let mut state = self.inner.lock();
        let fault = state.commit_fault.take();
        let mut staged = state.collections.clone();
        let mut touched: Vec<String> = Vec::new();
        for (index, op) in batch.ops().iter().enumerate() {
            if fault == Some(index) {
                bail!("injected commit failure after {index} operations");
            }
            let collection = apply_op(&mut staged, op)?;
            if !touched.contains(&collection) {
                touched.push(collection);
            }
        }
        if fault.is_some() {
            bail!("injected commit failure after {} operations", batch.len());
        }
        state.collections = staged;
        debug!(ops = batch.len(), "committed atomic batch");
        for collection in touched {
            state.notify(&collection);
        }
        Ok(())
    }
}
