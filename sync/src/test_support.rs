#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use serde_json::json;
use tokio::time::{sleep, timeout};

use hearth_core::{
    document::{COLLECTION_WORKSPACES, FIELD_MEMBER_USER_IDS, FieldMap},
    ids::{DocumentId, WorkspaceId},
    store::{DocumentStoreRef, memory::MemoryStore},
    workspace::WorkspaceRecord,
};

pub(crate) fn memory_store() -> (MemoryStore, DocumentStoreRef) {
    let store = MemoryStore::new();
    let shared: DocumentStoreRef = Arc::new(store.clone());
    (store, shared)
}

pub(crate) fn memory_store_with_cap(max_batch_ops: usize) -> (MemoryStore, DocumentStoreRef) {
    let store = MemoryStore::with_max_batch_ops(max_batch_ops);
    let shared: DocumentStoreRef = Arc::new(store.clone());
    (store, shared)
}

pub(crate) async fn seed_workspace(store: &DocumentStoreRef, members: &[&str]) -> WorkspaceId {
    let mut fields = FieldMap::new();
    fields.insert(FIELD_MEMBER_USER_IDS.to_owned(), json!(members));
    let id = store
        .insert(COLLECTION_WORKSPACES, fields)
        .await
        .expect("seed workspace");
    WorkspaceId::from(id)
}

pub(crate) async fn seed_workspace_record(
    store: &DocumentStoreRef,
    members: &[&str],
) -> WorkspaceRecord {
    let id = seed_workspace(store, members).await;
    load_workspace_record(store, &id).await
}

pub(crate) async fn load_workspace_record(
    store: &DocumentStoreRef,
    id: &WorkspaceId,
) -> WorkspaceRecord {
    let doc = store
        .fetch(COLLECTION_WORKSPACES, &DocumentId::new(id.as_str()))
        .await
        .expect("fetch workspace")
        .expect("workspace document");
    WorkspaceRecord::from_document(&doc).expect("decode workspace")
}

pub(crate) async fn wait_until(what: &str, predicate: impl Fn() -> bool) {
    let poll = async {
        while !predicate() {
            sleep(Duration::from_millis(10)).await;
        }
    };
    if timeout(Duration::from_secs(5), poll).await.is_err() {
        panic!("timed out waiting for {what}");
    }
}
