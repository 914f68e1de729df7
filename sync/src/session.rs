use tokio::{sync::watch, task::JoinHandle};

use hearth_core::{
    config::SyncConfig,
    document::{
        COLLECTION_JOIN_REQUESTS, COLLECTION_PROPERTIES, COLLECTION_TAGS, FIELD_MEMBER_USER_IDS,
        FIELD_WORKSPACE_ID,
    },
    ids::{UserId, WorkspaceId},
    join_request::JoinRequestRecord,
    property::PropertyRecord,
    store::{DocumentStoreRef, QueryFilter},
    tag::TagRecord,
    workspace::WorkspaceRecord,
};

use crate::{
    identity::IdentityHub,
    live::LiveCollection,
    resolver::WorkspaceResolver,
    transfer::MergeImportExportService,
    writes::{MembershipWriteService, WritePolicy},
};

/// Wires the whole pipeline over one store: the identity hub feeds the
/// workspace resolver, the signed-in user keys the property and tag views,
/// the resolved workspace keys the join-request view, and writes go through
/// the same store so every view updates itself.
pub struct SyncSession {
    identity: IdentityHub,
    resolver: WorkspaceResolver,
    adapter: JoinHandle<()>,
    properties: LiveCollection<PropertyRecord>,
    tags: LiveCollection<TagRecord>,
    join_requests: LiveCollection<JoinRequestRecord>,
    writes: MembershipWriteService,
    transfer: MergeImportExportService,
}

impl SyncSession {
    /// Spawns the resolver and view tasks; requires a running Tokio runtime.
    pub fn start(store: DocumentStoreRef, config: &SyncConfig) -> Self {
        let identity = IdentityHub::new();
        let resolver = WorkspaceResolver::spawn(store.clone(), identity.subscribe());

        let (workspace_ids_tx, workspace_ids) = watch::channel(None);
        let adapter = tokio::spawn(forward_workspace_ids(resolver.watch(), workspace_ids_tx));

        let properties = LiveCollection::spawn(
            store.clone(),
            COLLECTION_PROPERTIES,
            identity.subscribe(),
            member_filter,
            |doc| PropertyRecord::from_document(doc),
        );
        let tags = LiveCollection::spawn(
            store.clone(),
            COLLECTION_TAGS,
            identity.subscribe(),
            member_filter,
            |doc| TagRecord::from_document(doc),
        );
        let join_requests = LiveCollection::spawn(
            store.clone(),
            COLLECTION_JOIN_REQUESTS,
            workspace_ids,
            |workspace_id: &WorkspaceId| {
                QueryFilter::field_equals(FIELD_WORKSPACE_ID, workspace_id.as_str())
            },
            |doc| JoinRequestRecord::from_document(doc),
        );

        let writes = MembershipWriteService::with_policy(store.clone(), WritePolicy::from(config));
        let transfer = MergeImportExportService::new(store, writes.clone());

        Self {
            identity,
            resolver,
            adapter,
            properties,
            tags,
            join_requests,
            writes,
            transfer,
        }
    }

    pub fn identity(&self) -> &IdentityHub {
        &self.identity
    }

    /// Latest resolved workspace for the signed-in user.
    pub fn workspace(&self) -> Option<WorkspaceRecord> {
        self.resolver.current()
    }

    pub fn watch_workspace(&self) -> watch::Receiver<Option<WorkspaceRecord>> {
        self.resolver.watch()
    }

    pub fn properties(&self) -> &LiveCollection<PropertyRecord> {
        &self.properties
    }

    pub fn tags(&self) -> &LiveCollection<TagRecord> {
        &self.tags
    }

    pub fn join_requests(&self) -> &LiveCollection<JoinRequestRecord> {
        &self.join_requests
    }

    pub fn writes(&self) -> &MembershipWriteService {
        &self.writes
    }

    pub fn transfer(&self) -> &MergeImportExportService {
        &self.transfer
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        self.adapter.abort();
    }
}

fn member_filter(user_id: &UserId) -> QueryFilter {
    QueryFilter::array_contains(FIELD_MEMBER_USER_IDS, user_id.as_str())
}

/// Narrows the resolved workspace stream to its id so the join-request view
/// only rekeys when the workspace actually changes, not on every membership
/// edit.
async fn forward_workspace_ids(
    mut resolved: watch::Receiver<Option<WorkspaceRecord>>,
    tx: watch::Sender<Option<WorkspaceId>>,
) {
    loop {
        let id = resolved
            .borrow_and_update()
            .as_ref()
            .map(|workspace| workspace.id.clone());
        tx.send_if_modified(|current| {
            if *current == id {
                false
            } else {
                *current = id;
                true
            }
        });
        if resolved.changed().await.is_err() {
            return;
        }
    }
}
