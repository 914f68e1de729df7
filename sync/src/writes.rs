use serde_json::{Value as JsonValue, json};
use tracing::{debug, info};

use hearth_core::{
    config::SyncConfig,
    document::{
        COLLECTION_JOIN_REQUESTS, COLLECTION_PROPERTIES, COLLECTION_TAGS, COLLECTION_WORKSPACES,
        FIELD_MEMBER_USER_IDS,
    },
    error::{SyncError, SyncResult},
    ids::{DocumentId, JoinRequestId, PropertyId, TagId, UserId, WorkspaceId},
    join_request::JoinRequestRecord,
    property::PropertyInput,
    store::{DocumentStoreRef, QueryFilter, WriteBatch},
    tag::TagInput,
    workspace::WorkspaceRecord,
};

/// Controls whether updates re-stamp `memberUserIds` from the current
/// workspace. Off by default: membership is stamped at creation and only
/// propagated to existing documents by join approval.
#[derive(Debug, Clone, Copy, Default)]
pub struct WritePolicy {
    pub restamp_membership_on_update: bool,
}

impl From<&SyncConfig> for WritePolicy {
    fn from(config: &SyncConfig) -> Self {
        Self {
            restamp_membership_on_update: config.restamp_membership_on_update,
        }
    }
}

/// Workspace-scoped writes. Every created property and tag carries the
/// membership list of the workspace it was written under, which is what the
/// live queries filter on; join approval extends that membership across all
/// three collections in one atomic batch.
#[derive(Clone)]
pub struct MembershipWriteService {
    store: DocumentStoreRef,
    policy: WritePolicy,
}

impl MembershipWriteService {
    pub fn new(store: DocumentStoreRef) -> Self {
        Self::with_policy(store, WritePolicy::default())
    }

    pub fn with_policy(store: DocumentStoreRef, policy: WritePolicy) -> Self {
        Self { store, policy }
    }

    /// Creates or updates a property. Creation stamps the workspace's
    /// membership onto the document; updates rewrite the scalar fields and
    /// leave the stamp untouched unless the policy says otherwise.
    pub async fn save_property(
        &self,
        id: Option<&PropertyId>,
        input: &PropertyInput,
        workspace: &WorkspaceRecord,
    ) -> SyncResult<PropertyId> {
        let mut fields = input.to_fields()?;

        let Some(id) = id else {
            fields.insert(FIELD_MEMBER_USER_IDS.to_owned(), membership_stamp(workspace));
            let doc_id = self.store.insert(COLLECTION_PROPERTIES, fields).await?;
            debug!(property_id = %doc_id, workspace_id = %workspace.id, "created property");
            return Ok(PropertyId::from(doc_id));
        };

        let doc_id = DocumentId::new(id.as_str());
        if self
            .store
            .fetch(COLLECTION_PROPERTIES, &doc_id)
            .await?
            .is_none()
        {
            return Err(SyncError::property_not_found(id));
        }
        if self.policy.restamp_membership_on_update {
            fields.insert(FIELD_MEMBER_USER_IDS.to_owned(), membership_stamp(workspace));
        }
        self.store.update(COLLECTION_PROPERTIES, &doc_id, fields).await?;
        Ok(id.clone())
    }

    /// Creates or updates a tag, with the same stamping rules as
    /// [`save_property`](Self::save_property).
    pub async fn save_tag(
        &self,
        id: Option<&TagId>,
        input: &TagInput,
        workspace: &WorkspaceRecord,
    ) -> SyncResult<TagId> {
        let mut fields = input.to_fields()?;

        let Some(id) = id else {
            fields.insert(FIELD_MEMBER_USER_IDS.to_owned(), membership_stamp(workspace));
            let doc_id = self.store.insert(COLLECTION_TAGS, fields).await?;
            debug!(tag_id = %doc_id, workspace_id = %workspace.id, "created tag");
            return Ok(TagId::from(doc_id));
        };

        let doc_id = DocumentId::new(id.as_str());
        if self.store.fetch(COLLECTION_TAGS, &doc_id).await?.is_none() {
            return Err(SyncError::tag_not_found(id));
        }
        if self.policy.restamp_membership_on_update {
            fields.insert(FIELD_MEMBER_USER_IDS.to_owned(), membership_stamp(workspace));
        }
        self.store.update(COLLECTION_TAGS, &doc_id, fields).await?;
        Ok(id.clone())
    }

    pub async fn delete_property(&self, id: &PropertyId) -> SyncResult<()> {
        self.store
            .delete(COLLECTION_PROPERTIES, &DocumentId::new(id.as_str()))
            .await?;
        debug!(property_id = %id, "deleted property");
        Ok(())
    }

    /// Files a request to join another workspace. Duplicate pending requests
    /// from the same user are not coalesced.
    pub async fn create_join_request(
        &self,
        workspace_id: &WorkspaceId,
        user_id: &UserId,
    ) -> SyncResult<JoinRequestId> {
        if self
            .store
            .fetch(COLLECTION_WORKSPACES, &DocumentId::new(workspace_id.as_str()))
            .await?
            .is_none()
        {
            return Err(SyncError::workspace_not_found(workspace_id));
        }
        let fields = JoinRequestRecord::insert_fields(workspace_id, user_id);
        let request_id = self.store.insert(COLLECTION_JOIN_REQUESTS, fields).await?;
        debug!(
            request_id = %request_id,
            workspace_id = %workspace_id,
            %user_id,
            "created join request"
        );
        Ok(JoinRequestId::from(request_id))
    }

    /// Grants a pending request. One atomic batch adds the requester to the
    /// target workspace and to every property and tag the approver owns,
    /// then consumes the request. A batch over the store's cap fails closed
    /// before any membership change is applied.
    pub async fn approve_join_request(
        &self,
        request_id: &JoinRequestId,
        approver: &UserId,
    ) -> SyncResult<()> {
        let request_doc_id = DocumentId::new(request_id.as_str());
        let Some(request_doc) = self
            .store
            .fetch(COLLECTION_JOIN_REQUESTS, &request_doc_id)
            .await?
        else {
            return Err(SyncError::join_request_not_found(request_id));
        };
        let request = JoinRequestRecord::from_document(&request_doc)?;

        let workspace_doc_id = DocumentId::new(request.workspace_id.as_str());
        let Some(workspace_doc) = self
            .store
            .fetch(COLLECTION_WORKSPACES, &workspace_doc_id)
            .await?
        else {
            return Err(SyncError::workspace_not_found(&request.workspace_id));
        };
        let workspace = WorkspaceRecord::from_document(&workspace_doc)?;
        if !workspace.contains_member(approver) {
            return Err(SyncError::not_authorized(format!(
                "user {approver} is not a member of workspace {}",
                workspace.id
            )));
        }

        let owned = QueryFilter::array_contains(FIELD_MEMBER_USER_IDS, approver.as_str());
        let properties = self.store.query(COLLECTION_PROPERTIES, &owned).await?;
        let tags = self.store.query(COLLECTION_TAGS, &owned).await?;

        let grant = vec![request.user_id.to_string()];
        let mut batch = WriteBatch::new();
        batch.array_union(
            COLLECTION_WORKSPACES,
            workspace_doc_id,
            FIELD_MEMBER_USER_IDS,
            grant.clone(),
        );
        for doc in &properties {
            batch.array_union(
                COLLECTION_PROPERTIES,
                doc.id.clone(),
                FIELD_MEMBER_USER_IDS,
                grant.clone(),
            );
        }
        for doc in &tags {
            batch.array_union(
                COLLECTION_TAGS,
                doc.id.clone(),
                FIELD_MEMBER_USER_IDS,
                grant.clone(),
            );
        }
        batch.delete(COLLECTION_JOIN_REQUESTS, request_doc_id);

        let limit = self.store.max_batch_ops();
        if batch.len() > limit {
            return Err(SyncError::batch_too_large(batch.len(), limit));
        }
        self.store.commit(batch).await?;
        info!(
            request_id = %request_id,
            workspace_id = %workspace.id,
            user_id = %request.user_id,
            shared = properties.len() + tags.len(),
            "approved join request"
        );
        Ok(())
    }

    /// Withdraws or declines a pending request. The requester may cancel
    /// their own; anyone else must be a member of the target workspace.
    pub async fn cancel_join_request(
        &self,
        request_id: &JoinRequestId,
        caller: &UserId,
    ) -> SyncResult<()> {
        let request_doc_id = DocumentId::new(request_id.as_str());
        let Some(request_doc) = self
            .store
            .fetch(COLLECTION_JOIN_REQUESTS, &request_doc_id)
            .await?
        else {
            return Err(SyncError::join_request_not_found(request_id));
        };
        let request = JoinRequestRecord::from_document(&request_doc)?;

        if request.user_id != *caller {
            let workspace_doc_id = DocumentId::new(request.workspace_id.as_str());
            let Some(workspace_doc) = self
                .store
                .fetch(COLLECTION_WORKSPACES, &workspace_doc_id)
                .await?
            else {
                return Err(SyncError::workspace_not_found(&request.workspace_id));
            };
            let workspace = WorkspaceRecord::from_document(&workspace_doc)?;
            if !workspace.contains_member(caller) {
                return Err(SyncError::not_authorized(format!(
                    "user {caller} may not cancel join request {request_id}"
                )));
            }
        }

        self.store
            .delete(COLLECTION_JOIN_REQUESTS, &request_doc_id)
            .await?;
        debug!(request_id = %request_id, %caller, "cancelled join request");
        Ok(())
    }

    /// Removes the user from a workspace. Guards run against the stored
    /// membership, not a caller-held snapshot: the last member cannot leave,
    /// the document persists instead. Documents already stamped with the
    /// leaver stay as they are.
    pub async fn leave_workspace(
        &self,
        workspace_id: &WorkspaceId,
        user_id: &UserId,
    ) -> SyncResult<()> {
        let doc_id = DocumentId::new(workspace_id.as_str());
        let Some(doc) = self.store.fetch(COLLECTION_WORKSPACES, &doc_id).await? else {
            return Err(SyncError::workspace_not_found(workspace_id));
        };
        let workspace = WorkspaceRecord::from_document(&doc)?;

        if !workspace.contains_member(user_id) {
            return Err(SyncError::validation(format!(
                "user {user_id} is not a member of workspace {workspace_id}"
            )));
        }
        if workspace.member_count() <= 1 {
            return Err(SyncError::validation(format!(
                "the last member cannot leave workspace {workspace_id}"
            )));
        }

        let mut batch = WriteBatch::new();
        batch.array_remove(
            COLLECTION_WORKSPACES,
            doc_id,
            FIELD_MEMBER_USER_IDS,
            vec![user_id.to_string()],
        );
        self.store.commit(batch).await?;
        debug!(%workspace_id, %user_id, "left workspace");
        Ok(())
    }
}

fn membership_stamp(workspace: &WorkspaceRecord) -> JsonValue {
    json!(workspace.member_user_ids)
}
