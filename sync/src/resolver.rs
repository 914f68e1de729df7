use tokio::{sync::watch, task::JoinHandle, time::sleep};
use tracing::{info, warn};

use hearth_core::{
    document::{COLLECTION_WORKSPACES, Document, FIELD_MEMBER_USER_IDS},
    ids::{DocumentId, UserId, WorkspaceId},
    store::{DocumentStoreRef, QueryFilter, WriteBatch},
    workspace::WorkspaceRecord,
};

use crate::RESUBSCRIBE_DELAY;

/// Maps the signed-in user to their single workspace. An owned task follows
/// the identity channel, keeps a live query on the workspaces whose
/// membership contains the user, and on every snapshot either adopts the
/// one match, creates a workspace when there is none, or merges duplicates
/// down to one. The resolved workspace is published on a watch channel;
/// `None` means signed out or still pending.
pub struct WorkspaceResolver {
    rx: watch::Receiver<Option<WorkspaceRecord>>,
    handle: JoinHandle<()>,
}

impl WorkspaceResolver {
    pub fn spawn(store: DocumentStoreRef, identity: watch::Receiver<Option<UserId>>) -> Self {
        let (tx, rx) = watch::channel(None);
        let handle = tokio::spawn(run(store, identity, tx));
        Self { rx, handle }
    }

    /// Latest resolved workspace, if any.
    pub fn current(&self) -> Option<WorkspaceRecord> {
        self.rx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Option<WorkspaceRecord>> {
        self.rx.clone()
    }

    /// Stops the resolver task and waits for its store listener to be
    /// released.
    pub async fn shutdown(mut self) {
        self.handle.abort();
        let _ = (&mut self.handle).await;
    }
}

impl Drop for WorkspaceResolver {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run(
    store: DocumentStoreRef,
    mut identity: watch::Receiver<Option<UserId>>,
    tx: watch::Sender<Option<WorkspaceRecord>>,
) {
    loop {
        let Some(user_id) = identity.borrow_and_update().clone() else {
            publish(&tx, None);
            if identity.changed().await.is_err() {
                return;
            }
            continue;
        };

        if !serve_user(&store, &mut identity, &tx, &user_id).await {
            return;
        }
    }
}

/// Subscription loop for one signed-in user. Returns `false` once the
/// identity channel has closed and the resolver should exit; returning
/// drops the active listener, which cancels it store-side.
async fn serve_user(
    store: &DocumentStoreRef,
    identity: &mut watch::Receiver<Option<UserId>>,
    tx: &watch::Sender<Option<WorkspaceRecord>>,
    user_id: &UserId,
) -> bool {
    loop {
        let filter = QueryFilter::array_contains(FIELD_MEMBER_USER_IDS, user_id.as_str());
        let mut listener = match store.subscribe(COLLECTION_WORKSPACES, filter).await {
            Ok(listener) => listener,
            Err(err) => {
                warn!(%user_id, error = %err, "workspace subscription failed; retrying");
                tokio::select! {
                    _ = sleep(RESUBSCRIBE_DELAY) => continue,
                    changed = identity.changed() => return changed.is_ok(),
                }
            }
        };

        loop {
            tokio::select! {
                changed = identity.changed() => return changed.is_ok(),
                snapshot = listener.recv() => {
                    let Some(docs) = snapshot else {
                        warn!(%user_id, "workspace listener lost; resubscribing");
                        break;
                    };
                    resolve_tick(store, tx, user_id, &docs).await;
                }
            }
        }

        tokio::select! {
            _ = sleep(RESUBSCRIBE_DELAY) => {}
            changed = identity.changed() => return changed.is_ok(),
        }
    }
}

/// One resolution pass over the current set of workspaces containing the
/// user. Runs in full on every snapshot, so partial failures self-heal on
/// the next tick.
async fn resolve_tick(
    store: &DocumentStoreRef,
    tx: &watch::Sender<Option<WorkspaceRecord>>,
    user_id: &UserId,
    docs: &[Document],
) {
    let mut matches: Vec<WorkspaceRecord> = Vec::new();
    for doc in docs {
        match WorkspaceRecord::from_document(doc) {
            Ok(record) => matches.push(record),
            Err(err) => {
                warn!(doc_id = %doc.id, error = %err, "skipping undecodable workspace document");
            }
        }
    }

    if matches.is_empty() {
        create_initial_workspace(store, tx, user_id).await;
        return;
    }

    if matches.len() == 1 {
        if let Some(workspace) = matches.pop() {
            publish(tx, Some(workspace));
        }
        return;
    }

    merge_duplicates(store, tx, user_id, matches).await;
}

async fn create_initial_workspace(
    store: &DocumentStoreRef,
    tx: &watch::Sender<Option<WorkspaceRecord>>,
    user_id: &UserId,
) {
    let fields = WorkspaceRecord::insert_fields(user_id);
    let id = match store.insert(COLLECTION_WORKSPACES, fields).await {
        Ok(id) => id,
        Err(err) => {
            // No emission: consumers treat a missing workspace as pending
            // and the next snapshot retries the creation.
            warn!(%user_id, error = %err, "failed to create initial workspace");
            return;
        }
    };
    info!(%user_id, workspace_id = %id, "created initial workspace");

    match store.fetch(COLLECTION_WORKSPACES, &id).await {
        Ok(Some(doc)) => match WorkspaceRecord::from_document(&doc) {
            Ok(workspace) => publish(tx, Some(workspace)),
            Err(err) => {
                warn!(workspace_id = %id, error = %err, "failed to decode created workspace");
            }
        },
        // Already merged away by a concurrent client; the listener tick
        // covers it.
        Ok(None) => {}
        Err(err) => {
            warn!(workspace_id = %id, error = %err, "failed to read back created workspace");
        }
    }
}

async fn merge_duplicates(
    store: &DocumentStoreRef,
    tx: &watch::Sender<Option<WorkspaceRecord>>,
    user_id: &UserId,
    matches: Vec<WorkspaceRecord>,
) {
    let Some(plan) = plan_dedup(matches) else {
        return;
    };

    let mut batch = WriteBatch::new();
    for id in &plan.deletions {
        batch.delete(COLLECTION_WORKSPACES, DocumentId::new(id.as_str()));
    }
    for id in &plan.removals {
        batch.array_remove(
            COLLECTION_WORKSPACES,
            DocumentId::new(id.as_str()),
            FIELD_MEMBER_USER_IDS,
            vec![user_id.to_string()],
        );
    }

    match store.commit(batch).await {
        Ok(()) => {
            info!(
                %user_id,
                winner = %plan.winner.id,
                deleted = plan.deletions.len(),
                trimmed = plan.removals.len(),
                "merged duplicate workspaces"
            );
            publish(tx, Some(plan.winner));
        }
        Err(err) => {
            // Keep emitting the last known workspace; the next snapshot
            // observes the still-duplicated state and retries the merge.
            warn!(%user_id, error = %err, "workspace merge batch failed");
        }
    }
}

#[derive(Debug, PartialEq)]
pub(crate) struct DedupPlan {
    pub winner: WorkspaceRecord,
    /// Losers where the user was the only member; removed entirely.
    pub deletions: Vec<WorkspaceId>,
    /// Losers that keep their other members; only this user leaves.
    pub removals: Vec<WorkspaceId>,
}

/// Ranks duplicate workspaces for one user: largest membership first, ties
/// broken by ascending id so every client converges on the same winner.
pub(crate) fn plan_dedup(mut matches: Vec<WorkspaceRecord>) -> Option<DedupPlan> {
    matches.sort_by(|a, b| {
        b.member_count()
            .cmp(&a.member_count())
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut remaining = matches.into_iter();
    let winner = remaining.next()?;

    let mut deletions = Vec::new();
    let mut removals = Vec::new();
    for loser in remaining {
        if loser.member_count() <= 1 {
            deletions.push(loser.id);
        } else {
            removals.push(loser.id);
        }
    }

    Some(DedupPlan {
        winner,
        deletions,
        removals,
    })
}

fn publish(tx: &watch::Sender<Option<WorkspaceRecord>>, value: Option<WorkspaceRecord>) {
    tx.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    });
}
