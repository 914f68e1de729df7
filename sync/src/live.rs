use tokio::{sync::watch, task::JoinHandle, time::sleep};
use tracing::{debug, warn};

use hearth_core::{
    document::Document,
    store::{DocumentStoreRef, QueryFilter},
};

use crate::RESUBSCRIBE_DELAY;

/// A reactive view over one collection. An owned task follows a key channel
/// (usually the signed-in user or the resolved workspace), keeps a snapshot
/// listener registered for the key's filter, and publishes the decoded
/// result set on a watch channel. When the key changes the old listener is
/// dropped and a new one registered; while the key is `None` the view is
/// empty.
pub struct LiveCollection<T> {
    rx: watch::Receiver<Vec<T>>,
    handle: JoinHandle<()>,
}

impl<T> LiveCollection<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn spawn<K, F, D>(
        store: DocumentStoreRef,
        collection: &'static str,
        keys: watch::Receiver<Option<K>>,
        filter: F,
        decode: D,
    ) -> Self
    where
        K: Clone + Send + Sync + 'static,
        F: Fn(&K) -> QueryFilter + Send + Sync + 'static,
        D: Fn(&Document) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let (tx, rx) = watch::channel(Vec::new());
        let handle = tokio::spawn(run(store, collection, keys, filter, decode, tx));
        Self { rx, handle }
    }

    /// Latest decoded result set.
    pub fn current(&self) -> Vec<T> {
        self.rx.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Vec<T>> {
        self.rx.clone()
    }
}

impl<T> Drop for LiveCollection<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn run<T, K, F, D>(
    store: DocumentStoreRef,
    collection: &'static str,
    mut keys: watch::Receiver<Option<K>>,
    filter: F,
    decode: D,
    tx: watch::Sender<Vec<T>>,
) where
    T: Clone + PartialEq,
    K: Clone,
    F: Fn(&K) -> QueryFilter,
    D: Fn(&Document) -> anyhow::Result<T>,
{
    loop {
        let Some(key) = keys.borrow_and_update().clone() else {
            publish(&tx, Vec::new());
            if keys.changed().await.is_err() {
                return;
            }
            continue;
        };

        debug!(collection, "resubscribing for new filter key");
        if !serve_key(&store, collection, &mut keys, &filter, &decode, &tx, &key).await {
            return;
        }
    }
}

/// Subscription loop for one key. Returns `false` once the key channel has
/// closed; returning drops the active listener, which cancels it store-side.
async fn serve_key<T, K, F, D>(
    store: &DocumentStoreRef,
    collection: &'static str,
    keys: &mut watch::Receiver<Option<K>>,
    filter: &F,
    decode: &D,
    tx: &watch::Sender<Vec<T>>,
    key: &K,
) -> bool
where
    T: Clone + PartialEq,
    F: Fn(&K) -> QueryFilter,
    D: Fn(&Document) -> anyhow::Result<T>,
{
    loop {
        let mut listener = match store.subscribe(collection, filter(key)).await {
            Ok(listener) => listener,
            Err(err) => {
                warn!(collection, error = %err, "live query subscription failed; retrying");
                tokio::select! {
                    _ = sleep(RESUBSCRIBE_DELAY) => continue,
                    changed = keys.changed() => return changed.is_ok(),
                }
            }
        };

        loop {
            tokio::select! {
                changed = keys.changed() => return changed.is_ok(),
                snapshot = listener.recv() => {
                    let Some(docs) = snapshot else {
                        warn!(collection, "live query listener lost; resubscribing");
                        break;
                    };
                    publish(tx, decode_all(collection, decode, &docs));
                }
            }
        }

        tokio::select! {
            _ = sleep(RESUBSCRIBE_DELAY) => {}
            changed = keys.changed() => return changed.is_ok(),
        }
    }
}

/// Decodes a snapshot, dropping documents that fail to decode so one
/// malformed record cannot blank the whole view.
fn decode_all<T, D>(collection: &'static str, decode: &D, docs: &[Document]) -> Vec<T>
where
    D: Fn(&Document) -> anyhow::Result<T>,
{
    let mut items = Vec::with_capacity(docs.len());
    for doc in docs {
        match decode(doc) {
            Ok(item) => items.push(item),
            Err(err) => {
                warn!(collection, doc_id = %doc.id, error = %err, "skipping undecodable document");
            }
        }
    }
    items
}

fn publish<T: PartialEq>(tx: &watch::Sender<Vec<T>>, value: Vec<T>) {
    tx.send_if_modified(|current| {
        if *current == value {
            false
        } else {
            *current = value;
            true
        }
    });
}
