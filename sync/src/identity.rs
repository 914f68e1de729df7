use tokio::sync::watch;
use tracing::debug;

use hearth_core::ids::UserId;

/// Publishes the authenticated user id to every query object in a session.
/// `None` means signed out; the resolver and live collections react to each
/// change by re-keying their subscriptions.
#[derive(Debug)]
pub struct IdentityHub {
    tx: watch::Sender<Option<UserId>>,
}

impl IdentityHub {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn sign_in(&self, user_id: UserId) {
        debug!(%user_id, "identity signed in");
        self.tx.send_replace(Some(user_id));
    }

    pub fn sign_out(&self) {
        debug!("identity signed out");
        self.tx.send_replace(None);
    }

    pub fn current(&self) -> Option<UserId> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<UserId>> {
        self.tx.subscribe()
    }
}

impl Default for IdentityHub {
    fn default() -> Self {
        Self::new()
    }
}
