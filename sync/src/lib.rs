pub mod identity;
pub mod live;
pub mod resolver;
pub mod session;
pub mod transfer;
pub mod writes;

pub use identity::IdentityHub;
pub use live::LiveCollection;
pub use resolver::WorkspaceResolver;
pub use session::SyncSession;
pub use transfer::{ImportResult, MergeImportExportService, PortableExportDocument};
pub use writes::{MembershipWriteService, WritePolicy};

/// Backoff between attempts to re-establish a lost or failed store
/// subscription.
pub(crate) const RESUBSCRIBE_DELAY: std::time::Duration = std::time::Duration::from_millis(500);

#[cfg(test)]
pub mod test_support;
