pub mod config;
pub mod document;
pub mod error;
pub mod ids;
pub mod join_request;
pub mod property;
pub mod rating;
pub mod store;
pub mod tag;
pub mod workspace;

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use store::{DocumentStore, DocumentStoreRef};
