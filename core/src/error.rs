use thiserror::Error;

use crate::ids::{JoinRequestId, PropertyId, TagId, WorkspaceId};

/// Failures surfaced by the write and transfer services. Store transport
/// errors stay `anyhow` underneath and convert transparently.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{0}")]
    NotAuthorized(String),

    #[error("batch of {ops} operations exceeds the store limit of {limit}")]
    BatchTooLarge { ops: usize, limit: usize },

    #[error("{0}")]
    Validation(String),

    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl SyncError {
    pub fn not_authorized(message: impl Into<String>) -> Self {
        Self::NotAuthorized(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn batch_too_large(ops: usize, limit: usize) -> Self {
        Self::BatchTooLarge { ops, limit }
    }

    pub fn workspace_not_found(id: &WorkspaceId) -> Self {
        Self::NotFound {
            kind: "workspace",
            id: id.to_string(),
        }
    }

    pub fn property_not_found(id: &PropertyId) -> Self {
        Self::NotFound {
            kind: "property",
            id: id.to_string(),
        }
    }

    pub fn tag_not_found(id: &TagId) -> Self {
        Self::NotFound {
            kind: "tag",
            id: id.to_string(),
        }
    }

    pub fn join_request_not_found(id: &JoinRequestId) -> Self {
        Self::NotFound {
            kind: "join request",
            id: id.to_string(),
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_messages_name_the_resource() {
        let err = SyncError::workspace_not_found(&WorkspaceId::new("ws-1"));
        assert_eq!(err.to_string(), "workspace ws-1 not found");

        let err = SyncError::join_request_not_found(&JoinRequestId::new("req-9"));
        assert_eq!(err.to_string(), "join request req-9 not found");
    }

    #[test]
    fn batch_too_large_reports_both_sizes() {
        let err = SyncError::batch_too_large(612, 500);
        assert_eq!(
            err.to_string(),
            "batch of 612 operations exceeds the store limit of 500"
        );
    }

    #[test]
    fn store_errors_convert_transparently() {
        let err: SyncError = anyhow::anyhow!("connection reset").into();
        assert!(matches!(err, SyncError::Store(_)));
        assert_eq!(err.to_string(), "connection reset");
    }
}
