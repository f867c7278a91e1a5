use thiserror::Error;

use crate::app::thread_store::StoreState;
use crate::domain::engagement::EngagementKind;
use crate::infra::gateway::GatewayError;

/// Failures surfaced by the discussion engine.
///
/// Write failures leave the store `Ready`; `DuplicateId` is an integrity
/// violation and moves the store into its error state.
#[derive(Debug, Error)]
pub enum ThreadError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("duplicate {kind} id: {id}")]
    DuplicateId { kind: &'static str, id: String },

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("a {} toggle is already in flight", .0.as_str())]
    ToggleInProgress(EngagementKind),

    #[error("failed to persist comment: {0}")]
    CommentPersistFailed(#[source] GatewayError),

    #[error("failed to persist {action}: {source}")]
    PersistFailed {
        action: &'static str,
        #[source]
        source: GatewayError,
    },

    #[error("server unreachable: {0}")]
    Unreachable(#[source] GatewayError),

    #[error("store is not ready (state: {0:?})")]
    NotReady(StoreState),

    #[error("store has been closed")]
    Closed,
}

impl ThreadError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn duplicate(kind: &'static str, id: impl ToString) -> Self {
        Self::DuplicateId {
            kind,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed(message.into())
    }

    /// Integrity violations are never recovered locally.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DuplicateId { .. })
    }
}

pub type ThreadResult<T> = std::result::Result<T, ThreadError>;
