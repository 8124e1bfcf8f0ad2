use sea_orm::error::DbErr;
use uuid::Uuid;

use crate::lifecycle::RejectedTransition;

/// Error taxonomy for the lifecycle engine.
///
/// Foreground mutating operations surface these to the caller; background
/// paths (alert resolution, escalation audit entries) log and swallow
/// instead, so a failed enrichment never interrupts the primary flow.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Rejected transition: {0}")]
    RejectedTransition(#[from] RejectedTransition),

    /// A write lost to a concurrent writer, e.g. a request code minted twice
    /// after the single recount retry was also beaten.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Concurrent modification: {0}")]
    ConcurrentModification(Uuid),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}
