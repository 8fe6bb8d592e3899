//! Error types for the lending core
//!
//! One enum per layer, converted upward with `#[from]`:
//! - [`StoreError`] from the persistence collaborator
//! - [`LendingError`] from the engine, surfaced to callers

use crate::store::StoreError;
use thiserror::Error;

/// Result alias for engine operations
pub type LendingResult<T> = Result<T, LendingError>;

/// Errors returned by engine operations
#[derive(Debug, Error, PartialEq)]
pub enum LendingError {
    /// Referenced entity does not exist or is soft-deleted
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    #[error("no loan with control number {0}")]
    UnknownControlNumber(String),

    /// Request collides with existing state (e.g. second full payment for a week)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Request rejected before touching state
    #[error("validation failed: {0}")]
    Validation(String),

    /// A follow-up write after the primary write failed
    #[error("dependency failure: {0}")]
    DependencyFailure(String),

    /// Next-week search ran past the loan's schedule
    #[error("no open week found for loan {loan_id} up to week {searched_to}")]
    ScheduleExhausted { loan_id: u64, searched_to: u32 },

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl LendingError {
    pub(crate) fn loan_not_found(id: u64) -> Self {
        LendingError::NotFound { entity: "loan", id }
    }

    pub(crate) fn payment_not_found(id: u64) -> Self {
        LendingError::NotFound {
            entity: "payment",
            id,
        }
    }

    /// Caller error (4xx) as opposed to a server-side failure
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            LendingError::NotFound { .. }
                | LendingError::UnknownControlNumber(_)
                | LendingError::Conflict(_)
                | LendingError::Validation(_)
        )
    }
}
