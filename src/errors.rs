//! Domain error taxonomy surfaced by the repository layer.
//!
//! Repositories never leak raw store errors for expected outcomes: a lost
//! uniqueness race is a `Duplicate`, a failed optimistic condition is a
//! state conflict, and a multi-item checkout collapse is always
//! `DuplicateCheckout` regardless of which precondition tripped. Each
//! variant carries a stable machine-readable code for the request layer.

use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum DataError {
    /// Caller-supplied input fails a business rule; detected before any
    /// write.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    /// A uniqueness-registry precondition lost a race or the value is
    /// already taken.
    #[error("{entity} already exists")]
    Duplicate { entity: &'static str },

    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: &'static str, id: String },

    #[error("invalid visit transition {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    /// Checkout attempted before the visit reached DONE.
    #[error("visit is not done")]
    VisitNotDone,

    /// A billing record already exists, or a concurrent checkout won the
    /// race.
    #[error("visit already checked out")]
    DuplicateCheckout,

    /// Refresh token already consumed, revoked, or past its expiry.
    #[error("refresh token rejected")]
    TokenRejected,

    /// Stored state no longer matches what validation read.
    #[error("state conflict: {0}")]
    StateConflict(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(&'static str),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DataError {
    /// Stable machine-readable code; the request layer maps these to
    /// HTTP statuses.
    pub fn code(&self) -> &'static str {
        match self {
            DataError::Validation(_) => "VALIDATION",
            DataError::InvalidEnum { .. } => "VALIDATION",
            DataError::Duplicate { .. } => "DUPLICATE",
            DataError::NotFound { .. } => "NOT_FOUND",
            DataError::InvalidTransition { .. } => "INVALID_TRANSITION",
            DataError::VisitNotDone => "VISIT_NOT_DONE",
            DataError::DuplicateCheckout => "DUPLICATE_CHECKOUT",
            DataError::TokenRejected => "TOKEN_REJECTED",
            DataError::StateConflict(_) => "STATE_CONFLICT",
            DataError::Forbidden(_) => "FORBIDDEN",
            DataError::Store(_) => "STORE",
        }
    }
}
