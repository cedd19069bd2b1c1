//! Core error types.
//!
//! Every handler in `partyhub_core` returns `CoreResult<T>`. The five kinds
//! below are exactly the ones `spec.md` §7 names; the HTTP mapping lives in
//! `partyhub_server` and is a pure function of `CoreError::kind()`.

use thiserror::Error;

/// Errors the core raises, per spec §7.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Room or game-state key absent (or past its TTL).
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate nickname, bucket full, already-used slot.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Host token mismatch, wrong role for the action.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Operation not valid for the current phase, turn, or alive-state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Malformed payload, unknown enum, length violation.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Result alias used throughout the core.
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Coarse kind tag, used by the server to pick an HTTP status.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Unauthorized(_) => "unauthorized",
            Self::InvalidState(_) => "invalid_state",
            Self::InvalidArgument(_) => "invalid_argument",
        }
    }
}
