//! The module contains the errors the engine can return.
//!
//! The errors are:
//!
//! - [`Store`] returned when the record store rejects or fails a request.
//! - [`InvalidAmount`] returned when a monetary value breaks an invariant
//!   before anything reaches the store.
//! - [`Decode`] returned when a row coming from the store does not match the
//!   expected shape.
//!
//!  [`Store`]: EngineError::Store
//!  [`InvalidAmount`]: EngineError::InvalidAmount
//!  [`Decode`]: EngineError::Decode
use thiserror::Error;

/// Failures reported by a [`RecordStore`](crate::RecordStore) or an
/// [`AuthProvider`](crate::AuthProvider).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not authenticated")]
    Unauthorized,
    #[error("operation not allowed")]
    Forbidden,
    #[error("resource not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("server error: {0}")]
    Server(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl StoreError {
    /// Maps an HTTP status and the decoded error body to a store error.
    #[must_use]
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            409 => Self::Conflict(message),
            400 | 422 => Self::Validation(message),
            _ => Self::Server(message),
        }
    }
}

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid name: {0}")]
    InvalidName(String),
    #[error("Invalid currency: {0}")]
    InvalidCurrency(String),
    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),
    #[error("Invalid transaction kind: {0}")]
    InvalidKind(String),
    #[error("Invalid process status: {0}")]
    InvalidStatus(String),
    #[error("Invalid details: {0}")]
    InvalidDetails(String),
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Settings file error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidName(a), Self::InvalidName(b)) => a == b,
            (Self::InvalidCurrency(a), Self::InvalidCurrency(b)) => a == b,
            (Self::InvalidDateRange(a), Self::InvalidDateRange(b)) => a == b,
            (Self::InvalidKind(a), Self::InvalidKind(b)) => a == b,
            (Self::InvalidStatus(a), Self::InvalidStatus(b)) => a == b,
            (Self::InvalidDetails(a), Self::InvalidDetails(b)) => a == b,
            (Self::InvalidSettings(a), Self::InvalidSettings(b)) => a == b,
            (Self::Decode(a), Self::Decode(b)) => a == b,
            (Self::Io(a), Self::Io(b)) => a.kind() == b.kind(),
            (Self::Store(a), Self::Store(b)) => a == b,
            _ => false,
        }
    }
}
