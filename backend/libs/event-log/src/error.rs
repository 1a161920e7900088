//! Error types for the event log

use thiserror::Error;

/// Result type for event log operations
pub type EventLogResult<T> = Result<T, EventLogError>;

/// Errors that surface past the event log boundary
#[derive(Error, Debug)]
pub enum EventLogError {
    /// Backing store cannot be read or written (connectivity, permissions, etc.)
    ///
    /// This is never conflated with "no matching event": a lookup that fails
    /// because storage is down returns this error, not `None`.
    #[error("Storage unavailable: {0}")]
    Storage(#[from] sqlx::Error),

    /// Input rejected before any store access (empty identity, oversized field)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl EventLogError {
    /// Check if the error is transient (worth retrying)
    pub fn is_transient(&self) -> bool {
        match self {
            EventLogError::Storage(sqlx_err) => {
                matches!(
                    sqlx_err,
                    sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_)
                )
            }
            _ => false,
        }
    }
}

/// A stored record that failed to decode. Recovered internally: queries skip
/// the record and keep scanning; this never crosses the event log boundary.
#[derive(Error, Debug)]
#[error("malformed record {id}: {reason}")]
pub(crate) struct MalformedRecord {
    pub id: uuid::Uuid,
    pub reason: String,
}
