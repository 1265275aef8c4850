//! Error kinds raised while processing a single sensor event.
//!
//! None of these are fatal to the service: each one aborts (or, for
//! delivery failures, only degrades) the event that produced it.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessError {
    /// Payload shorter than the fixed 8-byte layout.
    MalformedPayload { len: usize },
    /// The state backend could not be reached or timed out.
    StorageUnavailable(String),
    /// The alert could not be delivered or timed out.
    DeliveryFailed(String),
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedPayload { len } => {
                write!(f, "malformed payload: expected at least 8 bytes, got {len}")
            }
            Self::StorageUnavailable(msg) => write!(f, "storage unavailable: {msg}"),
            Self::DeliveryFailed(msg) => write!(f, "alert delivery failed: {msg}"),
        }
    }
}

impl std::error::Error for ProcessError {}

impl From<tokio_postgres::Error> for ProcessError {
    fn from(e: tokio_postgres::Error) -> Self {
        Self::StorageUnavailable(e.to_string())
    }
}
