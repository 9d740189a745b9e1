//! Domain errors
//!
//! User-initiated actions (add, import) fail loudly with these errors.
//! Remote failures are represented as [`TransportError`] but never leave the
//! gateway: they are folded into fetch/push outcomes and logged.

use thiserror::Error;

use crate::storage::StorageError;

/// Errors surfaced by quote operations
#[derive(Error, Debug)]
pub enum QuoteError {
    /// A quote was added with an empty text or category
    #[error("Both text and category are required ({field} is empty)")]
    Validation { field: &'static str },

    /// An import batch contained no usable records
    #[error("No valid quotes found in import ({candidates} candidate(s) rejected)")]
    EmptyImport { candidates: usize },

    /// Import payload is not a JSON array
    #[error("Invalid import format: {details}")]
    MalformedImport { details: String },

    /// Local persistence failure
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Failures talking to the remote quote server
#[derive(Error, Debug)]
pub enum TransportError {
    /// Request could not be sent or the connection failed
    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("Server at {url} responded with status {status}")]
    Status { url: String, status: u16 },

    /// Response body did not have the expected shape
    #[error("Malformed payload from {url}: {details}")]
    Payload { url: String, details: String },

    /// Request did not complete in time
    #[error("Request timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl TransportError {
    /// Whether the failure happened before a response was received
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            TransportError::Request { .. } | TransportError::Timeout { .. }
        )
    }
}

/// Result type for quote operations
pub type QuoteResult<T> = Result<T, QuoteError>;
