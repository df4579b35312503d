//! Error types for the ledger client

use nocturne_core::domain::job::JobErrorCode;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to the node or the relay
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// The transaction was executed but did not succeed
    #[error("Transaction {hash} failed: {vm_status}")]
    TransactionFailed {
        /// Transaction hash
        hash: String,
        /// VM status reported by the node
        vm_status: String,
    },

    /// Invalid request
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::ApiError {
            status,
            message: message.into(),
        }
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::ApiError { status, .. } if *status >= 400 && *status < 500)
    }

    /// Registry error code carried by a failed transaction, if recognisable
    pub fn abort_code(&self) -> Option<JobErrorCode> {
        match self {
            Self::TransactionFailed { vm_status, .. } => JobErrorCode::from_vm_status(vm_status),
            _ => None,
        }
    }
}
