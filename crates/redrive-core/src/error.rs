//! Error types for redrive operations.

use thiserror::Error;

/// Failure while translating a message into an HTTP call or dispatching it
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Network, TLS or timeout failure reaching the redrive endpoint
    #[error("Transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// Endpoint was reachable but did not answer 200 or 201
    #[error("Received {status} status code with content [{body}]")]
    HttpStatus { status: u16, body: String },

    #[error("Invalid redrive URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Request could not be built: {message}")]
    InvalidRequest { message: String },

    #[error("Failed to build HTTP client: {message}")]
    ClientBuild { message: String },

    #[error("Message processor panicked: {message}")]
    Panicked { message: String },
}

impl ProcessingError {
    /// Check if the endpoint could not be reached at all
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Status code returned by the endpoint, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Errors raised by queue transports
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Receive failed: {message}")]
    ReceiveFailed { message: String },

    #[error("Delete failed for message {message_id}: {message}")]
    DeleteFailed { message_id: String, message: String },

    #[error("Message not found or already deleted: {message_id}")]
    MessageNotFound { message_id: String },

    #[error("Message {message_id} has no receipt handle")]
    MissingReceiptHandle { message_id: String },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },
}

impl QueueError {
    /// Check if error is transient and the operation may succeed later
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ReceiveFailed { .. } => true,
            Self::DeleteFailed { .. } => true,
            Self::MessageNotFound { .. } => false,
            Self::MissingReceiptHandle { .. } => false,
            Self::ConnectionFailed { .. } => true,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration parsing failed: {message}")]
    Parsing { message: String },
}

/// Validation errors for domain identifiers
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
