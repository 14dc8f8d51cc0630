//! Message types pulled from a queue for redrive.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;

// ============================================================================
// Identifiers
// ============================================================================

/// Identifier of a single delivery, unique per dequeue
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Generate new random message ID
    pub fn new() -> Self {
        let id = uuid::Uuid::new_v4();
        Self(id.to_string())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "message_id".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

/// Opaque transport token required to delete a received message
#[derive(Clone, PartialEq, Eq)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    pub fn new(handle: String) -> Result<Self, ValidationError> {
        if handle.is_empty() {
            return Err(ValidationError::Required {
                field: "receipt_handle".to_string(),
            });
        }

        Ok(Self(handle))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Receipt handles are long and carry no diagnostic value.
impl std::fmt::Debug for ReceiptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix: String = self.0.chars().take(8).collect();
        write!(f, "ReceiptHandle({}…)", prefix)
    }
}

// ============================================================================
// Message
// ============================================================================

/// A message received from the queue, ready to be redriven
#[derive(Debug, Clone)]
pub struct Message {
    pub id: MessageId,
    /// Raw payload; a JSON object for GET redrives, otherwise sent verbatim
    pub content: String,
    /// Message metadata forwarded as HTTP headers
    pub attributes: HashMap<String, String>,
    pub receipt_handle: Option<ReceiptHandle>,
}

impl Message {
    /// Create a message with a fresh identifier and no attributes
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            content: content.into(),
            attributes: HashMap::new(),
            receipt_handle: None,
        }
    }

    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = id;
        self
    }

    /// Add message attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_receipt_handle(mut self, receipt_handle: ReceiptHandle) -> Self {
        self.receipt_handle = Some(receipt_handle);
        self
    }
}
