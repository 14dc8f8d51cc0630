//! Queue transport interface consumed by queue processors.

use crate::error::QueueError;
use crate::message::Message;
use async_trait::async_trait;

/// Source of messages for a single queue.
///
/// Implementations own the queue semantics: how long a receive waits,
/// visibility timeouts and redelivery of undeleted messages. The processor
/// imposes no timeout of its own on these calls.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Receive the next message.
    ///
    /// `Ok(None)` means nothing arrived within the transport's wait window.
    async fn get_message(&self) -> Result<Option<Message>, QueueError>;

    /// Remove a received message from the queue
    async fn delete_message(&self, message: &Message) -> Result<(), QueueError>;
}
