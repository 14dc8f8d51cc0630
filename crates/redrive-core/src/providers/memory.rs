//! In-memory queue transport for testing and development.
//!
//! Messages are handed out in FIFO order. A received message moves to an
//! in-flight set until it is deleted; [`InMemoryQueueClient::requeue_in_flight`]
//! plays the part of a visibility timeout expiring.

use crate::client::QueueClient;
use crate::error::QueueError;
use crate::message::{Message, MessageId};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Message>,
    in_flight: HashMap<MessageId, Message>,
    deleted: Vec<MessageId>,
}

/// FIFO queue held in process memory
pub struct InMemoryQueueClient {
    state: Mutex<QueueState>,
    available: Notify,
    wait_time: Duration,
}

impl InMemoryQueueClient {
    /// Create an empty queue whose receives wait up to `wait_time` for a message
    pub fn new(wait_time: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            available: Notify::new(),
            wait_time,
        }
    }

    pub fn enqueue(&self, message: Message) {
        self.lock().pending.push_back(message);
        self.available.notify_one();
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn in_flight_count(&self) -> usize {
        self.lock().in_flight.len()
    }

    /// Identifiers of deleted messages, in deletion order
    pub fn deleted_ids(&self) -> Vec<MessageId> {
        self.lock().deleted.clone()
    }

    /// Make every undeleted in-flight message receivable again
    pub fn requeue_in_flight(&self) -> usize {
        let mut state = self.lock();
        let returned: Vec<Message> = state.in_flight.drain().map(|(_, m)| m).collect();
        let count = returned.len();
        state.pending.extend(returned);
        drop(state);

        for _ in 0..count {
            self.available.notify_one();
        }
        count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take_next(&self) -> Option<Message> {
        let mut state = self.lock();
        let message = state.pending.pop_front()?;
        state.in_flight.insert(message.id.clone(), message.clone());
        Some(message)
    }
}

impl Default for InMemoryQueueClient {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

#[async_trait]
impl QueueClient for InMemoryQueueClient {
    async fn get_message(&self) -> Result<Option<Message>, QueueError> {
        if let Some(message) = self.take_next() {
            return Ok(Some(message));
        }

        // A notify_one issued before this point leaves a permit behind, so an
        // enqueue racing with the empty check above is not lost.
        if tokio::time::timeout(self.wait_time, self.available.notified())
            .await
            .is_err()
        {
            tokio::task::yield_now().await;
            return Ok(None);
        }

        Ok(self.take_next())
    }

    async fn delete_message(&self, message: &Message) -> Result<(), QueueError> {
        let mut state = self.lock();

        if state.in_flight.remove(&message.id).is_none() {
            return Err(QueueError::MessageNotFound {
                message_id: message.id.to_string(),
            });
        }

        state.deleted.push(message.id.clone());
        Ok(())
    }
}
