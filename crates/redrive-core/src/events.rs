//! Observable events emitted by the redrive pipeline.
//!
//! Processors report what they do through an injected [`EventSink`] instead
//! of a process-wide logger. [`TracingEventSink`] forwards every event to
//! `tracing` and is what the service uses; [`MemoryEventSink`] keeps events
//! in memory so callers can assert on them.

use crate::queue_processor::ProcessorStats;
use std::sync::Mutex;
use tracing::{debug, error, info, trace, warn};

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;

/// Something that happened inside a queue processor or message processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedriveEvent {
    ProcessorStarted {
        alias: String,
    },

    /// `start` was called while the worker was already running
    ProcessorAlreadyRunning {
        alias: String,
    },

    /// `stop` was called while no worker was running
    ProcessorAlreadyStopped {
        alias: String,
    },

    /// Worker finished; `graceful` is false when the grace period elapsed
    /// or the worker ended abnormally
    ProcessorStopped {
        alias: String,
        graceful: bool,
    },

    ReceiveFailed {
        alias: String,
        error: String,
    },

    MessageReceived {
        alias: String,
        message_id: String,
        content: String,
    },

    MessageProcessed {
        alias: String,
        message_id: String,
    },

    MessageFailed {
        alias: String,
        message_id: String,
        error: String,
        content: String,
    },

    /// Running totals, reported after every processed message
    Totals {
        alias: String,
        stats: ProcessorStats,
    },

    MessageDeleted {
        alias: String,
        message_id: String,
    },

    /// The message stays in the queue and will likely be redelivered
    DeleteFailed {
        alias: String,
        message_id: String,
        error: String,
    },

    /// GET content could not be turned into query parameters
    MalformedGetContent {
        url: String,
        content: String,
        error: String,
    },
}

/// Receiver for redrive events
pub trait EventSink: Send + Sync {
    fn record(&self, event: RedriveEvent);
}

// ============================================================================
// Tracing sink
// ============================================================================

/// Forwards events to the `tracing` subscriber with structured fields
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&self, event: RedriveEvent) {
        match event {
            RedriveEvent::ProcessorStarted { alias } => {
                info!(alias = %alias, "Queue processor started");
            }
            RedriveEvent::ProcessorAlreadyRunning { alias } => {
                info!(alias = %alias, "Queue processor is already started");
            }
            RedriveEvent::ProcessorAlreadyStopped { alias } => {
                info!(alias = %alias, "Queue processor is already stopped");
            }
            RedriveEvent::ProcessorStopped {
                alias,
                graceful: true,
            } => {
                info!(alias = %alias, "Queue processor stopped");
            }
            RedriveEvent::ProcessorStopped {
                alias,
                graceful: false,
            } => {
                warn!(alias = %alias, "Queue processor has not stopped gracefully");
            }
            RedriveEvent::ReceiveFailed { alias, error } => {
                warn!(alias = %alias, error = %error, "Failed to receive message");
            }
            RedriveEvent::MessageReceived {
                alias,
                message_id,
                content,
            } => {
                debug!(alias = %alias, message_id = %message_id, "Message received");
                trace!(alias = %alias, message_id = %message_id, content = %content, "Message content");
            }
            RedriveEvent::MessageProcessed { alias, message_id } => {
                debug!(alias = %alias, message_id = %message_id, "Processing complete");
            }
            RedriveEvent::MessageFailed {
                alias,
                message_id,
                error,
                content,
            } => {
                error!(
                    alias = %alias,
                    message_id = %message_id,
                    error = %error,
                    content = %content,
                    "Error processing message"
                );
            }
            RedriveEvent::Totals { alias, stats } => {
                info!(
                    alias = %alias,
                    received = stats.received,
                    sent = stats.sent,
                    failed = stats.failed,
                    "Queue processor totals"
                );
            }
            RedriveEvent::MessageDeleted { alias, message_id } => {
                debug!(alias = %alias, message_id = %message_id, "Message deleted");
            }
            RedriveEvent::DeleteFailed {
                alias,
                message_id,
                error,
            } => {
                error!(
                    alias = %alias,
                    message_id = %message_id,
                    error = %error,
                    "Could not delete message - MESSAGE REMAINS IN QUEUE!"
                );
            }
            RedriveEvent::MalformedGetContent {
                url,
                content,
                error,
            } => {
                warn!(
                    url = %url,
                    error = %error,
                    content = %content,
                    "Error parsing message and adding query parameters. GET request might be incorrect"
                );
            }
        }
    }
}

// ============================================================================
// Memory sink
// ============================================================================

/// Keeps every recorded event in order
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<RedriveEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events
    pub fn events(&self) -> Vec<RedriveEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Count events matching a predicate
    pub fn count(&self, predicate: impl Fn(&RedriveEvent) -> bool) -> usize {
        self.events
            .lock()
            .map(|events| events.iter().filter(|e| predicate(e)).count())
            .unwrap_or(0)
    }
}

impl EventSink for MemoryEventSink {
    fn record(&self, event: RedriveEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
