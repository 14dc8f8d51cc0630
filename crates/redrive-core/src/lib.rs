//! # Redrive Core
//!
//! Moves messages from queues to HTTP endpoints.
//!
//! Each queue gets a [`QueueProcessor`] that receives one message at a time,
//! hands it to a [`MessageProcessor`] and deletes it from the queue
//! afterwards. [`HttpMessageProcessor`] is the production processor: it turns
//! a message into a GET, POST, PUT or DELETE request according to the
//! queue's [`ConfigurationEntry`] and accepts only 200 and 201 responses.
//!
//! ## Module Organization
//!
//! - [`client`] - Queue transport trait
//! - [`configuration`] - Per-queue redrive settings
//! - [`error`] - Error types
//! - [`events`] - Observable events and sinks
//! - [`http_processor`] - HTTP dispatch
//! - [`message`] - Message and identifier types
//! - [`processor`] - Message processing trait
//! - [`providers`] - In-memory and SQS transports
//! - [`queue_processor`] - The per-queue redrive loop

pub mod client;
pub mod configuration;
pub mod error;
pub mod events;
pub mod http_processor;
pub mod message;
pub mod processor;
pub mod providers;
pub mod queue_processor;

pub use client::QueueClient;
pub use configuration::ConfigurationEntry;
pub use error::{ConfigurationError, ProcessingError, QueueError, ValidationError};
pub use events::{EventSink, MemoryEventSink, RedriveEvent, TracingEventSink};
pub use http_processor::HttpMessageProcessor;
pub use message::{Message, MessageId, ReceiptHandle};
pub use processor::MessageProcessor;
pub use providers::{InMemoryQueueClient, SqsQueueClient, SqsQueueConfig};
pub use queue_processor::{ProcessorStats, QueueProcessor, DEFAULT_SHUTDOWN_GRACE};
