//! Queue transport implementations.

pub mod memory;
pub mod sqs;

pub use memory::InMemoryQueueClient;
pub use sqs::{SqsQueueClient, SqsQueueConfig};
