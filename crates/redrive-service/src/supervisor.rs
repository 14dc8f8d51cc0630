//! Owns one [`QueueProcessor`] per active queue.

use crate::config::{QueueConfig, ServiceConfig};
use async_trait::async_trait;
use redrive_core::{
    EventSink, HttpMessageProcessor, MessageProcessor, ProcessorStats, QueueClient, QueueError,
    QueueProcessor, SqsQueueClient,
};
use std::sync::Arc;
use tracing::{info, warn};

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;

/// Creates the queue transport for a configured queue
#[async_trait]
pub trait QueueClientFactory: Send + Sync {
    async fn create(&self, queue: &QueueConfig) -> Result<Arc<dyn QueueClient>, QueueError>;
}

/// Connects every queue to SQS
#[derive(Debug, Default, Clone, Copy)]
pub struct SqsQueueClientFactory;

#[async_trait]
impl QueueClientFactory for SqsQueueClientFactory {
    async fn create(&self, queue: &QueueConfig) -> Result<Arc<dyn QueueClient>, QueueError> {
        Ok(Arc::new(SqsQueueClient::from_config(&queue.source).await))
    }
}

/// Error building a supervisor
#[derive(Debug, thiserror::Error)]
#[error("Failed to create queue client for '{alias}': {source}")]
pub struct SupervisorError {
    pub alias: String,
    #[source]
    pub source: QueueError,
}

pub struct Supervisor {
    processors: Vec<QueueProcessor>,
}

impl Supervisor {
    /// Build one processor per active queue, all sharing a single HTTP processor
    pub async fn from_config(
        config: &ServiceConfig,
        factory: &dyn QueueClientFactory,
        events: Arc<dyn EventSink>,
    ) -> Result<Self, SupervisorError> {
        let message_processor: Arc<dyn MessageProcessor> =
            Arc::new(HttpMessageProcessor::with_event_sink(Arc::clone(&events)));

        for queue in config.inactive_queues() {
            info!(alias = %queue.alias(), "Queue is inactive; skipping");
        }

        let mut processors = Vec::new();
        for queue in config.active_queues() {
            let queue_client =
                factory
                    .create(queue)
                    .await
                    .map_err(|source| SupervisorError {
                        alias: queue.alias().to_string(),
                        source,
                    })?;

            let processor = QueueProcessor::new(
                queue_client,
                Arc::clone(&message_processor),
                queue.redrive.clone(),
            )
            .with_event_sink(Arc::clone(&events))
            .with_shutdown_grace(config.shutdown_timeout());

            info!(
                alias = %queue.alias(),
                queue_url = %queue.source.queue_url,
                redrive_url = %queue.redrive.redrive_url,
                method = %queue.redrive.http_method(),
                "Configured queue processor"
            );
            processors.push(processor);
        }

        if processors.is_empty() {
            warn!("No active queues configured");
        }

        Ok(Self { processors })
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn aliases(&self) -> Vec<&str> {
        self.processors.iter().map(|p| p.alias()).collect()
    }

    pub fn stats(&self) -> Vec<(String, ProcessorStats)> {
        self.processors
            .iter()
            .map(|p| (p.alias().to_string(), p.stats()))
            .collect()
    }

    pub async fn start_all(&self) {
        for processor in &self.processors {
            processor.start().await;
        }
    }

    /// Stop every processor concurrently, so shutdown takes at most one grace period
    pub async fn stop_all(&self) {
        futures::future::join_all(self.processors.iter().map(|p| p.stop())).await;
    }
}
