//! Shared fixtures for redrive pipeline tests.

use redrive_core::{
    ConfigurationEntry, HttpMessageProcessor, InMemoryQueueClient, MemoryEventSink,
    QueueProcessor,
};
use std::sync::Arc;
use std::time::Duration;

/// An in-memory queue wired to the real HTTP processor
pub struct Pipeline {
    pub queue: Arc<InMemoryQueueClient>,
    pub events: Arc<MemoryEventSink>,
    pub processor: QueueProcessor,
}

#[allow(dead_code)]
pub fn pipeline(configuration: ConfigurationEntry) -> Pipeline {
    pipeline_with_grace(configuration, Duration::from_secs(5))
}

pub fn pipeline_with_grace(configuration: ConfigurationEntry, grace: Duration) -> Pipeline {
    let queue = Arc::new(InMemoryQueueClient::new(Duration::from_millis(10)));
    let events = Arc::new(MemoryEventSink::new());
    let http = Arc::new(HttpMessageProcessor::with_event_sink(events.clone()));

    let processor = QueueProcessor::new(queue.clone(), http, configuration)
        .with_event_sink(events.clone())
        .with_shutdown_grace(grace);

    Pipeline {
        queue,
        events,
        processor,
    }
}

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn wait_until(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
