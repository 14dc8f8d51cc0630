//! # Queue Processor
//!
//! Owns the long-running redrive loop for one queue.
//!
//! The worker pulls one message at a time from its [`QueueClient`], hands it
//! to the [`MessageProcessor`], and deletes it afterwards whether processing
//! succeeded or not. Processing failures are counted and reported but never
//! leave the loop; deletion failures are reported loudly because the message
//! stays in the queue and will likely be processed again.
//!
//! Lifecycle is `Idle -> Running -> Idle`. Starting a running processor and
//! stopping an idle one are no-ops. Cancellation is cooperative: the worker
//! checks the stop signal once per iteration, so an in-flight request is
//! allowed to finish. `stop` waits for a grace period (30 seconds by
//! default) and then aborts the worker.

use crate::client::QueueClient;
use crate::configuration::ConfigurationEntry;
use crate::error::ProcessingError;
use crate::events::{EventSink, RedriveEvent, TracingEventSink};
use crate::message::Message;
use crate::processor::MessageProcessor;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

#[cfg(test)]
#[path = "queue_processor_tests.rs"]
mod tests;

/// Default time `stop` waits for the worker before aborting it
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Pause after a failed receive so a broken transport cannot spin the loop
pub const RECEIVE_ERROR_DELAY: Duration = Duration::from_secs(1);

/// Running totals for one worker lifetime
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorStats {
    pub received: u64,
    pub sent: u64,
    pub failed: u64,
}

/// Redrive loop for a single queue
pub struct QueueProcessor {
    context: Arc<WorkerContext>,
    shutdown_grace: Duration,
    worker: Mutex<Option<Worker>>,
    stats: StdMutex<watch::Receiver<ProcessorStats>>,
}

/// Everything the worker needs, shared read-only with the processor
#[derive(Clone)]
struct WorkerContext {
    queue_client: Arc<dyn QueueClient>,
    message_processor: Arc<dyn MessageProcessor>,
    configuration: ConfigurationEntry,
    events: Arc<dyn EventSink>,
    receive_error_delay: Duration,
}

/// Handle to a running worker
struct Worker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl QueueProcessor {
    /// Wire a processor for one queue. The processor starts idle.
    pub fn new(
        queue_client: Arc<dyn QueueClient>,
        message_processor: Arc<dyn MessageProcessor>,
        configuration: ConfigurationEntry,
    ) -> Self {
        let (_, stats) = watch::channel(ProcessorStats::default());

        Self {
            context: Arc::new(WorkerContext {
                queue_client,
                message_processor,
                configuration,
                events: Arc::new(TracingEventSink),
                receive_error_delay: RECEIVE_ERROR_DELAY,
            }),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            worker: Mutex::new(None),
            stats: StdMutex::new(stats),
        }
    }

    /// Report lifecycle and message events to `events` instead of `tracing`
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.update_context(|context| context.events = events);
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn with_receive_error_delay(mut self, delay: Duration) -> Self {
        self.update_context(|context| context.receive_error_delay = delay);
        self
    }

    // A running worker keeps the context it was started with; the update
    // applies to lifecycle events from here on and to the next worker.
    fn update_context(&mut self, update: impl FnOnce(&mut WorkerContext)) {
        update(Arc::make_mut(&mut self.context));
    }

    pub fn configuration(&self) -> &ConfigurationEntry {
        &self.context.configuration
    }

    pub fn alias(&self) -> &str {
        &self.context.configuration.alias
    }

    pub async fn is_running(&self) -> bool {
        self.worker.lock().await.is_some()
    }

    /// Totals of the current worker, or of the last one after a stop
    pub fn stats(&self) -> ProcessorStats {
        let stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = *stats.borrow();
        snapshot
    }

    /// Spawn the worker. Does nothing if it is already running.
    pub async fn start(&self) {
        let mut worker = self.worker.lock().await;

        if worker.is_some() {
            self.context.events.record(RedriveEvent::ProcessorAlreadyRunning {
                alias: self.alias().to_string(),
            });
            return;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (stats_tx, stats_rx) = watch::channel(ProcessorStats::default());

        let context = Arc::clone(&self.context);
        let handle = tokio::spawn(async move {
            context.run(shutdown_rx, stats_tx).await;
        });

        *self.stats.lock().unwrap_or_else(PoisonError::into_inner) = stats_rx;
        *worker = Some(Worker {
            shutdown: shutdown_tx,
            handle,
        });

        self.context.events.record(RedriveEvent::ProcessorStarted {
            alias: self.alias().to_string(),
        });
    }

    /// Signal the worker to stop and wait for it.
    ///
    /// Does nothing if no worker is running. If the worker does not exit
    /// within the grace period it is aborted and the stop is reported as
    /// not graceful; the processor is idle afterwards either way.
    pub async fn stop(&self) {
        let mut worker = self.worker.lock().await;

        let Some(running) = worker.take() else {
            self.context.events.record(RedriveEvent::ProcessorAlreadyStopped {
                alias: self.alias().to_string(),
            });
            return;
        };

        let Worker {
            shutdown,
            mut handle,
        } = running;

        // The worker may already have exited; a closed channel is fine.
        let _ = shutdown.send(true);

        let graceful = match tokio::time::timeout(self.shutdown_grace, &mut handle).await {
            Ok(Ok(())) => true,
            Ok(Err(_)) => false,
            Err(_) => {
                handle.abort();
                false
            }
        };

        self.context.events.record(RedriveEvent::ProcessorStopped {
            alias: self.alias().to_string(),
            graceful,
        });
    }
}

impl WorkerContext {
    fn alias(&self) -> String {
        self.configuration.alias.clone()
    }

    async fn run(
        &self,
        mut shutdown: watch::Receiver<bool>,
        stats_tx: watch::Sender<ProcessorStats>,
    ) {
        let mut stats = ProcessorStats::default();

        while !is_cancelled(&shutdown) {
            let message = match self.queue_client.get_message().await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    tokio::task::yield_now().await;
                    continue;
                }
                Err(e) => {
                    self.events.record(RedriveEvent::ReceiveFailed {
                        alias: self.alias(),
                        error: e.to_string(),
                    });
                    tokio::select! {
                        _ = tokio::time::sleep(self.receive_error_delay) => {}
                        _ = shutdown.changed() => {}
                    }
                    continue;
                }
            };

            stats.received += 1;
            stats_tx.send_replace(stats);

            self.events.record(RedriveEvent::MessageReceived {
                alias: self.alias(),
                message_id: message.id.to_string(),
                content: message.content.clone(),
            });

            match self.process(&message).await {
                Ok(()) => {
                    stats.sent += 1;
                    self.events.record(RedriveEvent::MessageProcessed {
                        alias: self.alias(),
                        message_id: message.id.to_string(),
                    });
                }
                Err(e) => {
                    stats.failed += 1;
                    self.events.record(RedriveEvent::MessageFailed {
                        alias: self.alias(),
                        message_id: message.id.to_string(),
                        error: e.to_string(),
                        content: message.content.clone(),
                    });
                }
            }

            stats_tx.send_replace(stats);
            self.events.record(RedriveEvent::Totals {
                alias: self.alias(),
                stats,
            });

            self.delete(&message).await;
        }
    }

    /// Run the message processor, turning a panic into a failure
    async fn process(&self, message: &Message) -> Result<(), ProcessingError> {
        let processing = self.message_processor.process_message(
            &message.content,
            &message.attributes,
            &self.configuration,
        );

        match AssertUnwindSafe(processing).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(ProcessingError::Panicked {
                message: panic_message(panic.as_ref()),
            }),
        }
    }

    async fn delete(&self, message: &Message) {
        match self.queue_client.delete_message(message).await {
            Ok(()) => self.events.record(RedriveEvent::MessageDeleted {
                alias: self.alias(),
                message_id: message.id.to_string(),
            }),
            Err(e) => self.events.record(RedriveEvent::DeleteFailed {
                alias: self.alias(),
                message_id: message.id.to_string(),
                error: e.to_string(),
            }),
        }
    }
}

/// Stop was requested, or the processor was dropped
fn is_cancelled(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
