//! AWS SQS queue transport.
//!
//! Receives one message per call using SQS long polling, so an idle queue
//! costs one request per `wait_time_seconds`. All message attributes are
//! requested and their string values are exposed as message attributes.
//! Messages are deleted by receipt handle; anything left undeleted becomes
//! visible again once the queue's visibility timeout expires.
//!
//! # Example
//!
//! ```rust,no_run
//! use redrive_core::providers::{SqsQueueClient, SqsQueueConfig};
//!
//! # async fn example() {
//! let config = SqsQueueConfig::new("https://sqs.eu-west-1.amazonaws.com/123456789012/orders")
//!     .with_region("eu-west-1");
//! let client = SqsQueueClient::from_config(&config).await;
//! # }
//! ```

use crate::client::QueueClient;
use crate::error::QueueError;
use crate::message::{Message, MessageId, ReceiptHandle};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::config::{Credentials, Region};
use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[cfg(test)]
#[path = "sqs_tests.rs"]
mod tests;

/// Longest long-poll wait SQS accepts
pub const MAX_WAIT_TIME_SECONDS: u32 = 20;

const CREDENTIALS_PROVIDER_NAME: &str = "redrive-configuration";

fn default_wait_time_seconds() -> u32 {
    MAX_WAIT_TIME_SECONDS
}

/// Connection settings for one SQS queue
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqsQueueConfig {
    pub queue_url: String,

    /// Region override; the default AWS provider chain applies when absent
    #[serde(default)]
    pub region: Option<String>,

    #[serde(default)]
    pub access_key: Option<String>,

    #[serde(default)]
    pub secret_key: Option<String>,

    /// Endpoint override, e.g. for LocalStack
    #[serde(default)]
    pub service_url: Option<String>,

    #[serde(default = "default_wait_time_seconds")]
    pub wait_time_seconds: u32,

    /// Visibility timeout applied to received messages instead of the queue default
    #[serde(default)]
    pub visibility_timeout_seconds: Option<u32>,
}

impl SqsQueueConfig {
    pub fn new(queue_url: impl Into<String>) -> Self {
        Self {
            queue_url: queue_url.into(),
            region: None,
            access_key: None,
            secret_key: None,
            service_url: None,
            wait_time_seconds: MAX_WAIT_TIME_SECONDS,
            visibility_timeout_seconds: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_credentials(
        mut self,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    pub fn with_service_url(mut self, service_url: impl Into<String>) -> Self {
        self.service_url = Some(service_url.into());
        self
    }

    /// Long-poll wait, capped at what SQS accepts
    pub fn effective_wait_time_seconds(&self) -> i32 {
        self.wait_time_seconds.min(MAX_WAIT_TIME_SECONDS) as i32
    }

    /// Static credentials, only when both halves are non-empty
    fn static_credentials(&self) -> Option<Credentials> {
        match (self.access_key.as_deref(), self.secret_key.as_deref()) {
            (Some(access_key), Some(secret_key))
                if !access_key.is_empty() && !secret_key.is_empty() =>
            {
                Some(Credentials::new(
                    access_key,
                    secret_key,
                    None,
                    None,
                    CREDENTIALS_PROVIDER_NAME,
                ))
            }
            _ => None,
        }
    }
}

impl fmt::Debug for SqsQueueConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqsQueueConfig")
            .field("queue_url", &self.queue_url)
            .field("region", &self.region)
            .field("access_key", &self.access_key.as_ref().map(|_| "<REDACTED>"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<REDACTED>"))
            .field("service_url", &self.service_url)
            .field("wait_time_seconds", &self.wait_time_seconds)
            .field("visibility_timeout_seconds", &self.visibility_timeout_seconds)
            .finish()
    }
}

/// [`QueueClient`] backed by an SQS queue
#[derive(Debug, Clone)]
pub struct SqsQueueClient {
    client: Client,
    queue_url: String,
    wait_time_seconds: i32,
    visibility_timeout_seconds: Option<i32>,
}

impl SqsQueueClient {
    pub fn new(client: Client, config: &SqsQueueConfig) -> Self {
        Self {
            client,
            queue_url: config.queue_url.clone(),
            wait_time_seconds: config.effective_wait_time_seconds(),
            visibility_timeout_seconds: config
                .visibility_timeout_seconds
                .map(|seconds| seconds.min(i32::MAX as u32) as i32),
        }
    }

    /// Build an SQS client from the default AWS provider chain plus any
    /// region, credential or endpoint overrides in `config`
    pub async fn from_config(config: &SqsQueueConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());

        if let Some(region) = config.region.clone() {
            loader = loader.region(Region::new(region));
        }
        if let Some(credentials) = config.static_credentials() {
            loader = loader.credentials_provider(credentials);
        }
        if let Some(service_url) = config.service_url.as_deref() {
            loader = loader.endpoint_url(service_url);
        }

        let sdk_config = loader.load().await;
        Self::new(Client::new(&sdk_config), config)
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

/// Convert an SQS message into a redrive message
fn to_message(message: &aws_sdk_sqs::types::Message) -> Message {
    let id = message
        .message_id()
        .and_then(|id| id.parse::<MessageId>().ok())
        .unwrap_or_default();

    let attributes = message
        .message_attributes()
        .map(|attributes| {
            attributes
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .string_value()
                        .map(|v| (name.clone(), v.to_string()))
                })
                .collect()
        })
        .unwrap_or_default();

    Message {
        id,
        content: message.body().unwrap_or_default().to_string(),
        attributes,
        receipt_handle: message
            .receipt_handle()
            .and_then(|handle| ReceiptHandle::new(handle.to_string()).ok()),
    }
}

#[async_trait]
impl QueueClient for SqsQueueClient {
    async fn get_message(&self) -> Result<Option<Message>, QueueError> {
        let mut request = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .wait_time_seconds(self.wait_time_seconds)
            .message_attribute_names("All");

        if let Some(visibility_timeout) = self.visibility_timeout_seconds {
            request = request.visibility_timeout(visibility_timeout);
        }

        let output = request
            .send()
            .await
            .map_err(|e| QueueError::ReceiveFailed {
                message: DisplayErrorContext(&e).to_string(),
            })?;

        let message = output.messages().first().map(to_message);
        if let Some(message) = &message {
            debug!(queue_url = %self.queue_url, message_id = %message.id, "Received SQS message");
        }

        Ok(message)
    }

    async fn delete_message(&self, message: &Message) -> Result<(), QueueError> {
        let receipt_handle =
            message
                .receipt_handle
                .as_ref()
                .ok_or_else(|| QueueError::MissingReceiptHandle {
                    message_id: message.id.to_string(),
                })?;

        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle.as_str())
            .send()
            .await
            .map_err(|e| QueueError::DeleteFailed {
                message_id: message.id.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        Ok(())
    }
}
