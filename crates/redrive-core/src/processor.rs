//! Message processing interface.

use crate::configuration::ConfigurationEntry;
use crate::error::ProcessingError;
use async_trait::async_trait;
use std::collections::HashMap;

/// Turns one queued message into an outbound call.
///
/// Returning `Ok(())` means the message was delivered; any error is counted
/// as a processing failure by the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    async fn process_message(
        &self,
        content: &str,
        attributes: &HashMap<String, String>,
        configuration: &ConfigurationEntry,
    ) -> Result<(), ProcessingError>;
}
