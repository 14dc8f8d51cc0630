//! # HTTP Message Processor
//!
//! Redrives a queued message to the HTTP endpoint named by its queue's
//! [`ConfigurationEntry`].
//!
//! Request construction:
//! - GET: the message content is parsed as a flat JSON object and each
//!   property becomes a query parameter. Content that is not a JSON object
//!   degrades to a parameterless GET and a warning event, it never fails
//!   the message.
//! - DELETE / PUT / POST: the content is sent verbatim as a JSON body.
//! - `x-api-key`, `Authorization` and HTTP Basic credentials are applied
//!   independently, so a request may carry all three.
//! - Message attributes become headers unless the key or value is empty. An
//!   attribute that is not a valid header fails the message.
//!
//! Only 200 and 201 count as delivered. Any other status, including other
//! 2xx codes, fails with [`ProcessingError::HttpStatus`]; transport failures
//! surface as [`ProcessingError::Transport`].

use crate::configuration::ConfigurationEntry;
use crate::error::ProcessingError;
use crate::events::{EventSink, RedriveEvent, TracingEventSink};
use crate::processor::MessageProcessor;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::trace;
use url::Url;

#[cfg(test)]
#[path = "http_processor_tests.rs"]
mod tests;

/// Header carrying the API gateway key
pub const API_KEY_HEADER: &str = "x-api-key";

const JSON_CONTENT_TYPE: &str = "application/json";

/// Check whether a response status counts as a successful redrive
pub fn is_accepted_status(status: StatusCode) -> bool {
    status == StatusCode::OK || status == StatusCode::CREATED
}

/// Client options that require a distinct `reqwest::Client`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ClientSettings {
    ignore_certificate_errors: bool,
    timeout: Option<Duration>,
}

impl From<&ConfigurationEntry> for ClientSettings {
    fn from(configuration: &ConfigurationEntry) -> Self {
        Self {
            ignore_certificate_errors: configuration.ignore_certificate_errors,
            timeout: configuration.timeout,
        }
    }
}

/// [`MessageProcessor`] that dispatches messages as HTTP requests
pub struct HttpMessageProcessor {
    clients: Mutex<HashMap<ClientSettings, reqwest::Client>>,
    events: Arc<dyn EventSink>,
}

impl HttpMessageProcessor {
    pub fn new() -> Self {
        Self::with_event_sink(Arc::new(TracingEventSink))
    }

    pub fn with_event_sink(events: Arc<dyn EventSink>) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            events,
        }
    }

    /// Build the outbound request for a message without sending it
    pub fn build_request(
        &self,
        content: &str,
        attributes: &HashMap<String, String>,
        configuration: &ConfigurationEntry,
    ) -> Result<reqwest::Request, ProcessingError> {
        let (_, request) = self.prepare(content, attributes, configuration)?;
        Ok(request)
    }

    fn prepare(
        &self,
        content: &str,
        attributes: &HashMap<String, String>,
        configuration: &ConfigurationEntry,
    ) -> Result<(reqwest::Client, reqwest::Request), ProcessingError> {
        trace!(url = %configuration.redrive_url, "Preparing request");

        let url =
            Url::parse(&configuration.redrive_url).map_err(|e| ProcessingError::InvalidUrl {
                url: configuration.redrive_url.clone(),
                message: e.to_string(),
            })?;

        let client = self.client_for(configuration)?;

        let builder = self.create_request(&client, content, url, configuration);
        let builder = add_authentication(builder, configuration);
        let builder = add_attributes(builder, attributes)?;

        let request = builder
            .build()
            .map_err(|e| ProcessingError::InvalidRequest {
                message: e.to_string(),
            })?;

        Ok((client, request))
    }

    fn create_request(
        &self,
        client: &reqwest::Client,
        content: &str,
        url: Url,
        configuration: &ConfigurationEntry,
    ) -> RequestBuilder {
        let method = configuration.http_method();

        if method == Method::GET {
            let parameters = self.query_parameters(content, configuration);
            let builder = client.get(url);
            if parameters.is_empty() {
                builder
            } else {
                builder.query(&parameters)
            }
        } else {
            client
                .request(method, url)
                .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
                .body(content.to_string())
        }
    }

    /// Flatten a JSON object into query parameters.
    ///
    /// Strings are forwarded unquoted; other values use their JSON text.
    fn query_parameters(
        &self,
        content: &str,
        configuration: &ConfigurationEntry,
    ) -> Vec<(String, String)> {
        match serde_json::from_str::<Map<String, Value>>(content) {
            Ok(object) => object
                .into_iter()
                .map(|(name, value)| {
                    let value = match value {
                        Value::String(s) => s,
                        other => other.to_string(),
                    };
                    (name, value)
                })
                .collect(),
            Err(e) => {
                self.events.record(RedriveEvent::MalformedGetContent {
                    url: configuration.redrive_url.clone(),
                    content: content.to_string(),
                    error: e.to_string(),
                });
                Vec::new()
            }
        }
    }

    fn client_for(
        &self,
        configuration: &ConfigurationEntry,
    ) -> Result<reqwest::Client, ProcessingError> {
        let settings = ClientSettings::from(configuration);

        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(&settings) {
            return Ok(client.clone());
        }

        let mut builder = reqwest::Client::builder();
        if settings.ignore_certificate_errors {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().map_err(|e| ProcessingError::ClientBuild {
            message: e.to_string(),
        })?;

        clients.insert(settings, client.clone());
        Ok(client)
    }
}

impl Default for HttpMessageProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageProcessor for HttpMessageProcessor {
    async fn process_message(
        &self,
        content: &str,
        attributes: &HashMap<String, String>,
        configuration: &ConfigurationEntry,
    ) -> Result<(), ProcessingError> {
        let (client, request) = self.prepare(content, attributes, configuration)?;

        trace!(url = %configuration.redrive_url, method = %request.method(), "Sending request");
        let response = client.execute(request).await.map_err(|e| {
            trace!(url = %configuration.redrive_url, error = %e, "Request failed");
            ProcessingError::Transport(e)
        })?;

        let status = response.status();
        if is_accepted_status(status) {
            trace!(url = %configuration.redrive_url, status = status.as_u16(), "Request successful");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        trace!(
            url = %configuration.redrive_url,
            status = status.as_u16(),
            "Request rejected by endpoint"
        );

        Err(ProcessingError::HttpStatus {
            status: status.as_u16(),
            body,
        })
    }
}

fn add_authentication(
    mut builder: RequestBuilder,
    configuration: &ConfigurationEntry,
) -> RequestBuilder {
    if let Some(token) = configuration.aws_gateway_token() {
        builder = builder.header(API_KEY_HEADER, token);
    }

    if let Some(token) = configuration.auth_token() {
        builder = builder.header(AUTHORIZATION, token);
    }

    if let Some((user, password)) = configuration.basic_auth() {
        builder = builder.basic_auth(user, Some(password));
    }

    builder
}

fn add_attributes(
    mut builder: RequestBuilder,
    attributes: &HashMap<String, String>,
) -> Result<RequestBuilder, ProcessingError> {
    for (key, value) in attributes {
        if key.is_empty() || value.is_empty() {
            continue;
        }

        let invalid = |reason: String| ProcessingError::InvalidRequest {
            message: format!("attribute '{}' is not a valid header: {}", key, reason),
        };
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| invalid(e.to_string()))?;
        let value = HeaderValue::from_str(value).map_err(|e| invalid(e.to_string()))?;

        builder = builder.header(name, value);
    }

    Ok(builder)
}
