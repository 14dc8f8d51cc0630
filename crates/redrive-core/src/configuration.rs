//! Per-queue redrive configuration.
//!
//! A [`ConfigurationEntry`] describes where the messages of one queue are
//! redriven to and how the outbound HTTP request is shaped. Entries are
//! immutable once a processor has been created from them; changing an entry
//! requires restarting the processor.

use crate::error::ConfigurationError;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

#[cfg(test)]
#[path = "configuration_tests.rs"]
mod tests;

/// Redrive settings for a single queue
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationEntry {
    /// Human-readable queue name used to correlate log output
    pub alias: String,

    /// Absolute URL of the endpoint messages are sent to
    pub redrive_url: String,

    /// Send messages as GET requests with the JSON properties as query parameters
    #[serde(default)]
    pub use_get: bool,

    #[serde(default)]
    pub use_put: bool,

    #[serde(default)]
    pub use_delete: bool,

    /// Skip TLS certificate validation for this endpoint only
    #[serde(default)]
    pub ignore_certificate_errors: bool,

    /// Request timeout; the HTTP client default applies when absent
    #[serde(default, rename = "timeout_ms", with = "optional_millis")]
    pub timeout: Option<Duration>,

    /// Sent as the `x-api-key` header
    #[serde(default)]
    pub aws_gateway_token: Option<String>,

    /// Sent verbatim as the `Authorization` header
    #[serde(default)]
    pub auth_token: Option<String>,

    #[serde(default)]
    pub basic_auth_user_name: Option<String>,

    #[serde(default)]
    pub basic_auth_password: Option<String>,
}

impl ConfigurationEntry {
    /// Create an entry that POSTs to `redrive_url` with no authentication
    pub fn new(alias: impl Into<String>, redrive_url: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            redrive_url: redrive_url.into(),
            use_get: false,
            use_put: false,
            use_delete: false,
            ignore_certificate_errors: false,
            timeout: None,
            aws_gateway_token: None,
            auth_token: None,
            basic_auth_user_name: None,
            basic_auth_password: None,
        }
    }

    /// Resolve the HTTP method for outbound requests.
    ///
    /// GET wins over everything else, then DELETE, then PUT. POST is used
    /// when no flag is set.
    pub fn http_method(&self) -> Method {
        if self.use_get {
            Method::GET
        } else if self.use_delete {
            Method::DELETE
        } else if self.use_put {
            Method::PUT
        } else {
            Method::POST
        }
    }

    /// API gateway token, if configured and non-empty
    pub fn aws_gateway_token(&self) -> Option<&str> {
        non_empty(&self.aws_gateway_token)
    }

    /// Authorization header value, if configured and non-empty
    pub fn auth_token(&self) -> Option<&str> {
        non_empty(&self.auth_token)
    }

    /// Basic auth credentials; only available when both halves are set
    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        match (
            non_empty(&self.basic_auth_user_name),
            non_empty(&self.basic_auth_password),
        ) {
            (Some(user), Some(password)) => Some((user, password)),
            _ => None,
        }
    }

    /// Validate the entry before a processor is built from it
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.alias.trim().is_empty() {
            return Err(ConfigurationError::Missing {
                key: "alias".to_string(),
            });
        }

        if self.redrive_url.trim().is_empty() {
            return Err(ConfigurationError::Missing {
                key: format!("{}.redrive_url", self.alias),
            });
        }

        let url = Url::parse(&self.redrive_url).map_err(|e| ConfigurationError::Invalid {
            message: format!(
                "queue '{}' has an invalid redrive_url '{}': {}",
                self.alias, self.redrive_url, e
            ),
        })?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "queue '{}' redrive_url must use http or https, got '{}'",
                    self.alias,
                    url.scheme()
                ),
            });
        }

        Ok(())
    }
}

impl fmt::Debug for ConfigurationEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationEntry")
            .field("alias", &self.alias)
            .field("redrive_url", &self.redrive_url)
            .field("use_get", &self.use_get)
            .field("use_put", &self.use_put)
            .field("use_delete", &self.use_delete)
            .field("ignore_certificate_errors", &self.ignore_certificate_errors)
            .field("timeout", &self.timeout)
            .field("aws_gateway_token", &redacted(&self.aws_gateway_token))
            .field("auth_token", &redacted(&self.auth_token))
            .field("basic_auth_user_name", &redacted(&self.basic_auth_user_name))
            .field("basic_auth_password", &redacted(&self.basic_auth_password))
            .finish()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn redacted(value: &Option<String>) -> Option<&'static str> {
    value.as_ref().map(|_| "<REDACTED>")
}

/// Serde adapter storing an optional [`Duration`] as whole milliseconds
mod optional_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
