//! Configuration for REST-backed stores.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::env;

/// Characters escaped inside a single path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Where a [`RestStore`](crate::RestStore) sends its requests.
///
/// URLs take the form `<host>[/<namespace>]/<type>s`. The default host is
/// empty, which yields root-relative paths such as `/planets`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestConfig {
    /// Scheme and authority, e.g. `http://localhost:3000`
    pub host: String,
    /// Optional path prefix, e.g. `api/v1`
    pub namespace: Option<String>,
}

impl RestConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            namespace: None,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Load configuration from `TANDEM_REST_HOST` and `TANDEM_REST_NAMESPACE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env::var("TANDEM_REST_HOST").unwrap_or_default();
        let namespace = env::var("TANDEM_REST_NAMESPACE")
            .ok()
            .filter(|ns| !ns.trim().is_empty());

        let config = Self { host, namespace };
        config.validate()?;
        Ok(config)
    }

    /// Check the host is either empty or an http(s) origin.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty()
            || self.host.starts_with("http://")
            || self.host.starts_with("https://")
        {
            Ok(())
        } else {
            Err(ConfigError::InvalidHost(self.host.clone()))
        }
    }

    /// URL of the collection resource for a record type.
    pub fn resource_url(&self, record_type: &str) -> String {
        let mut url = self.host.trim_end_matches('/').to_string();
        if let Some(namespace) = &self.namespace {
            let namespace = namespace.trim_matches('/');
            if !namespace.is_empty() {
                url.push('/');
                url.push_str(namespace);
            }
        }
        url.push('/');
        url.push_str(&pluralize(record_type));
        url
    }

    /// URL of a single record. The id is escaped so it stays one segment.
    pub fn record_url(&self, record_type: &str, remote_id: &impl std::fmt::Display) -> String {
        let segment = remote_id.to_string();
        format!(
            "{}/{}",
            self.resource_url(record_type),
            utf8_percent_encode(&segment, PATH_SEGMENT)
        )
    }
}

/// Resource name for a record type: the type with an `s` appended.
pub fn pluralize(record_type: &str) -> String {
    format!("{record_type}s")
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("REST host must start with http:// or https://, got '{0}'")]
    InvalidHost(String),
}
