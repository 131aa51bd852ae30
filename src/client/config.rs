//! config.rs
//!
//! Connection settings for the Elasticsearch HTTP client:
//! - base URL (scheme + host) and port, validated on every change
//! - optional basic-auth credentials
//! - per-request timeout
//! - headers attached to every request (JSON content type by default)

use std::time::Duration;

use reqwest::Url;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid host '{host}': {reason}")]
    InvalidHost { host: String, reason: String },

    #[error("host '{0}' must use the http or https scheme")]
    InvalidScheme(String),

    #[error("invalid header '{0}'")]
    InvalidHeader(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Scheme and host without port, e.g. `http://localhost`.
    base: String,
    port: u16,
    user: String,
    pass: String,
    timeout: Duration,
    headers: HeaderMap,
}

impl ClientConfig {
    /// A port embedded in `host` takes precedence over `port`.
    pub fn new(
        host: &str,
        port: u16,
        user: impl Into<String>,
        pass: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self, ConfigError> {
        let (base, embedded_port) = split_host(host)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            base,
            port: embedded_port.unwrap_or(port),
            user: user.into(),
            pass: pass.into(),
            timeout: Duration::from_secs(timeout_secs),
            headers,
        })
    }

    /// `scheme://host:port`, the prefix of every request URL.
    pub fn address(&self) -> String {
        format!("{}:{}", self.base, self.port)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Basic-auth credentials, only when both halves are set.
    pub fn credentials(&self) -> Option<(String, String)> {
        if self.user.is_empty() || self.pass.is_empty() {
            return None;
        }
        Some((self.user.clone(), self.pass.clone()))
    }

    pub fn set_header(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let name = HeaderName::from_bytes(key.trim().as_bytes())
            .map_err(|_| ConfigError::InvalidHeader(key.to_string()))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|_| ConfigError::InvalidHeader(key.to_string()))?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub fn set_host(&mut self, host: &str) -> Result<(), ConfigError> {
        let (base, embedded_port) = split_host(host)?;
        self.base = base;
        if let Some(port) = embedded_port {
            self.port = port;
        }
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) {
        self.port = port;
    }

    pub fn set_user(&mut self, user: impl Into<String>) {
        self.user = user.into();
    }

    pub fn set_pass(&mut self, pass: impl Into<String>) {
        self.pass = pass.into();
    }
}

fn split_host(host: &str) -> Result<(String, Option<u16>), ConfigError> {
    let url = Url::parse(host.trim()).map_err(|e| ConfigError::InvalidHost {
        host: host.to_string(),
        reason: e.to_string(),
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidScheme(host.to_string()));
    }

    let hostname = url.host_str().ok_or_else(|| ConfigError::InvalidHost {
        host: host.to_string(),
        reason: "missing hostname".to_string(),
    })?;

    Ok((format!("{}://{}", url.scheme(), hostname), url.port()))
}
