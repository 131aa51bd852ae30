//! http_client.rs
//!
//! The single seam through which the CLI talks to the cluster.
//!
//! `RemoteCaller` performs one HTTP round trip for `(method, path, body)` and
//! hands back the raw `reqwest::Response`; callers own draining the body.
//! `HttpClient` is the reqwest-backed implementation. Its connection settings
//! sit behind a lock so the REPL `set` commands can change host, port or
//! credentials while the index poller keeps using the same client.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use reqwest::Method;
use thiserror::Error;
use tracing::debug;

use crate::client::config::{ClientConfig, ConfigError};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),

    #[error("client config: {0}")]
    Config(#[from] ConfigError),
}

#[async_trait]
pub trait RemoteCaller: Send + Sync {
    async fn call(
        &self,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<reqwest::Response, ClientError>;
}

pub struct HttpClient {
    http: reqwest::Client,
    config: RwLock<ClientConfig>,
}

impl HttpClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            http,
            config: RwLock::new(config),
        })
    }

    /// Snapshot of the current connection settings.
    pub fn config(&self) -> ClientConfig {
        self.read_config().clone()
    }

    pub fn set_host(&self, host: &str) -> Result<(), ConfigError> {
        self.write_config().set_host(host)
    }

    pub fn set_port(&self, port: u16) {
        self.write_config().set_port(port);
    }

    pub fn set_user(&self, user: &str) {
        self.write_config().set_user(user);
    }

    pub fn set_pass(&self, pass: &str) {
        self.write_config().set_pass(pass);
    }

    fn read_config(&self) -> RwLockReadGuard<'_, ClientConfig> {
        // A panic while holding the guard cannot leave the settings half-written.
        self.config.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_config(&self) -> RwLockWriteGuard<'_, ClientConfig> {
        self.config.write().unwrap_or_else(|e| e.into_inner())
    }

    fn request(
        &self,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<reqwest::RequestBuilder, ClientError> {
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_| ClientError::InvalidMethod(method.to_string()))?;

        let cfg = self.read_config();
        let url = format!("{}{}", cfg.address(), path);
        debug!(%method, %url, "sending request");

        let mut req = self.http.request(method, url).headers(cfg.headers().clone());
        if let Some((user, pass)) = cfg.credentials() {
            req = req.basic_auth(user, Some(pass));
        }
        if !body.is_empty() {
            req = req.body(body.to_string());
        }
        Ok(req)
    }
}

#[async_trait]
impl RemoteCaller for HttpClient {
    async fn call(
        &self,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<reqwest::Response, ClientError> {
        // The config guard is released before the await point.
        let req = self.request(method, path, body)?;
        Ok(req.send().await?)
    }
}
