use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use shared::protocol::{CommandBatch, RequestPayload};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid request uri `{uri}`: {source}")]
    InvalidUri { uri: String, source: url::ParseError },
    #[error("request to {uri} failed: {source}")]
    Http { uri: String, source: reqwest::Error },
    #[error("{uri} answered with status {status}")]
    Status { uri: String, status: u16 },
    #[error("response from {uri} is not a command batch: {source}")]
    Decode {
        uri: String,
        source: serde_json::Error,
    },
}

/// Delivers one request payload and hands back the server's commands.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post(&self, uri: &str, payload: &RequestPayload)
        -> Result<CommandBatch, TransportError>;
}

/// Form-encoded POST over HTTP, the way the page-side library talks to the server.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: Option<Url>,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            base_url: None,
        })
    }

    pub fn with_client(http: Client) -> Self {
        Self {
            http,
            base_url: None,
        }
    }

    /// Relative request URIs are resolved against `base_url`.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn resolve(&self, uri: &str) -> Result<Url, TransportError> {
        let parsed = match &self.base_url {
            Some(base) => base.join(uri),
            None => Url::parse(uri),
        };
        parsed.map_err(|source| TransportError::InvalidUri {
            uri: uri.to_owned(),
            source,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(
        &self,
        uri: &str,
        payload: &RequestPayload,
    ) -> Result<CommandBatch, TransportError> {
        let url = self.resolve(uri)?;
        let uri = url.to_string();
        info!(function = %payload.function, uri = %uri, "transport: posting request");

        let http_err = |source| TransportError::Http {
            uri: uri.clone(),
            source,
        };
        let response = self
            .http
            .post(url)
            .header(header::CACHE_CONTROL, "no-cache")
            .form(&payload.form_fields())
            .send()
            .await
            .map_err(http_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                uri: uri.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(http_err)?;
        let batch = CommandBatch::from_json(&body).map_err(|source| TransportError::Decode {
            uri: uri.clone(),
            source,
        })?;
        debug!(commands = batch.len(), uri = %uri, "transport: response decoded");
        Ok(batch)
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
