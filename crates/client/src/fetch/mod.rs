//! Network seam for the agent.
//!
//! ### Network trait
//! - The agent only talks to the network through [`Network`], so strategy
//!   executors and the replay queue can be driven by any transport.
//! - A response with any HTTP status is a successful fetch; only transport
//!   failures (DNS, refused connection, timeout, oversize body) are errors.
//!
//! ### HttpNetwork
//! - reqwest with rustls, gzip/brotli/deflate
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)

pub mod url;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method, header};
use std::time::{Duration, Instant};
use tether_core::cache::MutationRecord;
use tether_core::{AppConfig, Error, HttpResponse, RequestDescriptor};

pub use url::{UrlError, parse_origin, resolve, same_origin};

/// Transport-level fetch failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("{size} bytes exceeds {limit}")]
    TooLarge { size: u64, limit: usize },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<FetchError> for Error {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Timeout(msg) => Error::FetchTimeout(msg),
            FetchError::Network(msg) => Error::NetworkUnavailable(msg),
            FetchError::TooLarge { .. } => Error::FetchTooLarge(err.to_string()),
            FetchError::InvalidRequest(msg) => Error::InvalidInput(msg),
        }
    }
}

/// A request as sent on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRequest {
    pub method: String,
    pub url: ::url::Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl NetworkRequest {
    pub fn get(url: ::url::Url) -> Self {
        Self { method: "GET".into(), url, headers: Vec::new(), body: None }
    }
}

impl From<&RequestDescriptor> for NetworkRequest {
    fn from(req: &RequestDescriptor) -> Self {
        Self { method: req.method.clone(), url: req.url.clone(), headers: req.headers.clone(), body: None }
    }
}

impl TryFrom<&MutationRecord> for NetworkRequest {
    type Error = FetchError;

    fn try_from(record: &MutationRecord) -> Result<Self, Self::Error> {
        let url = ::url::Url::parse(&record.url).map_err(|e| FetchError::InvalidRequest(e.to_string()))?;
        Ok(Self {
            method: record.method.clone(),
            url,
            headers: record.headers.clone(),
            body: record.body.clone().map(Bytes::from),
        })
    }
}

/// Anything that can perform a fetch on the agent's behalf.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &NetworkRequest) -> Result<HttpResponse, FetchError>;
}

/// Configuration for the HTTP network.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "tether/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "tether/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// reqwest-backed network.
pub struct HttpNetwork {
    http: Client,
    config: FetchConfig,
}

impl HttpNetwork {
    /// Create a new network client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::NetworkUnavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }
}

fn transport_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() { FetchError::Timeout(err.to_string()) } else { FetchError::Network(err.to_string()) }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &NetworkRequest) -> Result<HttpResponse, FetchError> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| FetchError::InvalidRequest(format!("method {}: {e}", request.method)))?;

        let mut builder = self.http.request(method, request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(FetchError::TooLarge { size: len, limit: self.config.max_bytes });
        }

        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .filter(|(name, _)| name != header::SET_COOKIE.as_str())
            .collect();

        let bytes = response.bytes().await.map_err(transport_error)?;

        if bytes.len() > self.config.max_bytes {
            return Err(FetchError::TooLarge { size: bytes.len() as u64, limit: self.config.max_bytes });
        }

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method,
            request.url,
            status.as_u16(),
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(HttpResponse::new(status.as_u16(), headers, bytes))
    }
}
