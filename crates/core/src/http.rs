//! Request and response model shared by the agent and its hosts.
//!
//! A `RequestDescriptor` is what the host hands the agent for one
//! intercepted request. An `HttpResponse` is what comes back, whether it
//! was fetched, read from a cache generation or synthesized.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::Error;

/// How the request was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level document load.
    Navigate,
    SameOrigin,
    NoCors,
    #[default]
    Cors,
}

impl FromStr for RequestMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "navigate" => Ok(RequestMode::Navigate),
            "same-origin" => Ok(RequestMode::SameOrigin),
            "no-cors" => Ok(RequestMode::NoCors),
            "cors" => Ok(RequestMode::Cors),
            other => Err(Error::InvalidInput(format!("unknown request mode: {other}"))),
        }
    }
}

/// The kind of content the requesting context expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    Document,
    Script,
    Worker,
    SharedWorker,
    Style,
    Image,
    Font,
    Manifest,
    #[default]
    Empty,
}

impl Destination {
    /// Destinations whose body is executed as JavaScript.
    pub fn is_script_like(&self) -> bool {
        matches!(self, Destination::Script | Destination::Worker | Destination::SharedWorker)
    }
}

impl FromStr for Destination {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "document" => Ok(Destination::Document),
            "script" => Ok(Destination::Script),
            "worker" => Ok(Destination::Worker),
            "sharedworker" => Ok(Destination::SharedWorker),
            "style" => Ok(Destination::Style),
            "image" => Ok(Destination::Image),
            "font" => Ok(Destination::Font),
            "manifest" => Ok(Destination::Manifest),
            "" | "empty" => Ok(Destination::Empty),
            other => Err(Error::InvalidInput(format!("unknown request destination: {other}"))),
        }
    }
}

/// One outgoing request as seen at interception time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub method: String,
    pub url: Url,
    pub mode: RequestMode,
    pub destination: Destination,
    pub headers: Vec<(String, String)>,
}

impl RequestDescriptor {
    /// A plain subresource GET.
    pub fn get(url: Url) -> Self {
        Self {
            method: "GET".into(),
            url,
            mode: RequestMode::default(),
            destination: Destination::default(),
            headers: Vec::new(),
        }
    }

    /// A top-level document navigation.
    pub fn navigate(url: Url) -> Self {
        Self { mode: RequestMode::Navigate, destination: Destination::Document, ..Self::get(url) }
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = method.to_ascii_uppercase();
        self
    }

    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    /// Navigations and explicit document loads.
    pub fn is_document(&self) -> bool {
        self.is_navigation() || self.destination == Destination::Document
    }

    /// The URL a cached copy of this request is stored under.
    pub fn cache_url(&self) -> String {
        let mut url = self.url.clone();
        url.set_fragment(None);
        url.to_string()
    }
}

/// Where a response handed back to the host came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Network,
    Cache,
    OfflineFallback,
    Synthesized,
    NetworkError,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache => "cache",
            ResponseSource::OfflineFallback => "offline_fallback",
            ResponseSource::Synthesized => "synthesized",
            ResponseSource::NetworkError => "network_error",
        };
        f.write_str(s)
    }
}

/// Body of a synthesized error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

/// An HTTP-response-shaped value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub source: ResponseSource,
}

impl HttpResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Into<Bytes>) -> Self {
        Self { status, headers, body: body.into(), source: ResponseSource::Network }
    }

    pub fn with_source(mut self, source: ResponseSource) -> Self {
        self.source = source;
        self
    }

    /// Synthesized JSON error: `{"error": code, "message": message}`.
    pub fn json_error(status: u16, code: &str, message: &str) -> Self {
        let body = ErrorBody { error: code.to_string(), message: message.to_string() };
        let bytes = serde_json::to_vec(&body).unwrap_or_default();
        Self {
            status,
            headers: vec![("content-type".into(), "application/json".into())],
            body: bytes.into(),
            source: ResponseSource::Synthesized,
        }
    }

    /// The explicit form of a failed fetch: status 0, no body.
    pub fn network_error() -> Self {
        Self { status: 0, headers: Vec::new(), body: Bytes::new(), source: ResponseSource::NetworkError }
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode a synthesized error body.
    pub fn error_body(&self) -> Option<ErrorBody> {
        serde_json::from_slice(&self.body).ok()
    }
}
