//! Request classification.
//!
//! Maps a request descriptor to exactly one caching strategy. Pure and
//! deterministic: the same descriptor and table always give the same answer.

use serde::Serialize;
use tether_core::{AppConfig, RequestDescriptor};
use url::Url;

use crate::fetch::same_origin;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "avif", "svg", "ico"];
const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs"];

/// The caching strategy selected for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Not intercepted; the host performs its default fetch.
    Bypass,
    CacheFirst,
    NetworkFirst,
    NetworkFirstDocument,
    AssetMimeGuard,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Strategy::Bypass => "bypass",
            Strategy::CacheFirst => "cache-first",
            Strategy::NetworkFirst => "network-first",
            Strategy::NetworkFirstDocument => "network-first-document",
            Strategy::AssetMimeGuard => "network-first-asset-mime-guard",
        };
        f.write_str(s)
    }
}

/// Strategy table for one deployed build.
#[derive(Debug, Clone)]
pub struct Classifier {
    origin: Url,
    bypass_prefixes: Vec<String>,
    asset_prefixes: Vec<String>,
    media_prefixes: Vec<String>,
    same_origin_only: bool,
    mime_guard: bool,
}

impl Classifier {
    pub fn new(origin: Url, config: &AppConfig) -> Self {
        Self {
            origin,
            bypass_prefixes: config.bypass_prefixes.clone(),
            asset_prefixes: config.asset_prefixes.clone(),
            media_prefixes: config.media_prefixes.clone(),
            same_origin_only: config.same_origin_only,
            mime_guard: config.mime_guard,
        }
    }

    /// The origin requests are compared against.
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Pick the strategy for `req`. First matching rule wins.
    pub fn classify(&self, req: &RequestDescriptor) -> Strategy {
        let path = req.url.path();

        if !req.method.eq_ignore_ascii_case("GET") {
            return Strategy::Bypass;
        }

        if has_prefix(path, &self.bypass_prefixes)
            || !matches!(req.url.scheme(), "http" | "https")
            || (self.same_origin_only && !same_origin(&req.url, &self.origin))
        {
            return Strategy::Bypass;
        }

        if req.is_document() {
            return Strategy::NetworkFirstDocument;
        }

        if req.destination.is_script_like() || has_prefix(path, &self.asset_prefixes) {
            return if self.mime_guard { Strategy::AssetMimeGuard } else { Strategy::NetworkFirst };
        }

        if req.destination == tether_core::Destination::Image
            || has_prefix(path, &self.media_prefixes)
            || has_extension(path, IMAGE_EXTENSIONS)
        {
            return Strategy::CacheFirst;
        }

        Strategy::NetworkFirst
    }
}

/// Whether the request will execute its response body as JavaScript.
pub fn expects_script(req: &RequestDescriptor) -> bool {
    req.destination.is_script_like() || has_extension(req.url.path(), SCRIPT_EXTENSIONS)
}

fn has_prefix(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|p| path.starts_with(p.as_str()))
}

fn has_extension(path: &str, extensions: &[&str]) -> bool {
    let file = path.rsplit('/').next().unwrap_or_default();
    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)),
        _ => false,
    }
}
