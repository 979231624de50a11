//! Strategy executors.
//!
//! The only code that reads or writes cached entries per request. The cache
//! is advisory: store errors are logged and read as a miss, and they never
//! replace a network response.

use tether_core::{HttpResponse, RequestDescriptor, ResponseSource};

use super::classify::{Strategy, expects_script};
use super::Agent;
use crate::fetch::NetworkRequest;

const HTML_ESSENCES: &[&str] = &["text/html", "application/xhtml+xml"];

/// Whether a Content-Type header names an HTML document.
pub(crate) fn is_html(content_type: &str) -> bool {
    let essence = match content_type.parse::<mime::Mime>() {
        Ok(parsed) => parsed.essence_str().to_ascii_lowercase(),
        Err(_) => content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase(),
    };
    HTML_ESSENCES.contains(&essence.as_str())
}

impl Agent {
    pub(crate) async fn execute(&self, strategy: Strategy, req: &RequestDescriptor) -> HttpResponse {
        match strategy {
            Strategy::CacheFirst => self.cache_first(req).await,
            Strategy::NetworkFirst => self.network_first(req).await,
            Strategy::NetworkFirstDocument => self.network_first_document(req).await,
            Strategy::AssetMimeGuard => self.asset_mime_guard(req).await,
            // Bypassed requests are not intercepted; there is nothing to serve.
            Strategy::Bypass => HttpResponse::network_error(),
        }
    }

    /// Serve from cache without revalidation; fetch and store on a miss.
    async fn cache_first(&self, req: &RequestDescriptor) -> HttpResponse {
        let url = req.cache_url();
        if let Some(cached) = self.lookup(&url).await {
            return cached;
        }

        match self.inner.network.fetch(&NetworkRequest::from(req)).await {
            Ok(response) => {
                self.store_dynamic(&url, &response).await;
                response
            }
            Err(err) => {
                tracing::debug!(%url, error = %err, "cache-first miss with network down");
                if req.is_document() {
                    self.offline_response().await
                } else {
                    HttpResponse::network_error()
                }
            }
        }
    }

    /// Fetch and refresh the dynamic generation; fall back to any cached copy.
    async fn network_first(&self, req: &RequestDescriptor) -> HttpResponse {
        let url = req.cache_url();
        match self.inner.network.fetch(&NetworkRequest::from(req)).await {
            Ok(response) => {
                self.store_dynamic(&url, &response).await;
                response
            }
            Err(err) => {
                tracing::debug!(%url, error = %err, "network-first falling back to cache");
                match self.lookup(&url).await {
                    Some(cached) => cached,
                    None => HttpResponse::json_error(
                        503,
                        "NETWORK_UNAVAILABLE",
                        "The network is unavailable and no cached copy exists",
                    ),
                }
            }
        }
    }

    /// Fetch a page directly. Pages are never written to the dynamic generation.
    async fn network_first_document(&self, req: &RequestDescriptor) -> HttpResponse {
        match self.inner.network.fetch(&NetworkRequest::from(req)).await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(url = %req.url, error = %err, "navigation failed; serving offline page");
                self.offline_response().await
            }
        }
    }

    /// Network-first, refusing to cache an HTML body for a script request.
    async fn asset_mime_guard(&self, req: &RequestDescriptor) -> HttpResponse {
        if !expects_script(req) {
            return self.network_first(req).await;
        }

        let url = req.cache_url();
        match self.inner.network.fetch(&NetworkRequest::from(req)).await {
            Ok(response) if response.content_type().is_some_and(is_html) => {
                tracing::warn!(
                    %url,
                    content_type = response.content_type().unwrap_or_default(),
                    "script request answered with HTML; not caching"
                );
                match self.lookup(&url).await {
                    Some(cached) => cached,
                    None => HttpResponse::json_error(
                        502,
                        "MIME_MISMATCH",
                        "Script request returned an HTML document and no cached copy exists",
                    ),
                }
            }
            Ok(response) => {
                self.store_dynamic(&url, &response).await;
                response
            }
            Err(err) => {
                tracing::debug!(%url, error = %err, "asset fetch failed; falling back to cache");
                match self.lookup(&url).await {
                    Some(cached) => cached,
                    None => HttpResponse::json_error(
                        503,
                        "NETWORK_UNAVAILABLE",
                        "The network is unavailable and no cached copy exists",
                    ),
                }
            }
        }
    }

    /// Look `url` up in the current generations, static first.
    async fn lookup(&self, url: &str) -> Option<HttpResponse> {
        match self.inner.db.match_any(&self.inner.generations.lookup_order(), url).await {
            Ok(hit) => hit.map(|entry| entry.into_response()),
            Err(err) => {
                tracing::warn!(%url, error = %err, "cache read failed; treating as miss");
                None
            }
        }
    }

    /// Store a copy of a successful response in the dynamic generation.
    async fn store_dynamic(&self, url: &str, response: &HttpResponse) {
        if !response.is_success() {
            return;
        }

        let generation = self.inner.generations.dynamic_name();
        match self.inner.db.put_entry(generation, url, response).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(%url, generation, "generation gone; write discarded"),
            Err(err) => tracing::warn!(%url, error = %err, "cache write failed"),
        }
    }

    /// The precached offline page, or a synthesized 503 when it is missing.
    async fn offline_response(&self) -> HttpResponse {
        let url = self.inner.offline_page.as_str();
        match self.inner.db.match_entry(self.inner.generations.static_name(), url).await {
            Ok(Some(entry)) => entry.into_response().with_source(ResponseSource::OfflineFallback),
            Ok(None) => HttpResponse::json_error(503, "OFFLINE", "You are offline and this page is not cached"),
            Err(err) => {
                tracing::warn!(error = %err, "offline page lookup failed");
                HttpResponse::json_error(503, "OFFLINE", "You are offline and this page is not cached")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{agent_with, shell_network};
    use super::*;
    use url::Url;

    #[test]
    fn test_is_html() {
        assert!(is_html("text/html"));
        assert!(is_html("text/html; charset=utf-8"));
        assert!(is_html("TEXT/HTML"));
        assert!(is_html("application/xhtml+xml"));
        assert!(!is_html("application/javascript"));
        assert!(!is_html("text/javascript; charset=utf-8"));
        assert!(!is_html(""));
    }

    #[tokio::test]
    async fn test_bypass_executor_never_fetches() {
        let network = shell_network();
        network.route("https://app.test/api/posts", HttpResponse::new(200, Vec::new(), "[]"));
        let (agent, _) = agent_with(network.clone()).await;

        let req = RequestDescriptor::get(Url::parse("https://app.test/api/posts").unwrap());
        let response = agent.execute(Strategy::Bypass, &req).await;
        assert_eq!(response.source, ResponseSource::NetworkError);
        assert!(network.calls().is_empty());
    }
}
