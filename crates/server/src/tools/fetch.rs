//! sw_fetch tool implementation.
//!
//! Feeds one request through the agent as a fetch event and reports which
//! strategy handled it and what would be handed back to the page.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tether_client::fetch::resolve;
use tether_client::{Agent, Event};
use tether_core::{Destination, RequestDescriptor, RequestMode};

use super::outcome_result;
use crate::error::ToolError;

/// Input parameters for sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request mode: "navigate", "same-origin", "no-cors" or "cors" (default).
    #[serde(default)]
    pub mode: Option<String>,

    /// Request destination: "document", "script", "worker", "image", ...
    /// Defaults to "document" for navigations and empty otherwise.
    #[serde(default)]
    pub destination: Option<String>,

    /// Extra request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_method() -> String {
    "GET".into()
}

impl SwFetchParams {
    fn into_request(self, agent: &Agent) -> Result<RequestDescriptor, McpError> {
        let url = resolve(agent.classifier().origin(), &self.url).map_err(|e| ToolError::InvalidInput(e.to_string()))?;

        let mode = match self.mode.as_deref() {
            Some(mode) => mode.parse::<RequestMode>()?,
            None => RequestMode::default(),
        };
        let destination = match self.destination.as_deref() {
            Some(dest) => dest.parse::<Destination>()?,
            None if mode == RequestMode::Navigate => Destination::Document,
            None => Destination::default(),
        };

        let mut req = RequestDescriptor::get(url)
            .with_method(&self.method)
            .with_mode(mode)
            .with_destination(destination);
        for (name, value) in &self.headers {
            req = req.with_header(name, value);
        }
        Ok(req)
    }
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(agent: &Agent, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(ToolError::InvalidInput("url cannot be empty".into()).into());
    }

    let req = params.into_request(agent)?;
    let outcome = agent.dispatch(Event::Fetch(req)).await?;
    outcome_result(agent, outcome).await
}

#[cfg(test)]
mod tests {
    use super::super::testing::{offline_agent, output};
    use super::*;

    fn params(url: &str) -> SwFetchParams {
        SwFetchParams { url: url.into(), method: default_method(), mode: None, destination: None, headers: BTreeMap::new() }
    }

    #[tokio::test]
    async fn test_fetch_empty_url() {
        let (agent, _) = offline_agent().await;
        let err = fetch_impl(&agent, params("  ")).await.unwrap_err();
        assert_eq!(err.code.0, -32602);
    }

    #[tokio::test]
    async fn test_fetch_bad_mode() {
        let (agent, _) = offline_agent().await;
        let err = fetch_impl(&agent, SwFetchParams { mode: Some("teleport".into()), ..params("/") })
            .await
            .unwrap_err();
        assert_eq!(err.code.0, -32602);
    }

    #[tokio::test]
    async fn test_navigation_defaults_to_document() {
        let (agent, _) = offline_agent().await;
        let req = SwFetchParams { mode: Some("navigate".into()), ..params("/dashboard") }
            .into_request(&agent)
            .unwrap();
        assert_eq!(req.destination, Destination::Document);
        assert_eq!(req.url.as_str(), "http://127.0.0.1:9/dashboard");
    }

    #[tokio::test]
    async fn test_fetch_before_activation_not_intercepted() {
        let (agent, _) = offline_agent().await;
        let result = fetch_impl(&agent, params("/")).await.unwrap();
        let json = output(&result);
        assert_eq!(json["state"], "parsed");
        assert_eq!(json["intercepted"], false);
        assert!(json.get("response").is_none());
    }
}
