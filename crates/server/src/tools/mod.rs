//! MCP tool implementations.
//!
//! This module contains all tools exposed by the tether server. Agent
//! tools turn their arguments into an event, dispatch it and render the
//! outcome; cache tools read the store directly.

pub mod cache;
pub mod events;
pub mod fetch;
pub mod lifecycle;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use tether_client::{Agent, Effect, LifecycleState, Outcome, ReplayReport, Strategy};
use tether_core::HttpResponse;

use crate::error::ToolError;

/// A response body as shown to the tool caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "encoding", content = "content", rename_all = "lowercase")]
pub enum BodyView {
    Utf8(String),
    Base64(String),
}

impl BodyView {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(text) => BodyView::Utf8(text.to_string()),
            Err(_) => BodyView::Base64(STANDARD.encode(bytes)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseView {
    pub status: u16,
    pub source: String,
    pub headers: Vec<(String, String)>,
    pub body: BodyView,
}

impl From<&HttpResponse> for ResponseView {
    fn from(response: &HttpResponse) -> Self {
        Self {
            status: response.status,
            source: response.source.to_string(),
            headers: response.headers.clone(),
            body: BodyView::from_bytes(&response.body),
        }
    }
}

/// Rendered outcome of one dispatched event.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeView {
    /// Lifecycle state after the event.
    pub state: LifecycleState,
    pub effects: Vec<Effect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<Strategy>,
    /// `false` when the host should perform its default fetch.
    pub intercepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<ResponseView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay: Option<ReplayReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reaped: Vec<String>,
}

impl OutcomeView {
    pub async fn render(agent: &Agent, outcome: Outcome) -> Self {
        Self {
            state: agent.state().await,
            effects: outcome.effects,
            strategy: outcome.strategy,
            intercepted: outcome.response.is_some(),
            response: outcome.response.as_ref().map(ResponseView::from),
            replay: outcome.replay,
            reaped: outcome.reaped,
        }
    }
}

/// Serialize `output` as pretty JSON text content.
pub fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output).map_err(|e| ToolError::OutputFailed(e.to_string()))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

/// Render an outcome as a tool result.
pub async fn outcome_result(agent: &Agent, outcome: Outcome) -> Result<CallToolResult, McpError> {
    json_result(&OutcomeView::render(agent, outcome).await)
}
