//! cache_get tool implementation.
//!
//! Looks a URL up in the current generations, static first.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tether_client::Agent;
use tether_client::fetch::resolve;

use super::super::{BodyView, json_result};
use crate::error::ToolError;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize)]
pub struct CacheGetOutput {
    pub url: String,
    /// The stored entry; `null` on a miss.
    pub entry: Option<CachedEntryView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CachedEntryView {
    pub generation: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: BodyView,
    pub stored_at: String,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(agent: &Agent, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let url = resolve(agent.classifier().origin(), &params.url).map_err(|e| ToolError::InvalidInput(e.to_string()))?;

    let entry = agent
        .db()
        .match_any(&agent.generations().lookup_order(), url.as_str())
        .await?
        .map(|entry| CachedEntryView {
            body: BodyView::from_bytes(&entry.body),
            generation: entry.generation,
            status: entry.status,
            headers: entry.headers,
            stored_at: entry.stored_at,
        });

    json_result(&CacheGetOutput { url: url.to_string(), entry })
}
