//! cache_generations tool implementation.
//!
//! Lists every generation at rest and marks the current pair.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::Serialize;
use tether_client::Agent;
use tether_core::GenerationInfo;

use super::super::json_result;

/// Output from the cache_generations tool.
#[derive(Debug, Clone, Serialize)]
pub struct CacheGenerationsOutput {
    pub current_static: String,
    pub current_dynamic: String,
    pub generations: Vec<GenerationEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationEntry {
    #[serde(flatten)]
    pub info: GenerationInfo,
    pub current: bool,
}

/// Implementation of the cache_generations tool.
pub async fn generations_impl(agent: &Agent) -> Result<CallToolResult, McpError> {
    let names = agent.generations();
    let generations = agent
        .db()
        .list_generations()
        .await?
        .into_iter()
        .map(|info| GenerationEntry { current: names.is_current(&info.name), info })
        .collect();

    json_result(&CacheGenerationsOutput {
        current_static: names.static_name().to_string(),
        current_dynamic: names.dynamic_name().to_string(),
        generations,
    })
}
