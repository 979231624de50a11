//! sw_install and sw_activate tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use tether_client::{Agent, Event};

use super::outcome_result;

/// Precache the application shell into the static generation.
pub async fn install_impl(agent: &Agent) -> Result<CallToolResult, McpError> {
    let outcome = agent.dispatch(Event::Install).await?;
    outcome_result(agent, outcome).await
}

/// Reap stale generations and start intercepting fetches.
pub async fn activate_impl(agent: &Agent) -> Result<CallToolResult, McpError> {
    let outcome = agent.dispatch(Event::Activate).await?;
    outcome_result(agent, outcome).await
}
