//! Push, notification-click, message and sync tool implementations.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tether_client::{Agent, ControlMessage, Event};

use super::outcome_result;

/// Input parameters for sw_push tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwPushParams {
    /// Plain-text push payload, used as the notification body.
    #[serde(default)]
    pub payload: Option<String>,
}

/// Input parameters for sw_notification_click tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwNotificationClickParams {
    /// Clicked action ("open" or "dismiss"); omitted for a body click.
    #[serde(default)]
    pub action: Option<String>,
}

/// Input parameters for sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// Control message, e.g. `{"type": "GET_VERSION"}`.
    pub message: serde_json::Value,
}

/// Input parameters for sw_sync tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwSyncParams {
    /// Sync tag (default: the configured replay tag).
    #[serde(default)]
    pub tag: Option<String>,
}

pub async fn push_impl(agent: &Agent, params: SwPushParams) -> Result<CallToolResult, McpError> {
    let outcome = agent.dispatch(Event::Push(params.payload)).await?;
    outcome_result(agent, outcome).await
}

pub async fn notification_click_impl(
    agent: &Agent, params: SwNotificationClickParams,
) -> Result<CallToolResult, McpError> {
    let outcome = agent.dispatch(Event::NotificationClick { action: params.action }).await?;
    outcome_result(agent, outcome).await
}

pub async fn message_impl(agent: &Agent, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    let message = ControlMessage::from_value(params.message)?;
    let outcome = agent.dispatch(Event::Message(message)).await?;
    outcome_result(agent, outcome).await
}

/// Replay queued mutations. Without a tag, the configured replay tag is used.
pub async fn sync_impl(agent: &Agent, sync_tag: &str, params: SwSyncParams) -> Result<CallToolResult, McpError> {
    let tag = params.tag.unwrap_or_else(|| sync_tag.to_string());
    let outcome = agent.dispatch(Event::Sync { tag }).await?;
    outcome_result(agent, outcome).await
}
