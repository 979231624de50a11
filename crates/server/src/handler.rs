//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use crate::tools::{
    cache::{CacheGetParams, generations_impl, get_impl, queue_impl},
    events::{
        SwMessageParams, SwNotificationClickParams, SwPushParams, SwSyncParams, message_impl,
        notification_click_impl, push_impl, sync_impl,
    },
    fetch::{SwFetchParams, fetch_impl},
    lifecycle::{activate_impl, install_impl},
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use tether_client::Agent;

/// The main MCP server handler for tether.
#[derive(Clone)]
pub struct TetherServer {
    agent: Agent,
    sync_tag: String,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl TetherServer {
    /// Create a new server handler around an agent.
    pub fn new(agent: Agent, sync_tag: impl Into<String>) -> Self {
        Self { agent, sync_tag: sync_tag.into(), tool_router: Self::tool_router() }
    }

    #[tool(description = "Install the agent: precache the application shell into the static cache generation.")]
    async fn sw_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.agent).await
    }

    #[tool(description = "Activate the agent: delete stale cache generations and start intercepting fetches.")]
    async fn sw_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.agent).await
    }

    /// Route one request through the agent.
    ///
    /// Returns the chosen strategy and the response the page would receive.
    /// Requests are not intercepted until the agent is activated.
    #[tool(
        description = "Fetch a URL through the caching agent. Returns the strategy used and the response (status, source, headers, body)."
    )]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.agent, params.0).await
    }

    #[tool(description = "Deliver a push message. Returns the notification to display.")]
    async fn sw_push(&self, params: Parameters<SwPushParams>) -> Result<CallToolResult, McpError> {
        push_impl(&self.agent, params.0).await
    }

    #[tool(description = "Deliver a notification click, optionally on an action (\"open\" or \"dismiss\").")]
    async fn sw_notification_click(
        &self, params: Parameters<SwNotificationClickParams>,
    ) -> Result<CallToolResult, McpError> {
        notification_click_impl(&self.agent, params.0).await
    }

    #[tool(description = "Send a control message: SKIP_WAITING, GET_VERSION or QUEUE_MUTATION.")]
    async fn sw_message(&self, params: Parameters<SwMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.agent, params.0).await
    }

    #[tool(description = "Signal reconnection: replay queued mutations in order. Returns a replay report.")]
    async fn sw_sync(&self, params: Parameters<SwSyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.agent, &self.sync_tag, params.0).await
    }

    #[tool(description = "List cache generations at rest and mark the current static/dynamic pair.")]
    async fn cache_generations(&self) -> Result<CallToolResult, McpError> {
        generations_impl(&self.agent).await
    }

    #[tool(description = "Look a URL up in the current cache generations without touching the network.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.agent, params.0).await
    }

    #[tool(description = "List queued mutations awaiting replay, oldest first.")]
    async fn queue_list(&self) -> Result<CallToolResult, McpError> {
        queue_impl(&self.agent).await
    }
}

impl ServerHandler for TetherServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "tether-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
