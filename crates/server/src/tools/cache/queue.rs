//! queue_list tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::Serialize;
use tether_client::Agent;

use super::super::{BodyView, json_result};

/// Output from the queue_list tool.
#[derive(Debug, Clone, Serialize)]
pub struct QueueListOutput {
    pub mutations: Vec<MutationView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MutationView {
    pub id: String,
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<BodyView>,
    pub created_at: String,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub next_attempt_at: Option<i64>,
}

/// Implementation of the queue_list tool.
pub async fn queue_impl(agent: &Agent) -> Result<CallToolResult, McpError> {
    let mutations = agent
        .db()
        .pending_mutations()
        .await?
        .into_iter()
        .map(|record| MutationView {
            body: record.body.as_deref().map(BodyView::from_bytes),
            id: record.id,
            method: record.method,
            url: record.url,
            headers: record.headers,
            created_at: record.created_at,
            attempts: record.attempts,
            last_error: record.last_error,
            next_attempt_at: record.next_attempt_at,
        })
        .collect();

    json_result(&QueueListOutput { mutations })
}
