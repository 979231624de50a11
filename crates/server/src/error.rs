//! Structured errors for the tether MCP server.
//!
//! Agent and cache failures arrive as `tether_core::Error`; this type
//! covers what only goes wrong at the tool boundary.

use rmcp::model::{ErrorCode, ErrorData as McpError};

/// Errors raised while decoding tool arguments or encoding tool output.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Tool arguments could not be turned into an agent event.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Tool output could not be serialized.
    #[error("OUTPUT_FAILED: {0}")]
    OutputFailed(String),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let (code, message) = match &err {
            ToolError::InvalidInput(msg) => (-32602, msg.clone()),
            ToolError::OutputFailed(msg) => (-32603, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
