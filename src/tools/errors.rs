//! Tool error types.

use thiserror::Error;

/// Errors that can occur while validating or running a tool.
#[derive(Debug, Clone, Error)]
pub enum ToolError {
    /// The tool's backing capability failed or could not be reached.
    ///
    /// `transient` is set by the handler when a retry may succeed.
    #[error("tool '{tool}' unavailable: {reason}")]
    Unavailable {
        tool: String,
        reason: String,
        transient: bool,
    },

    /// No tool is registered under this id.
    #[error("unknown tool: '{tool}'")]
    UnknownTool { tool: String },

    /// The payload does not satisfy the tool's parameter schema.
    #[error("invalid payload for '{tool}': {reason}")]
    InvalidPayload { tool: String, reason: String },

    /// A tool call did not finish before its deadline.
    #[error("tool call '{tool}' timed out after {timeout_ms}ms")]
    Timeout { tool: String, timeout_ms: u64 },
}

impl ToolError {
    /// Shorthand for a permanent failure reported by a handler.
    pub fn unavailable(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolError::Unavailable {
            tool: tool.into(),
            reason: reason.into(),
            transient: false,
        }
    }

    /// Shorthand for a failure the handler expects to clear up on retry.
    pub fn transient(tool: impl Into<String>, reason: impl Into<String>) -> Self {
        ToolError::Unavailable {
            tool: tool.into(),
            reason: reason.into(),
            transient: true,
        }
    }

    /// Whether the registry should retry the call.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ToolError::Unavailable {
                transient: true,
                ..
            } | ToolError::Timeout { .. }
        )
    }

    /// The tool id the error refers to.
    pub fn tool(&self) -> &str {
        match self {
            ToolError::Unavailable { tool, .. }
            | ToolError::UnknownTool { tool }
            | ToolError::InvalidPayload { tool, .. }
            | ToolError::Timeout { tool, .. } => tool,
        }
    }
}
