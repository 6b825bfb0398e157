//! Shared types for the tool registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session-wide key/value memory handed to every tool call.
pub type SharedMemory = serde_json::Map<String, serde_json::Value>;

/// Coarse grouping of what a tool does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    Search,
    Analysis,
    Generation,
    Other,
}

/// Static description of a tool, as registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique registry key (e.g. `"academic_search"`).
    pub id: String,
    pub description: String,
    pub category: ToolCategory,
    /// JSON Schema for the payload. Only `required` is enforced locally.
    #[serde(default)]
    pub params_schema: serde_json::Value,
}

impl ToolDefinition {
    pub fn new(id: impl Into<String>, description: impl Into<String>, category: ToolCategory) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            category,
            params_schema: serde_json::Value::Null,
        }
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.params_schema = schema;
        self
    }
}

/// Usage metadata accumulated per tool.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ToolUsage {
    /// Completed `run` calls, successful or not. Retries are not counted twice.
    pub invocations: u64,
    pub failures: u64,
    /// Retry attempts made beyond the first try.
    pub retries: u64,
    pub total_latency_ms: f64,
    pub last_used: Option<DateTime<Utc>>,
}

impl ToolUsage {
    pub fn average_latency_ms(&self) -> f64 {
        if self.invocations == 0 {
            0.0
        } else {
            self.total_latency_ms / self.invocations as f64
        }
    }
}

/// Usage for one tool, as reported in system stats.
#[derive(Debug, Clone, Serialize)]
pub struct ToolUsageSnapshot {
    pub tool_id: String,
    pub category: ToolCategory,
    pub usage: ToolUsage,
}
