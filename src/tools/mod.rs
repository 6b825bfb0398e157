//! Tool Registry — the tool-execution capability consumed by plan steps.
//!
//! Tool implementations (search, analysis, generation) live outside the
//! core. They are plugged in as `ToolHandler`s under a string id, and the
//! registry adds payload validation, retries and usage tracking on top.

pub mod errors;
pub mod registry;
pub mod types;

// Re-exports for convenience
pub use errors::ToolError;
pub use registry::{RetryPolicy, ToolHandler, ToolRegistry};
pub use types::{SharedMemory, ToolCategory, ToolDefinition, ToolUsage, ToolUsageSnapshot};
