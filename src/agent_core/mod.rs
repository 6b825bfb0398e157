//! Agent Core — multi-agent orchestration for the tutoring backend.
//!
//! Submodules:
//! - `types`: Sessions, agents, intents, plans and executions
//! - `errors`: Orchestrator error type
//! - `events`: Broadcast lifecycle notifications
//! - `intent`: Keyword intent classifier
//! - `agents`: Agent template registry and the stock templates
//! - `plan_templates`: Intent → step list templates
//! - `session`: Per-session context store (agents, memory, history, limits)
//! - `actions`: One handler per step action
//! - `executor`: Plan execution state machine
//! - `orchestrator`: The façade callers use

pub mod actions;
pub mod agents;
pub mod errors;
pub mod events;
pub mod executor;
pub mod intent;
pub mod orchestrator;
pub mod plan_templates;
pub mod session;
pub mod types;

// Re-exports for convenience
pub use agents::AgentRegistry;
pub use errors::{CapacityResource, ExecutionStage, OrchestratorError};
pub use events::{CoreEvent, EventBus};
pub use executor::{ExecutionSettings, PlanExecutor, CLOSING_REMARK};
pub use orchestrator::{Orchestrator, OrchestratorParts};
pub use plan_templates::PlanBuilder;
pub use session::SessionStore;
pub use types::{
    AgentKind, AgentTemplate, Execution, ExecutionStatus, Intent, IntentType, Plan,
    ProcessResponse, SessionConfig, SessionInfo, SessionOverrides, Step, StepAction,
    SystemStats,
};
