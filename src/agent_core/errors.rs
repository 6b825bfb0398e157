//! Agent Core error types.

use serde::Serialize;
use thiserror::Error;

use crate::routing::RoutingError;
use crate::tools::ToolError;

use super::types::{Execution, StepAction};

/// Which per-session limit was hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityResource {
    Agents,
    Tools,
}

impl std::fmt::Display for CapacityResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapacityResource::Agents => f.write_str("agents"),
            CapacityResource::Tools => f.write_str("tools"),
        }
    }
}

/// Where a plan execution stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStage {
    EnsureAgents,
    Step,
    Synthesize,
}

impl std::fmt::Display for ExecutionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStage::EnsureAgents => f.write_str("ensure_agents"),
            ExecutionStage::Step => f.write_str("step"),
            ExecutionStage::Synthesize => f.write_str("synthesize"),
        }
    }
}

/// Errors that can occur during session, agent and plan operations.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("session not found: '{session_id}'")]
    SessionNotFound { session_id: String },

    /// The session was closed or has timed out.
    #[error("session '{session_id}' is no longer active")]
    SessionInactive { session_id: String },

    #[error("agent template not found: '{template_id}'")]
    AgentTemplateNotFound { template_id: String },

    /// A step names a template with no instance in the session.
    #[error("no '{template_id}' agent in session '{session_id}'")]
    AgentMissing {
        session_id: String,
        template_id: String,
    },

    #[error("session '{session_id}' reached its {resource} limit of {limit}")]
    CapacityExceeded {
        session_id: String,
        resource: CapacityResource,
        limit: usize,
    },

    /// A step asked for a tool outside its agent's allowed set.
    #[error("agent '{template_id}' is not permitted to use tool '{tool}'")]
    ToolNotPermitted { template_id: String, tool: String },

    #[error("step {step} ({action}) timed out after {timeout_ms}ms")]
    StepTimeout {
        step: usize,
        action: StepAction,
        timeout_ms: u64,
    },

    #[error("plan '{plan_id}' has no steps")]
    EmptyPlan { plan_id: String },

    /// Model selection or invocation failed.
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// A tool call failed.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// A plan stopped part-way; `execution` holds the steps attempted so far.
    #[error("plan execution failed during {stage}{}: {source}", step_label(.step, .action))]
    PlanExecutionFailed {
        stage: ExecutionStage,
        step: Option<usize>,
        action: Option<StepAction>,
        source: Box<OrchestratorError>,
        execution: Box<Execution>,
    },
}

fn step_label(step: &Option<usize>, action: &Option<StepAction>) -> String {
    match (step, action) {
        (Some(i), Some(a)) => format!(" at step {i} ({a})"),
        (Some(i), None) => format!(" at step {i}"),
        _ => String::new(),
    }
}

impl OrchestratorError {
    /// The innermost error, unwrapping `PlanExecutionFailed`.
    pub fn root_cause(&self) -> &OrchestratorError {
        match self {
            OrchestratorError::PlanExecutionFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// The partial execution record, if the error came from a plan run.
    pub fn partial_execution(&self) -> Option<&Execution> {
        match self {
            OrchestratorError::PlanExecutionFailed { execution, .. } => Some(&**execution),
            _ => None,
        }
    }
}
