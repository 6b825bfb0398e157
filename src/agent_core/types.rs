//! Shared types for the agent core.
//!
//! Records returned across the public API (`SessionInfo`, `Execution`,
//! `ProcessResponse`, `SystemStats`) serialize in camelCase.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::routing::types::{Complexity, ModelSnapshot};
use crate::tools::types::{SharedMemory, ToolUsageSnapshot};

// ─── Session Configuration ──────────────────────────────────────────────────

/// Per-session limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub max_agents: usize,
    /// Distinct tools a session may use over its lifetime.
    pub max_tools: usize,
    pub inactivity_timeout_secs: u64,
    /// Message history cap; oldest entries are evicted first.
    pub history_limit: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_agents: 5,
            max_tools: 10,
            inactivity_timeout_secs: 300,
            history_limit: 100,
        }
    }
}

/// Caller overrides applied on top of the store's defaults at session creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOverrides {
    #[serde(default)]
    pub max_agents: Option<usize>,
    #[serde(default)]
    pub max_tools: Option<usize>,
    #[serde(default)]
    pub inactivity_timeout_secs: Option<u64>,
}

impl SessionConfig {
    pub fn merged(&self, overrides: &SessionOverrides) -> Self {
        Self {
            max_agents: overrides.max_agents.unwrap_or(self.max_agents),
            max_tools: overrides.max_tools.unwrap_or(self.max_tools),
            inactivity_timeout_secs: overrides
                .inactivity_timeout_secs
                .unwrap_or(self.inactivity_timeout_secs),
            history_limit: self.history_limit,
        }
    }
}

// ─── Agents ─────────────────────────────────────────────────────────────────

/// The closed set of agent behaviours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Research,
    Analysis,
    Creative,
    ProblemSolver,
}

impl AgentKind {
    /// Request type used when this agent asks the router for a model.
    pub fn request_type(&self) -> &'static str {
        match self {
            AgentKind::Research => "academic",
            AgentKind::Analysis => "analysis",
            AgentKind::Creative => "creative",
            AgentKind::ProblemSolver => "problem_solving",
        }
    }
}

/// Static agent definition. Immutable once registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTemplate {
    pub id: String,
    pub kind: AgentKind,
    pub capabilities: Vec<String>,
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub default_config: SharedMemory,
}

impl AgentTemplate {
    pub fn allows_tool(&self, tool_id: &str) -> bool {
        self.allowed_tools.iter().any(|t| t == tool_id)
    }
}

/// One entry in an agent instance's execution history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentAction {
    pub execution_id: String,
    pub step_index: usize,
    pub action: StepAction,
    pub tools: Vec<String>,
    pub result: String,
    pub at: DateTime<Utc>,
}

/// A template instantiated inside one session.
///
/// Holds its own copy of the template, so re-registering the template id
/// does not affect instances that already exist.
#[derive(Debug, Clone)]
pub struct AgentInstance {
    pub id: String,
    pub session_id: String,
    pub template: Arc<AgentTemplate>,
    /// Template defaults overlaid with spawn-time config.
    pub config: SharedMemory,
    pub history: Vec<AgentAction>,
    pub created_at: DateTime<Utc>,
}

// ─── Session ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One message in a session's bounded history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
}

/// Session-scoped mutable state. Dropped when the session closes.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub shared_memory: SharedMemory,
    /// Keyed by agent instance id.
    pub agent_memory: HashMap<String, SharedMemory>,
    /// Ids of executions currently running in this session, innermost last.
    pub execution_stack: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Requested,
    Expired,
}

/// Per-session state owned by the session store.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub config: SessionConfig,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub closed: Option<CloseReason>,
    /// Spawned instance ids in spawn order.
    pub agent_order: Vec<String>,
    pub agents: HashMap<String, AgentInstance>,
    /// `None` once the session is closed.
    pub context: Option<Context>,
    pub history: VecDeque<HistoryEntry>,
    pub tools_used: HashSet<String>,
}

impl Session {
    pub fn is_active(&self) -> bool {
        self.closed.is_none()
    }

    /// Idle for at least the inactivity timeout as of `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        let idle = now.signed_duration_since(self.last_activity);
        idle.num_milliseconds() >= (self.config.inactivity_timeout_secs as i64) * 1000
    }

    /// First instance of a template, by spawn order.
    pub fn instance_for_template(&self, template_id: &str) -> Option<&AgentInstance> {
        self.agent_order
            .iter()
            .filter_map(|id| self.agents.get(id))
            .find(|a| a.template.id == template_id)
    }

    pub fn push_history(&mut self, entry: HistoryEntry) {
        self.history.push_back(entry);
        while self.history.len() > self.config.history_limit {
            self.history.pop_front();
        }
    }
}

/// Read-only view of a session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: String,
    pub user_id: String,
    pub active: bool,
    pub config: SessionConfig,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Instance ids in spawn order.
    pub active_agents: Vec<String>,
    pub history_len: usize,
    pub shared_memory_keys: Vec<String>,
    pub tools_used: Vec<String>,
    pub running_executions: usize,
}

// ─── Intent ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    InformationRetrieval,
    Analysis,
    ContentCreation,
    ProblemSolving,
    Educational,
    Unknown,
}

impl IntentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentType::InformationRetrieval => "information_retrieval",
            IntentType::Analysis => "analysis",
            IntentType::ContentCreation => "content_creation",
            IntentType::ProblemSolving => "problem_solving",
            IntentType::Educational => "educational",
            IntentType::Unknown => "unknown",
        }
    }
}

/// Classifier output for one message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    #[serde(rename = "type")]
    pub intent_type: IntentType,
    pub confidence: f64,
    pub required_capabilities: Vec<String>,
    pub complexity: Complexity,
}

// ─── Plan ───────────────────────────────────────────────────────────────────

/// The closed set of things a step can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    Research,
    Analyze,
    Synthesize,
    Create,
    Solve,
    Explain,
    Verify,
}

impl StepAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepAction::Research => "research",
            StepAction::Analyze => "analyze",
            StepAction::Synthesize => "synthesize",
            StepAction::Create => "create",
            StepAction::Solve => "solve",
            StepAction::Explain => "explain",
            StepAction::Verify => "verify",
        }
    }

    /// Whether the action produces text through a routed model.
    pub fn is_generative(&self) -> bool {
        matches!(
            self,
            StepAction::Create | StepAction::Explain | StepAction::Solve | StepAction::Synthesize
        )
    }
}

impl std::fmt::Display for StepAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub action: StepAction,
    /// Agent template id that performs the step.
    pub agent: String,
    pub tools: Vec<String>,
}

/// Ordered decomposition of one message. Built fresh per message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: String,
    pub session_id: String,
    pub intent: Intent,
    pub steps: Vec<Step>,
    /// Distinct template ids in first-use order.
    pub required_agents: Vec<String>,
    pub estimated_duration_secs: u64,
}

// ─── Execution ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Created,
    Executing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Executing,
    Completed,
    Failed,
}

/// Runtime record of one attempted step.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub index: usize,
    pub action: StepAction,
    pub agent_template: String,
    pub agent_instance: Option<String>,
    pub tools: Vec<String>,
    pub status: StepStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub error: Option<String>,
    /// Model that generated the result, for generative actions.
    pub model: Option<String>,
}

/// Runtime record of a plan's run.
///
/// `steps` holds only the steps that were attempted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Execution {
    pub id: String,
    pub session_id: String,
    pub plan_id: String,
    pub required_agents: Vec<String>,
    pub status: ExecutionStatus,
    pub steps: Vec<StepRecord>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Execution {
    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub intent: Intent,
    pub plan_id: String,
    pub plan_steps: usize,
    pub estimated_duration_secs: u64,
    /// Agent instance ids that ran at least one step.
    pub agents_used: Vec<String>,
    pub models_used: Vec<String>,
    pub duration_ms: u64,
}

/// Result of `process_message`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    pub response: String,
    pub execution: Execution,
    pub metadata: ResponseMetadata,
}

// ─── System Stats ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub live_agents: usize,
    pub registered_templates: usize,
    pub registered_tools: usize,
    pub models: Vec<ModelSnapshot>,
    pub tools: Vec<ToolUsageSnapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_merge_onto_defaults() {
        let merged = SessionConfig::default().merged(&SessionOverrides {
            max_agents: Some(2),
            ..SessionOverrides::default()
        });
        assert_eq!(merged.max_agents, 2);
        assert_eq!(merged.max_tools, 10);
        assert_eq!(merged.inactivity_timeout_secs, 300);
    }

    #[test]
    fn generative_actions() {
        let generative: Vec<StepAction> = [
            StepAction::Research,
            StepAction::Analyze,
            StepAction::Synthesize,
            StepAction::Create,
            StepAction::Solve,
            StepAction::Explain,
            StepAction::Verify,
        ]
        .into_iter()
        .filter(StepAction::is_generative)
        .collect();
        assert_eq!(
            generative,
            vec![
                StepAction::Synthesize,
                StepAction::Create,
                StepAction::Solve,
                StepAction::Explain
            ]
        );
    }

    #[test]
    fn intent_serializes_type_field() {
        let intent = Intent {
            intent_type: IntentType::InformationRetrieval,
            confidence: 0.8,
            required_capabilities: vec![],
            complexity: Complexity::Low,
        };
        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["type"], "information_retrieval");
        assert_eq!(json["requiredCapabilities"], serde_json::json!([]));
    }
}
