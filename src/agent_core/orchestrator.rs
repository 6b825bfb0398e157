//! Orchestrator façade.
//!
//! Entry point for callers. Owns the shared registries and the session store,
//! and turns one message into `classify → plan → execute`. The façade is
//! `Send + Sync`: wrap it in an `Arc` and call it from any number of tasks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::config::CoreConfig;
use crate::routing::types::{
    ModelDescriptor, Outcome, RoutingDecision, Specialization, UserContext,
};
use crate::routing::{ModelInvoker, ModelRegistry, ModelRouter, RoutingError};
use crate::tools::{SharedMemory, ToolDefinition, ToolHandler, ToolRegistry};

use super::agents::AgentRegistry;
use super::errors::OrchestratorError;
use super::events::{CoreEvent, EventBus};
use super::executor::{ExecutionSettings, PlanExecutor};
use super::intent;
use super::plan_templates::PlanBuilder;
use super::session::SessionStore;
use super::types::{
    AgentTemplate, Plan, ProcessResponse, SessionConfig, SessionInfo, SessionOverrides,
    SystemStats,
};

pub struct Orchestrator {
    sessions: Arc<SessionStore>,
    agents: Arc<AgentRegistry>,
    tools: Arc<ToolRegistry>,
    router: Arc<ModelRouter>,
    events: EventBus,
    planner: PlanBuilder,
    executor: PlanExecutor,
}

/// Parts an orchestrator is assembled from.
pub struct OrchestratorParts {
    pub session_defaults: SessionConfig,
    pub agents: AgentRegistry,
    pub tools: ToolRegistry,
    pub router: ModelRouter,
    pub planner: PlanBuilder,
    pub settings: ExecutionSettings,
}

impl Orchestrator {
    pub fn new(parts: OrchestratorParts) -> Self {
        let events = EventBus::new();
        let sessions = Arc::new(SessionStore::new(parts.session_defaults, events.clone()));
        let agents = Arc::new(parts.agents);
        let tools = Arc::new(parts.tools);
        let router = Arc::new(parts.router);
        let executor = PlanExecutor::new(
            sessions.clone(),
            agents.clone(),
            tools.clone(),
            router.clone(),
            events.clone(),
            parts.settings,
        );
        Self {
            sessions,
            agents,
            tools,
            router,
            events,
            planner: parts.planner,
            executor,
        }
    }

    /// Build from a loaded config: stock agent templates, the configured
    /// models and an empty tool registry.
    pub fn from_config(config: &CoreConfig, invoker: Arc<dyn ModelInvoker>) -> Self {
        let exec = &config.execution;
        let registry = Arc::new(ModelRegistry::with_models(config.model_descriptors()));
        let mut router = ModelRouter::new(registry, invoker);
        if let Some(secs) = exec.model_timeout_secs {
            router = router.with_call_timeout(Duration::from_secs(secs));
        }

        Self::new(OrchestratorParts {
            session_defaults: config.session.clone(),
            agents: AgentRegistry::with_defaults(),
            tools: ToolRegistry::with_policy(config.retry_policy()),
            router,
            planner: PlanBuilder::new(exec.per_step_estimate_secs),
            settings: ExecutionSettings {
                step_timeout: exec.step_timeout_secs.map(Duration::from_secs),
                generation: exec.generation.clone(),
            },
        })
    }

    // ─── Sessions ───────────────────────────────────────────────────────────

    pub fn create_session(&self, user_id: &str, overrides: &SessionOverrides) -> String {
        self.sessions.create(user_id, overrides)
    }

    pub fn close_session(&self, session_id: &str) -> Result<(), OrchestratorError> {
        self.sessions.close(session_id)
    }

    pub fn get_session_info(&self, session_id: &str) -> Result<SessionInfo, OrchestratorError> {
        self.sessions.info(session_id)
    }

    /// Close idle sessions. Returns the ids closed.
    pub fn sweep_expired(&self) -> Vec<String> {
        self.sessions.sweep_expired()
    }

    /// Forget closed sessions. Returns how many were dropped.
    pub fn remove_closed(&self) -> usize {
        self.sessions.remove_closed()
    }

    /// Spawn an agent instance from a registered template.
    pub fn spawn_agent(
        &self,
        session_id: &str,
        template_id: &str,
        config: SharedMemory,
    ) -> Result<String, OrchestratorError> {
        let template = self
            .agents
            .get(template_id)
            .ok_or_else(|| OrchestratorError::AgentTemplateNotFound {
                template_id: template_id.to_string(),
            })?;
        self.sessions.spawn_agent(session_id, template, config)
    }

    // ─── Messages ───────────────────────────────────────────────────────────

    /// Classify a message, plan it and run the plan in the session.
    pub async fn process_message(
        &self,
        session_id: &str,
        message: &str,
    ) -> Result<ProcessResponse, OrchestratorError> {
        let plan = self.plan_message(session_id, message)?;
        self.executor.execute(&plan, message).await
    }

    /// Plan without executing. The session must be active.
    pub fn plan_message(&self, session_id: &str, message: &str) -> Result<Plan, OrchestratorError> {
        self.sessions.touch(session_id)?;
        let intent = intent::classify(message);
        tracing::debug!(
            session_id,
            intent = intent.intent_type.as_str(),
            confidence = intent.confidence,
            complexity = ?intent.complexity,
            "message classified"
        );
        Ok(self.planner.build(&intent, session_id))
    }

    // ─── Routing ────────────────────────────────────────────────────────────

    /// Pick a model for a request. The caller must report back with
    /// `record_outcome` to release the model's load.
    pub fn route(
        &self,
        request_type: &str,
        content: &str,
        user: &UserContext,
    ) -> Result<RoutingDecision, RoutingError> {
        self.router.route(request_type, content, user)
    }

    pub fn record_outcome(&self, model: &str, outcome: Outcome) -> Result<(), RoutingError> {
        self.router.record_outcome(model, outcome)
    }

    pub fn set_user_preference(&self, user_id: &str, preferred: Specialization) {
        self.router.set_user_preference(user_id, preferred);
    }

    pub fn register_model(&self, descriptor: ModelDescriptor) {
        self.router.registry().register(descriptor);
    }

    // ─── Registration ───────────────────────────────────────────────────────

    /// Add or replace an agent template. Returns true if one was replaced.
    pub fn register_agent(&self, template: AgentTemplate) -> bool {
        self.agents.register(template)
    }

    /// Add or replace a tool. Returns true if one was replaced.
    pub fn register_tool(&self, definition: ToolDefinition, handler: Arc<dyn ToolHandler>) -> bool {
        self.tools.register(definition, handler)
    }

    // ─── Observation ────────────────────────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<CoreEvent> {
        self.events.subscribe()
    }

    pub fn get_system_stats(&self) -> SystemStats {
        SystemStats {
            total_sessions: self.sessions.total(),
            active_sessions: self.sessions.active_count(),
            live_agents: self.sessions.live_agents(),
            registered_templates: self.agents.len(),
            registered_tools: self.tools.len(),
            models: self.router.models(),
            tools: self.tools.usage_snapshot(),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
