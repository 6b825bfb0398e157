//! Plan executor: the execution state machine.
//!
//! Execution: `created → executing → {completed | failed}`.
//! Step: `pending → executing → {completed | failed}`.
//!
//! Steps run strictly in order because later steps read what earlier ones
//! wrote to shared memory. The first failing step aborts the rest; the
//! error carries the partial `Execution`. Session locks are taken only to
//! copy state in or out, never across a tool or model call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::json;

use crate::routing::types::{GenerationConfig, UserContext};
use crate::routing::ModelRouter;
use crate::tools::ToolRegistry;

use super::actions::{self, StepContext, StepOutput};
use super::agents::AgentRegistry;
use super::errors::{ExecutionStage, OrchestratorError};
use super::events::{CoreEvent, EventBus};
use super::session::{AgentSnapshot, SessionStore};
use super::types::{
    AgentAction, AgentTemplate, Execution, ExecutionStatus, HistoryEntry, Plan,
    ProcessResponse, ResponseMetadata, Role, Step, StepRecord, StepStatus,
};

/// Appended to every synthesized response.
pub const CLOSING_REMARK: &str =
    "This answer was coordinated by the multi-agent orchestration system.";

#[derive(Debug, Clone, Default)]
pub struct ExecutionSettings {
    /// Hard deadline for one step, tools and generation included.
    pub step_timeout: Option<Duration>,
    pub generation: GenerationConfig,
}

pub struct PlanExecutor {
    sessions: Arc<SessionStore>,
    agents: Arc<AgentRegistry>,
    tools: Arc<ToolRegistry>,
    router: Arc<ModelRouter>,
    events: EventBus,
    settings: ExecutionSettings,
}

impl PlanExecutor {
    pub fn new(
        sessions: Arc<SessionStore>,
        agents: Arc<AgentRegistry>,
        tools: Arc<ToolRegistry>,
        router: Arc<ModelRouter>,
        events: EventBus,
        settings: ExecutionSettings,
    ) -> Self {
        Self {
            sessions,
            agents,
            tools,
            router,
            events,
            settings,
        }
    }

    /// Run a plan for one message and synthesize the response.
    ///
    /// Session lookup errors return immediately with no side effects. Any
    /// later failure is wrapped in `PlanExecutionFailed`.
    pub async fn execute(
        &self,
        plan: &Plan,
        message: &str,
    ) -> Result<ProcessResponse, OrchestratorError> {
        let started = Instant::now();
        let session_id = plan.session_id.as_str();
        self.sessions.touch(session_id)?;
        let user = UserContext::for_user(self.sessions.user_id(session_id)?);

        let mut execution = Execution {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            plan_id: plan.id.clone(),
            required_agents: plan.required_agents.clone(),
            status: ExecutionStatus::Created,
            steps: Vec::with_capacity(plan.steps.len()),
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        };

        execution.status = ExecutionStatus::Executing;
        execution.started_at = Some(Utc::now());
        self.sessions.push_execution(session_id, &execution.id);
        self.sessions.append_history(
            session_id,
            HistoryEntry {
                role: Role::User,
                content: message.to_string(),
                at: Utc::now(),
                execution_id: Some(execution.id.clone()),
            },
        );
        tracing::info!(
            session_id,
            execution_id = %execution.id,
            plan_id = %plan.id,
            steps = plan.steps.len(),
            "execution started"
        );
        self.events.emit(CoreEvent::ExecutionStarted {
            session_id: session_id.to_string(),
            execution_id: execution.id.clone(),
            steps: plan.steps.len(),
        });

        if plan.steps.is_empty() {
            let err = OrchestratorError::EmptyPlan {
                plan_id: plan.id.clone(),
            };
            return Err(self.fail(execution, ExecutionStage::Synthesize, None, err));
        }

        // ─── Ensure agents ──────────────────────────────────────────────────
        let bindings = match self.ensure_agents(plan) {
            Ok(b) => b,
            Err(e) => return Err(self.fail(execution, ExecutionStage::EnsureAgents, None, e)),
        };

        // ─── Steps ──────────────────────────────────────────────────────────
        let mut shared_local = self.sessions.shared_snapshot(session_id).unwrap_or_default();
        let mut results: Vec<String> = Vec::with_capacity(plan.steps.len());
        let mut agents_used: Vec<String> = Vec::new();
        let mut models_used: Vec<String> = Vec::new();

        for (index, step) in plan.steps.iter().enumerate() {
            let agent = bindings.get(&step.agent);
            let mut record = StepRecord {
                index,
                action: step.action,
                agent_template: step.agent.clone(),
                agent_instance: agent.map(|a| a.instance_id.clone()),
                tools: step.tools.clone(),
                status: StepStatus::Pending,
                started_at: None,
                finished_at: None,
                result: None,
                error: None,
                model: None,
            };

            // Pick up writes made since the last step; a closed session
            // keeps running on the local copy.
            if let Some(current) = self.sessions.shared_snapshot(session_id) {
                shared_local = current;
            }

            record.status = StepStatus::Executing;
            record.started_at = Some(Utc::now());
            tracing::debug!(
                session_id,
                execution_id = %execution.id,
                step = index,
                action = %step.action,
                "step started"
            );

            let outcome = match agent {
                Some(agent) => {
                    self.run_step(session_id, index, step, agent, &user, message, &shared_local, &results)
                        .await
                }
                None => Err(OrchestratorError::AgentMissing {
                    session_id: session_id.to_string(),
                    template_id: step.agent.clone(),
                }),
            };
            record.finished_at = Some(Utc::now());

            match outcome {
                Ok(output) => {
                    record.status = StepStatus::Completed;
                    record.result = Some(output.result.clone());
                    record.model = output.model.clone();
                    execution.steps.push(record);

                    if let Some(agent) = agent {
                        self.record_step(session_id, &execution.id, index, step, agent, &output);
                        if !agents_used.contains(&agent.instance_id) {
                            agents_used.push(agent.instance_id.clone());
                        }
                    }
                    let key = format!("step_{}_{}", index + 1, step.action);
                    shared_local.insert(key.clone(), json!(output.result));
                    if let Some(model) = output.model {
                        if !models_used.contains(&model) {
                            models_used.push(model);
                        }
                    }
                    results.push(output.result);
                }
                Err(e) => {
                    record.status = StepStatus::Failed;
                    record.error = Some(e.to_string());
                    execution.steps.push(record);
                    return Err(self.fail(execution, ExecutionStage::Step, Some((index, step)), e));
                }
            }
        }

        // ─── Synthesize ─────────────────────────────────────────────────────
        let response = synthesize(&results);
        self.sessions.append_history(
            session_id,
            HistoryEntry {
                role: Role::Assistant,
                content: response.clone(),
                at: Utc::now(),
                execution_id: Some(execution.id.clone()),
            },
        );
        self.finish(&mut execution, ExecutionStatus::Completed);

        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            session_id,
            execution_id = %execution.id,
            steps = execution.steps.len(),
            duration_ms,
            "execution completed"
        );

        Ok(ProcessResponse {
            response,
            metadata: ResponseMetadata {
                intent: plan.intent.clone(),
                plan_id: plan.id.clone(),
                plan_steps: plan.steps.len(),
                estimated_duration_secs: plan.estimated_duration_secs,
                agents_used,
                models_used,
                duration_ms,
            },
            execution,
        })
    }

    fn ensure_agents(&self, plan: &Plan) -> Result<HashMap<String, AgentSnapshot>, OrchestratorError> {
        let templates = plan
            .required_agents
            .iter()
            .map(|id| {
                self.agents
                    .get(id)
                    .ok_or_else(|| OrchestratorError::AgentTemplateNotFound {
                        template_id: id.clone(),
                    })
            })
            .collect::<Result<Vec<Arc<AgentTemplate>>, _>>()?;
        self.sessions.ensure_agents(&plan.session_id, &templates)
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_step(
        &self,
        session_id: &str,
        index: usize,
        step: &Step,
        agent: &AgentSnapshot,
        user: &UserContext,
        message: &str,
        shared: &crate::tools::SharedMemory,
        prior_results: &[String],
    ) -> Result<StepOutput, OrchestratorError> {
        if let Some(tool) = step.tools.iter().find(|t| !agent.template.allows_tool(t)) {
            return Err(OrchestratorError::ToolNotPermitted {
                template_id: agent.template.id.clone(),
                tool: tool.clone(),
            });
        }
        self.sessions.reserve_tools(session_id, &step.tools)?;

        let ctx = StepContext {
            tools: &self.tools,
            router: &self.router,
            user,
            generation: &self.settings.generation,
            message,
            shared,
            agent,
            prior_results,
        };

        match self.settings.step_timeout {
            Some(limit) => tokio::time::timeout(limit, actions::execute(step, &ctx))
                .await
                .unwrap_or_else(|_| {
                    Err(OrchestratorError::StepTimeout {
                        step: index,
                        action: step.action,
                        timeout_ms: limit.as_millis() as u64,
                    })
                }),
            None => actions::execute(step, &ctx).await,
        }
    }

    fn record_step(
        &self,
        session_id: &str,
        execution_id: &str,
        index: usize,
        step: &Step,
        agent: &AgentSnapshot,
        output: &StepOutput,
    ) {
        let key = format!("step_{}_{}", index + 1, step.action);
        self.sessions
            .write_shared_in_flight(session_id, key, json!(output.result));
        self.sessions.record_agent_action(
            session_id,
            &agent.instance_id,
            AgentAction {
                execution_id: execution_id.to_string(),
                step_index: index,
                action: step.action,
                tools: step.tools.clone(),
                result: output.result.clone(),
                at: Utc::now(),
            },
        );
    }

    fn finish(&self, execution: &mut Execution, status: ExecutionStatus) {
        execution.status = status;
        execution.finished_at = Some(Utc::now());
        self.sessions
            .pop_execution(&execution.session_id, &execution.id);
        self.events.emit(CoreEvent::ExecutionFinished {
            session_id: execution.session_id.clone(),
            execution_id: execution.id.clone(),
            status,
        });
    }

    fn fail(
        &self,
        mut execution: Execution,
        stage: ExecutionStage,
        step: Option<(usize, &Step)>,
        source: OrchestratorError,
    ) -> OrchestratorError {
        self.finish(&mut execution, ExecutionStatus::Failed);
        tracing::warn!(
            session_id = %execution.session_id,
            execution_id = %execution.id,
            stage = %stage,
            step = ?step.map(|(i, _)| i),
            completed = execution.completed_steps(),
            error = %source,
            "execution failed"
        );
        OrchestratorError::PlanExecutionFailed {
            stage,
            step: step.map(|(i, _)| i),
            action: step.map(|(_, s)| s.action),
            source: Box::new(source),
            execution: Box::new(execution),
        }
    }
}

/// Enumerate step results as `n. <result>` lines and append the closing remark.
pub fn synthesize(results: &[String]) -> String {
    let body = results
        .iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {r}", i + 1))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{body}\n\n{CLOSING_REMARK}")
}

// ─── Tests ──────────────────────────────────────────────────────────────────
