//! Plan templates keyed by intent type.
//!
//! Every intent maps to a fixed, ordered step list. Intents without an entry
//! fall back to research followed by analysis.

use super::agents::{ANALYSIS_AGENT, CREATIVE_AGENT, PROBLEM_SOLVER_AGENT, RESEARCH_AGENT};
use super::types::{Intent, IntentType, Plan, Step, StepAction};

/// Builds plans from intents.
#[derive(Debug, Clone, Copy)]
pub struct PlanBuilder {
    per_step_estimate_secs: u64,
}

impl PlanBuilder {
    pub fn new(per_step_estimate_secs: u64) -> Self {
        Self {
            per_step_estimate_secs,
        }
    }

    /// Build a fresh plan for one message in a session.
    pub fn build(&self, intent: &Intent, session_id: &str) -> Plan {
        let steps = template_steps(intent.intent_type);

        let mut required_agents: Vec<String> = Vec::new();
        for step in &steps {
            if !required_agents.contains(&step.agent) {
                required_agents.push(step.agent.clone());
            }
        }

        let plan = Plan {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            intent: intent.clone(),
            estimated_duration_secs: steps.len() as u64 * self.per_step_estimate_secs,
            steps,
            required_agents,
        };

        tracing::info!(
            session_id,
            plan_id = %plan.id,
            intent = intent.intent_type.as_str(),
            steps = plan.steps.len(),
            "plan built"
        );
        plan
    }
}

impl Default for PlanBuilder {
    fn default() -> Self {
        Self::new(5)
    }
}

fn step(action: StepAction, agent: &str, tools: &[&str]) -> Step {
    Step {
        action,
        agent: agent.to_string(),
        tools: tools.iter().map(|t| t.to_string()).collect(),
    }
}

fn template_steps(intent_type: IntentType) -> Vec<Step> {
    match intent_type {
        IntentType::InformationRetrieval => vec![
            step(StepAction::Research, RESEARCH_AGENT, &["academic_search", "web_search"]),
            step(StepAction::Analyze, ANALYSIS_AGENT, &["data_analyzer"]),
            step(StepAction::Synthesize, RESEARCH_AGENT, &[]),
        ],
        IntentType::Analysis => vec![
            step(StepAction::Research, RESEARCH_AGENT, &["web_search"]),
            step(StepAction::Analyze, ANALYSIS_AGENT, &["data_analyzer"]),
            step(StepAction::Verify, ANALYSIS_AGENT, &[]),
        ],
        IntentType::ContentCreation => vec![
            step(StepAction::Research, RESEARCH_AGENT, &["web_search"]),
            step(
                StepAction::Create,
                CREATIVE_AGENT,
                &["content_generator", "presentation_builder"],
            ),
        ],
        IntentType::ProblemSolving => vec![
            step(StepAction::Analyze, PROBLEM_SOLVER_AGENT, &[]),
            step(StepAction::Solve, PROBLEM_SOLVER_AGENT, &["calculator"]),
            step(StepAction::Verify, PROBLEM_SOLVER_AGENT, &["calculator"]),
        ],
        IntentType::Educational => vec![
            step(StepAction::Research, RESEARCH_AGENT, &["academic_search"]),
            step(StepAction::Explain, CREATIVE_AGENT, &["content_generator"]),
        ],
        IntentType::Unknown => vec![
            step(StepAction::Research, RESEARCH_AGENT, &["web_search"]),
            step(StepAction::Analyze, ANALYSIS_AGENT, &["data_analyzer"]),
        ],
    }
}
