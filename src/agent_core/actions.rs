//! Step actions.
//!
//! One named function per `StepAction`, all with the same shape:
//! `(step, context) -> StepOutput`. `execute` dispatches on the variant.
//! Tools declared on a step run concurrently; their results come back in
//! declared order. Generative actions then route a model through the
//! façade with the tool output folded into the prompt.

use futures::future::try_join_all;
use serde_json::{json, Value};

use crate::routing::types::{GenerationConfig, UserContext};
use crate::routing::ModelRouter;
use crate::text::truncate_utf8;
use crate::tools::types::SharedMemory;
use crate::tools::ToolRegistry;

use super::errors::OrchestratorError;
use super::session::AgentSnapshot;
use super::types::{Step, StepAction};

/// Longest tool output (in bytes) carried into a result or prompt.
const MAX_TOOL_TEXT_BYTES: usize = 400;

/// Everything a step may read. Built fresh for each step.
pub struct StepContext<'a> {
    pub tools: &'a ToolRegistry,
    pub router: &'a ModelRouter,
    pub user: &'a UserContext,
    pub generation: &'a GenerationConfig,
    pub message: &'a str,
    pub shared: &'a SharedMemory,
    pub agent: &'a AgentSnapshot,
    /// Results of earlier steps in this execution, in order.
    pub prior_results: &'a [String],
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    pub result: String,
    /// Model that produced the text, for generative actions.
    pub model: Option<String>,
}

impl StepOutput {
    fn plain(result: String) -> Self {
        Self {
            result,
            model: None,
        }
    }
}

pub async fn execute(step: &Step, ctx: &StepContext<'_>) -> Result<StepOutput, OrchestratorError> {
    match step.action {
        StepAction::Research => research(step, ctx).await,
        StepAction::Analyze => analyze(step, ctx).await,
        StepAction::Verify => verify(step, ctx).await,
        StepAction::Synthesize => synthesize(step, ctx).await,
        StepAction::Create => create(step, ctx).await,
        StepAction::Solve => solve(step, ctx).await,
        StepAction::Explain => explain(step, ctx).await,
    }
}

// ─── Actions ────────────────────────────────────────────────────────────────

async fn research(step: &Step, ctx: &StepContext<'_>) -> Result<StepOutput, OrchestratorError> {
    let outputs = run_tools(step, ctx).await?;
    if outputs.is_empty() {
        return Ok(StepOutput::plain(format!(
            "Collected background on: {}",
            ctx.message
        )));
    }
    Ok(StepOutput::plain(format!(
        "Research findings: {}",
        join_tool_text(&outputs)
    )))
}

async fn analyze(step: &Step, ctx: &StepContext<'_>) -> Result<StepOutput, OrchestratorError> {
    let outputs = run_tools(step, ctx).await?;
    let subject = match ctx.prior_results.len() {
        0 => "the request".to_string(),
        n => format!("{n} earlier finding(s)"),
    };
    if outputs.is_empty() {
        return Ok(StepOutput::plain(format!("Analyzed {subject}.")));
    }
    Ok(StepOutput::plain(format!(
        "Analysis of {subject}: {}",
        join_tool_text(&outputs)
    )))
}

async fn verify(step: &Step, ctx: &StepContext<'_>) -> Result<StepOutput, OrchestratorError> {
    let outputs = run_tools(step, ctx).await?;
    let mut result = format!("Verified {} earlier result(s).", ctx.prior_results.len());
    if !outputs.is_empty() {
        result.push_str(" Checks: ");
        result.push_str(&join_tool_text(&outputs));
    }
    Ok(StepOutput::plain(result))
}

async fn synthesize(step: &Step, ctx: &StepContext<'_>) -> Result<StepOutput, OrchestratorError> {
    generate(step, ctx, "Synthesize the findings into a concise answer.").await
}

async fn create(step: &Step, ctx: &StepContext<'_>) -> Result<StepOutput, OrchestratorError> {
    generate(step, ctx, "Create the requested learning material.").await
}

async fn solve(step: &Step, ctx: &StepContext<'_>) -> Result<StepOutput, OrchestratorError> {
    generate(step, ctx, "Solve the problem step by step.").await
}

async fn explain(step: &Step, ctx: &StepContext<'_>) -> Result<StepOutput, OrchestratorError> {
    generate(step, ctx, "Explain the topic clearly for a student.").await
}

// ─── Helpers ────────────────────────────────────────────────────────────────

async fn generate(
    step: &Step,
    ctx: &StepContext<'_>,
    instruction: &str,
) -> Result<StepOutput, OrchestratorError> {
    let outputs = run_tools(step, ctx).await?;
    let prompt = build_prompt(instruction, ctx, &outputs);
    let completion = ctx
        .router
        .complete(
            ctx.agent.template.kind.request_type(),
            &prompt,
            ctx.user,
            ctx.generation,
        )
        .await?;
    Ok(StepOutput {
        result: completion.text,
        model: Some(completion.model),
    })
}

async fn run_tools(
    step: &Step,
    ctx: &StepContext<'_>,
) -> Result<Vec<(String, Value)>, OrchestratorError> {
    let payload = json!({
        "query": ctx.message,
        "action": step.action.as_str(),
        "previous_results": ctx.prior_results,
        "agent_config": ctx.agent.config,
    });

    let calls = step.tools.iter().map(|tool| {
        let payload = payload.clone();
        async move {
            let value = ctx.tools.run(tool, payload, ctx.shared).await?;
            Ok::<_, OrchestratorError>((tool.clone(), value))
        }
    });
    try_join_all(calls).await
}

fn build_prompt(instruction: &str, ctx: &StepContext<'_>, outputs: &[(String, Value)]) -> String {
    let mut prompt = format!("{instruction}\n\nRequest: {}\n", ctx.message);
    if let Some(tone) = ctx.agent.config.get("tone").and_then(Value::as_str) {
        prompt.push_str(&format!("Tone: {tone}\n"));
    }
    if !ctx.prior_results.is_empty() {
        prompt.push_str("\nEarlier findings:\n");
        for result in ctx.prior_results {
            prompt.push_str(&format!("- {}\n", truncate_utf8(result, MAX_TOOL_TEXT_BYTES)));
        }
    }
    if !outputs.is_empty() {
        prompt.push_str("\nTool output:\n");
        for (tool, value) in outputs {
            prompt.push_str(&format!("- [{tool}] {}\n", render_value(value)));
        }
    }
    prompt
}

fn join_tool_text(outputs: &[(String, Value)]) -> String {
    outputs
        .iter()
        .map(|(tool, value)| format!("[{tool}] {}", render_value(value)))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Text form of a tool result: a bare string, an object's `summary`, or
/// compact JSON.
fn render_value(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("summary").and_then(Value::as_str) {
            Some(summary) => summary.to_string(),
            None => value.to_string(),
        },
        other => other.to_string(),
    };
    truncate_utf8(&text, MAX_TOOL_TEXT_BYTES).to_string()
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_core::agents::{AgentRegistry, CREATIVE_AGENT, RESEARCH_AGENT};
    use crate::test_support::{tool_registry, StaticInvoker};
    use crate::routing::ModelRegistry;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn snapshot(template_id: &str) -> AgentSnapshot {
        let template = AgentRegistry::with_defaults().get(template_id).unwrap();
        AgentSnapshot {
            instance_id: format!("{template_id}-1"),
            config: template.default_config.clone(),
            template,
        }
    }

    fn router() -> ModelRouter {
        ModelRouter::new(
            Arc::new(ModelRegistry::with_models(crate::test_support::models())),
            Arc::new(StaticInvoker),
        )
    }

    #[test]
    fn render_prefers_summary() {
        assert_eq!(render_value(&json!("plain")), "plain");
        assert_eq!(render_value(&json!({ "summary": "short", "raw": [1, 2] })), "short");
        assert_eq!(render_value(&json!([1, 2])), "[1,2]");
    }

    #[tokio::test]
    async fn research_runs_declared_tools_in_order() {
        let (tools, handlers) = tool_registry();
        let router = router();
        let agent = snapshot(RESEARCH_AGENT);
        let shared = SharedMemory::new();
        let ctx = StepContext {
            tools: &tools,
            router: &router,
            user: &UserContext::default(),
            generation: &GenerationConfig::default(),
            message: "search for thermodynamics papers",
            shared: &shared,
            agent: &agent,
            prior_results: &[],
        };
        let step = Step {
            action: StepAction::Research,
            agent: RESEARCH_AGENT.into(),
            tools: vec!["academic_search".into(), "web_search".into()],
        };

        let out = execute(&step, &ctx).await.unwrap();
        assert!(out.model.is_none());
        let academic = out.result.find("[academic_search]").unwrap();
        let web = out.result.find("[web_search]").unwrap();
        assert!(academic < web);
        assert_eq!(handlers["web_search"].calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn create_routes_a_creative_model() {
        let (tools, _) = tool_registry();
        let router = router();
        let agent = snapshot(CREATIVE_AGENT);
        let shared = SharedMemory::new();
        let prior = vec!["gears transmit torque".to_string()];
        let ctx = StepContext {
            tools: &tools,
            router: &router,
            user: &UserContext::default(),
            generation: &GenerationConfig::default(),
            message: "Create a presentation about gears",
            shared: &shared,
            agent: &agent,
            prior_results: &prior,
        };
        let step = Step {
            action: StepAction::Create,
            agent: CREATIVE_AGENT.into(),
            tools: vec!["content_generator".into()],
        };

        let out = execute(&step, &ctx).await.unwrap();
        assert_eq!(out.model.as_deref(), Some("tutor-creative"));
        assert!(out.result.contains("Create the requested learning material."));
        assert!(out.result.contains("Tone: engaging"));
        assert!(out.result.contains("gears transmit torque"));
    }

    #[tokio::test]
    async fn tool_failure_surfaces_as_tool_error() {
        let (tools, _) = tool_registry();
        let router = router();
        let agent = snapshot(RESEARCH_AGENT);
        let shared = SharedMemory::new();
        let ctx = StepContext {
            tools: &tools,
            router: &router,
            user: &UserContext::default(),
            generation: &GenerationConfig::default(),
            message: "q",
            shared: &shared,
            agent: &agent,
            prior_results: &[],
        };
        let step = Step {
            action: StepAction::Research,
            agent: RESEARCH_AGENT.into(),
            tools: vec!["not_registered".into()],
        };
        let err = execute(&step, &ctx).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Tool(_)));
    }
}
