//! Demo driver: runs one tutoring message through the orchestrator and
//! prints the response as JSON.
//!
//! Usage: `tutor-core [message...]`
//!
//! Models come from `config/tutor-core.yaml` (or `TUTOR_CORE_CONFIG`). Models
//! with a `base_url` are called over HTTP; without any, an offline echo
//! backend answers so the pipeline can be exercised end to end.

use std::sync::Arc;

use anyhow::Context as _;
use async_trait::async_trait;
use serde_json::{json, Value};

use tutor_core::agent_core::agents::DEFAULT_TOOL_IDS;
use tutor_core::agent_core::{Orchestrator, SessionOverrides};
use tutor_core::config::{self, CoreConfig, ModelEntry};
use tutor_core::routing::types::{GenerationConfig, ModelDescriptor, Specialization};
use tutor_core::routing::{HttpModelBackend, ModelInvoker, RoutingError};
use tutor_core::tools::{SharedMemory, ToolCategory, ToolDefinition, ToolError, ToolHandler};

const DEFAULT_MESSAGE: &str = "Create a presentation about how gears transmit torque";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tutor_core::init_tracing(None)?;

    let mut config = load_config()?;
    if config.models.is_empty() {
        tracing::warn!("no models configured, using offline defaults");
        config.models = offline_models();
    }
    config.validate()?;

    let invoker: Arc<dyn ModelInvoker> = if config.models.iter().any(|m| m.base_url.is_some()) {
        Arc::new(HttpModelBackend::new()?)
    } else {
        Arc::new(OfflineInvoker)
    };

    let orchestrator = Orchestrator::from_config(&config, invoker);
    for id in DEFAULT_TOOL_IDS {
        orchestrator.register_tool(
            ToolDefinition::new(*id, format!("offline stand-in for {id}"), category_for(id)),
            Arc::new(StubTool { id: id.to_string() }),
        );
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let message = if args.is_empty() {
        DEFAULT_MESSAGE.to_string()
    } else {
        args.join(" ")
    };

    let session_id = orchestrator.create_session("demo-student", &SessionOverrides::default());
    let response = orchestrator
        .process_message(&session_id, &message)
        .await
        .context("message processing failed")?;
    let info = orchestrator.get_session_info(&session_id)?;
    orchestrator.close_session(&session_id)?;

    let output = json!({
        "response": response,
        "session": info,
        "stats": orchestrator.get_system_stats(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn load_config() -> anyhow::Result<CoreConfig> {
    let cwd = std::env::current_dir().context("cannot read current directory")?;
    match config::find_config_path(&cwd) {
        Ok(path) => {
            tracing::info!(path = %path.display(), "loading config");
            Ok(config::load_config(&path)?)
        }
        Err(config::ConfigError::NotFound) => {
            tracing::info!("no config file found, using defaults");
            Ok(CoreConfig::default())
        }
        Err(e) => Err(e.into()),
    }
}

fn offline_models() -> Vec<ModelEntry> {
    [
        ("offline-chat", Specialization::Chat),
        ("offline-reasoner", Specialization::Reasoning),
        ("offline-technical", Specialization::Technical),
        ("offline-creative", Specialization::Creative),
        ("offline-academic", Specialization::Academic),
    ]
    .into_iter()
    .map(|(name, specialization)| ModelEntry {
        name: name.to_string(),
        backend: "offline".to_string(),
        specialization,
        max_context_length: 32_768,
        base_url: None,
        model_id: None,
        stats: None,
        active: true,
    })
    .collect()
}

fn category_for(tool_id: &str) -> ToolCategory {
    match tool_id {
        "web_search" | "academic_search" => ToolCategory::Search,
        "data_analyzer" | "calculator" | "code_executor" => ToolCategory::Analysis,
        "content_generator" | "presentation_builder" => ToolCategory::Generation,
        _ => ToolCategory::Other,
    }
}

/// Tool that reports what it was asked for.
struct StubTool {
    id: String,
}

#[async_trait]
impl ToolHandler for StubTool {
    async fn run(&self, payload: Value, _shared: &SharedMemory) -> Result<Value, ToolError> {
        let query = payload["query"].as_str().unwrap_or_default();
        Ok(json!({ "summary": format!("{} looked at '{query}'", self.id) }))
    }
}

/// Backend that answers with the first line of the prompt.
struct OfflineInvoker;

#[async_trait]
impl ModelInvoker for OfflineInvoker {
    async fn invoke(
        &self,
        model: &ModelDescriptor,
        prompt: &str,
        _config: &GenerationConfig,
    ) -> Result<String, RoutingError> {
        let first_line = prompt.lines().next().unwrap_or_default();
        Ok(format!("[{}] {first_line}", model.name))
    }
}
