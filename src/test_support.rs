//! In-memory collaborators for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agent_core::agents::DEFAULT_TOOL_IDS;
use crate::routing::types::{GenerationConfig, ModelDescriptor, Specialization};
use crate::routing::{ModelInvoker, RoutingError};
use crate::tools::{RetryPolicy, SharedMemory, ToolCategory, ToolDefinition, ToolError, ToolHandler, ToolRegistry};

/// Tool that counts its calls and either echoes or fails permanently.
pub struct RecordingTool {
    pub id: String,
    pub calls: AtomicU32,
    pub fail: bool,
    pub delay: Duration,
}

impl RecordingTool {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            calls: AtomicU32::new(0),
            fail: false,
            delay: Duration::ZERO,
        }
    }

    /// Answers normally after sleeping for `delay`.
    pub fn slow(id: &str, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(id)
        }
    }

    pub fn failing(id: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(id)
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ToolHandler for RecordingTool {
    async fn run(&self, payload: Value, shared: &SharedMemory) -> Result<Value, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(ToolError::unavailable(&self.id, "simulated outage"));
        }
        Ok(json!({
            "summary": format!("{} result for '{}'", self.id, payload["query"].as_str().unwrap_or("")),
            "shared_keys": shared.len(),
        }))
    }
}

/// Invoker that answers locally: `[model] <prompt>`.
pub struct StaticInvoker;

#[async_trait]
impl ModelInvoker for StaticInvoker {
    async fn invoke(
        &self,
        model: &ModelDescriptor,
        prompt: &str,
        _config: &GenerationConfig,
    ) -> Result<String, RoutingError> {
        Ok(format!("[{}] {prompt}", model.name))
    }
}

/// `StaticInvoker` that sleeps before answering.
pub struct DelayedInvoker(pub Duration);

#[async_trait]
impl ModelInvoker for DelayedInvoker {
    async fn invoke(
        &self,
        model: &ModelDescriptor,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<String, RoutingError> {
        tokio::time::sleep(self.0).await;
        StaticInvoker.invoke(model, prompt, config).await
    }
}

/// One model per specialization, identical stats, generous context.
pub fn models() -> Vec<ModelDescriptor> {
    [
        ("tutor-chat", Specialization::Chat),
        ("tutor-reasoner", Specialization::Reasoning),
        ("tutor-technical", Specialization::Technical),
        ("tutor-creative", Specialization::Creative),
        ("tutor-academic", Specialization::Academic),
    ]
    .into_iter()
    .map(|(name, spec)| ModelDescriptor::new(name, "static", spec, 100_000))
    .collect()
}

/// Registry with a `RecordingTool` for every tool the stock templates use.
pub fn tool_registry() -> (ToolRegistry, HashMap<String, Arc<RecordingTool>>) {
    tool_registry_with(&[])
}

/// Like `tool_registry`, but the named tools fail.
pub fn tool_registry_with(failing: &[&str]) -> (ToolRegistry, HashMap<String, Arc<RecordingTool>>) {
    tool_registry_from(|id| {
        if failing.contains(&id) {
            RecordingTool::failing(id)
        } else {
            RecordingTool::new(id)
        }
    })
}

/// Registry whose handlers are built by `make`, one per stock tool id.
pub fn tool_registry_from(
    make: impl Fn(&str) -> RecordingTool,
) -> (ToolRegistry, HashMap<String, Arc<RecordingTool>>) {
    let registry = ToolRegistry::with_policy(RetryPolicy {
        max_retries: 0,
        ..RetryPolicy::default()
    });
    let mut handlers = HashMap::new();
    for &id in DEFAULT_TOOL_IDS {
        let handler = Arc::new(make(id));
        registry.register(
            ToolDefinition::new(id, "test double", ToolCategory::Other),
            handler.clone(),
        );
        handlers.insert(id.to_string(), handler);
    }
    (registry, handlers)
}
