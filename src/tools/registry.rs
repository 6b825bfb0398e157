//! Tool registry. Maps tool ids to handlers and tracks their usage.
//!
//! Provides:
//! - Registration (later registration of an id replaces the earlier one)
//! - Payload validation against the registered parameter schema
//! - Execution with retry and exponential backoff for transient failures
//! - Optional per-call deadline
//! - Per-tool usage metadata

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;

use super::errors::ToolError;
use super::types::{SharedMemory, ToolDefinition, ToolUsage, ToolUsageSnapshot};

// ─── Constants ──────────────────────────────────────────────────────────────

/// Default retry attempts for transient tool failures.
const DEFAULT_MAX_RETRIES: u32 = 1;

/// Default base delay between retries (doubles each attempt).
const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(200);

// ─── Contract ───────────────────────────────────────────────────────────────

/// The external capability behind a tool id.
///
/// Handlers receive a read-only copy of the session's shared memory and
/// return a JSON result. They must not assume they run on the session's
/// task; calls for one session are sequential, calls across sessions are not.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn run(&self, payload: Value, shared: &SharedMemory) -> Result<Value, ToolError>;
}

/// How the registry retries and bounds tool calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Deadline for a single attempt.
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_RETRY_BASE_DELAY,
            attempt_timeout: None,
        }
    }
}

// ─── ToolRegistry ───────────────────────────────────────────────────────────

struct RegisteredTool {
    definition: ToolDefinition,
    handler: Arc<dyn ToolHandler>,
    usage: Mutex<ToolUsage>,
}

/// Concurrency-safe registry of tools.
///
/// Lookups take a read lock only long enough to clone the entry's `Arc`;
/// handler calls never run under the registry lock.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<RegisteredTool>>>,
    policy: RetryPolicy,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::with_policy(RetryPolicy::default())
    }

    pub fn with_policy(policy: RetryPolicy) -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            policy,
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Register a tool. Returns `true` if an earlier definition was replaced.
    ///
    /// Usage metadata starts fresh for the new definition.
    pub fn register(&self, definition: ToolDefinition, handler: Arc<dyn ToolHandler>) -> bool {
        let id = definition.id.clone();
        let entry = Arc::new(RegisteredTool {
            definition,
            handler,
            usage: Mutex::new(ToolUsage::default()),
        });
        let replaced = self
            .tools
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), entry)
            .is_some();

        if replaced {
            tracing::warn!(tool = %id, "tool re-registered, previous definition replaced");
        } else {
            tracing::info!(tool = %id, "tool registered");
        }
        replaced
    }

    pub fn contains(&self, tool_id: &str) -> bool {
        self.read().contains_key(tool_id)
    }

    pub fn get(&self, tool_id: &str) -> Option<ToolDefinition> {
        self.read().get(tool_id).map(|t| t.definition.clone())
    }

    /// All definitions, ordered by id.
    pub fn list(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.read().values().map(|t| t.definition.clone()).collect();
        defs.sort_by(|a, b| a.id.cmp(&b.id));
        defs
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Validate a payload: tool exists and every `required` field is present.
    pub fn validate_payload(&self, tool_id: &str, payload: &Value) -> Result<(), ToolError> {
        let entry = self.entry(tool_id)?;
        check_required(&entry.definition, payload)
    }

    /// Run a tool with validation, retry and usage accounting.
    pub async fn run(
        &self,
        tool_id: &str,
        payload: Value,
        shared: &SharedMemory,
    ) -> Result<Value, ToolError> {
        let entry = self.entry(tool_id)?;
        check_required(&entry.definition, &payload)?;

        let start = Instant::now();
        let mut retries = 0u64;
        let mut attempt = 0u32;

        let result = loop {
            if attempt > 0 {
                let delay = self.policy.base_delay * 2u32.pow(attempt - 1);
                tokio::time::sleep(delay).await;
                retries += 1;
            }

            match self.attempt(&entry, payload.clone(), shared).await {
                Ok(value) => break Ok(value),
                Err(e) if e.is_retriable() && attempt < self.policy.max_retries => {
                    tracing::warn!(tool = %tool_id, attempt, error = %e, "transient tool failure, retrying");
                    attempt += 1;
                }
                Err(e) => break Err(e),
            }
        };

        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        {
            let mut usage = entry.usage.lock().unwrap_or_else(PoisonError::into_inner);
            usage.invocations += 1;
            usage.retries += retries;
            usage.total_latency_ms += latency_ms;
            usage.last_used = Some(chrono::Utc::now());
            if result.is_err() {
                usage.failures += 1;
            }
        }

        match &result {
            Ok(_) => tracing::info!(tool = %tool_id, latency_ms, retries, "tool call completed"),
            Err(e) => tracing::warn!(tool = %tool_id, latency_ms, retries, error = %e, "tool call failed"),
        }
        result
    }

    pub fn usage(&self, tool_id: &str) -> Option<ToolUsage> {
        self.read()
            .get(tool_id)
            .map(|t| t.usage.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    /// Usage for every tool, ordered by id.
    pub fn usage_snapshot(&self) -> Vec<ToolUsageSnapshot> {
        let mut snaps: Vec<ToolUsageSnapshot> = self
            .read()
            .values()
            .map(|t| ToolUsageSnapshot {
                tool_id: t.definition.id.clone(),
                category: t.definition.category,
                usage: t.usage.lock().unwrap_or_else(PoisonError::into_inner).clone(),
            })
            .collect();
        snaps.sort_by(|a, b| a.tool_id.cmp(&b.tool_id));
        snaps
    }

    // ─── Internals ──────────────────────────────────────────────────────────

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<RegisteredTool>>> {
        self.tools.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn entry(&self, tool_id: &str) -> Result<Arc<RegisteredTool>, ToolError> {
        self.read()
            .get(tool_id)
            .cloned()
            .ok_or_else(|| ToolError::UnknownTool {
                tool: tool_id.to_string(),
            })
    }

    async fn attempt(
        &self,
        entry: &RegisteredTool,
        payload: Value,
        shared: &SharedMemory,
    ) -> Result<Value, ToolError> {
        match self.policy.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, entry.handler.run(payload, shared))
                .await
                .unwrap_or_else(|_| {
                    Err(ToolError::Timeout {
                        tool: entry.definition.id.clone(),
                        timeout_ms: limit.as_millis() as u64,
                    })
                }),
            None => entry.handler.run(payload, shared).await,
        }
    }
}

/// Structural check: required fields present on an object payload.
///
/// Full JSON Schema validation is left to the handler.
fn check_required(definition: &ToolDefinition, payload: &Value) -> Result<(), ToolError> {
    let Some(required) = definition
        .params_schema
        .get("required")
        .and_then(|r| r.as_array())
    else {
        return Ok(());
    };

    let obj = payload.as_object();
    for field in required.iter().filter_map(|f| f.as_str()) {
        let has_field = obj.map(|o| o.contains_key(field)).unwrap_or(false);
        if !has_field {
            return Err(ToolError::InvalidPayload {
                tool: definition.id.clone(),
                reason: format!("missing required field: '{field}'"),
            });
        }
    }
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::types::ToolCategory;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Echo;

    #[async_trait]
    impl ToolHandler for Echo {
        async fn run(&self, payload: Value, shared: &SharedMemory) -> Result<Value, ToolError> {
            Ok(json!({ "payload": payload, "shared_keys": shared.len() }))
        }
    }

    /// Fails transiently `failures` times, then succeeds.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ToolHandler for Flaky {
        async fn run(&self, _payload: Value, _shared: &SharedMemory) -> Result<Value, ToolError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(ToolError::transient("flaky", "try again"))
            } else {
                Ok(json!("ok"))
            }
        }
    }

    struct Hangs;

    #[async_trait]
    impl ToolHandler for Hangs {
        async fn run(&self, _payload: Value, _shared: &SharedMemory) -> Result<Value, ToolError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(Value::Null)
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
            attempt_timeout: None,
        }
    }

    fn def(id: &str) -> ToolDefinition {
        ToolDefinition::new(id, "test tool", ToolCategory::Other)
    }

    #[test]
    fn register_and_replace() {
        let reg = ToolRegistry::new();
        assert!(!reg.register(def("web_search"), Arc::new(Echo)));
        let replacement = ToolDefinition::new("web_search", "v2", ToolCategory::Search);
        assert!(reg.register(replacement, Arc::new(Echo)));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.get("web_search").unwrap().description, "v2");
    }

    #[test]
    fn list_is_sorted_by_id() {
        let reg = ToolRegistry::new();
        reg.register(def("b"), Arc::new(Echo));
        reg.register(def("a"), Arc::new(Echo));
        let ids: Vec<String> = reg.list().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn validate_required_fields() {
        let reg = ToolRegistry::new();
        reg.register(
            def("content_generator").with_schema(json!({
                "type": "object",
                "required": ["topic"],
            })),
            Arc::new(Echo),
        );

        assert!(reg
            .validate_payload("content_generator", &json!({ "topic": "gears" }))
            .is_ok());
        let err = reg
            .validate_payload("content_generator", &json!({}))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidPayload { .. }));
        assert!(err.to_string().contains("topic"));

        let err = reg.validate_payload("missing", &json!({})).unwrap_err();
        assert!(matches!(err, ToolError::UnknownTool { .. }));
    }

    #[tokio::test]
    async fn run_passes_shared_memory() {
        let reg = ToolRegistry::new();
        reg.register(def("echo"), Arc::new(Echo));
        let mut shared = SharedMemory::new();
        shared.insert("topic".into(), json!("gears"));

        let out = reg.run("echo", json!({ "q": 1 }), &shared).await.unwrap();
        assert_eq!(out["payload"]["q"], 1);
        assert_eq!(out["shared_keys"], 1);

        let usage = reg.usage("echo").unwrap();
        assert_eq!(usage.invocations, 1);
        assert_eq!(usage.failures, 0);
        assert!(usage.last_used.is_some());
    }

    #[tokio::test]
    async fn transient_failure_is_retried() {
        let reg = ToolRegistry::with_policy(fast_policy(2));
        let flaky = Arc::new(Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
        });
        reg.register(def("flaky"), flaky.clone());

        let out = reg.run("flaky", json!({}), &SharedMemory::new()).await.unwrap();
        assert_eq!(out, json!("ok"));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);

        let usage = reg.usage("flaky").unwrap();
        assert_eq!(usage.invocations, 1);
        assert_eq!(usage.retries, 2);
    }

    #[tokio::test]
    async fn retries_exhausted_returns_last_error() {
        let reg = ToolRegistry::with_policy(fast_policy(1));
        let flaky = Arc::new(Flaky {
            failures: 5,
            calls: AtomicU32::new(0),
        });
        reg.register(def("flaky"), flaky.clone());

        let err = reg
            .run("flaky", json!({}), &SharedMemory::new())
            .await
            .unwrap_err();
        assert!(err.is_retriable());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
        assert_eq!(reg.usage("flaky").unwrap().failures, 1);
    }

    #[tokio::test]
    async fn invalid_payload_never_reaches_handler() {
        let reg = ToolRegistry::new();
        let flaky = Arc::new(Flaky {
            failures: 0,
            calls: AtomicU32::new(0),
        });
        reg.register(
            def("strict").with_schema(json!({ "required": ["query"] })),
            flaky.clone(),
        );

        let err = reg
            .run("strict", json!({ "other": 1 }), &SharedMemory::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidPayload { .. }));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn attempt_timeout_is_enforced() {
        let reg = ToolRegistry::with_policy(RetryPolicy {
            max_retries: 0,
            base_delay: Duration::from_millis(1),
            attempt_timeout: Some(Duration::from_millis(50)),
        });
        reg.register(def("hangs"), Arc::new(Hangs));

        let err = reg
            .run("hangs", json!({}), &SharedMemory::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { timeout_ms: 50, .. }));
    }

    #[test]
    fn usage_snapshot_covers_all_tools() {
        let reg = ToolRegistry::new();
        reg.register(def("z"), Arc::new(Echo));
        reg.register(ToolDefinition::new("a", "", ToolCategory::Search), Arc::new(Echo));
        let snaps = reg.usage_snapshot();
        assert_eq!(snaps.len(), 2);
        assert_eq!(snaps[0].tool_id, "a");
        assert_eq!(snaps[0].category, ToolCategory::Search);
        assert_eq!(snaps[1].usage.invocations, 0);
    }
}
