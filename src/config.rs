//! Core configuration loading and validation.
//!
//! Reads `config/tutor-core.yaml` and resolves environment variables. Every
//! section is optional; an empty document yields the built-in defaults.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::agent_core::types::SessionConfig;
use crate::routing::types::{GenerationConfig, ModelDescriptor, PerformanceStats, Specialization};
use crate::tools::RetryPolicy;

/// Env var that points directly at a config file.
pub const CONFIG_ENV_VAR: &str = "TUTOR_CORE_CONFIG";

/// Relative path searched for when walking up from a start directory.
const CONFIG_RELATIVE_PATH: &str = "config/tutor-core.yaml";

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to parse config: {reason}")]
    Parse { reason: String },

    #[error("could not find config/tutor-core.yaml (set TUTOR_CORE_CONFIG to override)")]
    NotFound,

    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}

// ─── Public Types ────────────────────────────────────────────────────────────

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    /// Models in registration order; order breaks scoring ties.
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

/// Plan execution tuning.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    /// Seconds added to a plan's estimated duration per step.
    #[serde(default = "default_per_step_estimate_secs")]
    pub per_step_estimate_secs: u64,
    /// Extra attempts for transient tool failures.
    #[serde(default = "default_tool_retries")]
    pub tool_retries: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Deadline for a single tool attempt.
    #[serde(default)]
    pub tool_timeout_ms: Option<u64>,
    /// Deadline for a whole step (tools plus generation).
    #[serde(default)]
    pub step_timeout_secs: Option<u64>,
    /// Deadline for a single model call.
    #[serde(default)]
    pub model_timeout_secs: Option<u64>,
    #[serde(default)]
    pub generation: GenerationConfig,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            per_step_estimate_secs: default_per_step_estimate_secs(),
            tool_retries: default_tool_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            tool_timeout_ms: None,
            step_timeout_secs: None,
            model_timeout_secs: None,
            generation: GenerationConfig::default(),
        }
    }
}

fn default_per_step_estimate_secs() -> u64 {
    5
}

fn default_tool_retries() -> u32 {
    1
}

fn default_retry_base_delay_ms() -> u64 {
    200
}

/// One routable model as written in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    pub backend: String,
    pub specialization: Specialization,
    pub max_context_length: usize,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    /// Seed statistics, e.g. carried over from a previous run.
    #[serde(default)]
    pub stats: Option<PerformanceStats>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ModelEntry {
    pub fn to_descriptor(&self) -> ModelDescriptor {
        let mut desc = ModelDescriptor::new(
            self.name.clone(),
            self.backend.clone(),
            self.specialization,
            self.max_context_length,
        );
        desc.base_url = self.base_url.clone();
        desc.model_id = self.model_id.clone();
        desc.active = self.active;
        if let Some(stats) = &self.stats {
            desc.stats = stats.clone();
        }
        desc
    }
}

impl CoreConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.execution.tool_retries,
            base_delay: Duration::from_millis(self.execution.retry_base_delay_ms),
            attempt_timeout: self.execution.tool_timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn model_descriptors(&self) -> Vec<ModelDescriptor> {
        self.models.iter().map(ModelEntry::to_descriptor).collect()
    }

    /// Reject configurations the core cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.max_agents == 0 {
            return Err(ConfigError::Invalid {
                reason: "session.max_agents must be at least 1".into(),
            });
        }
        if self.session.history_limit == 0 {
            return Err(ConfigError::Invalid {
                reason: "session.history_limit must be at least 1".into(),
            });
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            if !seen.insert(model.name.as_str()) {
                return Err(ConfigError::Invalid {
                    reason: format!("duplicate model name '{}'", model.name),
                });
            }
            if model.max_context_length == 0 {
                return Err(ConfigError::Invalid {
                    reason: format!("model '{}' has max_context_length 0", model.name),
                });
            }
        }
        Ok(())
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Locate the config file.
///
/// `TUTOR_CORE_CONFIG` wins when it names an existing file; otherwise walks
/// upward from `start` looking for `config/tutor-core.yaml`.
pub fn find_config_path(start: &Path) -> Result<PathBuf, ConfigError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(expand_tilde(&path));
        if candidate.exists() {
            return Ok(candidate);
        }
        tracing::warn!(path = %candidate.display(), "TUTOR_CORE_CONFIG points at a missing file");
    }

    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_RELATIVE_PATH);
        if candidate.exists() {
            return Ok(candidate);
        }
        if !dir.pop() {
            break;
        }
    }

    Err(ConfigError::NotFound)
}

/// Load, interpolate, parse and validate a config file.
pub fn load_config(path: &Path) -> Result<CoreConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    let config = parse_config(&raw)?;
    tracing::info!(
        path = %path.display(),
        models = config.models.len(),
        max_agents = config.session.max_agents,
        "core config loaded"
    );
    Ok(config)
}

/// Parse a config document from a string.
pub fn parse_config(raw: &str) -> Result<CoreConfig, ConfigError> {
    let interpolated = interpolate_env_vars(raw);
    // An empty (or comment-only) document deserializes as null.
    let config: Option<CoreConfig> =
        serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
    let config = config.unwrap_or_default();
    config.validate()?;
    Ok(config)
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                expr.push(c);
            }
            result.push_str(&resolve_var_expr(&expr));
        } else {
            result.push(ch);
        }
    }

    result
}

fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((name, default)) => std::env::var(name).unwrap_or_else(|_| expand_tilde(default)),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_is_default() {
        let config = parse_config("").unwrap();
        assert_eq!(config.session.max_agents, 5);
        assert_eq!(config.session.max_tools, 10);
        assert_eq!(config.session.inactivity_timeout_secs, 300);
        assert_eq!(config.session.history_limit, 100);
        assert_eq!(config.execution.per_step_estimate_secs, 5);
        assert!(config.models.is_empty());
    }

    #[test]
    fn interpolates_with_default() {
        std::env::remove_var("__TUTOR_CORE_TEST_UNSET__");
        assert_eq!(
            interpolate_env_vars("${__TUTOR_CORE_TEST_UNSET__:-http://localhost:11434/v1}"),
            "http://localhost:11434/v1"
        );
    }

    #[test]
    fn interpolates_with_value() {
        std::env::set_var("__TUTOR_CORE_TEST_URL__", "http://gpu-box:8080/v1");
        assert_eq!(
            interpolate_env_vars("base_url: ${__TUTOR_CORE_TEST_URL__:-x}"),
            "base_url: http://gpu-box:8080/v1"
        );
        std::env::remove_var("__TUTOR_CORE_TEST_URL__");
    }

    #[test]
    fn tilde_is_expanded() {
        let result = expand_tilde("~/tutor");
        assert!(!result.starts_with('~'));
        assert!(result.ends_with("/tutor"));
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let yaml = r#"
session:
  max_agents: 3
execution:
  tool_retries: 0
  step_timeout_secs: 30
models:
  - name: tutor-chat
    backend: ollama
    specialization: chat
    max_context_length: 8000
    base_url: http://localhost:11434/v1
  - name: tutor-reasoner
    backend: llama_cpp
    specialization: reasoning
    max_context_length: 32000
    active: false
    stats:
      average_latency_ms: 400
      success_rate: 98
      user_satisfaction: 4.5
      total_requests: 10
      error_count: 0
"#;
        let config = parse_config(yaml).unwrap();
        assert_eq!(config.session.max_agents, 3);
        assert_eq!(config.session.max_tools, 10);
        assert_eq!(config.execution.tool_retries, 0);
        assert_eq!(config.execution.retry_base_delay_ms, 200);
        assert_eq!(config.execution.step_timeout_secs, Some(30));

        let descs = config.model_descriptors();
        assert_eq!(descs[0].name, "tutor-chat");
        assert!(descs[0].active);
        assert!(!descs[1].active);
        assert_eq!(descs[1].stats.total_requests, 10);
        assert_eq!(config.retry_policy().max_retries, 0);
    }

    #[test]
    fn duplicate_model_names_rejected() {
        let yaml = r#"
models:
  - { name: a, backend: ollama, specialization: chat, max_context_length: 10 }
  - { name: a, backend: ollama, specialization: creative, max_context_length: 10 }
"#;
        let err = parse_config(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn zero_agents_rejected() {
        let err = parse_config("session:\n  max_agents: 0\n").unwrap_err();
        assert!(err.to_string().contains("max_agents"));
    }

    #[test]
    fn load_and_discover_from_disk() {
        let root = tempfile::tempdir().unwrap();
        let config_dir = root.path().join("config");
        std::fs::create_dir_all(&config_dir).unwrap();
        let mut file = std::fs::File::create(config_dir.join("tutor-core.yaml")).unwrap();
        writeln!(file, "session:\n  inactivity_timeout_secs: 60").unwrap();

        let nested = root.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        let found = find_config_path(&nested).unwrap();
        assert_eq!(found, config_dir.join("tutor-core.yaml"));
        let config = load_config(&found).unwrap();
        assert_eq!(config.session.inactivity_timeout_secs, 60);
    }

    #[test]
    fn unreadable_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(&dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
