//! Shared types for model routing.

use serde::{Deserialize, Serialize};

// ─── Model Identity ──────────────────────────────────────────────────────────

/// What a backend model is tuned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specialization {
    Chat,
    Reasoning,
    Technical,
    Creative,
    Academic,
}

impl Specialization {
    /// Map a caller-supplied request type onto the specialization that serves it.
    ///
    /// Unknown request types map to `None` and earn no specialization bonus.
    pub fn for_request_type(request_type: &str) -> Option<Self> {
        match request_type {
            "chat" | "conversation" => Some(Specialization::Chat),
            "reasoning" | "analysis" | "problem_solving" => Some(Specialization::Reasoning),
            "technical" | "code" | "engineering" => Some(Specialization::Technical),
            "creative" | "content_generation" => Some(Specialization::Creative),
            "academic" | "educational" => Some(Specialization::Academic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Specialization::Chat => "chat",
            Specialization::Reasoning => "reasoning",
            Specialization::Technical => "technical",
            Specialization::Creative => "creative",
            Specialization::Academic => "academic",
        }
    }
}

/// Running performance statistics for one model.
///
/// Means are maintained incrementally by the registry; they are never
/// recomputed from history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub average_latency_ms: f64,
    /// Percentage in `[0, 100]`.
    pub success_rate: f64,
    /// Mean user rating in `[0, 5]`.
    pub user_satisfaction: f64,
    pub total_requests: u64,
    pub error_count: u64,
    /// Number of outcomes that carried a user rating.
    #[serde(default)]
    pub rated_requests: u64,
}

impl Default for PerformanceStats {
    fn default() -> Self {
        Self {
            average_latency_ms: 1000.0,
            success_rate: 100.0,
            user_satisfaction: 4.0,
            total_requests: 0,
            error_count: 0,
            rated_requests: 0,
        }
    }
}

/// A routable backend model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Unique registry key.
    pub name: String,
    /// Runtime serving the model (e.g. "ollama", "llama_cpp", "openai").
    pub backend: String,
    pub specialization: Specialization,
    /// Longest content (in characters) the model accepts.
    pub max_context_length: usize,
    /// OpenAI-compatible base URL, when the model is served over HTTP.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Backend-side model identifier; defaults to `name`.
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub stats: PerformanceStats,
}

fn default_active() -> bool {
    true
}

impl ModelDescriptor {
    /// Create an active descriptor with default statistics.
    pub fn new(
        name: impl Into<String>,
        backend: impl Into<String>,
        specialization: Specialization,
        max_context_length: usize,
    ) -> Self {
        Self {
            name: name.into(),
            backend: backend.into(),
            specialization,
            max_context_length,
            base_url: None,
            model_id: None,
            active: true,
            stats: PerformanceStats::default(),
        }
    }

    pub fn with_endpoint(mut self, base_url: impl Into<String>, model_id: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self.model_id = Some(model_id.into());
        self
    }

    pub fn with_stats(mut self, stats: PerformanceStats) -> Self {
        self.stats = stats;
        self
    }
}

/// Point-in-time copy of a registered model, including its in-flight load.
#[derive(Debug, Clone, Serialize)]
pub struct ModelSnapshot {
    pub descriptor: ModelDescriptor,
    pub in_flight: u32,
}

// ─── Request Criteria ────────────────────────────────────────────────────────

/// Coarse difficulty of a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

/// Caller-declared urgency of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    High,
}

/// Who is asking, and what they prefer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserContext {
    #[serde(default)]
    pub user_id: Option<String>,
    /// Overrides the preference stored for `user_id`, if any.
    #[serde(default)]
    pub preferred_model_type: Option<Specialization>,
    #[serde(default)]
    pub urgency: Option<Urgency>,
}

impl UserContext {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }
}

/// Features derived from a request before scoring.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestCriteria {
    pub complexity: Complexity,
    /// One of engineering, mathematics, science, programming, business, general.
    pub domain: String,
    pub requires_reasoning: bool,
    pub is_conversational: bool,
    pub is_technical: bool,
    pub requires_creativity: bool,
    /// Content length in characters.
    pub content_length: usize,
    pub urgency: Urgency,
}

// ─── Outcomes & Decisions ────────────────────────────────────────────────────

/// Feedback reported after a dispatched request finishes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub latency_ms: f64,
    pub success: bool,
    /// Optional user rating in `[0, 5]`.
    #[serde(default)]
    pub user_rating: Option<f64>,
}

impl Outcome {
    pub fn success(latency_ms: f64) -> Self {
        Self {
            latency_ms,
            success: true,
            user_rating: None,
        }
    }

    pub fn failure(latency_ms: f64) -> Self {
        Self {
            latency_ms,
            success: false,
            user_rating: None,
        }
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.user_rating = Some(rating);
        self
    }
}

/// Score assigned to one candidate during selection.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateScore {
    pub model: String,
    pub score: f64,
    pub exceeds_context: bool,
}

/// Result of routing a request: the chosen model plus the evidence.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingDecision {
    pub model: ModelDescriptor,
    pub score: f64,
    pub criteria: RequestCriteria,
    /// Every scored candidate, in registry order.
    pub candidates: Vec<CandidateScore>,
}

/// Sampling parameters passed to the backend for one generation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

/// Text produced by a routed backend call.
#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    pub model: String,
    pub text: String,
    pub latency_ms: f64,
}
