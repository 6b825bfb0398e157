//! Routing façade.
//!
//! Pairs the model registry with a `ModelInvoker`: selects a model, marks the
//! dispatch, calls the backend and reports the measured outcome back into the
//! registry. Also keeps each user's preferred model type.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use super::client::ModelInvoker;
use super::errors::RoutingError;
use super::registry::ModelRegistry;
use super::types::{
    Completion, GenerationConfig, ModelSnapshot, Outcome, RoutingDecision, Specialization,
    UserContext,
};

/// Model selection and invocation for the rest of the core.
pub struct ModelRouter {
    registry: Arc<ModelRegistry>,
    invoker: Arc<dyn ModelInvoker>,
    preferences: RwLock<HashMap<String, Specialization>>,
    /// Hard deadline for a single backend call, if any.
    call_timeout: Option<Duration>,
}

impl ModelRouter {
    pub fn new(registry: Arc<ModelRegistry>, invoker: Arc<dyn ModelInvoker>) -> Self {
        Self {
            registry,
            invoker,
            preferences: RwLock::new(HashMap::new()),
            call_timeout: None,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Store the model type a user prefers; used when a request's context
    /// does not name one.
    pub fn set_user_preference(&self, user_id: &str, preferred: Specialization) {
        self.preferences
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id.to_string(), preferred);
        tracing::info!(user_id, preferred = preferred.as_str(), "user model preference stored");
    }

    pub fn user_preference(&self, user_id: &str) -> Option<Specialization> {
        self.preferences
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .copied()
    }

    /// Select a model for a request and mark it as dispatched.
    ///
    /// The caller owns the dispatch from here on and must report it through
    /// [`ModelRouter::record_outcome`], which releases the load.
    pub fn route(
        &self,
        request_type: &str,
        content: &str,
        user: &UserContext,
    ) -> Result<RoutingDecision, RoutingError> {
        let user = self.resolve_preference(user);
        let decision = self.registry.select(request_type, content, &user)?;
        self.registry.begin_dispatch(&decision.model.name)?;

        tracing::info!(
            request_type,
            model = %decision.model.name,
            score = decision.score,
            domain = %decision.criteria.domain,
            complexity = ?decision.criteria.complexity,
            "request routed"
        );
        Ok(decision)
    }

    /// Report how a dispatched request went.
    pub fn record_outcome(&self, model: &str, outcome: Outcome) -> Result<(), RoutingError> {
        self.registry.record_outcome(model, outcome)
    }

    /// Route, invoke and report in one call.
    ///
    /// Backend failures are recorded against the model before being returned.
    /// Other errors only release the load. If the returned future is dropped
    /// mid-call, the dispatch is recorded as a failure.
    pub async fn complete(
        &self,
        request_type: &str,
        prompt: &str,
        user: &UserContext,
        config: &GenerationConfig,
    ) -> Result<Completion, RoutingError> {
        let decision = self.route(request_type, prompt, user)?;
        let model = decision.model;
        let start = Instant::now();
        let mut guard = DispatchGuard {
            registry: &self.registry,
            model: model.name.clone(),
            start,
            armed: true,
        };

        let result = match self.call_timeout {
            Some(limit) => {
                match tokio::time::timeout(limit, self.invoker.invoke(&model, prompt, config)).await
                {
                    Ok(inner) => inner,
                    Err(_) => Err(RoutingError::Timeout {
                        model: model.name.clone(),
                        duration_ms: limit.as_millis() as u64,
                    }),
                }
            }
            None => self.invoker.invoke(&model, prompt, config).await,
        };
        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
        guard.armed = false;

        match result {
            Ok(text) => {
                self.registry
                    .record_outcome(&model.name, Outcome::success(latency_ms))?;
                Ok(Completion {
                    model: model.name,
                    text,
                    latency_ms,
                })
            }
            Err(e) if e.is_backend_failure() => {
                tracing::warn!(model = %model.name, error = %e, latency_ms, "model call failed");
                self.registry
                    .record_outcome(&model.name, Outcome::failure(latency_ms))?;
                Err(e)
            }
            Err(e) => {
                tracing::warn!(model = %model.name, error = %e, "model call rejected before dispatch");
                self.registry.release_dispatch(&model.name)?;
                Err(e)
            }
        }
    }

    pub fn models(&self) -> Vec<ModelSnapshot> {
        self.registry.snapshot()
    }

    fn resolve_preference(&self, user: &UserContext) -> UserContext {
        let mut resolved = user.clone();
        if resolved.preferred_model_type.is_none() {
            if let Some(user_id) = resolved.user_id.as_deref() {
                resolved.preferred_model_type = self.user_preference(user_id);
            }
        }
        resolved
    }
}

/// Records a failure for a dispatch whose call was abandoned, e.g. when an
/// outer deadline drops the `complete` future.
struct DispatchGuard<'a> {
    registry: &'a ModelRegistry,
    model: String,
    start: Instant,
    armed: bool,
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let latency_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        tracing::warn!(model = %self.model, latency_ms, "model call abandoned");
        if let Err(e) = self
            .registry
            .record_outcome(&self.model, Outcome::failure(latency_ms))
        {
            tracing::error!(model = %self.model, error = %e, "failed to record abandoned call");
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
