//! Model registry and scorer.
//!
//! Holds every known backend model together with its running performance
//! statistics and in-flight load. Models live in an append-only arena indexed
//! by name; each entry has its own mutex so recording an outcome for one model
//! never blocks work on another. The arena lock is only taken for writing on
//! registration.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use super::criteria::derive_criteria;
use super::errors::RoutingError;
use super::types::{
    CandidateScore, ModelDescriptor, ModelSnapshot, Outcome, RequestCriteria, RoutingDecision,
    Specialization, UserContext,
};

// ─── Scoring Weights ────────────────────────────────────────────────────────

/// Bonus for a model whose specialization serves the request type.
const SPECIALIZATION_BONUS: f64 = 50.0;
/// Latency term: `LATENCY_BASE - average_latency_ms / LATENCY_DIVISOR`.
const LATENCY_BASE: f64 = 100.0;
const LATENCY_DIVISOR: f64 = 10.0;
const SUCCESS_RATE_WEIGHT: f64 = 0.3;
const SATISFACTION_WEIGHT: f64 = 10.0;
/// Bonus when the model matches the caller's preferred model type.
const PREFERENCE_BONUS: f64 = 20.0;
/// Penalty per request currently in flight on the model.
const LOAD_PENALTY: f64 = 2.0;
/// Penalty when the content is longer than the model's context.
const CONTEXT_OVERFLOW_PENALTY: f64 = 100.0;

// ─── Registry ───────────────────────────────────────────────────────────────

struct ModelEntry {
    descriptor: ModelDescriptor,
    in_flight: u32,
}

#[derive(Default)]
struct Arena {
    entries: Vec<Arc<Mutex<ModelEntry>>>,
    index: HashMap<String, usize>,
}

/// Concurrency-safe registry of routable models.
#[derive(Default)]
pub struct ModelRegistry {
    arena: RwLock<Arena>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of descriptors, in order.
    pub fn with_models(models: impl IntoIterator<Item = ModelDescriptor>) -> Self {
        let registry = Self::new();
        for model in models {
            registry.register(model);
        }
        registry
    }

    /// Register a model. A later registration under the same name replaces
    /// the descriptor but keeps the original position in iteration order.
    pub fn register(&self, descriptor: ModelDescriptor) {
        let mut arena = self.arena.write().unwrap_or_else(PoisonError::into_inner);
        let name = descriptor.name.clone();

        if let Some(&idx) = arena.index.get(&name) {
            let mut entry = lock(&arena.entries[idx]);
            entry.descriptor = descriptor;
            tracing::warn!(model = %name, "model re-registered; previous descriptor replaced");
            return;
        }

        let idx = arena.entries.len();
        arena.entries.push(Arc::new(Mutex::new(ModelEntry {
            descriptor,
            in_flight: 0,
        })));
        arena.index.insert(name.clone(), idx);
        tracing::info!(model = %name, "model registered");
    }

    /// Enable or disable a model for selection.
    pub fn set_active(&self, name: &str, active: bool) -> Result<(), RoutingError> {
        let entry = self.entry(name)?;
        lock(&entry).descriptor.active = active;
        tracing::info!(model = name, active, "model activation changed");
        Ok(())
    }

    /// Descriptors of all active models, in registration order.
    pub fn list_active(&self) -> Vec<ModelDescriptor> {
        self.entries()
            .iter()
            .filter_map(|e| {
                let entry = lock(e);
                entry.descriptor.active.then(|| entry.descriptor.clone())
            })
            .collect()
    }

    /// Snapshot of every registered model, active or not.
    pub fn snapshot(&self) -> Vec<ModelSnapshot> {
        self.entries()
            .iter()
            .map(|e| {
                let entry = lock(e);
                ModelSnapshot {
                    descriptor: entry.descriptor.clone(),
                    in_flight: entry.in_flight,
                }
            })
            .collect()
    }

    /// Look up a single model.
    pub fn get(&self, name: &str) -> Option<ModelSnapshot> {
        let entry = self.entry(name).ok()?;
        let entry = lock(&entry);
        Some(ModelSnapshot {
            descriptor: entry.descriptor.clone(),
            in_flight: entry.in_flight,
        })
    }

    pub fn len(&self) -> usize {
        self.arena
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ─── Selection ──────────────────────────────────────────────────────

    /// Pick the best active model for a request.
    ///
    /// Does not touch load counters; see [`ModelRegistry::begin_dispatch`].
    /// Returns `ModelNotFound` when there are no active models, or when the
    /// content is longer than every candidate's context.
    pub fn select(
        &self,
        request_type: &str,
        content: &str,
        user: &UserContext,
    ) -> Result<RoutingDecision, RoutingError> {
        let criteria = derive_criteria(request_type, content, user);
        let target = Specialization::for_request_type(request_type);

        let mut candidates = Vec::new();
        let mut best: Option<(f64, ModelDescriptor)> = None;

        for e in self.entries() {
            let (descriptor, in_flight) = {
                let entry = lock(&e);
                if !entry.descriptor.active {
                    continue;
                }
                (entry.descriptor.clone(), entry.in_flight)
            };

            let score = score_model(
                &descriptor,
                target,
                &criteria,
                user.preferred_model_type,
                in_flight,
            );
            tracing::debug!(model = %descriptor.name, score, "scored candidate");

            candidates.push(CandidateScore {
                model: descriptor.name.clone(),
                score,
                exceeds_context: criteria.content_length > descriptor.max_context_length,
            });

            // Strictly greater: ties keep the first model encountered.
            if best.as_ref().map_or(true, |(top, _)| score > *top) {
                best = Some((score, descriptor));
            }
        }

        let Some((score, model)) = best else {
            return Err(RoutingError::ModelNotFound {
                request_type: request_type.to_string(),
                reason: "no active models registered".to_string(),
            });
        };

        if candidates.iter().all(|c| c.exceeds_context) {
            return Err(RoutingError::ModelNotFound {
                request_type: request_type.to_string(),
                reason: format!(
                    "content length {} exceeds the context of every active model",
                    criteria.content_length
                ),
            });
        }

        Ok(RoutingDecision {
            model,
            score,
            criteria,
            candidates,
        })
    }

    // ─── Load & Outcomes ────────────────────────────────────────────────

    /// Mark a request as dispatched to `name`.
    pub fn begin_dispatch(&self, name: &str) -> Result<(), RoutingError> {
        let entry = self.entry(name)?;
        lock(&entry).in_flight += 1;
        Ok(())
    }

    /// Release one unit of in-flight load without touching the statistics.
    ///
    /// For dispatches that never reached the backend.
    pub fn release_dispatch(&self, name: &str) -> Result<(), RoutingError> {
        let entry = self.entry(name)?;
        let mut entry = lock(&entry);
        entry.in_flight = entry.in_flight.saturating_sub(1);
        tracing::debug!(model = name, in_flight = entry.in_flight, "dispatch released");
        Ok(())
    }

    /// Record the outcome of a request served by `name`.
    ///
    /// Updates the running means with `new = (old * (n - 1) + sample) / n`,
    /// where `n` is the post-increment request count. A failure counts as a
    /// `0` success sample. Satisfaction is averaged over rated outcomes only.
    /// Releases one unit of in-flight load.
    ///
    /// A latency that is negative or not finite leaves the latency mean where
    /// it was; a rating that is not finite is dropped.
    pub fn record_outcome(&self, name: &str, outcome: Outcome) -> Result<(), RoutingError> {
        let entry = self.entry(name)?;
        let mut entry = lock(&entry);
        entry.in_flight = entry.in_flight.saturating_sub(1);

        let stats = &mut entry.descriptor.stats;
        stats.total_requests += 1;
        let n = stats.total_requests as f64;

        let latency_sample = if outcome.latency_ms.is_finite() && outcome.latency_ms >= 0.0 {
            outcome.latency_ms
        } else {
            tracing::warn!(model = name, latency_ms = outcome.latency_ms, "invalid latency sample ignored");
            stats.average_latency_ms
        };
        stats.average_latency_ms = running_mean(stats.average_latency_ms, latency_sample, n);
        let success_sample = if outcome.success { 100.0 } else { 0.0 };
        stats.success_rate = running_mean(stats.success_rate, success_sample, n);
        if !outcome.success {
            stats.error_count += 1;
        }

        if let Some(rating) = outcome.user_rating.filter(|r| r.is_finite()) {
            stats.rated_requests += 1;
            let rated = stats.rated_requests as f64;
            stats.user_satisfaction =
                running_mean(stats.user_satisfaction, rating.clamp(0.0, 5.0), rated);
        }

        tracing::info!(
            model = name,
            latency_ms = outcome.latency_ms,
            success = outcome.success,
            total_requests = stats.total_requests,
            average_latency_ms = stats.average_latency_ms,
            success_rate = stats.success_rate,
            "model outcome recorded"
        );
        Ok(())
    }

    // ─── Helpers ────────────────────────────────────────────────────────

    fn entries(&self) -> Vec<Arc<Mutex<ModelEntry>>> {
        self.arena
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .clone()
    }

    fn entry(&self, name: &str) -> Result<Arc<Mutex<ModelEntry>>, RoutingError> {
        let arena = self.arena.read().unwrap_or_else(PoisonError::into_inner);
        arena
            .index
            .get(name)
            .map(|&idx| Arc::clone(&arena.entries[idx]))
            .ok_or_else(|| RoutingError::UnknownModel {
                name: name.to_string(),
            })
    }
}

fn lock(entry: &Mutex<ModelEntry>) -> MutexGuard<'_, ModelEntry> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}

fn running_mean(old: f64, sample: f64, n: f64) -> f64 {
    (old * (n - 1.0) + sample) / n
}

/// Score one candidate.
///
/// `specialization bonus + (100 - latency/10) + success_rate * 0.3
///  + satisfaction * 10 + preference bonus - 2 * load - context penalty`.
pub fn score_model(
    model: &ModelDescriptor,
    target: Option<Specialization>,
    criteria: &RequestCriteria,
    preferred: Option<Specialization>,
    in_flight: u32,
) -> f64 {
    let stats = &model.stats;
    let mut score = 0.0;

    if target == Some(model.specialization) {
        score += SPECIALIZATION_BONUS;
    }
    score += LATENCY_BASE - stats.average_latency_ms / LATENCY_DIVISOR;
    score += stats.success_rate * SUCCESS_RATE_WEIGHT;
    score += stats.user_satisfaction * SATISFACTION_WEIGHT;
    if preferred == Some(model.specialization) {
        score += PREFERENCE_BONUS;
    }
    score -= LOAD_PENALTY * f64::from(in_flight);
    if criteria.content_length > model.max_context_length {
        score -= CONTEXT_OVERFLOW_PENALTY;
    }

    score
}

// ─── Tests ──────────────────────────────────────────────────────────────────
