//! Model Routing — picks a backend model for a request and tracks how it did.
//!
//! This module handles:
//! - Request-criteria derivation (complexity, domain, intent flags)
//! - Deterministic candidate scoring and selection
//! - Per-model performance statistics and in-flight load
//! - Backend invocation through the `ModelInvoker` seam
//!
//! Scores are reproducible for a given registry state: the weighting
//! constants in `registry` are part of the routing contract.

pub mod client;
pub mod criteria;
pub mod errors;
pub mod registry;
pub mod router;
pub mod types;

// Re-exports for convenience
pub use client::{HttpModelBackend, ModelInvoker};
pub use errors::RoutingError;
pub use registry::ModelRegistry;
pub use router::ModelRouter;
pub use types::{
    Completion, Complexity, GenerationConfig, ModelDescriptor, ModelSnapshot, Outcome,
    PerformanceStats, RequestCriteria, RoutingDecision, Specialization, Urgency, UserContext,
};
