//! Request-criteria derivation.
//!
//! Turns raw request content into the coarse features the scorer reports
//! alongside its decision. Every rule here is a fixed keyword table so the
//! output is deterministic for a given input.

use crate::text::{contains_any, count_matches};

use super::types::{Complexity, RequestCriteria, UserContext};

// ─── Keyword Tables ─────────────────────────────────────────────────────────

/// The three pattern classes whose combined match count drives complexity.
const ANALYTICAL_PATTERNS: &[&str] = &[
    "analyze", "analyse", "compare", "evaluate", "derive", "prove", "justify", "why",
];
const TECHNICAL_PATTERNS: &[&str] = &[
    "algorithm", "equation", "integral", "derivative", "architecture", "optimiz", "theorem",
    "implementation",
];
const STRUCTURAL_PATTERNS: &[&str] = &[
    "step by step", "detailed", "comprehensive", "in depth", "multiple", "first", "then",
    "finally",
];

/// Domain classes, checked in order; the first class with a hit wins.
const DOMAIN_CLASSES: &[(&str, &[&str])] = &[
    (
        "engineering",
        &["engineering", "mechanical", "gear", "torque", "circuit", "structural", "thermodynamic"],
    ),
    (
        "mathematics",
        &["math", "equation", "algebra", "calculus", "integral", "derivative", "geometry", "theorem"],
    ),
    (
        "science",
        &["physics", "chemistry", "biology", "science", "molecule", "experiment", "quantum"],
    ),
    (
        "programming",
        &["code", "program", "python", "rust", "javascript", "function", "debug", "compile"],
    ),
    (
        "business",
        &["business", "market", "finance", "revenue", "strategy", "management", "startup"],
    ),
];

const REASONING_REQUEST_TYPES: &[&str] = &["reasoning", "analysis", "problem_solving"];
const REASONING_KEYWORDS: &[&str] = &["why", "prove", "reason", "solve", "analyze", "deduce"];

const CONVERSATIONAL_REQUEST_TYPES: &[&str] = &["chat", "conversation"];
const CONVERSATIONAL_KEYWORDS: &[&str] = &["hello", "hi ", "hey", "thanks", "how are you"];

const TECHNICAL_REQUEST_TYPES: &[&str] = &["technical", "code", "engineering"];
const TECHNICAL_DOMAINS: &[&str] = &["engineering", "programming"];

const CREATIVE_REQUEST_TYPES: &[&str] = &["creative", "content_generation"];
const CREATIVE_KEYWORDS: &[&str] = &[
    "create", "write", "story", "design", "imagine", "presentation", "poem",
];

/// Match count above which content is high complexity.
const HIGH_COMPLEXITY_MATCHES: usize = 5;
/// Match count above which content is medium complexity.
const MEDIUM_COMPLEXITY_MATCHES: usize = 2;

// ─── Public API ─────────────────────────────────────────────────────────────

/// Derive scoring criteria from the request type, content and caller context.
pub fn derive_criteria(request_type: &str, content: &str, user: &UserContext) -> RequestCriteria {
    let lower = content.to_lowercase();
    let domain = classify_domain(&lower);

    RequestCriteria {
        complexity: classify_complexity(&lower),
        requires_reasoning: REASONING_REQUEST_TYPES.contains(&request_type)
            || contains_any(&lower, REASONING_KEYWORDS),
        is_conversational: CONVERSATIONAL_REQUEST_TYPES.contains(&request_type)
            || contains_any(&lower, CONVERSATIONAL_KEYWORDS),
        is_technical: TECHNICAL_REQUEST_TYPES.contains(&request_type)
            || TECHNICAL_DOMAINS.contains(&domain),
        requires_creativity: CREATIVE_REQUEST_TYPES.contains(&request_type)
            || contains_any(&lower, CREATIVE_KEYWORDS),
        domain: domain.to_string(),
        content_length: content.chars().count(),
        urgency: user.urgency.unwrap_or_default(),
    }
}

/// Complexity from the combined match count of the three pattern classes.
pub fn classify_complexity(lower: &str) -> Complexity {
    let matches = count_matches(lower, ANALYTICAL_PATTERNS)
        + count_matches(lower, TECHNICAL_PATTERNS)
        + count_matches(lower, STRUCTURAL_PATTERNS);

    if matches > HIGH_COMPLEXITY_MATCHES {
        Complexity::High
    } else if matches > MEDIUM_COMPLEXITY_MATCHES {
        Complexity::Medium
    } else {
        Complexity::Low
    }
}

/// First matching domain class, else "general".
pub fn classify_domain(lower: &str) -> &'static str {
    DOMAIN_CLASSES
        .iter()
        .find(|(_, keywords)| contains_any(lower, keywords))
        .map(|(domain, _)| *domain)
        .unwrap_or("general")
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::types::Urgency;

    #[test]
    fn complexity_thresholds() {
        assert_eq!(classify_complexity("what time is it"), Complexity::Low);
        // analyze, compare, derive, then -> 4 matches
        assert_eq!(
            classify_complexity("analyze and compare, then derive"),
            Complexity::Medium
        );
        // analyze, compare, derive, algorithm, equation, detailed, then -> 7 matches
        assert_eq!(
            classify_complexity(
                "analyze and compare the algorithm, derive the equation, then a detailed proof"
            ),
            Complexity::High
        );
    }

    #[test]
    fn exactly_two_matches_is_low() {
        assert_eq!(classify_complexity("compare and evaluate"), Complexity::Low);
    }

    #[test]
    fn domain_uses_first_matching_class() {
        // "gear" (engineering) beats "equation" (mathematics) by table order
        assert_eq!(classify_domain("gear ratio equation"), "engineering");
        assert_eq!(classify_domain("solve this equation"), "mathematics");
        assert_eq!(classify_domain("debug my python"), "programming");
        assert_eq!(classify_domain("tell me a joke"), "general");
    }

    #[test]
    fn flags_from_request_type_and_keywords() {
        let user = UserContext::default();
        let c = derive_criteria("code", "Write a story about robots", &user);
        assert!(c.is_technical);
        assert!(c.requires_creativity);
        assert!(!c.requires_reasoning);
        assert_eq!(c.urgency, Urgency::Normal);
        assert_eq!(c.content_length, 26);
    }

    #[test]
    fn urgency_comes_from_caller_context() {
        let user = UserContext {
            urgency: Some(Urgency::High),
            ..UserContext::default()
        };
        let c = derive_criteria("chat", "hello", &user);
        assert_eq!(c.urgency, Urgency::High);
        assert!(c.is_conversational);
    }

    #[test]
    fn content_length_counts_characters() {
        let c = derive_criteria("chat", "héllo", &UserContext::default());
        assert_eq!(c.content_length, 5);
    }
}
