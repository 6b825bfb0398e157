//! Heuristic intent classifier.
//!
//! Ordered keyword tables, first hit wins. Same input, same `Intent`.

use crate::routing::types::Complexity;
use crate::text::contains_any;

use super::types::{Intent, IntentType};

/// Checked in order; confidence is fixed per intent type.
const INTENT_TABLE: &[(IntentType, f64, &[&str])] = &[
    (
        IntentType::InformationRetrieval,
        0.8,
        &[
            "search", "find", "look up", "research", "papers", "sources", "articles",
            "information about",
        ],
    ),
    (
        IntentType::Analysis,
        0.75,
        &["analyze", "analyse", "compare", "evaluate", "assess", "examine", "pros and cons"],
    ),
    (
        IntentType::ContentCreation,
        0.8,
        &["create", "write", "generate", "make", "design", "draft", "presentation", "compose"],
    ),
    (
        IntentType::ProblemSolving,
        0.75,
        &["solve", "calculate", "compute", "fix", "debug", "problem", "figure out"],
    ),
    (
        IntentType::Educational,
        0.7,
        &["explain", "teach", "learn", "understand", "what is", "how does", "tutorial"],
    ),
];

const UNKNOWN_CONFIDENCE: f64 = 0.5;

/// Content longer than this (in characters) is high complexity.
const HIGH_COMPLEXITY_CHARS: usize = 500;
/// Content shorter than this is low complexity.
const LOW_COMPLEXITY_CHARS: usize = 50;
const HIGH_COMPLEXITY_KEYWORDS: &[&str] = &["complex", "detailed"];

/// Classify a raw message.
pub fn classify(message: &str) -> Intent {
    let lower = message.to_lowercase();

    let (intent_type, confidence) = INTENT_TABLE
        .iter()
        .find(|(_, _, keywords)| contains_any(&lower, keywords))
        .map(|(t, c, _)| (*t, *c))
        .unwrap_or((IntentType::Unknown, UNKNOWN_CONFIDENCE));

    let intent = Intent {
        intent_type,
        confidence,
        required_capabilities: required_capabilities(intent_type)
            .iter()
            .map(|c| c.to_string())
            .collect(),
        complexity: message_complexity(message, &lower),
    };

    tracing::debug!(
        intent = intent_type.as_str(),
        confidence,
        complexity = ?intent.complexity,
        "message classified"
    );
    intent
}

fn message_complexity(message: &str, lower: &str) -> Complexity {
    let chars = message.chars().count();
    if chars > HIGH_COMPLEXITY_CHARS || contains_any(lower, HIGH_COMPLEXITY_KEYWORDS) {
        Complexity::High
    } else if chars < LOW_COMPLEXITY_CHARS {
        Complexity::Low
    } else {
        Complexity::Medium
    }
}

/// Capability tags an agent set needs to serve an intent.
pub fn required_capabilities(intent_type: IntentType) -> &'static [&'static str] {
    match intent_type {
        IntentType::InformationRetrieval => &["information_gathering", "source_evaluation"],
        IntentType::Analysis => &["data_analysis", "critical_thinking"],
        IntentType::ContentCreation => &["content_creation", "presentation_design"],
        IntentType::ProblemSolving => &["problem_decomposition", "step_by_step_reasoning"],
        IntentType::Educational => &["information_gathering", "explanation"],
        IntentType::Unknown => &["information_gathering"],
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_is_information_retrieval() {
        let intent = classify("search for thermodynamics papers");
        assert_eq!(intent.intent_type, IntentType::InformationRetrieval);
        assert_eq!(intent.confidence, 0.8);
        assert_eq!(intent.complexity, Complexity::Low);
        assert_eq!(
            intent.required_capabilities,
            vec!["information_gathering", "source_evaluation"]
        );
    }

    #[test]
    fn presentation_is_content_creation() {
        let intent = classify("Create a presentation about gears");
        assert_eq!(intent.intent_type, IntentType::ContentCreation);
        assert_eq!(intent.confidence, 0.8);
    }

    #[test]
    fn first_table_entry_wins() {
        // "compare" (analysis) and "write" (content creation) both match.
        let intent = classify("compare these and write it up");
        assert_eq!(intent.intent_type, IntentType::Analysis);
        assert_eq!(intent.confidence, 0.75);
    }

    #[test]
    fn other_types() {
        assert_eq!(
            classify("solve x^2 = 4").intent_type,
            IntentType::ProblemSolving
        );
        let edu = classify("explain torque to me");
        assert_eq!(edu.intent_type, IntentType::Educational);
        assert_eq!(edu.confidence, 0.7);
    }

    #[test]
    fn no_match_is_unknown() {
        let intent = classify("hello there");
        assert_eq!(intent.intent_type, IntentType::Unknown);
        assert_eq!(intent.confidence, 0.5);
        assert_eq!(intent.required_capabilities, vec!["information_gathering"]);
    }

    #[test]
    fn complexity_rules() {
        assert_eq!(classify("a detailed question").complexity, Complexity::High);
        assert_eq!(classify(&"word ".repeat(120)).complexity, Complexity::High);
        assert_eq!(
            classify("a question of medium length that is about gear ratios ok").complexity,
            Complexity::Medium
        );
        assert_eq!(classify("short").complexity, Complexity::Low);
    }
}
