//! Agent template registry.
//!
//! Templates are stored behind `Arc` and handed out as snapshots. Replacing
//! a template only affects instances spawned afterwards.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::types::{AgentKind, AgentTemplate};

pub const RESEARCH_AGENT: &str = "research_agent";
pub const ANALYSIS_AGENT: &str = "analysis_agent";
pub const CREATIVE_AGENT: &str = "creative_agent";
pub const PROBLEM_SOLVER_AGENT: &str = "problem_solver_agent";

/// Tool ids referenced by the stock templates.
pub const DEFAULT_TOOL_IDS: &[&str] = &[
    "web_search",
    "academic_search",
    "data_analyzer",
    "content_generator",
    "presentation_builder",
    "calculator",
    "code_executor",
];

#[derive(Default)]
pub struct AgentRegistry {
    templates: RwLock<HashMap<String, Arc<AgentTemplate>>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the research, analysis, creative and
    /// problem-solver templates.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        for template in default_templates() {
            registry.register(template);
        }
        registry
    }

    /// Register a template. Returns `true` if an earlier definition was replaced.
    pub fn register(&self, template: AgentTemplate) -> bool {
        let id = template.id.clone();
        let replaced = self
            .templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), Arc::new(template))
            .is_some();
        if replaced {
            tracing::warn!(template = %id, "agent template re-registered; existing instances keep the old definition");
        } else {
            tracing::info!(template = %id, "agent template registered");
        }
        replaced
    }

    pub fn get(&self, template_id: &str) -> Option<Arc<AgentTemplate>> {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(template_id)
            .cloned()
    }

    /// Template ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn template(
    id: &str,
    kind: AgentKind,
    capabilities: &[&str],
    allowed_tools: &[&str],
) -> AgentTemplate {
    AgentTemplate {
        id: id.to_string(),
        kind,
        capabilities: capabilities.iter().map(|s| s.to_string()).collect(),
        allowed_tools: allowed_tools.iter().map(|s| s.to_string()).collect(),
        default_config: serde_json::Map::new(),
    }
}

fn default_templates() -> Vec<AgentTemplate> {
    let mut creative = template(
        CREATIVE_AGENT,
        AgentKind::Creative,
        &["content_creation", "presentation_design", "storytelling", "explanation"],
        &["content_generator", "presentation_builder"],
    );
    creative
        .default_config
        .insert("tone".into(), serde_json::json!("engaging"));

    vec![
        template(
            RESEARCH_AGENT,
            AgentKind::Research,
            &["information_gathering", "source_evaluation", "summarization"],
            &["web_search", "academic_search"],
        ),
        template(
            ANALYSIS_AGENT,
            AgentKind::Analysis,
            &["data_analysis", "critical_thinking", "comparison", "explanation"],
            &["data_analyzer", "web_search"],
        ),
        creative,
        template(
            PROBLEM_SOLVER_AGENT,
            AgentKind::ProblemSolver,
            &["problem_decomposition", "step_by_step_reasoning", "verification"],
            &["calculator", "code_executor"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_kind() {
        let reg = AgentRegistry::with_defaults();
        assert_eq!(
            reg.ids(),
            vec![ANALYSIS_AGENT, CREATIVE_AGENT, PROBLEM_SOLVER_AGENT, RESEARCH_AGENT]
        );
        assert_eq!(reg.get(CREATIVE_AGENT).unwrap().kind, AgentKind::Creative);
    }

    #[test]
    fn default_tools_are_known() {
        let reg = AgentRegistry::with_defaults();
        for id in reg.ids() {
            for tool in &reg.get(&id).unwrap().allowed_tools {
                assert!(DEFAULT_TOOL_IDS.contains(&tool.as_str()), "{tool}");
            }
        }
    }

    #[test]
    fn re_registration_replaces_but_old_arc_survives() {
        let reg = AgentRegistry::with_defaults();
        let before = reg.get(RESEARCH_AGENT).unwrap();

        let mut replacement = (*before).clone();
        replacement.allowed_tools = vec!["web_search".into()];
        assert!(reg.register(replacement));

        assert_eq!(before.allowed_tools.len(), 2);
        assert_eq!(reg.get(RESEARCH_AGENT).unwrap().allowed_tools.len(), 1);
    }
}
