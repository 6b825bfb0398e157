//! Session context store.
//!
//! Sessions live behind one `Arc<Mutex<Session>>` each. The outer map is only
//! locked long enough to clone that `Arc`, so operations on different
//! sessions never contend, and operations on one session are serialized.
//! No lock here is ever held across an `.await`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::tools::types::SharedMemory;

use super::errors::{CapacityResource, OrchestratorError};
use super::events::{CoreEvent, EventBus};
use super::types::{
    AgentAction, AgentInstance, AgentTemplate, CloseReason, Context, HistoryEntry, Session,
    SessionConfig, SessionInfo, SessionOverrides,
};

type SessionHandle = Arc<Mutex<Session>>;

pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
    defaults: SessionConfig,
    events: EventBus,
}

/// What a step needs to know about its agent, copied out of the session.
#[derive(Debug, Clone)]
pub struct AgentSnapshot {
    pub instance_id: String,
    pub template: Arc<AgentTemplate>,
    pub config: SharedMemory,
}

impl SessionStore {
    pub fn new(defaults: SessionConfig, events: EventBus) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            defaults,
            events,
        }
    }

    pub fn defaults(&self) -> &SessionConfig {
        &self.defaults
    }

    // ─── Lifecycle ──────────────────────────────────────────────────────────

    /// Create a session for a user and return its id.
    pub fn create(&self, user_id: &str, overrides: &SessionOverrides) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let config = self.defaults.merged(overrides);

        let session = Session {
            id: id.clone(),
            user_id: user_id.to_string(),
            config: config.clone(),
            created_at: now,
            last_activity: now,
            closed: None,
            agent_order: Vec::new(),
            agents: HashMap::new(),
            context: Some(Context::default()),
            history: VecDeque::new(),
            tools_used: HashSet::new(),
        };
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), Arc::new(Mutex::new(session)));

        tracing::info!(
            session_id = %id,
            user_id,
            max_agents = config.max_agents,
            max_tools = config.max_tools,
            "session created"
        );
        self.events.emit(CoreEvent::SessionCreated {
            session_id: id.clone(),
            user_id: user_id.to_string(),
        });
        id
    }

    /// Close a session. Closing an already-closed session succeeds.
    pub fn close(&self, session_id: &str) -> Result<(), OrchestratorError> {
        let handle = self.handle(session_id)?;
        let mut session = lock(&handle);
        if session.is_active() {
            close_locked(&mut session, CloseReason::Requested, &self.events);
        }
        Ok(())
    }

    /// Close every active session that has been idle past its timeout.
    /// Returns the ids closed.
    pub fn sweep_expired(&self) -> Vec<String> {
        let now = Utc::now();
        let mut closed = Vec::new();
        for handle in self.handles() {
            let mut session = lock(&handle);
            if session.is_active() && session.is_expired_at(now) {
                close_locked(&mut session, CloseReason::Expired, &self.events);
                closed.push(session.id.clone());
            }
        }
        if !closed.is_empty() {
            tracing::info!(count = closed.len(), "expired sessions swept");
        }
        closed
    }

    /// Drop closed sessions from the store. Returns how many were removed.
    pub fn remove_closed(&self) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, handle| lock(handle).is_active());
        before - sessions.len()
    }

    // ─── Agents ─────────────────────────────────────────────────────────────

    /// Spawn one instance of a template into an active session.
    ///
    /// An unknown id is `SessionNotFound`; a closed or expired session is
    /// reported separately as `SessionInactive` rather than folded into
    /// not-found.
    pub fn spawn_agent(
        &self,
        session_id: &str,
        template: Arc<AgentTemplate>,
        config: SharedMemory,
    ) -> Result<String, OrchestratorError> {
        let handle = self.active_handle(session_id)?;
        let mut session = lock(&handle);
        ensure_active(&mut session, &self.events)?;

        if session.agents.len() >= session.config.max_agents {
            return Err(OrchestratorError::CapacityExceeded {
                session_id: session_id.to_string(),
                resource: CapacityResource::Agents,
                limit: session.config.max_agents,
            });
        }
        let id = spawn_locked(&mut session, template, config, &self.events);
        session.last_activity = Utc::now();
        Ok(id)
    }

    /// Make sure the session has one instance of every template.
    ///
    /// Capacity is checked for all missing templates up front: either every
    /// missing instance is spawned or none is. Returns a snapshot of the
    /// bound instance for every requested template, keyed by template id.
    /// Snapshots outlive a later close, so an execution in flight can finish.
    pub fn ensure_agents(
        &self,
        session_id: &str,
        templates: &[Arc<AgentTemplate>],
    ) -> Result<HashMap<String, AgentSnapshot>, OrchestratorError> {
        let handle = self.active_handle(session_id)?;
        let mut session = lock(&handle);
        ensure_active(&mut session, &self.events)?;

        let mut bound: HashMap<String, String> = HashMap::new();
        let mut missing: Vec<Arc<AgentTemplate>> = Vec::new();
        for template in templates {
            if bound.contains_key(&template.id) || missing.iter().any(|t| t.id == template.id) {
                continue;
            }
            match session.instance_for_template(&template.id) {
                Some(instance) => {
                    bound.insert(template.id.clone(), instance.id.clone());
                }
                None => missing.push(template.clone()),
            }
        }

        if session.agents.len() + missing.len() > session.config.max_agents {
            return Err(OrchestratorError::CapacityExceeded {
                session_id: session_id.to_string(),
                resource: CapacityResource::Agents,
                limit: session.config.max_agents,
            });
        }

        for template in missing {
            let template_id = template.id.clone();
            let instance_id = spawn_locked(&mut session, template, SharedMemory::new(), &self.events);
            bound.insert(template_id, instance_id);
        }
        session.last_activity = Utc::now();

        Ok(bound
            .into_iter()
            .filter_map(|(template_id, instance_id)| {
                let instance = session.agents.get(&instance_id)?;
                Some((
                    template_id,
                    AgentSnapshot {
                        instance_id,
                        template: instance.template.clone(),
                        config: instance.config.clone(),
                    },
                ))
            })
            .collect())
    }

    /// Current shared memory, or `None` once the session is closed.
    pub fn shared_snapshot(&self, session_id: &str) -> Option<SharedMemory> {
        self.with_open_session(session_id, |session| {
            session
                .context
                .as_ref()
                .map(|c| c.shared_memory.clone())
                .unwrap_or_default()
        })
    }

    /// Append to an instance's execution history and record its last result.
    ///
    /// No-op once the session is closed.
    pub fn record_agent_action(&self, session_id: &str, instance_id: &str, action: AgentAction) {
        self.with_open_session(session_id, |session| {
            if let Some(context) = session.context.as_mut() {
                context
                    .agent_memory
                    .entry(instance_id.to_string())
                    .or_default()
                    .insert("last_result".into(), Value::String(action.result.clone()));
            }
            if let Some(instance) = session.agents.get_mut(instance_id) {
                instance.history.push(action);
            }
        });
    }

    /// Instance ids in spawn order.
    pub fn agent_ids(&self, session_id: &str) -> Result<Vec<String>, OrchestratorError> {
        let handle = self.handle(session_id)?;
        let session = lock(&handle);
        Ok(session.agent_order.clone())
    }

    /// An instance's execution history.
    pub fn agent_history(
        &self,
        session_id: &str,
        instance_id: &str,
    ) -> Result<Vec<AgentAction>, OrchestratorError> {
        let handle = self.handle(session_id)?;
        let session = lock(&handle);
        Ok(session
            .agents
            .get(instance_id)
            .map(|a| a.history.clone())
            .unwrap_or_default())
    }

    // ─── Tools ──────────────────────────────────────────────────────────────

    /// Record that a session is about to use these tools, enforcing its
    /// distinct-tool limit. No-op once the session is closed.
    pub fn reserve_tools(&self, session_id: &str, tools: &[String]) -> Result<(), OrchestratorError> {
        self.with_open_session(session_id, |session| {
            let new: HashSet<&String> = tools
                .iter()
                .filter(|t| !session.tools_used.contains(*t))
                .collect();
            if session.tools_used.len() + new.len() > session.config.max_tools {
                return Err(OrchestratorError::CapacityExceeded {
                    session_id: session.id.clone(),
                    resource: CapacityResource::Tools,
                    limit: session.config.max_tools,
                });
            }
            for tool in new {
                session.tools_used.insert(tool.clone());
            }
            Ok(())
        })
        .unwrap_or(Ok(()))
    }

    // ─── Memory & History ───────────────────────────────────────────────────

    pub fn shared_memory(&self, session_id: &str) -> Result<SharedMemory, OrchestratorError> {
        let handle = self.active_handle(session_id)?;
        let mut session = lock(&handle);
        ensure_active(&mut session, &self.events)?;
        Ok(session
            .context
            .as_ref()
            .map(|c| c.shared_memory.clone())
            .unwrap_or_default())
    }

    pub fn set_shared(&self, session_id: &str, key: &str, value: Value) -> Result<(), OrchestratorError> {
        let handle = self.active_handle(session_id)?;
        let mut session = lock(&handle);
        ensure_active(&mut session, &self.events)?;
        if let Some(context) = session.context.as_mut() {
            context.shared_memory.insert(key.to_string(), value);
        }
        session.last_activity = Utc::now();
        Ok(())
    }

    pub fn agent_memory(
        &self,
        session_id: &str,
        instance_id: &str,
    ) -> Result<SharedMemory, OrchestratorError> {
        let handle = self.active_handle(session_id)?;
        let mut session = lock(&handle);
        ensure_active(&mut session, &self.events)?;
        Ok(session
            .context
            .as_ref()
            .and_then(|c| c.agent_memory.get(instance_id))
            .cloned()
            .unwrap_or_default())
    }

    /// Write a step result into shared memory. No-op once the session is closed.
    pub fn write_shared_in_flight(&self, session_id: &str, key: String, value: Value) {
        self.with_open_session(session_id, |session| {
            if let Some(context) = session.context.as_mut() {
                context.shared_memory.insert(key, value);
            }
        });
    }

    /// Append to the bounded message history. No-op once the session is closed.
    pub fn append_history(&self, session_id: &str, entry: HistoryEntry) {
        self.with_open_session(session_id, |session| session.push_history(entry));
    }

    pub fn history(&self, session_id: &str) -> Result<Vec<HistoryEntry>, OrchestratorError> {
        let handle = self.handle(session_id)?;
        let session = lock(&handle);
        Ok(session.history.iter().cloned().collect())
    }

    pub fn push_execution(&self, session_id: &str, execution_id: &str) {
        self.with_open_session(session_id, |session| {
            if let Some(context) = session.context.as_mut() {
                context.execution_stack.push(execution_id.to_string());
            }
        });
    }

    pub fn pop_execution(&self, session_id: &str, execution_id: &str) {
        self.with_open_session(session_id, |session| {
            if let Some(context) = session.context.as_mut() {
                if let Some(pos) = context.execution_stack.iter().rposition(|e| e == execution_id) {
                    context.execution_stack.remove(pos);
                }
            }
        });
    }

    // ─── Queries ────────────────────────────────────────────────────────────

    /// Check that a session is usable and mark it as active now.
    pub fn touch(&self, session_id: &str) -> Result<(), OrchestratorError> {
        let handle = self.active_handle(session_id)?;
        let mut session = lock(&handle);
        ensure_active(&mut session, &self.events)?;
        session.last_activity = Utc::now();
        Ok(())
    }

    pub fn user_id(&self, session_id: &str) -> Result<String, OrchestratorError> {
        let handle = self.handle(session_id)?;
        let session = lock(&handle);
        Ok(session.user_id.clone())
    }

    /// Read-only view. Also answers for closed sessions (with `active: false`).
    /// A session idle past its timeout reads as inactive even before it is
    /// swept.
    pub fn info(&self, session_id: &str) -> Result<SessionInfo, OrchestratorError> {
        let handle = self.handle(session_id)?;
        let session = lock(&handle);
        let now = Utc::now();

        let mut shared_memory_keys: Vec<String> = session
            .context
            .as_ref()
            .map(|c| c.shared_memory.keys().cloned().collect())
            .unwrap_or_default();
        shared_memory_keys.sort();
        let mut tools_used: Vec<String> = session.tools_used.iter().cloned().collect();
        tools_used.sort();

        Ok(SessionInfo {
            session_id: session.id.clone(),
            user_id: session.user_id.clone(),
            active: is_live_at(&session, now),
            config: session.config.clone(),
            created_at: session.created_at,
            last_activity: session.last_activity,
            active_agents: session.agent_order.clone(),
            history_len: session.history.len(),
            shared_memory_keys,
            tools_used,
            running_executions: session
                .context
                .as_ref()
                .map(|c| c.execution_stack.len())
                .unwrap_or(0),
        })
    }

    pub fn total(&self) -> usize {
        self.read().len()
    }

    /// Sessions that are open and not yet idle past their timeout.
    pub fn active_count(&self) -> usize {
        let now = Utc::now();
        self.handles()
            .iter()
            .filter(|h| is_live_at(&lock(h), now))
            .count()
    }

    /// Agent instances across all active sessions.
    pub fn live_agents(&self) -> usize {
        self.handles().iter().map(|h| lock(h).agents.len()).sum()
    }

    // ─── Internals ──────────────────────────────────────────────────────────

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, SessionHandle>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn handles(&self) -> Vec<SessionHandle> {
        self.read().values().cloned().collect()
    }

    fn handle(&self, session_id: &str) -> Result<SessionHandle, OrchestratorError> {
        self.read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| OrchestratorError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    /// Like `handle`, but a closed session is `SessionInactive`.
    fn active_handle(&self, session_id: &str) -> Result<SessionHandle, OrchestratorError> {
        let handle = self.handle(session_id)?;
        if !lock(&handle).is_active() {
            return Err(OrchestratorError::SessionInactive {
                session_id: session_id.to_string(),
            });
        }
        Ok(handle)
    }

    /// Run `f` on the session if it exists and is still open.
    fn with_open_session<R>(&self, session_id: &str, f: impl FnOnce(&mut Session) -> R) -> Option<R> {
        let handle = self.handle(session_id).ok()?;
        let mut session = lock(&handle);
        if !session.is_active() {
            tracing::debug!(session_id, "session closed, in-flight write skipped");
            return None;
        }
        Some(f(&mut session))
    }
}

fn lock(handle: &SessionHandle) -> MutexGuard<'_, Session> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Reject closed sessions; close and reject expired ones.
fn is_live_at(session: &Session, now: DateTime<Utc>) -> bool {
    session.is_active() && !session.is_expired_at(now)
}

fn ensure_active(session: &mut Session, events: &EventBus) -> Result<(), OrchestratorError> {
    if session.is_active() && session.is_expired_at(Utc::now()) {
        close_locked(session, CloseReason::Expired, events);
    }
    if session.is_active() {
        Ok(())
    } else {
        Err(OrchestratorError::SessionInactive {
            session_id: session.id.clone(),
        })
    }
}

fn close_locked(session: &mut Session, reason: CloseReason, events: &EventBus) {
    session.closed = Some(reason);
    session.context = None;
    session.agents.clear();
    session.agent_order.clear();
    tracing::info!(session_id = %session.id, reason = ?reason, "session closed");
    events.emit(CoreEvent::SessionClosed {
        session_id: session.id.clone(),
        reason,
    });
}

fn spawn_locked(
    session: &mut Session,
    template: Arc<AgentTemplate>,
    config: SharedMemory,
    events: &EventBus,
) -> String {
    let instance_id = format!("{}-{}", template.id, uuid::Uuid::new_v4().simple());
    let mut merged = template.default_config.clone();
    merged.extend(config);

    let instance = AgentInstance {
        id: instance_id.clone(),
        session_id: session.id.clone(),
        template: template.clone(),
        config: merged,
        history: Vec::new(),
        created_at: Utc::now(),
    };
    session.agents.insert(instance_id.clone(), instance);
    session.agent_order.push(instance_id.clone());
    if let Some(context) = session.context.as_mut() {
        context.agent_memory.insert(instance_id.clone(), SharedMemory::new());
    }

    tracing::info!(
        session_id = %session.id,
        instance_id = %instance_id,
        template = %template.id,
        agents = session.agents.len(),
        "agent spawned"
    );
    events.emit(CoreEvent::AgentSpawned {
        session_id: session.id.clone(),
        instance_id: instance_id.clone(),
        template_id: template.id.clone(),
    });
    instance_id
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_core::agents::{AgentRegistry, CREATIVE_AGENT, RESEARCH_AGENT};

    fn store() -> SessionStore {
        SessionStore::new(SessionConfig::default(), EventBus::new())
    }

    fn research() -> Arc<AgentTemplate> {
        AgentRegistry::with_defaults().get(RESEARCH_AGENT).unwrap()
    }

    #[test]
    fn close_is_idempotent() {
        let store = store();
        let id = store.create("u1", &SessionOverrides::default());
        store.close(&id).unwrap();
        store.close(&id).unwrap();
        assert!(!store.info(&id).unwrap().active);
    }

    #[test]
    fn closing_unknown_session_is_not_found() {
        let err = store().close("nope").unwrap_err();
        assert!(matches!(err, OrchestratorError::SessionNotFound { .. }));
    }

    #[test]
    fn sixth_spawn_exceeds_capacity() {
        let store = store();
        let id = store.create("u1", &SessionOverrides::default());
        let mut spawned = Vec::new();
        for _ in 0..5 {
            spawned.push(store.spawn_agent(&id, research(), SharedMemory::new()).unwrap());
        }
        let err = store
            .spawn_agent(&id, research(), SharedMemory::new())
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::CapacityExceeded {
                resource: CapacityResource::Agents,
                limit: 5,
                ..
            }
        ));
        assert_eq!(store.info(&id).unwrap().active_agents, spawned);
    }

    #[test]
    fn instance_ids_are_unique_per_spawn() {
        let store = store();
        let id = store.create("u1", &SessionOverrides::default());
        let a = store.spawn_agent(&id, research(), SharedMemory::new()).unwrap();
        let b = store.spawn_agent(&id, research(), SharedMemory::new()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn spawn_into_closed_session_is_inactive() {
        let store = store();
        let id = store.create("u1", &SessionOverrides::default());
        store.close(&id).unwrap();
        let err = store
            .spawn_agent(&id, research(), SharedMemory::new())
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::SessionInactive { .. }));
    }

    #[test]
    fn spawn_config_overlays_template_defaults() {
        let store = store();
        let id = store.create("u1", &SessionOverrides::default());
        let creative = AgentRegistry::with_defaults().get(CREATIVE_AGENT).unwrap();
        let mut config = SharedMemory::new();
        config.insert("audience".into(), serde_json::json!("grade 8"));
        let instance = store.spawn_agent(&id, creative.clone(), config).unwrap();

        let bindings = store.ensure_agents(&id, &[creative]).unwrap();
        let snap = &bindings[CREATIVE_AGENT];
        assert_eq!(snap.instance_id, instance);
        assert_eq!(snap.config["tone"], "engaging");
        assert_eq!(snap.config["audience"], "grade 8");
    }

    #[test]
    fn ensure_agents_is_all_or_nothing() {
        let store = store();
        let id = store.create(
            "u1",
            &SessionOverrides {
                max_agents: Some(2),
                ..SessionOverrides::default()
            },
        );
        store.spawn_agent(&id, research(), SharedMemory::new()).unwrap();

        let reg = AgentRegistry::with_defaults();
        let wanted: Vec<Arc<AgentTemplate>> = ["analysis_agent", "creative_agent"]
            .iter()
            .map(|t| reg.get(t).unwrap())
            .collect();
        let err = store.ensure_agents(&id, &wanted).unwrap_err();
        assert!(matches!(err, OrchestratorError::CapacityExceeded { .. }));
        assert_eq!(store.info(&id).unwrap().active_agents.len(), 1);
    }

    #[test]
    fn ensure_agents_reuses_existing() {
        let store = store();
        let id = store.create("u1", &SessionOverrides::default());
        let existing = store.spawn_agent(&id, research(), SharedMemory::new()).unwrap();
        let bindings = store.ensure_agents(&id, &[research(), research()]).unwrap();
        assert_eq!(bindings[RESEARCH_AGENT].instance_id, existing);
        assert_eq!(store.info(&id).unwrap().active_agents.len(), 1);
    }

    #[test]
    fn zero_timeout_session_expires() {
        let store = store();
        let id = store.create(
            "u1",
            &SessionOverrides {
                inactivity_timeout_secs: Some(0),
                ..SessionOverrides::default()
            },
        );
        let err = store.touch(&id).unwrap_err();
        assert!(matches!(err, OrchestratorError::SessionInactive { .. }));
        assert!(!store.info(&id).unwrap().active);
    }

    #[test]
    fn idle_session_reads_inactive_before_sweep() {
        let store = store();
        let idle = store.create(
            "u1",
            &SessionOverrides {
                inactivity_timeout_secs: Some(0),
                ..SessionOverrides::default()
            },
        );
        store.create("u2", &SessionOverrides::default());

        assert!(!store.info(&idle).unwrap().active);
        assert_eq!(store.active_count(), 1);
        assert_eq!(store.sweep_expired(), vec![idle]);
    }

    #[test]
    fn sweep_and_remove() {
        let store = store();
        let stale = store.create(
            "u1",
            &SessionOverrides {
                inactivity_timeout_secs: Some(0),
                ..SessionOverrides::default()
            },
        );
        let fresh = store.create("u2", &SessionOverrides::default());

        assert_eq!(store.sweep_expired(), vec![stale.clone()]);
        assert_eq!(store.active_count(), 1);
        assert_eq!(store.remove_closed(), 1);
        assert_eq!(store.total(), 1);
        assert!(store.info(&fresh).unwrap().active);
        assert!(matches!(
            store.info(&stale).unwrap_err(),
            OrchestratorError::SessionNotFound { .. }
        ));
    }

    #[test]
    fn tool_limit_counts_distinct_tools() {
        let store = store();
        let id = store.create(
            "u1",
            &SessionOverrides {
                max_tools: Some(2),
                ..SessionOverrides::default()
            },
        );
        store
            .reserve_tools(&id, &["web_search".into(), "web_search".into()])
            .unwrap();
        store.reserve_tools(&id, &["calculator".into()]).unwrap();
        store.reserve_tools(&id, &["web_search".into()]).unwrap();
        let err = store
            .reserve_tools(&id, &["data_analyzer".into()])
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::CapacityExceeded {
                resource: CapacityResource::Tools,
                ..
            }
        ));
    }

    #[test]
    fn history_is_bounded() {
        let store = SessionStore::new(
            SessionConfig {
                history_limit: 2,
                ..SessionConfig::default()
            },
            EventBus::new(),
        );
        let id = store.create("u1", &SessionOverrides::default());
        for i in 0..3 {
            store.append_history(
                &id,
                HistoryEntry {
                    role: crate::agent_core::types::Role::User,
                    content: format!("m{i}"),
                    at: Utc::now(),
                    execution_id: None,
                },
            );
        }
        let history = store.history(&id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "m1");
    }

    #[test]
    fn closing_releases_context_and_skips_in_flight_writes() {
        let store = store();
        let id = store.create("u1", &SessionOverrides::default());
        store.set_shared(&id, "topic", serde_json::json!("gears")).unwrap();
        store.close(&id).unwrap();

        store.write_shared_in_flight(&id, "late".into(), serde_json::json!(1));
        let info = store.info(&id).unwrap();
        assert!(info.shared_memory_keys.is_empty());
        assert!(info.active_agents.is_empty());
        assert!(matches!(
            store.shared_memory(&id).unwrap_err(),
            OrchestratorError::SessionInactive { .. }
        ));
    }

    #[tokio::test]
    async fn lifecycle_events_are_published() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let store = SessionStore::new(SessionConfig::default(), bus);
        let id = store.create("u1", &SessionOverrides::default());
        store.spawn_agent(&id, research(), SharedMemory::new()).unwrap();
        store.close(&id).unwrap();
        store.close(&id).unwrap();

        assert!(matches!(rx.recv().await.unwrap(), CoreEvent::SessionCreated { .. }));
        assert!(matches!(rx.recv().await.unwrap(), CoreEvent::AgentSpawned { .. }));
        assert!(matches!(rx.recv().await.unwrap(), CoreEvent::SessionClosed { .. }));
        assert!(rx.try_recv().is_err());
    }
}
