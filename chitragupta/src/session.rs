//! Session store for workflow run state
//!
//! Sessions live in process memory only. The store is shared by every
//! in-flight run; each run only ever writes its own session.

use chitragupta_sdk::{async_trait, RunState, Session, SessionError, SessionId, SessionSummary};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A new session and the session the store dropped to make room for it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreatedSession {
    pub id: SessionId,
    pub evicted: Option<SessionId>,
}

/// Keyed storage of sessions
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create an empty session in `Created` state
    async fn create(&self) -> CreatedSession;

    async fn get(&self, id: &SessionId) -> Result<Session, SessionError>;

    /// Set one context key. Visible to the next `get` immediately.
    async fn update(
        &self,
        id: &SessionId,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), SessionError>;

    /// Move the session's stage marker
    async fn set_stage(&self, id: &SessionId, stage: RunState) -> Result<(), SessionError>;

    /// Summaries ordered by creation time, oldest first
    async fn list(&self) -> Vec<SessionSummary>;

    async fn evict(&self, id: &SessionId) -> Result<Session, SessionError>;

    /// Drop every session whose run has reached a terminal state. Returns
    /// the dropped ids.
    async fn cleanup_terminal(&self) -> Vec<SessionId>;
}

/// In-memory session store
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
    /// Soft capacity. When reached, `create` evicts the oldest terminal session.
    max_sessions: Option<usize>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_limit(max_sessions: usize) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_sessions: Some(max_sessions),
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

fn evict_oldest_terminal(sessions: &mut HashMap<SessionId, Session>) -> Option<SessionId> {
    let oldest = sessions
        .values()
        .filter(|s| s.stage.is_terminal())
        .min_by_key(|s| s.created_at)
        .map(|s| s.id)?;
    sessions.remove(&oldest);
    Some(oldest)
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self) -> CreatedSession {
        let session = Session::new(SessionId::new());
        let id = session.id;
        let mut sessions = self.sessions.write().await;
        let mut evicted = None;

        if let Some(limit) = self.max_sessions {
            if sessions.len() >= limit {
                evicted = evict_oldest_terminal(&mut sessions);
                match evicted {
                    Some(evicted) => {
                        tracing::debug!(session_id = %evicted, "evicted oldest finished session")
                    }
                    None => tracing::warn!(
                        limit,
                        active = sessions.len(),
                        "session store over capacity with no finished sessions to evict"
                    ),
                }
            }
        }

        sessions.insert(id, session);
        CreatedSession { id, evicted }
    }

    async fn get(&self, id: &SessionId) -> Result<Session, SessionError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .cloned()
            .ok_or(SessionError::NotFound(*id))
    }

    async fn update(
        &self,
        id: &SessionId,
        key: &str,
        value: serde_json::Value,
    ) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(id).ok_or(SessionError::NotFound(*id))?;
        session.context.insert(key.to_string(), value);
        Ok(())
    }

    async fn set_stage(&self, id: &SessionId, stage: RunState) -> Result<(), SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(id).ok_or(SessionError::NotFound(*id))?;
        session.stage = stage;
        Ok(())
    }

    async fn list(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<SessionSummary> = sessions.values().map(Session::summary).collect();
        summaries.sort_by_key(|s| s.created_at);
        summaries
    }

    async fn evict(&self, id: &SessionId) -> Result<Session, SessionError> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(id).ok_or(SessionError::NotFound(*id))
    }

    async fn cleanup_terminal(&self) -> Vec<SessionId> {
        let mut sessions = self.sessions.write().await;
        let finished: Vec<SessionId> = sessions
            .values()
            .filter(|session| session.stage.is_terminal())
            .map(|session| session.id)
            .collect();
        for id in &finished {
            sessions.remove(id);
        }
        finished
    }
}
