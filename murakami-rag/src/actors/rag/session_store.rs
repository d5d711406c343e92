use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::SessionError;
use crate::protocol::{AgentAddress, RequestId};

/// What the RAG agent remembers between forwarding a question and receiving its pages.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub question: String,
    pub requester: AgentAddress,
    pub document_path: String,
    pub opened_at: Instant,
}

/// Outstanding questions keyed by request id.
///
/// Owned by the RAG agent's event loop; nothing else reads or writes it.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: HashMap<RequestId, Session>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking a question. An id that is still awaiting pages is
    /// rejected and the stored session is left as it was.
    pub fn open(&mut self, request_id: RequestId, session: Session) -> Result<(), SessionError> {
        if self.sessions.contains_key(&request_id) {
            return Err(SessionError::AlreadyInProgress(request_id));
        }
        self.sessions.insert(request_id, session);
        Ok(())
    }

    /// Remove and return the session; a second call for the same id yields `None`.
    pub fn take(&mut self, request_id: &RequestId) -> Option<Session> {
        self.sessions.remove(request_id)
    }

    /// Drop sessions opened more than `ttl` before `now`, returning them.
    pub fn prune_expired(&mut self, now: Instant, ttl: Duration) -> Vec<(RequestId, Session)> {
        let expired: Vec<RequestId> = self
            .sessions
            .iter()
            .filter(|(_, s)| now.saturating_duration_since(s.opened_at) > ttl)
            .map(|(id, _)| *id)
            .collect();
        expired
            .into_iter()
            .filter_map(|id| self.sessions.remove(&id).map(|s| (id, s)))
            .collect()
    }

    pub fn contains(&self, request_id: &RequestId) -> bool {
        self.sessions.contains_key(request_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
