//! Session registry: one entry per connected client.

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::session::session::{Outbound, Session, SessionId};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Concurrent map of live sessions.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
    config: SessionConfig,
}

impl SessionRegistry {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
        }
    }

    /// Register a newly connected client. Returns the session together with
    /// the receiving half of its outbound queue, which the transport pump
    /// (or a test) must drain.
    pub fn connect(
        &self,
        id: SessionId,
    ) -> SessionResult<(Arc<Session>, mpsc::UnboundedReceiver<Outbound>)> {
        match self.sessions.entry(id.clone()) {
            Entry::Occupied(_) => Err(SessionError::DuplicateId(id.to_string())),
            Entry::Vacant(slot) => {
                debug!(session = %id, "Session connected");
                let (session, rx) = Session::new(id, self.config.clone());
                slot.insert(Arc::clone(&session));
                Ok((session, rx))
            }
        }
    }

    /// Resolve a live session by id.
    pub fn get(&self, id: &SessionId) -> SessionResult<Arc<Session>> {
        self.sessions
            .get(id)
            .map(|entry| Arc::clone(&entry))
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Remove and close a session, failing its in-flight round trips.
    pub fn disconnect(&self, id: &SessionId) -> SessionResult<()> {
        let (_, session) = self
            .sessions
            .remove(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        session.close();
        debug!(session = %id, "Session disconnected");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_and_get() {
        let registry = SessionRegistry::new(SessionConfig::default());
        let (session, _rx) = registry.connect("s1".into()).unwrap();

        assert_eq!(registry.len(), 1);
        let found = registry.get(session.id()).unwrap();
        assert_eq!(found.id().as_str(), "s1");
    }

    #[test]
    fn test_duplicate_connect_rejected() {
        let registry = SessionRegistry::new(SessionConfig::default());
        let (_session, _rx) = registry.connect("s1".into()).unwrap();

        let err = registry.connect("s1".into()).unwrap_err();
        assert!(matches!(err, SessionError::DuplicateId(_)));
    }

    #[test]
    fn test_disconnect_closes_session() {
        let registry = SessionRegistry::new(SessionConfig::default());
        let (session, _rx) = registry.connect("s2".into()).unwrap();

        registry.disconnect(&"s2".into()).unwrap();
        assert!(session.is_closed());
        assert!(matches!(
            registry.get(&"s2".into()),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn test_unknown_session_not_found() {
        let registry = SessionRegistry::new(SessionConfig::default());
        assert!(matches!(
            registry.get(&"ghost".into()),
            Err(SessionError::NotFound(_))
        ));
        assert!(matches!(
            registry.disconnect(&"ghost".into()),
            Err(SessionError::NotFound(_))
        ));
    }
}
