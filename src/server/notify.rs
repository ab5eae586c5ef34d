//! Client-originated notification routing.
//!
//! Notifications carry no response channel, so handlers here are infallible
//! from the caller's point of view: failures are reported back to the same
//! session as warning-level log notifications and otherwise discarded.

use crate::session::{self, SessionId, SessionRegistry};
use crate::protocol::types::LogMessageParams;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Handler for one client notification kind.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    /// React to the notification. Runs with the originating session bound as
    /// current; must swallow its own failures.
    async fn handle(&self, payload: Option<Value>);
}

/// Routes client notifications to their registered handlers.
pub struct NotificationRouter {
    sessions: Arc<SessionRegistry>,
    handlers: DashMap<String, Arc<dyn NotificationHandler>>,
}

impl NotificationRouter {
    pub fn new(sessions: Arc<SessionRegistry>) -> Self {
        Self {
            sessions,
            handlers: DashMap::new(),
        }
    }

    /// Register the handler for a notification kind, replacing any previous
    /// one.
    pub fn register<H: NotificationHandler + 'static>(&self, kind: impl Into<String>, handler: H) {
        self.handlers.insert(kind.into(), Arc::new(handler));
    }

    /// Dispatch a client notification.
    ///
    /// Unknown kinds are silently ignored for forward compatibility, and an
    /// unknown session only drops the notification: there is no caller to
    /// report either condition to.
    #[instrument(skip(self, payload), fields(session = %session_id, kind = kind))]
    pub async fn on_client_notification(
        &self,
        session_id: &SessionId,
        kind: &str,
        payload: Option<Value>,
    ) {
        let Some(handler) = self.handlers.get(kind).map(|entry| Arc::clone(&entry)) else {
            debug!("Ignoring unregistered notification kind: {}", kind);
            return;
        };

        let session = match self.sessions.get(session_id) {
            Ok(session) => session,
            Err(e) => {
                debug!("Dropping notification: {}", e);
                return;
            }
        };

        session::scope(session, handler.handle(payload)).await;
    }
}

/// Handler for `notifications/roots/list_changed`: re-syncs the roots list
/// from the client and reports the outcome as a log notification.
pub struct RootsListChangedHandler;

#[async_trait]
impl NotificationHandler for RootsListChangedHandler {
    async fn handle(&self, _payload: Option<Value>) {
        let Some(current) = session::current() else {
            return;
        };
        match current.list_roots().await {
            Ok(roots) => {
                current.send_log_notification(LogMessageParams::info(json!({
                    "message": "Roots list updated",
                    "roots": roots,
                })));
            }
            Err(e) => {
                current.send_log_notification(LogMessageParams::warning(json!({
                    "message": "Failed to retrieve updated roots list",
                    "error": e.to_string(),
                })));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::protocol::types::{
        JsonRpcResponse, LogLevel, LogMessageParams as Params, methods,
    };
    use crate::session::Outbound;
    use std::time::Duration;

    const ROOTS_CHANGED: &str = methods::ROOTS_LIST_CHANGED;

    fn setup() -> (Arc<SessionRegistry>, NotificationRouter) {
        let config = SessionConfig {
            roots_request_timeout: Duration::from_millis(100),
            ..SessionConfig::default()
        };
        let sessions = Arc::new(SessionRegistry::new(config));
        let router = NotificationRouter::new(Arc::clone(&sessions));
        router.register(ROOTS_CHANGED, RootsListChangedHandler);
        (sessions, router)
    }

    fn decode_log(outbound: Outbound) -> Params {
        let Outbound::Request(request) = outbound else {
            panic!("expected a queued notification");
        };
        assert_eq!(request.method, methods::LOG_MESSAGE);
        serde_json::from_value(request.params.unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_kind_is_a_no_op() {
        let (sessions, router) = setup();
        let (_session, mut rx) = sessions.connect("s1".into()).unwrap();

        router
            .on_client_notification(&"s1".into(), "notifications/unknown/kind", None)
            .await;

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unknown_session_is_dropped() {
        let (_sessions, router) = setup();
        // Must return without panicking; nothing to observe.
        router
            .on_client_notification(&"ghost".into(), ROOTS_CHANGED, None)
            .await;
    }

    #[tokio::test]
    async fn test_roots_changed_success_emits_one_info_log() {
        let (sessions, router) = setup();
        let (session, mut rx) = sessions.connect("s1".into()).unwrap();

        let responder = tokio::spawn(async move {
            let Some(Outbound::Request(request)) = rx.recv().await else {
                panic!("expected a roots/list request");
            };
            assert_eq!(request.method, methods::ROOTS_LIST);
            session.resolve_response(JsonRpcResponse::success(
                request.id,
                serde_json::json!({"roots": [
                    {"uri": "file:///a", "name": "a"},
                    {"uri": "file:///b", "name": "b"},
                ]}),
            ));
            rx
        });

        router
            .on_client_notification(&"s1".into(), ROOTS_CHANGED, None)
            .await;

        let mut rx = responder.await.unwrap();
        let log = decode_log(rx.recv().await.unwrap());
        assert_eq!(log.level, LogLevel::Info);
        assert_eq!(log.data["roots"][0]["uri"], "file:///a");
        assert_eq!(log.data["roots"][1]["uri"], "file:///b");

        // Exactly one log message.
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_roots_changed_failure_emits_one_warning_log() {
        let (sessions, router) = setup();
        let (_session, mut rx) = sessions.connect("s1".into()).unwrap();

        // Nobody answers the roots/list request, so it times out.
        router
            .on_client_notification(&"s1".into(), ROOTS_CHANGED, None)
            .await;

        // First queued message is the unanswered roots/list request.
        let Some(Outbound::Request(request)) = rx.recv().await else {
            panic!("expected the roots/list request");
        };
        assert_eq!(request.method, methods::ROOTS_LIST);

        let log = decode_log(rx.recv().await.unwrap());
        assert_eq!(log.level, LogLevel::Warning);
        assert_eq!(log.data["message"], "Failed to retrieve updated roots list");
        assert!(log.data["error"].as_str().unwrap().contains("timed out"));

        assert!(rx.try_recv().is_err());
    }
}
