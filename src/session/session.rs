//! Per-client session state and notification delivery.

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::protocol::types::{
    JsonRpcRequest, JsonRpcResponse, ListRootsResult, LogMessageParams, RequestId, Root, methods,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, warn};

/// Opaque session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A message queued for delivery to the client.
///
/// Responses to client requests and server-originated requests/notifications
/// share one per-session queue, so emission order is preserved on the wire.
#[derive(Debug, Clone)]
pub enum Outbound {
    Request(JsonRpcRequest),
    Response(JsonRpcResponse),
}

/// One connected client.
///
/// Owns the outbound delivery queue, the pending map for server→client round
/// trips, and the cached client-reported roots. Created on connect, closed on
/// disconnect; handlers must not assume a session outlives their call.
pub struct Session {
    id: SessionId,
    config: SessionConfig,
    outbound: mpsc::UnboundedSender<Outbound>,
    pending: DashMap<RequestId, oneshot::Sender<JsonRpcResponse>>,
    next_request_id: AtomicI64,
    roots: RwLock<Vec<Root>>,
    last_sync: RwLock<Option<DateTime<Utc>>>,
    mutation_slot: Mutex<()>,
    closed: AtomicBool,
}

impl Session {
    /// Create a session together with the receiving half of its outbound
    /// queue. The caller (transport pump, or a test) drains the receiver.
    pub fn new(
        id: SessionId,
        config: SessionConfig,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Arc::new(Self {
            id,
            config,
            outbound: tx,
            pending: DashMap::new(),
            next_request_id: AtomicI64::new(1),
            roots: RwLock::new(Vec::new()),
            last_sync: RwLock::new(None),
            mutation_slot: Mutex::new(()),
            closed: AtomicBool::new(false),
        });
        (session, rx)
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// The per-session mutation slot, held across handler calls under the
    /// serialized concurrency policy.
    pub(crate) fn mutation_slot(&self) -> &Mutex<()> {
        &self.mutation_slot
    }

    /// Enqueue a message for delivery. Fails only if the session is closed.
    pub fn enqueue(&self, message: Outbound) -> SessionResult<()> {
        if self.is_closed() {
            return Err(SessionError::Closed(self.id.to_string()));
        }
        self.outbound
            .send(message)
            .map_err(|_| SessionError::Closed(self.id.to_string()))
    }

    /// Queue a response to a client request.
    pub fn send_response(&self, response: JsonRpcResponse) -> SessionResult<()> {
        self.enqueue(Outbound::Response(response))
    }

    /// Emit a log notification to the client.
    ///
    /// Fire-and-forget: the message is handed to the outbound queue and the
    /// call returns. If the session is already closed the message is dropped.
    pub fn send_log_notification(&self, params: LogMessageParams) {
        let value = match serde_json::to_value(&params) {
            Ok(value) => value,
            Err(e) => {
                warn!(session = %self.id, "Failed to serialize log notification: {}", e);
                return;
            }
        };
        let notification = JsonRpcRequest::notification(methods::LOG_MESSAGE, value);
        if self.enqueue(Outbound::Request(notification)).is_err() {
            debug!(session = %self.id, "Dropping log notification for closed session");
        }
    }

    /// Fetch the client's current roots list via a request/response round
    /// trip over the existing connection.
    ///
    /// On success the cached roots and the last-sync timestamp are updated
    /// and the fresh snapshot is returned. The result is a snapshot: the
    /// client may change its roots again at any time.
    pub async fn list_roots(&self) -> SessionResult<Vec<Root>> {
        let id = RequestId::Number(self.next_request_id.fetch_add(1, Ordering::SeqCst));
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);

        let request = JsonRpcRequest::new(methods::ROOTS_LIST).with_id(id.clone());
        if let Err(e) = self.enqueue(Outbound::Request(request)) {
            self.pending.remove(&id);
            return Err(e);
        }

        let timeout = self.config.roots_request_timeout;
        let response = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response,
            // Sender dropped: the session closed while we were waiting.
            Ok(Err(_)) => {
                return Err(SessionError::ClientRequest(format!(
                    "connection to session {} closed",
                    self.id
                )));
            }
            Err(_) => {
                self.pending.remove(&id);
                return Err(SessionError::Timeout(timeout.as_millis() as u64));
            }
        };

        if let Some(error) = response.error {
            return Err(SessionError::ClientRequest(error.message));
        }

        let result: ListRootsResult = response
            .result
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| SessionError::ClientRequest(format!("malformed roots/list result: {}", e)))?
            .ok_or_else(|| SessionError::ClientRequest("empty roots/list response".into()))?;

        *self.roots.write() = result.roots.clone();
        *self.last_sync.write() = Some(Utc::now());
        debug!(session = %self.id, count = result.roots.len(), "Roots list synced");
        Ok(result.roots)
    }

    /// Route a response from the client to the round trip awaiting it.
    pub fn resolve_response(&self, response: JsonRpcResponse) {
        let Some(id) = response.id.clone() else {
            warn!(session = %self.id, "Discarding response without id");
            return;
        };
        match self.pending.remove(&id) {
            Some((_, tx)) => {
                // Receiver may have timed out already; nothing to do then.
                let _ = tx.send(response);
            }
            None => warn!(session = %self.id, id = ?id, "Response for unknown request id"),
        }
    }

    /// Snapshot of the cached roots as of the last sync.
    pub fn cached_roots(&self) -> Vec<Root> {
        self.roots.read().clone()
    }

    /// When the roots were last synced from the client, if ever.
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        *self.last_sync.read()
    }

    /// Mark the session closed, failing every in-flight round trip and
    /// sealing the outbound queue. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.pending.clear();
        debug!(session = %self.id, "Session closed");
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::LogLevel;
    use std::time::Duration;

    fn test_config() -> SessionConfig {
        SessionConfig {
            roots_request_timeout: Duration::from_millis(100),
            ..SessionConfig::default()
        }
    }

    #[tokio::test]
    async fn test_log_notification_enqueued_in_order() {
        let (session, mut rx) = Session::new("s1".into(), test_config());

        session.send_log_notification(LogMessageParams::info(serde_json::json!({"n": 1})));
        session.send_log_notification(LogMessageParams::warning(serde_json::json!({"n": 2})));

        for expected in 1..=2 {
            let Some(Outbound::Request(request)) = rx.recv().await else {
                panic!("expected a queued notification");
            };
            assert_eq!(request.method, methods::LOG_MESSAGE);
            assert!(request.is_notification());
            let params = request.params.unwrap();
            assert_eq!(params["data"]["n"], expected);
        }
    }

    #[tokio::test]
    async fn test_list_roots_round_trip() {
        let (session, mut rx) = Session::new("s1".into(), test_config());

        let responder = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                let Some(Outbound::Request(request)) = rx.recv().await else {
                    panic!("expected a roots/list request");
                };
                assert_eq!(request.method, methods::ROOTS_LIST);
                session.resolve_response(JsonRpcResponse::success(
                    request.id,
                    serde_json::json!({"roots": [{"uri": "file:///work", "name": "work"}]}),
                ));
            })
        };

        let roots = session.list_roots().await.unwrap();
        responder.await.unwrap();

        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].uri, "file:///work");
        assert_eq!(session.cached_roots(), roots);
        assert!(session.last_sync().is_some());
    }

    #[tokio::test]
    async fn test_list_roots_times_out() {
        let (session, _rx) = Session::new("s1".into(), test_config());

        let err = session.list_roots().await.unwrap_err();
        assert!(matches!(err, SessionError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_list_roots_error_response() {
        let (session, mut rx) = Session::new("s1".into(), test_config());

        let responder = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                let Some(Outbound::Request(request)) = rx.recv().await else {
                    panic!("expected a roots/list request");
                };
                session.resolve_response(JsonRpcResponse::error(
                    request.id,
                    crate::protocol::types::JsonRpcError::new(-32603, "roots unavailable"),
                ));
            })
        };

        let err = session.list_roots().await.unwrap_err();
        responder.await.unwrap();
        assert!(matches!(err, SessionError::ClientRequest(msg) if msg.contains("roots unavailable")));
    }

    #[tokio::test]
    async fn test_close_fails_pending_round_trip() {
        let (session, mut rx) = Session::new("s1".into(), test_config());

        let closer = {
            let session = Arc::clone(&session);
            tokio::spawn(async move {
                // Wait until the request is actually in flight.
                let _ = rx.recv().await;
                session.close();
            })
        };

        let err = session.list_roots().await.unwrap_err();
        closer.await.unwrap();
        assert!(matches!(err, SessionError::ClientRequest(_)));
    }

    #[tokio::test]
    async fn test_closed_session_drops_notifications() {
        let (session, _rx) = Session::new("s1".into(), test_config());
        session.close();

        // Must not panic or error; the message is silently dropped.
        session.send_log_notification(LogMessageParams::new(
            LogLevel::Info,
            serde_json::json!({"message": "late"}),
        ));
        assert!(session.enqueue(Outbound::Request(JsonRpcRequest::new("ping"))).is_err());
    }
}
