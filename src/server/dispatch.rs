//! Tool invocation dispatch.
//!
//! Resolves the target session and tool, validates arguments, binds the
//! session as current for exactly the handler's execution, and converts every
//! failure into a structured [`InvocationResult`]. Errors never cross this
//! boundary.

use crate::config::ConcurrencyPolicy;
use crate::session::{self, SessionId, SessionRegistry};
use crate::tools::ToolRegistry;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Classification of a failed invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationErrorKind {
    SessionNotFound,
    ToolNotFound,
    InvalidArguments,
    /// Any failure raised inside the tool handler itself.
    Handler,
}

/// Outcome of a single tool invocation: a structured value or a classified
/// error, never both.
#[derive(Debug)]
pub enum InvocationResult {
    Value(Value),
    Error {
        kind: InvocationErrorKind,
        message: String,
    },
}

impl InvocationResult {
    pub fn error(kind: InvocationErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Executes tool invocations in the context of their session.
pub struct Dispatcher {
    sessions: Arc<SessionRegistry>,
    tools: Arc<ToolRegistry>,
    policy: ConcurrencyPolicy,
}

impl Dispatcher {
    pub fn new(
        sessions: Arc<SessionRegistry>,
        tools: Arc<ToolRegistry>,
        policy: ConcurrencyPolicy,
    ) -> Self {
        Self {
            sessions,
            tools,
            policy,
        }
    }

    /// Invoke `tool_name` with `arguments` on behalf of `session_id`.
    ///
    /// The session is bound as current only for the handler call; the
    /// binding is scoped to this invocation's task and released on every
    /// exit path. Side effects a handler performed before failing are not
    /// rolled back.
    #[instrument(skip(self, arguments), fields(session = %session_id, tool = tool_name))]
    pub async fn invoke(
        &self,
        session_id: &SessionId,
        tool_name: &str,
        arguments: Value,
    ) -> InvocationResult {
        let session = match self.sessions.get(session_id) {
            Ok(session) => session,
            Err(e) => {
                warn!("Invocation rejected: {}", e);
                return InvocationResult::error(
                    InvocationErrorKind::SessionNotFound,
                    e.to_string(),
                );
            }
        };

        let tool = match self.tools.get(tool_name) {
            Ok(tool) => tool,
            Err(e) => {
                warn!("Invocation rejected: {}", e);
                return InvocationResult::error(InvocationErrorKind::ToolNotFound, e.to_string());
            }
        };

        if let Err(e) = tool.spec().validate(&arguments) {
            debug!("Argument validation failed: {}", e);
            return InvocationResult::error(InvocationErrorKind::InvalidArguments, e.to_string());
        }

        // The handler runs in its own task so a panicking tool is contained
        // as a Handler error instead of unwinding past this call.
        let policy = self.policy;
        let result = tokio::spawn(async move {
            session::scope(Arc::clone(&session), async {
                let _slot = match policy {
                    ConcurrencyPolicy::Serialized => Some(session.mutation_slot().lock().await),
                    ConcurrencyPolicy::Parallel => None,
                };
                tool.execute(arguments).await
            })
            .await
        })
        .await;

        match result {
            Ok(Ok(value)) => InvocationResult::Value(value),
            Ok(Err(e)) => {
                warn!("Tool handler failed: {}", e);
                InvocationResult::error(InvocationErrorKind::Handler, e.to_string())
            }
            Err(e) => {
                let message = panic_message(e);
                warn!("Tool handler panicked: {}", message);
                InvocationResult::error(InvocationErrorKind::Handler, message)
            }
        }
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return "tool handler task was cancelled".into();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool handler panicked".into()
    }
}
