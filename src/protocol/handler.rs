//! Request handler trait and wire-level method routing.

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::types::*;
use crate::session::SessionId;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

/// Handler trait for processing MCP requests, parameterized by the calling
/// session.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle initialize request.
    async fn initialize(
        &self,
        session: &SessionId,
        params: InitializeParams,
    ) -> ProtocolResult<InitializeResult>;

    /// Handle initialized notification.
    async fn initialized(&self, session: &SessionId) -> ProtocolResult<()>;

    /// Handle shutdown request.
    async fn shutdown(&self, session: &SessionId) -> ProtocolResult<()>;

    /// List available tools.
    async fn list_tools(&self, session: &SessionId) -> ProtocolResult<ListToolsResult>;

    /// Call a tool.
    async fn call_tool(
        &self,
        session: &SessionId,
        params: CallToolParams,
    ) -> ProtocolResult<CallToolResult>;

    /// Handle a client notification other than `initialized`. Fire-and-forget.
    async fn notification(&self, session: &SessionId, method: &str, params: Option<Value>);

    /// Handle ping request.
    async fn ping(&self) -> ProtocolResult<Value> {
        Ok(serde_json::json!({}))
    }
}

/// Routes JSON-RPC methods to the appropriate [`Handler`] entry point.
pub struct MethodRouter<H: Handler> {
    handler: Arc<H>,
}

impl<H: Handler> MethodRouter<H> {
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// Dispatch a request on behalf of `session_id`.
    ///
    /// Returns `None` for notifications: the protocol defines no response
    /// for them, so even a failing notification produces nothing.
    #[instrument(skip(self, request), fields(session = %session_id, method = %request.method))]
    pub async fn dispatch(
        &self,
        session_id: &SessionId,
        request: JsonRpcRequest,
    ) -> Option<JsonRpcResponse> {
        debug!("Dispatching request: {}", request.method);
        let is_notification = request.is_notification();

        let result = match request.method.as_str() {
            methods::INITIALIZE => self.handle_initialize(session_id, request.params).await,
            "initialized" | methods::INITIALIZED => self
                .handler
                .initialized(session_id)
                .await
                .map(|()| Value::Null),
            methods::SHUTDOWN => self.handler.shutdown(session_id).await.map(|()| Value::Null),
            methods::PING => self.handler.ping().await,
            methods::TOOLS_LIST => self.handle_list_tools(session_id).await,
            methods::TOOLS_CALL => self.handle_call_tool(session_id, request.params).await,
            method if is_notification => {
                // Unknown notification kinds are forwarded, not errors.
                self.handler
                    .notification(session_id, method, request.params)
                    .await;
                Ok(Value::Null)
            }
            method => {
                warn!("Unknown method: {}", method);
                Err(ProtocolError::MethodNotFound(method.to_string()))
            }
        };

        if is_notification {
            return None;
        }

        Some(match result {
            Ok(value) => JsonRpcResponse::success(request.id, value),
            Err(e) => {
                error!("Request failed: {}", e);
                JsonRpcResponse::error(request.id, JsonRpcError::new(e.code(), e.to_string()))
            }
        })
    }

    async fn handle_initialize(
        &self,
        session_id: &SessionId,
        params: Option<Value>,
    ) -> ProtocolResult<Value> {
        let params: InitializeParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| ProtocolError::InvalidParams(e.to_string().into()))?
            .ok_or_else(|| ProtocolError::InvalidParams("Missing params".into()))?;

        let result = self.handler.initialize(session_id, params).await?;
        serde_json::to_value(result).map_err(|e| ProtocolError::InternalError(e.to_string().into()))
    }

    async fn handle_list_tools(&self, session_id: &SessionId) -> ProtocolResult<Value> {
        let result = self.handler.list_tools(session_id).await?;
        serde_json::to_value(result).map_err(|e| ProtocolError::InternalError(e.to_string().into()))
    }

    async fn handle_call_tool(
        &self,
        session_id: &SessionId,
        params: Option<Value>,
    ) -> ProtocolResult<Value> {
        let params: CallToolParams = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| ProtocolError::InvalidParams(e.to_string().into()))?
            .ok_or_else(|| ProtocolError::InvalidParams("Missing params".into()))?;

        let result = self.handler.call_tool(session_id, params).await?;
        serde_json::to_value(result).map_err(|e| ProtocolError::InternalError(e.to_string().into()))
    }
}
