//! MCP request handler implementation.

use crate::error::ProtocolResult;
use crate::protocol::handler::Handler;
use crate::protocol::types::{
    CallToolParams, CallToolResult, InitializeParams, InitializeResult, ListToolsResult,
    LoggingCapability, MCP_VERSION, ServerCapabilities, ServerInfo, ToolsCapability,
};
use crate::server::dispatch::InvocationResult;
use crate::server::state::ServerState;
use crate::session::SessionId;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Handler wiring protocol messages to the dispatcher and notification
/// router.
pub struct McpHandler {
    state: Arc<ServerState>,
}

impl McpHandler {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }
}

#[async_trait]
impl Handler for McpHandler {
    async fn initialize(
        &self,
        _session: &SessionId,
        params: InitializeParams,
    ) -> ProtocolResult<InitializeResult> {
        info!(
            "Initialize request from {} v{}",
            params.client_info.name, params.client_info.version
        );
        debug!("Client capabilities: {:?}", params.capabilities);

        self.state.set_initialized(params.client_info);

        let capabilities = ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: Some(false),
            }),
            logging: Some(LoggingCapability {}),
        };

        let tool_names: Vec<String> = self
            .state
            .tools
            .list()
            .into_iter()
            .map(|tool| tool.name)
            .collect();
        let instructions = format!(
            "Text obfuscation MCP server. Available tools: {}. \
            Tool calls emit log notifications; roots list changes are re-synced \
            from the client and reported the same way.",
            tool_names.join(", ")
        );

        Ok(InitializeResult {
            protocol_version: MCP_VERSION.into(),
            capabilities,
            server_info: ServerInfo {
                name: self.state.config.name.to_string(),
                version: self.state.config.version.to_string(),
            },
            instructions: Some(instructions),
        })
    }

    async fn initialized(&self, _session: &SessionId) -> ProtocolResult<()> {
        info!("Server initialized successfully");
        Ok(())
    }

    async fn shutdown(&self, _session: &SessionId) -> ProtocolResult<()> {
        info!("Shutdown request received");
        Ok(())
    }

    async fn list_tools(&self, _session: &SessionId) -> ProtocolResult<ListToolsResult> {
        let tools = self.state.tools.list();
        debug!("Listing {} tools", tools.len());

        Ok(ListToolsResult {
            tools,
            next_cursor: None,
        })
    }

    async fn call_tool(
        &self,
        session: &SessionId,
        params: CallToolParams,
    ) -> ProtocolResult<CallToolResult> {
        debug!("Tool call: {}", params.name);

        let result = self
            .state
            .dispatcher
            .invoke(session, &params.name, params.arguments)
            .await;

        // Invocation failures become tool-level errors on the wire, never
        // protocol errors: the request itself was well-formed.
        Ok(match result {
            InvocationResult::Value(Value::String(text)) => CallToolResult::text(text),
            InvocationResult::Value(value) => CallToolResult::text(
                serde_json::to_string_pretty(&value).unwrap_or_else(|e| e.to_string()),
            ),
            InvocationResult::Error { message, .. } => CallToolResult::error(message),
        })
    }

    async fn notification(&self, session: &SessionId, method: &str, params: Option<Value>) {
        self.state
            .router
            .on_client_notification(session, method, params)
            .await;
    }
}
