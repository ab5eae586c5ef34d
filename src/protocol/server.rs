//! MCP server loop with lifecycle management.

use crate::error::{McpError, ProtocolError, Result};
use crate::protocol::handler::{Handler, MethodRouter};
use crate::protocol::transport::{StdioTransport, Transport};
use crate::protocol::types::*;
use crate::session::{Outbound, SessionId, SessionRegistry};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};

/// Server lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Server created but not initialized.
    Created,
    /// Initialize request received, awaiting initialized notification.
    Initializing,
    /// Server is fully operational.
    Running,
    /// Shutdown requested.
    ShuttingDown,
    /// Server has stopped.
    Stopped,
}

/// MCP Server over a single transport connection.
pub struct McpServer<H: Handler> {
    info: ServerInfo,
    capabilities: ServerCapabilities,
    handler: Arc<H>,
    sessions: Arc<SessionRegistry>,
    session_id: SessionId,
    lifecycle: Arc<RwLock<Lifecycle>>,
    running: AtomicBool,
}

impl<H: Handler + 'static> McpServer<H> {
    pub fn new(
        handler: H,
        info: ServerInfo,
        capabilities: ServerCapabilities,
        sessions: Arc<SessionRegistry>,
        session_id: SessionId,
    ) -> Self {
        Self {
            info,
            capabilities,
            handler: Arc::new(handler),
            sessions,
            session_id,
            lifecycle: Arc::new(RwLock::new(Lifecycle::Created)),
            running: AtomicBool::new(false),
        }
    }

    /// Get current lifecycle state.
    pub async fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.read().await
    }

    /// Check if the server loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn capabilities(&self) -> &ServerCapabilities {
        &self.capabilities
    }

    /// Run the server with stdio transport.
    #[instrument(skip(self), fields(server = %self.info.name))]
    pub async fn run(self) -> Result<()> {
        let transport = Arc::new(StdioTransport::new());
        self.run_with_transport(transport).await
    }

    /// Run the server with a custom transport.
    ///
    /// The connection is registered as one session; every outbound message
    /// (responses, log notifications, server→client requests) flows through
    /// that session's queue, so per-session emission order reaches the wire
    /// intact. Each request with an id is dispatched in its own task.
    pub async fn run_with_transport<T: Transport + 'static>(self, transport: Arc<T>) -> Result<()> {
        info!(
            "Starting MCP server: {} v{}",
            self.info.name, self.info.version
        );
        self.running.store(true, Ordering::SeqCst);

        let router = Arc::new(MethodRouter::new(Arc::clone(&self.handler)));
        let (session, mut outbound_rx) = self
            .sessions
            .connect(self.session_id.clone())
            .map_err(McpError::Session)?;

        // Outbound pump: single consumer of the session queue.
        let pump = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move {
                while let Some(outbound) = outbound_rx.recv().await {
                    let message = match outbound {
                        Outbound::Request(request) => Message::Request(request),
                        Outbound::Response(response) => Message::Response(response),
                    };
                    if let Err(e) = transport.write_message(&message).await {
                        error!("Failed to write outbound message: {}", e);
                        break;
                    }
                }
            })
        };

        let server = Arc::new(self);

        loop {
            if !server.running.load(Ordering::SeqCst) {
                info!("Server stopping...");
                break;
            }

            let message = match transport.read_message().await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    debug!("EOF received, shutting down");
                    break;
                }
                Err(McpError::Protocol(ProtocolError::ParseError)) => {
                    let response = JsonRpcResponse::error(None, JsonRpcError::parse_error());
                    if session.send_response(response).is_err() {
                        break;
                    }
                    continue;
                }
                Err(e) => {
                    error!("Transport error: {}", e);
                    break;
                }
            };

            match message {
                // Responses belong to server→client round trips in flight.
                Message::Response(response) => session.resolve_response(response),
                Message::Request(request) => {
                    let method = request.method.clone();
                    server.update_lifecycle_for_method(&method).await;

                    if method == methods::SHUTDOWN {
                        // Handled inline so the response is queued before the
                        // loop stops.
                        if let Some(response) = router.dispatch(session.id(), request).await {
                            let _ = session.send_response(response);
                        }
                        server.running.store(false, Ordering::SeqCst);
                        continue;
                    }

                    let router = Arc::clone(&router);
                    let session = Arc::clone(&session);
                    tokio::spawn(async move {
                        if let Some(response) = router.dispatch(session.id(), request).await
                            && session.send_response(response).is_err()
                        {
                            debug!("Session closed before response could be queued");
                        }
                    });
                }
            }
        }

        // Failing in-flight round trips beats hanging on a dead connection.
        let _ = server.sessions.disconnect(&server.session_id);
        drop(session);
        let _ = pump.await;

        *server.lifecycle.write().await = Lifecycle::Stopped;
        info!("Server stopped");
        Ok(())
    }

    async fn update_lifecycle_for_method(&self, method: &str) {
        let mut lifecycle = self.lifecycle.write().await;
        match method {
            methods::INITIALIZE => {
                if *lifecycle == Lifecycle::Created {
                    *lifecycle = Lifecycle::Initializing;
                }
            }
            "initialized" | methods::INITIALIZED => {
                if *lifecycle == Lifecycle::Initializing {
                    *lifecycle = Lifecycle::Running;
                    info!("Server initialized and running");
                }
            }
            methods::SHUTDOWN => {
                *lifecycle = Lifecycle::ShuttingDown;
            }
            _ => {}
        }
    }

    /// Stop the server loop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Builder for MCP Server.
pub struct McpServerBuilder<H: Handler> {
    handler: Option<H>,
    sessions: Option<Arc<SessionRegistry>>,
    session_id: SessionId,
    name: String,
    version: String,
    capabilities: ServerCapabilities,
}

impl<H: Handler + 'static> McpServerBuilder<H> {
    pub fn new() -> Self {
        Self {
            handler: None,
            sessions: None,
            session_id: SessionId::new("stdio"),
            name: env!("CARGO_PKG_NAME").into(),
            version: env!("CARGO_PKG_VERSION").into(),
            capabilities: ServerCapabilities::default(),
        }
    }

    pub fn handler(mut self, handler: H) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn sessions(mut self, sessions: Arc<SessionRegistry>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn session_id(mut self, id: impl Into<SessionId>) -> Self {
        self.session_id = id.into();
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_tools(mut self) -> Self {
        self.capabilities.tools = Some(ToolsCapability {
            list_changed: Some(false),
        });
        self
    }

    pub fn with_logging(mut self) -> Self {
        self.capabilities.logging = Some(LoggingCapability {});
        self
    }

    pub fn build(self) -> Result<McpServer<H>> {
        let handler = self.handler.ok_or_else(|| McpError::Internal {
            message: "Handler is required".into(),
        })?;
        let sessions = self.sessions.ok_or_else(|| McpError::Internal {
            message: "Session registry is required".into(),
        })?;

        Ok(McpServer::new(
            handler,
            ServerInfo {
                name: self.name,
                version: self.version,
            },
            self.capabilities,
            sessions,
            self.session_id,
        ))
    }
}

impl<H: Handler + 'static> Default for McpServerBuilder<H> {
    fn default() -> Self {
        Self::new()
    }
}
