//! Server state management.

use crate::config::ServerConfig;
use crate::error::{McpError, Result};
use crate::protocol::types::{ClientInfo, methods};
use crate::server::dispatch::Dispatcher;
use crate::server::notify::{NotificationRouter, RootsListChangedHandler};
use crate::session::SessionRegistry;
use crate::tools::ToolRegistry;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared state behind the MCP handler: configuration, live sessions, the
/// tool registry, and the two dispatch paths.
pub struct ServerState {
    pub config: ServerConfig,
    pub sessions: Arc<SessionRegistry>,
    pub tools: Arc<ToolRegistry>,
    pub dispatcher: Dispatcher,
    pub router: NotificationRouter,
    initialized: AtomicBool,
    client_info: RwLock<Option<ClientInfo>>,
}

impl ServerState {
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn set_initialized(&self, client_info: ClientInfo) {
        *self.client_info.write() = Some(client_info);
        self.initialized.store(true, Ordering::SeqCst);
    }

    pub fn client_info(&self) -> Option<ClientInfo> {
        self.client_info.read().clone()
    }
}

/// Builder assembling the state: registers built-in tools and the
/// roots-list-changed handler. Tool registration errors are fatal here.
pub struct ServerStateBuilder {
    config: Option<ServerConfig>,
    tools: Option<ToolRegistry>,
}

impl ServerStateBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            tools: None,
        }
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a pre-built tool registry instead of the built-in tools.
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn build(self) -> Result<ServerState> {
        let config = self.config.unwrap_or_default();
        let tools = Arc::new(match self.tools {
            Some(tools) => tools,
            None => crate::tools::create_registry().map_err(McpError::Tool)?,
        });

        let sessions = Arc::new(SessionRegistry::new(config.session.clone()));
        let dispatcher = Dispatcher::new(
            Arc::clone(&sessions),
            Arc::clone(&tools),
            config.session.concurrency,
        );

        let router = NotificationRouter::new(Arc::clone(&sessions));
        router.register(methods::ROOTS_LIST_CHANGED, RootsListChangedHandler);

        Ok(ServerState {
            config,
            sessions,
            tools,
            dispatcher,
            router,
            initialized: AtomicBool::new(false),
            client_info: RwLock::new(None),
        })
    }
}

impl Default for ServerStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
