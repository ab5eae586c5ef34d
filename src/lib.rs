//! MCP server exposing text-obfuscation tools with session-scoped
//! bidirectional notifications.
//!
//! Tools are registered once at startup with typed parameter schemas and
//! invoked over JSON-RPC 2.0. While a tool runs, the originating session is
//! bound task-locally, so handlers can emit log notifications or round-trip
//! to the client (e.g. `roots/list`) without threading a session through
//! every call. Client notifications such as `roots/list_changed` are routed
//! to registered handlers under the same binding discipline.
//!
//! # Example
//!
//! ```no_run
//! use cipher_mcp::{
//!     config::ServerConfig,
//!     protocol::McpServerBuilder,
//!     server::{McpHandler, ServerStateBuilder},
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let state = Arc::new(
//!         ServerStateBuilder::new()
//!             .config(ServerConfig::default())
//!             .build()?,
//!     );
//!
//!     let server = McpServerBuilder::new()
//!         .handler(McpHandler::new(Arc::clone(&state)))
//!         .sessions(Arc::clone(&state.sessions))
//!         .with_tools()
//!         .with_logging()
//!         .build()?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod session;
pub mod tools;

pub use config::{ConcurrencyPolicy, ServerConfig, SessionConfig};
pub use error::{McpError, ProtocolError, Result, SessionError, ToolError};
pub use server::{
    Dispatcher, InvocationErrorKind, InvocationResult, McpHandler, NotificationHandler,
    NotificationRouter, ServerState, ServerStateBuilder,
};
pub use session::{Session, SessionId, SessionRegistry};
pub use tools::{ParamSpec, ParamType, ToolHandler, ToolRegistry, ToolSpec};
