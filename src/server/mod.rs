//! Server-side dispatch, notification routing, and state.

pub mod dispatch;
pub mod handler;
pub mod notify;
pub mod state;

pub use dispatch::{Dispatcher, InvocationErrorKind, InvocationResult};
pub use handler::McpHandler;
pub use notify::{NotificationHandler, NotificationRouter, RootsListChangedHandler};
pub use state::{ServerState, ServerStateBuilder};
