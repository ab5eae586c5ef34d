//! Session management: per-client state, notification delivery, and the
//! task-local "current session" binding.

pub mod context;
pub mod registry;
pub mod session;

pub use context::{current, scope};
pub use registry::SessionRegistry;
pub use session::{Outbound, Session, SessionId};
