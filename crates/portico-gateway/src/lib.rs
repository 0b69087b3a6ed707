//! portico-gateway - HTTP front door for plugin routes contributed by agent runtimes
//!
//! The gateway mounts a plugin namespace under
//! `/api/agents/{agent_ref}/plugins/{plugin}` and dispatches each request to
//! the first matching route descriptor declared by that plugin. Route
//! templates come in three kinds (exact, parameterized, wildcard);
//! parameterized templates are compiled to regexes once and cached for the
//! life of the process. Multipart bodies are materialized before dispatch so
//! matched handlers never see an unparsed upload.

pub mod dispatch;
pub mod error;
pub mod multipart;
pub mod payload;
pub mod pattern;
pub mod server;

pub use dispatch::{Dispatch, Dispatcher};
pub use error::DispatchError;
pub use server::GatewayServer;
