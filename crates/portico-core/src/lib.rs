//! portico-core - runtime, plugin, and route model for the portico gateway
//!
//! This crate provides:
//! - The data model for live agent runtimes and the plugins they install
//! - Route descriptors with structural template classification
//! - The `RouteHandler` trait plugins implement for each endpoint
//! - The process-wide runtime registry with display-name fallback lookup

pub mod registry;
pub mod runtime;
pub mod types;

// Re-export main types for convenience
pub use registry::RuntimeRegistry;
pub use runtime::{route, AgentRuntime, Plugin, RouteDescriptor, RouteHandler, RouteKind};
pub use types::{PluginRequest, PluginResponse, UploadedFile};
