//! Agent runtimes, plugins, and the routes they expose

use anyhow::Result;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::types::{PluginRequest, PluginResponse};

/// A live, addressable agent instance and the plugins installed on it.
///
/// Immutable once registered; installation and removal of plugins is a
/// whole-runtime replacement event handled by the registry owner.
pub struct AgentRuntime {
    pub id: Uuid,
    /// Human-facing display name, usable as a lookup fallback
    pub name: String,
    /// Plugins in installation order
    pub plugins: Vec<Plugin>,
}

impl AgentRuntime {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            plugins: Vec::new(),
        }
    }

    /// Add a plugin (builder style, installation order preserved)
    pub fn with_plugin(mut self, plugin: Plugin) -> Self {
        self.plugins.push(plugin);
        self
    }
}

/// A named bundle of routes contributed by a runtime
pub struct Plugin {
    pub name: String,
    /// Routes in declaration order; the first match wins
    pub routes: Vec<RouteDescriptor>,
}

impl Plugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            routes: Vec::new(),
        }
    }

    /// Add a route (builder style, declaration order preserved)
    pub fn with_route(mut self, route: RouteDescriptor) -> Self {
        self.routes.push(route);
        self
    }
}

/// How a route template matches, determined structurally from the template
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Byte-for-byte equality with the request path
    Exact,
    /// `:name` segments each capture one non-`/` path segment
    Parameterized,
    /// Literal prefix up to `*`, remainder unconstrained
    Wildcard,
}

impl RouteKind {
    /// Classify a template. A `*` anywhere makes the route a wildcard even
    /// if `:name` segments are also present.
    pub fn classify(template: &str) -> Self {
        if template.contains('*') {
            Self::Wildcard
        } else if template.split('/').any(|seg| seg.starts_with(':')) {
            Self::Parameterized
        } else {
            Self::Exact
        }
    }
}

/// One exposed plugin endpoint
pub struct RouteDescriptor {
    /// HTTP verb, matched by case-sensitive string equality
    pub method: String,
    /// Path template relative to the plugin mount
    pub path: String,
    pub kind: RouteKind,
    /// Whether this route expects uploaded file parts
    pub multipart: bool,
    pub handler: Arc<dyn RouteHandler>,
}

impl RouteDescriptor {
    pub fn new(
        method: impl Into<String>,
        path: impl Into<String>,
        handler: Arc<dyn RouteHandler>,
    ) -> Self {
        let path = path.into();
        let kind = RouteKind::classify(&path);
        Self {
            method: method.into(),
            path,
            kind,
            multipart: false,
            handler,
        }
    }

    /// Mark this route as expecting uploaded file parts
    pub fn multipart(mut self) -> Self {
        self.multipart = true;
        self
    }
}

/// Callback invoked when a route matches.
///
/// By the time `handle` runs, the request's parameter map contains every
/// named capture from the matched template and any multipart uploads have
/// already been materialized.
#[async_trait]
pub trait RouteHandler: Send + Sync {
    async fn handle(
        &self,
        request: PluginRequest,
        runtime: Arc<AgentRuntime>,
    ) -> Result<PluginResponse>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> RouteHandler for FnHandler<F>
where
    F: Fn(PluginRequest, Arc<AgentRuntime>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<PluginResponse>> + Send,
{
    async fn handle(
        &self,
        request: PluginRequest,
        runtime: Arc<AgentRuntime>,
    ) -> Result<PluginResponse> {
        (self.0)(request, runtime).await
    }
}

/// Wrap an async closure as a route handler
pub fn route<F, Fut>(f: F) -> Arc<dyn RouteHandler>
where
    F: Fn(PluginRequest, Arc<AgentRuntime>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<PluginResponse>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}
