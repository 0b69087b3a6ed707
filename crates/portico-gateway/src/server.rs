//! Gateway HTTP server: axum front door for the plugin namespace

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use portico_core::{PluginResponse, RuntimeRegistry};

use crate::dispatch::{Dispatch, Dispatcher};
use crate::error::DispatchError;
use crate::multipart;
use crate::payload::{codes, error_response};

/// Shared state for all gateway routes
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<RuntimeRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub uploads_dir: PathBuf,
    pub started_at: DateTime<Utc>,
}

/// The gateway server
pub struct GatewayServer {
    state: GatewayState,
    bind: SocketAddr,
}

impl GatewayServer {
    /// Create a new gateway server over an externally owned registry
    pub fn new(bind: SocketAddr, registry: Arc<RuntimeRegistry>, uploads_dir: PathBuf) -> Self {
        let state = GatewayState {
            dispatcher: Arc::new(Dispatcher::new(registry.clone())),
            registry,
            uploads_dir,
            started_at: Utc::now(),
        };
        Self { state, bind }
    }

    /// Build the axum router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/status", get(status_handler))
            .route("/api/agents", get(agents_handler))
            .route(
                "/api/agents/{agent_ref}/plugins/{plugin}",
                any(plugin_route_handler),
            )
            .route(
                "/api/agents/{agent_ref}/plugins/{plugin}/{*rest}",
                any(plugin_route_handler),
            )
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Start the server (blocks until shutdown)
    pub async fn run(self) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.state.uploads_dir).await?;
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(self.bind).await?;
        info!("Gateway listening on {}", self.bind);

        axum::serve(listener, router).await?;
        Ok(())
    }

    /// Start the server in the background, returning a handle
    pub fn spawn(self) -> tokio::task::JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

// ── HTTP Handlers ──

async fn status_handler(State(state): State<GatewayState>) -> impl IntoResponse {
    let agents = state.registry.count().await;
    let uptime = (Utc::now() - state.started_at).num_seconds();

    axum::Json(serde_json::json!({
        "status": "ok",
        "agents": agents,
        "started_at": state.started_at,
        "uptime_secs": uptime,
    }))
}

async fn agents_handler(State(state): State<GatewayState>) -> impl IntoResponse {
    let agents: Vec<_> = state
        .registry
        .list()
        .await
        .iter()
        .map(|runtime| {
            serde_json::json!({
                "id": runtime.id,
                "name": runtime.name,
                "plugins": runtime
                    .plugins
                    .iter()
                    .map(|p| p.name.as_str())
                    .collect::<Vec<_>>(),
            })
        })
        .collect();
    axum::Json(serde_json::json!({ "agents": agents }))
}

/// The plugin namespace: multipart pre-processing, then dispatch
async fn plugin_route_handler(
    State(state): State<GatewayState>,
    Path(path_params): Path<HashMap<String, String>>,
    req: Request,
) -> Response {
    let agent_ref = path_params.get("agent_ref").cloned().unwrap_or_default();
    let plugin = path_params.get("plugin").cloned().unwrap_or_default();
    let sub_path = match path_params.get("rest") {
        Some(rest) => format!("/{plugin}/{rest}"),
        None => format!("/{plugin}"),
    };

    let mut request = match multipart::preprocess(req, sub_path, &state.uploads_dir).await {
        Ok(request) => request,
        Err(e) => {
            warn!("Rejecting request for agent '{}': {}", agent_ref, e);
            return error_response(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, e.to_string());
        }
    };
    request
        .params
        .insert("agent_ref".to_string(), agent_ref.clone());

    match state.dispatcher.dispatch(&mut request, &agent_ref).await {
        Ok(Dispatch::Handled(response)) => plugin_response(response),
        Ok(Dispatch::NotHandled) => error_response(
            StatusCode::NOT_FOUND,
            codes::NOT_FOUND,
            format!(
                "no plugin route matched {} {}",
                request.method, request.path
            ),
        ),
        Err(e @ DispatchError::RuntimeNotFound { .. }) => {
            error_response(StatusCode::NOT_FOUND, codes::AGENT_NOT_FOUND, e.to_string())
        }
        Err(DispatchError::Handler(e)) => {
            error!("Plugin handler failed for agent '{}': {:#}", agent_ref, e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::HANDLER_ERROR,
                "plugin handler failed",
            )
        }
    }
}

/// Convert a handler's response into an HTTP response
fn plugin_response(response: PluginResponse) -> Response {
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK);
    let mut builder = Response::builder().status(status);
    if let Some(content_type) = &response.content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|_| status.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_response_conversion() {
        let resp = plugin_response(PluginResponse::text("hello").with_status(201));
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain"
        );
    }

    #[test]
    fn test_plugin_response_invalid_status_falls_back() {
        let resp = plugin_response(PluginResponse::new(9999));
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
