//! Runtime registry: resolves agent references to live runtime handles

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::runtime::AgentRuntime;

/// Process-wide registry of live agent runtimes.
///
/// Lookup is by identifier first; an unparseable or unknown identifier
/// falls back to a linear scan comparing display names in registration
/// order, so the first registered runtime wins on duplicate names.
pub struct RuntimeRegistry {
    inner: RwLock<Inner>,
}

struct Inner {
    runtimes: HashMap<Uuid, Arc<AgentRuntime>>,
    /// Registration order, for deterministic name-fallback scans
    order: Vec<Uuid>,
}

impl RuntimeRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                runtimes: HashMap::new(),
                order: Vec::new(),
            }),
        }
    }

    /// Register a runtime, returning the shared handle
    pub async fn register(&self, runtime: AgentRuntime) -> Arc<AgentRuntime> {
        let runtime = Arc::new(runtime);
        let mut inner = self.inner.write().await;
        if inner.runtimes.insert(runtime.id, runtime.clone()).is_none() {
            inner.order.push(runtime.id);
        } else {
            warn!("Replacing already-registered runtime '{}'", runtime.id);
        }
        info!(
            "Registered runtime '{}' ({}) with {} plugins",
            runtime.name,
            runtime.id,
            runtime.plugins.len()
        );
        runtime
    }

    /// Remove a runtime by id
    pub async fn remove(&self, id: &Uuid) -> bool {
        let mut inner = self.inner.write().await;
        if inner.runtimes.remove(id).is_some() {
            inner.order.retain(|o| o != id);
            info!("Removed runtime '{}'", id);
            true
        } else {
            false
        }
    }

    /// Direct lookup by agent id
    pub async fn get(&self, id: &Uuid) -> Option<Arc<AgentRuntime>> {
        self.inner.read().await.runtimes.get(id).cloned()
    }

    /// Resolve an external agent reference: a valid id looks up directly,
    /// anything else (or an id miss) scans display names.
    pub async fn resolve(&self, agent_ref: &str) -> Option<Arc<AgentRuntime>> {
        let inner = self.inner.read().await;
        if let Ok(id) = Uuid::parse_str(agent_ref) {
            if let Some(runtime) = inner.runtimes.get(&id) {
                return Some(runtime.clone());
            }
        }
        let found = inner
            .order
            .iter()
            .filter_map(|id| inner.runtimes.get(id))
            .find(|runtime| runtime.name == agent_ref)
            .cloned();
        if let Some(ref runtime) = found {
            debug!("Resolved '{}' by display name to {}", agent_ref, runtime.id);
        }
        found
    }

    /// All runtimes in registration order
    pub async fn list(&self) -> Vec<Arc<AgentRuntime>> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.runtimes.get(id))
            .cloned()
            .collect()
    }

    /// Number of registered runtimes
    pub async fn count(&self) -> usize {
        self.inner.read().await.runtimes.len()
    }
}

impl Default for RuntimeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
