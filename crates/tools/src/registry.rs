//! Backend registry — maps each tool kind to the backend that executes it.
//!
//! Built once at startup and shared read-only by every turn.

use parley_core::tool::{ToolBackend, ToolKind};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Resolves a [`ToolKind`] to exactly one backend.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<ToolKind, Arc<dyn ToolBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under its own kind. The first registration for a
    /// kind wins; later ones are ignored.
    pub fn register(&mut self, backend: Arc<dyn ToolBackend>) -> &mut Self {
        let kind = backend.kind();
        if self.backends.contains_key(&kind) {
            warn!(%kind, "Backend already registered for tool kind, ignoring");
        } else {
            self.backends.insert(kind, backend);
        }
        self
    }

    /// Builder-style registration.
    pub fn with(mut self, backend: Arc<dyn ToolBackend>) -> Self {
        self.register(backend);
        self
    }

    pub fn get(&self, kind: ToolKind) -> Option<Arc<dyn ToolBackend>> {
        self.backends.get(&kind).cloned()
    }

    /// Registered kinds, in a stable order.
    pub fn kinds(&self) -> Vec<ToolKind> {
        let mut kinds: Vec<_> = self.backends.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}
