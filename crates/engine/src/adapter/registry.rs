use crate::adapter::AdapterHandle;
use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use shelf_models::SourceId;
use std::collections::HashMap;
use tracing::debug;

/// Source id → adapter, populated once at startup.
#[derive(Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<SourceId, AdapterHandle>,
}
impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its own id, returning any adapter it
    /// replaced.
    pub fn register(&mut self, adapter: AdapterHandle) -> Option<AdapterHandle> {
        debug!(source = %adapter.id(), "registering source adapter");
        self.adapters.insert(adapter.id().clone(), adapter)
    }

    pub fn with(mut self, adapter: AdapterHandle) -> Self {
        self.register(adapter);
        self
    }

    pub fn get(&self, source: &SourceId) -> Option<&AdapterHandle> {
        self.adapters.get(source)
    }

    pub fn sources(&self) -> impl Iterator<Item = &SourceId> {
        self.adapters.keys()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Look up the adapter for `source` and make sure it is ready to fetch.
    pub async fn resolve(&self, source: &SourceId) -> Result<AdapterHandle> {
        let adapter = self.get(source).cloned().ok_or_raise(|| ErrorKind::AdapterResolution(source.clone()))?;
        adapter.ready().await.or_raise(|| ErrorKind::AdapterResolution(source.clone()))?;
        Ok(adapter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::ScriptedAdapter;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_resolve_registered_adapter() {
        let registry = AdapterRegistry::new().with(Arc::new(ScriptedAdapter::new("mangadex")));
        let adapter = registry.resolve(&SourceId::from("mangadex")).await.unwrap();
        assert_eq!(adapter.id(), &SourceId::from("mangadex"));
    }

    #[tokio::test]
    async fn test_resolve_unknown_source() {
        let registry = AdapterRegistry::new();
        let err = registry.resolve(&SourceId::from("nowhere")).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::AdapterResolution(source) if source.as_str() == "nowhere"));
    }

    #[tokio::test]
    async fn test_resolve_unavailable_adapter() {
        let registry = AdapterRegistry::new().with(Arc::new(ScriptedAdapter::new("mangadex").unavailable()));
        let err = registry.resolve(&SourceId::from("mangadex")).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::AdapterResolution(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_register_replaces_by_id() {
        let mut registry = AdapterRegistry::new();
        assert!(registry.register(Arc::new(ScriptedAdapter::new("a"))).is_none());
        assert!(registry.register(Arc::new(ScriptedAdapter::new("a"))).is_some());
        assert_eq!(registry.len(), 1);
    }
}
