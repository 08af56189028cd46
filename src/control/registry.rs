//! Directory of commandable components.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::proxy::{ComponentSnapshot, StressorControlProxy};
use super::role::ComponentRole;

/// Components by id, shared by the facade and the scenario engine.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    components: RwLock<BTreeMap<String, Arc<StressorControlProxy>>>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, Arc<StressorControlProxy>>> {
        match self.components.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Component registry lock poisoned, using recovered data");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Arc<StressorControlProxy>>> {
        match self.components.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("Component registry lock poisoned, using recovered data");
                poisoned.into_inner()
            }
        }
    }

    /// Register a proxy, returning the one it replaced.
    pub fn register(&self, proxy: StressorControlProxy) -> Option<Arc<StressorControlProxy>> {
        let id = proxy.component_id().to_string();
        let role = proxy.role();
        let previous = self.write().insert(id.clone(), Arc::new(proxy));
        tracing::info!(component = %id, role = %role, replaced = previous.is_some(), "Registered component");
        previous
    }

    /// Remove a component.
    pub fn unregister(&self, component_id: &str) -> Option<Arc<StressorControlProxy>> {
        self.write().remove(component_id)
    }

    /// Look up one component.
    #[must_use]
    pub fn get(&self, component_id: &str) -> Option<Arc<StressorControlProxy>> {
        self.read().get(component_id).cloned()
    }

    /// Components playing `role`, ordered by id.
    #[must_use]
    pub fn by_role(&self, role: ComponentRole) -> Vec<Arc<StressorControlProxy>> {
        self.read()
            .values()
            .filter(|p| p.role() == role)
            .cloned()
            .collect()
    }

    /// Every component, ordered by id.
    #[must_use]
    pub fn all(&self) -> Vec<Arc<StressorControlProxy>> {
        self.read().values().cloned().collect()
    }

    /// Serializable views of every component.
    #[must_use]
    pub fn snapshots(&self) -> Vec<ComponentSnapshot> {
        self.all().iter().map(|p| p.snapshot()).collect()
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no component is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::ControlConfig;
    use crate::traits::MockStressorControl;

    fn proxy(id: &str, role: ComponentRole) -> StressorControlProxy {
        StressorControlProxy::new(id, role, Arc::new(MockStressorControl::new()), ControlConfig::default())
    }

    #[test]
    fn test_register_and_lookup_by_role() {
        let registry = ComponentRegistry::new();
        assert!(registry.is_empty());
        registry.register(proxy("pub-1", ComponentRole::Publisher));
        registry.register(proxy("pub-0", ComponentRole::Publisher));
        registry.register(proxy("cpu-0", ComponentRole::Cpu));

        let publishers: Vec<String> = registry
            .by_role(ComponentRole::Publisher)
            .iter()
            .map(|p| p.component_id().to_string())
            .collect();
        assert_eq!(publishers, vec!["pub-0", "pub-1"]);
        assert!(registry.by_role(ComponentRole::Memory).is_empty());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_register_replaces_same_id() {
        let registry = ComponentRegistry::new();
        assert!(registry.register(proxy("cpu-0", ComponentRole::Cpu)).is_none());
        let replaced = registry.register(proxy("cpu-0", ComponentRole::Memory));
        assert_eq!(replaced.unwrap().role(), ComponentRole::Cpu);
        assert_eq!(registry.get("cpu-0").unwrap().role(), ComponentRole::Memory);
    }

    #[test]
    fn test_unregister() {
        let registry = ComponentRegistry::new();
        registry.register(proxy("cpu-0", ComponentRole::Cpu));
        assert!(registry.unregister("cpu-0").is_some());
        assert!(registry.get("cpu-0").is_none());
        assert_eq!(registry.snapshots().len(), 0);
    }
}
