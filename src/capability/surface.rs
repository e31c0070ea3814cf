use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use log::debug;

use super::{CapabilityEndpoint, CapabilityRegistry, EndpointKey};
use crate::error::{RazerError, RazerResult};

/// Per-device map of callable endpoints.
///
/// Built from the capability ids a device profile declares. Invocations take
/// the read side of the lock only long enough to clone the endpoint handle;
/// `add` and `remove` take the write side.
pub struct Surface {
    registry: Arc<CapabilityRegistry>,
    declared: Vec<&'static str>,
    inner: RwLock<SurfaceInner>,
}

/// Bindings keyed by namespace, then method name. Iteration follows
/// `(namespace, method)` order.
#[derive(Default)]
struct SurfaceInner {
    bindings: BTreeMap<&'static str, BTreeMap<&'static str, Arc<CapabilityEndpoint>>>,
    runtime_added: BTreeSet<&'static str>,
}

impl SurfaceInner {
    fn bind(&mut self, endpoint: Arc<CapabilityEndpoint>) {
        self.bindings
            .entry(endpoint.namespace())
            .or_default()
            .insert(endpoint.method(), endpoint);
    }

    fn endpoints(&self) -> impl Iterator<Item = &Arc<CapabilityEndpoint>> {
        self.bindings.values().flat_map(BTreeMap::values)
    }
}

impl Surface {
    /// Composes a surface from `capabilities`, in order. Ids without a
    /// registered endpoint are skipped.
    pub fn compose(registry: Arc<CapabilityRegistry>, capabilities: &[&'static str]) -> Self {
        let mut inner = SurfaceInner::default();
        for capability in capabilities {
            match registry.by_capability(capability) {
                Some(endpoint) => inner.bind(endpoint),
                None => debug!("Capability '{capability}' has no endpoint yet, skipping"),
            }
        }
        Self {
            registry,
            declared: capabilities.to_vec(),
            inner: RwLock::new(inner),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SurfaceInner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SurfaceInner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Binds one more capability after construction.
    pub fn add(&self, capability: &str) -> RazerResult<()> {
        let endpoint =
            self.registry
                .by_capability(capability)
                .ok_or_else(|| RazerError::EndpointNotFound {
                    namespace: "*".to_string(),
                    method: capability.to_string(),
                })?;
        let mut inner = self.write();
        inner.runtime_added.insert(endpoint.capability);
        inner.bind(endpoint);
        Ok(())
    }

    /// Unbinds a method. Returns false when it was not bound.
    pub fn remove(&self, namespace: &str, method: &str) -> bool {
        let mut guard = self.write();
        let inner = &mut *guard;
        let Some(methods) = inner.bindings.get_mut(namespace) else {
            return false;
        };
        let Some(endpoint) = methods.remove(method) else {
            return false;
        };
        if methods.is_empty() {
            inner.bindings.remove(namespace);
        }
        inner.runtime_added.remove(endpoint.capability);
        true
    }

    pub fn get(&self, namespace: &str, method: &str) -> Option<Arc<CapabilityEndpoint>> {
        self.read()
            .bindings
            .get(namespace)
            .and_then(|methods| methods.get(method))
            .cloned()
    }

    /// First binding with this method name, in key order.
    pub fn find_method(&self, method: &str) -> Option<Arc<CapabilityEndpoint>> {
        self.read()
            .bindings
            .values()
            .find_map(|methods| methods.get(method))
            .cloned()
    }

    /// Method name to arity, first binding per name in key order.
    pub fn method_arities(&self) -> BTreeMap<&'static str, usize> {
        let mut arities = BTreeMap::new();
        for endpoint in self.read().endpoints() {
            arities.entry(endpoint.method()).or_insert(endpoint.arity());
        }
        arities
    }

    pub fn endpoints(&self) -> Vec<Arc<CapabilityEndpoint>> {
        self.read().endpoints().cloned().collect()
    }

    pub fn keys(&self) -> Vec<EndpointKey> {
        self.read().endpoints().map(|endpoint| endpoint.key).collect()
    }

    pub fn declared(&self) -> &[&'static str] {
        &self.declared
    }

    pub fn runtime_added(&self) -> Vec<&'static str> {
        self.read().runtime_added.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.read().endpoints().count()
    }

    pub fn is_empty(&self) -> bool {
        self.read().bindings.is_empty()
    }
}
