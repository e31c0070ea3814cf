use std::{collections::HashMap, sync::Arc};

use log::debug;

use super::{CapabilityEndpoint, EndpointKey, catalog};
use crate::error::{RazerError, RazerResult};

/// Process-wide catalog of capability endpoints.
///
/// Filled once at startup from the explicit table in [`catalog`] and only read
/// afterwards. Endpoints are shared with device surfaces by `Arc`, never
/// copied.
///
/// # Example
///
/// ```no_run
/// use razerd::capability::CapabilityRegistry;
///
/// let registry = CapabilityRegistry::with_catalog()?;
/// let endpoint = registry.lookup("razer.device.lighting.chroma", "setStatic")?;
/// assert_eq!(endpoint.arity(), 3);
/// # Ok::<(), razerd::error::RazerError>(())
/// ```
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    /// Namespace, then method name.
    endpoints: HashMap<&'static str, HashMap<&'static str, Arc<CapabilityEndpoint>>>,
    capabilities: HashMap<&'static str, Arc<CapabilityEndpoint>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry holding every cataloged endpoint.
    pub fn with_catalog() -> RazerResult<Self> {
        let mut registry = Self::new();
        for endpoint in catalog::endpoints() {
            registry.register(endpoint)?;
        }
        debug!("Capability registry holds {} endpoints", registry.len());
        Ok(registry)
    }

    /// Adds an endpoint. Both the `(namespace, method)` identity and the
    /// capability id must be unused.
    pub fn register(&mut self, endpoint: CapabilityEndpoint) -> RazerResult<()> {
        let key = endpoint.key;
        if self.get(key.namespace, key.method).is_some()
            || self.capabilities.contains_key(endpoint.capability)
        {
            return Err(RazerError::DuplicateEndpoint {
                namespace: key.namespace.to_string(),
                method: key.method.to_string(),
            });
        }
        let endpoint = Arc::new(endpoint);
        self.capabilities.insert(endpoint.capability, endpoint.clone());
        self.endpoints
            .entry(key.namespace)
            .or_default()
            .insert(key.method, endpoint);
        Ok(())
    }

    fn get(&self, namespace: &str, method: &str) -> Option<&Arc<CapabilityEndpoint>> {
        self.endpoints
            .get(namespace)
            .and_then(|methods| methods.get(method))
    }

    pub fn lookup(&self, namespace: &str, method: &str) -> RazerResult<Arc<CapabilityEndpoint>> {
        self.get(namespace, method)
            .cloned()
            .ok_or_else(|| RazerError::EndpointNotFound {
                namespace: namespace.to_string(),
                method: method.to_string(),
            })
    }

    /// Resolves a capability id as used in device profiles.
    pub fn by_capability(&self, capability: &str) -> Option<Arc<CapabilityEndpoint>> {
        self.capabilities.get(capability).cloned()
    }

    pub fn contains(&self, key: &EndpointKey) -> bool {
        self.get(key.namespace, key.method).is_some()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}
