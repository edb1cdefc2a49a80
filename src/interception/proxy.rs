//! Proxy factories and the per-production interception decision.

use std::any::type_name;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, trace};

use super::{InterceptionRegistry, Interceptor, InterceptorChain};
use crate::activation::AnyArc;
use crate::call_site::CallSite;
use crate::key::{key_of_trait, key_of_type, Key};
use crate::provider::{ResolverContext, Scope};

/// Why an eligible instance could not be proxied. Never surfaced to callers:
/// the raw instance is returned instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyError {
    #[error("no interface proxy registered for {0}")]
    NoInterfaceProxy(&'static str),
    #[error("{0} has no class proxy and cannot be subclassed")]
    Sealed(&'static str),
    #[error("proxy factory for {0} received an instance of another type")]
    TargetMismatch(&'static str),
    #[error("proxy factory for {0} panicked")]
    Panicked(&'static str),
}

type ProxyFactoryFn = Arc<dyn Fn(AnyArc, InterceptorChain) -> Result<AnyArc, ProxyError> + Send + Sync>;

/// Proxy factories keyed by the service they stand in for.
#[derive(Clone, Default)]
pub(crate) struct ProxyRegistry {
    factories: HashMap<Key, ProxyFactoryFn>,
}

impl ProxyRegistry {
    pub(crate) fn add_interface<T, F>(&mut self, factory: F)
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>, InterceptorChain) -> Arc<T> + Send + Sync + 'static,
    {
        let erased: ProxyFactoryFn = Arc::new(move |raw: AnyArc, chain: InterceptorChain| {
            let target = raw
                .downcast::<Arc<T>>()
                .map_err(|_| ProxyError::TargetMismatch(type_name::<T>()))?;
            Ok::<_, ProxyError>(Arc::new(factory((*target).clone(), chain)) as AnyArc)
        });
        self.factories.insert(key_of_trait::<T>(), erased);
    }

    pub(crate) fn add_class<T, F>(&mut self, factory: F)
    where
        T: Send + Sync + 'static,
        F: Fn(Arc<T>, InterceptorChain) -> T + Send + Sync + 'static,
    {
        let erased: ProxyFactoryFn = Arc::new(move |raw: AnyArc, chain: InterceptorChain| {
            let target = raw
                .downcast::<T>()
                .map_err(|_| ProxyError::TargetMismatch(type_name::<T>()))?;
            Ok::<_, ProxyError>(Arc::new(factory(target, chain)) as AnyArc)
        });
        self.factories.insert(key_of_type::<T>(), erased);
    }

    pub(crate) fn len(&self) -> usize {
        self.factories.len()
    }

    fn create(&self, service: Key, raw: AnyArc, chain: InterceptorChain) -> Result<AnyArc, ProxyError> {
        let name = service.display_name();
        let factory = match self.factories.get(&service) {
            Some(factory) => factory,
            None if service.is_trait() => return Err(ProxyError::NoInterfaceProxy(name)),
            None => return Err(ProxyError::Sealed(name)),
        };
        catch_unwind(AssertUnwindSafe(|| factory(raw, chain))).unwrap_or(Err(ProxyError::Panicked(name)))
    }
}

/// Interception decision applied at every factory and constructor production.
pub(crate) struct Interception {
    registry: Arc<InterceptionRegistry>,
    proxies: ProxyRegistry,
}

impl Interception {
    pub(crate) fn new(registry: Arc<InterceptionRegistry>, proxies: ProxyRegistry) -> Self {
        Self { registry, proxies }
    }

    pub(crate) fn registry(&self) -> &Arc<InterceptionRegistry> {
        &self.registry
    }

    /// Creates the global interceptors if they are still missing.
    ///
    /// Must run while this thread holds no scope cache lock: the interceptor
    /// factories resolve their own dependencies from the root scope.
    pub(crate) fn prepare(&self, scope: &Scope) {
        if self.registry.awaits_materialization() {
            let root = scope.root();
            self.registry.materialize(&ResolverContext::new(&root));
        }
    }

    /// Returns a proxy for `raw` when its implementation is interceptable and
    /// the chain is non-empty, otherwise `raw` itself.
    pub(crate) fn maybe_intercept(&self, raw: AnyArc, call_site: &CallSite) -> AnyArc {
        let implementation = call_site.implementation_name();
        if !self.registry.is_interceptable(implementation) {
            return raw;
        }

        let global = self.registry.materialized().unwrap_or_else(|| {
            if self.registry.factory_count() > 0 {
                debug!(implementation, "global interceptors not created yet, applying descriptor interceptors only");
            }
            Arc::from(Vec::new())
        });
        let interceptors: Vec<Arc<dyn Interceptor>> =
            global.iter().chain(call_site.interceptors().iter()).cloned().collect();
        if interceptors.is_empty() {
            trace!(implementation, "interceptable but no interceptors registered");
            return raw;
        }

        let service = call_site.service_key();
        let chain = InterceptorChain::new(interceptors, service.display_name(), implementation);
        match self.proxies.create(service, raw.clone(), chain) {
            Ok(proxy) => {
                debug!(service = service.display_name(), implementation, "created interception proxy");
                proxy
            }
            Err(error) => {
                debug!(service = service.display_name(), implementation, %error, "proxy not created, using raw instance");
                raw
            }
        }
    }
}
