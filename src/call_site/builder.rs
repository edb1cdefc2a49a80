//! Builds and memoizes call-site graphs from service descriptors.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use super::{CallSite, CallSiteKind};
use crate::activation::TypeActivator;
use crate::descriptors::{Implementation, ServiceDescriptor};
use crate::error::{DiError, DiResult};
use crate::interception::Interceptor;
use crate::key::{key_of_type, CacheKey, Key, ServiceRequest};
use crate::lifetime::Lifetime;
use crate::provider::{Scope, ScopeFactory};

/// Requests currently being built on one build path.
#[derive(Debug, Default)]
pub(crate) struct CallSiteChain {
    path: Vec<ServiceRequest>,
}

impl CallSiteChain {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn enter(&mut self, request: ServiceRequest) -> DiResult<()> {
        if self.path.contains(&request) {
            let mut names: Vec<&'static str> = self.path.iter().map(|r| r.key().display_name()).collect();
            names.push(request.key().display_name());
            return Err(DiError::Circular(names));
        }
        self.path.push(request);
        Ok(())
    }

    fn leave(&mut self, request: ServiceRequest) {
        if let Some(last) = self.path.pop() {
            debug_assert_eq!(last, request);
        }
    }
}

/// Call-site builder over an immutable descriptor set.
pub(crate) struct CallSiteFactory {
    descriptors: Vec<ServiceDescriptor>,
    // Descriptor positions per service key, in registration order
    index: HashMap<Key, Vec<usize>>,
    cache: RwLock<HashMap<ServiceRequest, Arc<CallSite>>>,
}

impl CallSiteFactory {
    pub(crate) fn new(descriptors: Vec<ServiceDescriptor>) -> Self {
        let mut index: HashMap<Key, Vec<usize>> = HashMap::new();
        for (position, descriptor) in descriptors.iter().enumerate() {
            index.entry(descriptor.key()).or_default().push(position);
        }
        Self { descriptors, index, cache: RwLock::new(HashMap::new()) }
    }

    pub(crate) fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    /// Returns the memoized call site for `request`, building it on first use.
    ///
    /// `Ok(None)` means no registration exists for a single request. All
    /// requests always yield a call site, possibly with no items.
    pub(crate) fn get_call_site(
        &self,
        request: ServiceRequest,
        chain: &mut CallSiteChain,
    ) -> DiResult<Option<Arc<CallSite>>> {
        if let Some(call_site) = self.cache.read().get(&request) {
            trace!(service = request.key().display_name(), "call site cache hit");
            return Ok(Some(call_site.clone()));
        }

        chain.enter(request)?;
        let built = match request {
            ServiceRequest::Single(key) => self.try_create_exact(key, chain),
            ServiceRequest::All(key) => self.try_create_enumerable(key, chain).map(Some),
        };
        chain.leave(request);

        let built = built?;
        if let Some(call_site) = &built {
            debug!(
                service = request.key().display_name(),
                call_site = ?call_site.call_site_type(),
                "created call site"
            );
            // A racing build of the same request yields an equivalent graph
            self.cache.write().insert(request, call_site.clone());
        }
        Ok(built)
    }

    fn try_create_exact(&self, key: Key, chain: &mut CallSiteChain) -> DiResult<Option<Arc<CallSite>>> {
        if key == key_of_type::<Scope>() {
            return Ok(Some(Arc::new(CallSite::bare(key, CallSiteKind::ServiceProviderSelf))));
        }
        if key == key_of_type::<ScopeFactory>() {
            return Ok(Some(Arc::new(CallSite::bare(key, CallSiteKind::ScopeFactorySelf))));
        }

        let Some(&last) = self.index.get(&key).and_then(|positions| positions.last()) else {
            return Ok(None);
        };
        self.create_from_descriptor(&self.descriptors[last], 0, chain).map(Some)
    }

    fn try_create_enumerable(&self, key: Key, chain: &mut CallSiteChain) -> DiResult<Arc<CallSite>> {
        let positions = self.index.get(&key).map(Vec::as_slice).unwrap_or(&[]);
        let count = positions.len();
        let items = positions
            .iter()
            .enumerate()
            .map(|(i, &position)| self.create_from_descriptor(&self.descriptors[position], count - 1 - i, chain))
            .collect::<DiResult<Vec<_>>>()?;
        Ok(Arc::new(CallSite::bare(key, CallSiteKind::Enumerable(items))))
    }

    fn create_from_descriptor(
        &self,
        descriptor: &ServiceDescriptor,
        slot: usize,
        chain: &mut CallSiteChain,
    ) -> DiResult<Arc<CallSite>> {
        let key = descriptor.key();
        let interceptors: Arc<[Arc<dyn Interceptor>]> = descriptor.interceptors().into();
        let production = |kind| CallSite::new(key, descriptor.implementation_name(), interceptors.clone(), kind);

        let inner = match &descriptor.implementation {
            // Fixed instances need neither caching nor disposal tracking
            Implementation::Instance(value) => {
                return Ok(Arc::new(production(CallSiteKind::Constant(value.clone()))));
            }
            Implementation::Factory(factory) => production(CallSiteKind::Factory(factory.clone())),
            Implementation::Type(activator) => production(self.select_constructor(activator, chain)?),
        };
        let inner = Arc::new(inner);

        let cache_key = CacheKey { key, slot };
        let kind = match descriptor.lifetime() {
            Lifetime::Transient => CallSiteKind::Transient(inner.clone()),
            Lifetime::Scoped => CallSiteKind::Scoped { cache_key, inner: inner.clone() },
            Lifetime::Singleton => CallSiteKind::Singleton { cache_key, inner: inner.clone() },
        };
        Ok(Arc::new(CallSite::wrap(&inner, kind)))
    }

    /// Picks the usable constructor with the most parameters, first declared on ties.
    fn select_constructor(&self, activator: &TypeActivator, chain: &mut CallSiteChain) -> DiResult<CallSiteKind> {
        let mut best: Option<(usize, Vec<Arc<CallSite>>)> = None;
        let mut missing: Vec<&'static str> = Vec::new();

        for (index, constructor) in activator.constructors.iter().enumerate() {
            let mut parameters = Vec::with_capacity(constructor.parameters.len());
            let mut usable = true;
            for parameter in &constructor.parameters {
                match self.get_call_site(parameter.request(), chain)? {
                    Some(call_site) => parameters.push(call_site),
                    None => {
                        usable = false;
                        let name = parameter.key.display_name();
                        if !missing.contains(&name) {
                            missing.push(name);
                        }
                    }
                }
            }

            let better = best.as_ref().map_or(true, |(_, chosen)| parameters.len() > chosen.len());
            if usable && better {
                best = Some((index, parameters));
            }
        }

        match best {
            Some((index, parameters)) if !parameters.is_empty() => Ok(CallSiteKind::Constructor {
                constructor: activator.constructors[index].clone(),
                parameters,
            }),
            Some((index, _)) => Ok(CallSiteKind::CreateInstance(activator.constructors[index].activate.clone())),
            None => match &activator.default_activation {
                Some(activate) => Ok(CallSiteKind::CreateInstance(activate.clone())),
                None => Err(DiError::NoViableConstructor {
                    implementation: activator.implementation,
                    missing,
                }),
            },
        }
    }
}
