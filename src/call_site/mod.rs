//! Call-site graph: the resolution plan for a service request.
//!
//! A call site describes how one value is produced. The graph for a request is
//! built once from the descriptors, validated, then executed by an engine for
//! every resolution.

use std::fmt;
use std::sync::Arc;

use crate::activation::{ActivateFn, AnyArc, ConstructorInfo};
use crate::descriptors::FactoryFn;
use crate::interception::Interceptor;
use crate::key::{CacheKey, Key};
use crate::lifetime::Lifetime;

mod builder;
mod validator;

pub(crate) use builder::{CallSiteChain, CallSiteFactory};
pub(crate) use validator::CallSiteValidator;

/// Node kinds of the call-site graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallSiteType {
    /// A fixed, pre-built instance.
    Constant,
    /// A registered factory closure.
    Factory,
    /// A constructor invoked with resolved parameters.
    Constructor,
    /// Activation without dependencies.
    CreateInstance,
    /// New instance per resolution, tracked for disposal.
    Transient,
    /// Cached once per scope.
    Scoped,
    /// Cached once in the root scope.
    Singleton,
    /// Every registration of a service, in registration order.
    Enumerable,
    /// The resolving scope itself.
    ServiceProvider,
    /// The scope factory.
    ScopeFactory,
}

pub(crate) enum CallSiteKind {
    Constant(AnyArc),
    Factory(FactoryFn),
    Constructor {
        constructor: ConstructorInfo,
        parameters: Vec<Arc<CallSite>>,
    },
    CreateInstance(ActivateFn),
    Transient(Arc<CallSite>),
    Scoped {
        cache_key: CacheKey,
        inner: Arc<CallSite>,
    },
    Singleton {
        cache_key: CacheKey,
        inner: Arc<CallSite>,
    },
    Enumerable(Vec<Arc<CallSite>>),
    ServiceProviderSelf,
    ScopeFactorySelf,
}

/// One node of the call-site graph.
pub struct CallSite {
    service: Key,
    implementation: &'static str,
    interceptors: Arc<[Arc<dyn Interceptor>]>,
    pub(crate) kind: CallSiteKind,
}

impl CallSite {
    pub(crate) fn new(
        service: Key,
        implementation: &'static str,
        interceptors: Arc<[Arc<dyn Interceptor>]>,
        kind: CallSiteKind,
    ) -> Self {
        Self { service, implementation, interceptors, kind }
    }

    /// A node without implementation details of its own.
    pub(crate) fn bare(service: Key, kind: CallSiteKind) -> Self {
        Self::new(service, service.display_name(), Arc::from(Vec::new()), kind)
    }

    /// Wraps `inner` in a lifetime node carrying the same identity.
    pub(crate) fn wrap(inner: &Arc<CallSite>, kind: CallSiteKind) -> Self {
        Self::new(inner.service, inner.implementation, inner.interceptors.clone(), kind)
    }

    pub fn service_key(&self) -> Key {
        self.service
    }

    pub fn implementation_name(&self) -> &'static str {
        self.implementation
    }

    /// Descriptor-level interceptors applied when this node's production is intercepted.
    pub fn interceptors(&self) -> &[Arc<dyn Interceptor>] {
        &self.interceptors
    }

    pub fn call_site_type(&self) -> CallSiteType {
        match &self.kind {
            CallSiteKind::Constant(_) => CallSiteType::Constant,
            CallSiteKind::Factory(_) => CallSiteType::Factory,
            CallSiteKind::Constructor { .. } => CallSiteType::Constructor,
            CallSiteKind::CreateInstance(_) => CallSiteType::CreateInstance,
            CallSiteKind::Transient(_) => CallSiteType::Transient,
            CallSiteKind::Scoped { .. } => CallSiteType::Scoped,
            CallSiteKind::Singleton { .. } => CallSiteType::Singleton,
            CallSiteKind::Enumerable(_) => CallSiteType::Enumerable,
            CallSiteKind::ServiceProviderSelf => CallSiteType::ServiceProvider,
            CallSiteKind::ScopeFactorySelf => CallSiteType::ScopeFactory,
        }
    }

    /// Lifetime of a lifetime node, `None` for production nodes.
    pub fn lifetime(&self) -> Option<Lifetime> {
        match &self.kind {
            CallSiteKind::Transient(_) => Some(Lifetime::Transient),
            CallSiteKind::Scoped { .. } => Some(Lifetime::Scoped),
            CallSiteKind::Singleton { .. } => Some(Lifetime::Singleton),
            _ => None,
        }
    }

    /// Cache identity of a scoped or singleton node.
    pub fn cache_key(&self) -> Option<CacheKey> {
        match &self.kind {
            CallSiteKind::Scoped { cache_key, .. } | CallSiteKind::Singleton { cache_key, .. } => Some(*cache_key),
            _ => None,
        }
    }

    /// Direct children: constructor parameters, enumerable items, or the
    /// wrapped node of a lifetime node.
    pub fn children(&self) -> &[Arc<CallSite>] {
        match &self.kind {
            CallSiteKind::Constructor { parameters, .. } => parameters,
            CallSiteKind::Enumerable(items) => items,
            CallSiteKind::Transient(inner)
            | CallSiteKind::Scoped { inner, .. }
            | CallSiteKind::Singleton { inner, .. } => std::slice::from_ref(inner),
            _ => &[],
        }
    }
}

impl fmt::Debug for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSite")
            .field("type", &self.call_site_type())
            .field("service", &self.service.display_name())
            .field("implementation", &self.implementation)
            .field("children", &self.children())
            .finish()
    }
}
