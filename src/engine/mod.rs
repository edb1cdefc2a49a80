//! Resolution engines.
//!
//! Every engine executes the same call-site graph. A request's graph is turned
//! into a realized service on first resolution and cached; what the realized
//! service does depends on the provider's [`ServiceProviderMode`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::activation::{AnyArc, Produced};
use crate::call_site::{CallSite, CallSiteChain, CallSiteFactory, CallSiteValidator};
use crate::descriptors::ServiceDescriptor;
use crate::error::{DiError, DiResult};
use crate::interception::Interception;
use crate::internal::{resolution_depth, ResolutionGuard};
use crate::key::ServiceRequest;
use crate::provider::{Scope, ScopeState, ServiceProviderOptions};

mod compiled;
mod runtime;

/// A request's reusable production routine.
pub(crate) type RealizedService = Arc<dyn Fn(&Scope) -> DiResult<AnyArc> + Send + Sync>;

/// Strategy used to execute call-site graphs.
///
/// All modes produce equivalent object graphs and differ only in latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "config", derive(serde::Deserialize), serde(rename_all = "lowercase"))]
pub enum ServiceProviderMode {
    /// Walk the graph on every resolution.
    Runtime,
    /// Reduce the graph to a closure tree on first resolution.
    Compiled,
    /// Walk the graph, then switch to the compiled form after repeated use.
    #[default]
    Dynamic,
}

impl FromStr for ServiceProviderMode {
    type Err = DiError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "runtime" => Ok(ServiceProviderMode::Runtime),
            "compiled" => Ok(ServiceProviderMode::Compiled),
            "dynamic" => Ok(ServiceProviderMode::Dynamic),
            other => Err(DiError::Configuration(format!("unknown provider mode {:?}", other))),
        }
    }
}

impl fmt::Display for ServiceProviderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ServiceProviderMode::Runtime => "runtime",
            ServiceProviderMode::Compiled => "compiled",
            ServiceProviderMode::Dynamic => "dynamic",
        };
        f.write_str(name)
    }
}

/// State shared by a provider and all of its scopes.
pub(crate) struct ProviderEngine {
    pub(crate) call_sites: CallSiteFactory,
    validator: Option<CallSiteValidator>,
    pub(crate) realized: RwLock<HashMap<ServiceRequest, RealizedService>>,
    pub(crate) root: Arc<ScopeState>,
    pub(crate) interception: Interception,
    pub(crate) options: ServiceProviderOptions,
}

impl ProviderEngine {
    pub(crate) fn new(
        descriptors: Vec<ServiceDescriptor>,
        interception: Interception,
        options: ServiceProviderOptions,
    ) -> Self {
        debug!(
            descriptors = descriptors.len(),
            mode = %options.mode,
            validate_scopes = options.validate_scopes,
            "building service provider"
        );
        Self {
            call_sites: CallSiteFactory::new(descriptors),
            validator: options.validate_scopes.then(CallSiteValidator::new),
            realized: RwLock::new(HashMap::new()),
            root: Arc::new(ScopeState::new()),
            interception,
            options,
        }
    }

    /// Resolves `request` against `scope`; `Ok(None)` when nothing is registered.
    pub(crate) fn get_service(&self, request: ServiceRequest, scope: &Scope) -> DiResult<Option<AnyArc>> {
        if scope.is_disposed() || self.root.is_disposed() {
            return Err(DiError::Disposed);
        }
        // No scope cache lock is held on this thread outside a resolution
        if resolution_depth() == 0 {
            self.interception.prepare(scope);
        }
        let _guard = ResolutionGuard::enter(request)?;

        let Some(realized) = self.realized_service(request)? else {
            return Ok(None);
        };
        if let Some(validator) = &self.validator {
            validator.validate_resolution(request, scope.is_root())?;
        }
        realized(scope).map(Some)
    }

    /// Builds, validates and realizes the call site of `request` once.
    /// Build failures are not cached.
    fn realized_service(&self, request: ServiceRequest) -> DiResult<Option<RealizedService>> {
        if let Some(realized) = self.realized.read().get(&request) {
            return Ok(Some(realized.clone()));
        }

        let Some(call_site) = self.call_site(request)? else {
            return Ok(None);
        };
        if let Some(validator) = &self.validator {
            validator.validate_call_site(request, &call_site)?;
        }

        let realized = self.realize(request, call_site);
        self.realized.write().entry(request).or_insert_with(|| realized.clone());
        Ok(Some(realized))
    }

    pub(crate) fn call_site(&self, request: ServiceRequest) -> DiResult<Option<Arc<CallSite>>> {
        self.call_sites.get_call_site(request, &mut CallSiteChain::new())
    }

    fn realize(&self, request: ServiceRequest, call_site: Arc<CallSite>) -> RealizedService {
        debug!(service = request.key().display_name(), mode = %self.options.mode, "realizing service");
        match self.options.mode {
            ServiceProviderMode::Runtime => runtime::realize(call_site),
            ServiceProviderMode::Compiled => compiled::realize(&call_site),
            ServiceProviderMode::Dynamic if self.options.promotion_threshold <= 1 => compiled::realize(&call_site),
            ServiceProviderMode::Dynamic => promoting(request, call_site, self.options.promotion_threshold),
        }
    }

    /// Drops realized services so cached closures release their instances.
    pub(crate) fn clear_realized(&self) {
        self.realized.write().clear();
    }
}

/// Interprets until `threshold` calls, then replaces itself with the compiled form.
fn promoting(request: ServiceRequest, call_site: Arc<CallSite>, threshold: usize) -> RealizedService {
    let calls = AtomicUsize::new(0);
    Arc::new(move |scope: &Scope| {
        if calls.fetch_add(1, Ordering::Relaxed) + 1 == threshold {
            debug!(service = request.key().display_name(), calls = threshold, "promoting to compiled");
            let compiled = compiled::realize(&call_site);
            scope.engine.realized.write().insert(request, compiled.clone());
            return compiled(scope);
        }
        runtime::resolve(&call_site, scope)
    })
}

/// Applies the interception decision to a constructor or factory production.
pub(crate) fn intercept(produced: Produced, call_site: &CallSite, scope: &Scope) -> Produced {
    Produced {
        value: scope.engine.interception.maybe_intercept(produced.value, call_site),
        disposable: produced.disposable,
    }
}
