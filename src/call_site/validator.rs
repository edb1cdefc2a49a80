//! Scope validation of call-site graphs.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::{CallSite, CallSiteKind};
use crate::error::{DiError, DiResult};
use crate::key::{Key, ServiceRequest};

/// Detects captive scoped dependencies.
///
/// Every newly built call site is walked once: a singleton reaching a scoped
/// node fails immediately, and the first scoped dependency of each request is
/// remembered so that resolving the request from the root scope can be
/// rejected on every call.
#[derive(Default)]
pub(crate) struct CallSiteValidator {
    scoped_services: RwLock<HashMap<ServiceRequest, Key>>,
}

impl CallSiteValidator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Validates a freshly built call site for `request`.
    pub(crate) fn validate_call_site(&self, request: ServiceRequest, call_site: &CallSite) -> DiResult<()> {
        if let Some(scoped) = Self::visit(call_site, None)? {
            self.scoped_services.write().insert(request, scoped);
        }
        Ok(())
    }

    /// Checks a resolution of `request` against the resolving scope.
    pub(crate) fn validate_resolution(&self, request: ServiceRequest, from_root: bool) -> DiResult<()> {
        if !from_root {
            return Ok(());
        }
        match self.scoped_services.read().get(&request) {
            Some(scoped) => Err(DiError::ScopedFromRoot {
                service: request.key().display_name(),
                scoped: scoped.display_name(),
            }),
            None => Ok(()),
        }
    }

    /// Returns the first scoped service reachable from `call_site`.
    fn visit(call_site: &CallSite, singleton: Option<&'static str>) -> DiResult<Option<Key>> {
        match &call_site.kind {
            CallSiteKind::Scoped { inner, .. } => {
                if let Some(singleton) = singleton {
                    return Err(DiError::ScopedFromSingleton {
                        scoped: call_site.service_key().display_name(),
                        singleton,
                    });
                }
                Self::visit(inner, singleton)?;
                Ok(Some(call_site.service_key()))
            }
            CallSiteKind::Singleton { inner, .. } => {
                Self::visit(inner, Some(call_site.service_key().display_name()))
            }
            CallSiteKind::Transient(inner) => Self::visit(inner, singleton),
            CallSiteKind::Constructor { parameters: children, .. } | CallSiteKind::Enumerable(children) => {
                let mut first = None;
                for child in children {
                    let scoped = Self::visit(child, singleton)?;
                    first = first.or(scoped);
                }
                Ok(first)
            }
            CallSiteKind::Constant(_)
            | CallSiteKind::Factory(_)
            | CallSiteKind::CreateInstance(_)
            | CallSiteKind::ServiceProviderSelf
            | CallSiteKind::ScopeFactorySelf => Ok(None),
        }
    }
}
