//! Interpreting engine: walks the call-site graph on every resolution.

use std::sync::Arc;

use super::{intercept, RealizedService};
use crate::activation::{AnyArc, Arguments, Produced};
use crate::call_site::{CallSite, CallSiteKind};
use crate::error::DiResult;
use crate::provider::{ResolverContext, Scope, ScopeFactory};

pub(crate) fn realize(call_site: Arc<CallSite>) -> RealizedService {
    Arc::new(move |scope: &Scope| resolve(&call_site, scope))
}

pub(crate) fn resolve(call_site: &CallSite, scope: &Scope) -> DiResult<AnyArc> {
    visit(call_site, scope).map(|produced| produced.value)
}

fn visit(call_site: &CallSite, scope: &Scope) -> DiResult<Produced> {
    match &call_site.kind {
        CallSiteKind::Constant(value) => Ok(Produced::plain(value.clone())),
        CallSiteKind::Factory(factory) => {
            let raw = factory(&ResolverContext::new(scope))?;
            Ok(intercept(Produced::plain(raw), call_site, scope))
        }
        CallSiteKind::Constructor { constructor, parameters } => {
            let values = parameters
                .iter()
                .map(|parameter| resolve(parameter, scope))
                .collect::<DiResult<Vec<_>>>()?;
            let produced = (constructor.activate)(Arguments::new(values))?;
            Ok(intercept(produced, call_site, scope))
        }
        CallSiteKind::CreateInstance(activate) => {
            let produced = activate(Arguments::empty())?;
            Ok(intercept(produced, call_site, scope))
        }
        CallSiteKind::Transient(inner) => {
            let produced = visit(inner, scope)?;
            Ok(Produced::plain(scope.capture_produced(produced)))
        }
        CallSiteKind::Scoped { cache_key, inner } => {
            scope.get_or_produce(*cache_key, || visit(inner, scope)).map(Produced::plain)
        }
        CallSiteKind::Singleton { cache_key, inner } => {
            let root = scope.root();
            root.get_or_produce(*cache_key, || visit(inner, &root)).map(Produced::plain)
        }
        CallSiteKind::Enumerable(items) => {
            let values = items.iter().map(|item| resolve(item, scope)).collect::<DiResult<Vec<_>>>()?;
            Ok(Produced::plain(Arc::new(values) as AnyArc))
        }
        CallSiteKind::ServiceProviderSelf => Ok(Produced::plain(Arc::new(scope.clone()) as AnyArc)),
        CallSiteKind::ScopeFactorySelf => {
            Ok(Produced::plain(Arc::new(ScopeFactory::new(scope.engine.clone())) as AnyArc))
        }
    }
}
