//! Compiling engine: reduces a call-site graph to a tree of closures once.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::{intercept, RealizedService};
use crate::activation::{AnyArc, Arguments, Produced};
use crate::call_site::{CallSite, CallSiteKind};
use crate::error::DiResult;
use crate::provider::{ResolverContext, Scope, ScopeFactory};

type Producer = Arc<dyn Fn(&Scope) -> DiResult<Produced> + Send + Sync>;

pub(crate) fn realize(call_site: &Arc<CallSite>) -> RealizedService {
    compile_value(call_site)
}

fn compile_value(call_site: &Arc<CallSite>) -> RealizedService {
    let producer = compile(call_site);
    Arc::new(move |scope: &Scope| producer(scope).map(|produced| produced.value))
}

fn compile(call_site: &Arc<CallSite>) -> Producer {
    match &call_site.kind {
        CallSiteKind::Constant(value) => {
            let value = value.clone();
            Arc::new(move |_: &Scope| -> DiResult<Produced> { Ok(Produced::plain(value.clone())) })
        }
        CallSiteKind::Factory(factory) => {
            let factory = factory.clone();
            let site = call_site.clone();
            Arc::new(move |scope: &Scope| -> DiResult<Produced> {
                let raw = factory(&ResolverContext::new(scope))?;
                Ok(intercept(Produced::plain(raw), &site, scope))
            })
        }
        CallSiteKind::Constructor { constructor, parameters } => {
            let activate = constructor.activate.clone();
            let parameters: Vec<_> = parameters.iter().map(compile_value).collect();
            let site = call_site.clone();
            Arc::new(move |scope: &Scope| -> DiResult<Produced> {
                let mut values = Vec::with_capacity(parameters.len());
                for parameter in &parameters {
                    values.push(parameter(scope)?);
                }
                let produced = activate(Arguments::new(values))?;
                Ok(intercept(produced, &site, scope))
            })
        }
        CallSiteKind::CreateInstance(activate) => {
            let activate = activate.clone();
            let site = call_site.clone();
            Arc::new(move |scope: &Scope| -> DiResult<Produced> {
                let produced = activate(Arguments::empty())?;
                Ok(intercept(produced, &site, scope))
            })
        }
        CallSiteKind::Transient(inner) => {
            let inner = compile(inner);
            Arc::new(move |scope: &Scope| -> DiResult<Produced> {
                let produced = inner(scope)?;
                Ok(Produced::plain(scope.capture_produced(produced)))
            })
        }
        CallSiteKind::Scoped { cache_key, inner } => {
            let cache_key = *cache_key;
            let inner = compile(inner);
            Arc::new(move |scope: &Scope| {
                scope.get_or_produce(cache_key, || inner(scope)).map(Produced::plain)
            })
        }
        CallSiteKind::Singleton { cache_key, inner } => {
            let cache_key = *cache_key;
            let inner = compile(inner);
            // The root cache stays authoritative; this only skips its lock
            let resolved: OnceCell<AnyArc> = OnceCell::new();
            Arc::new(move |scope: &Scope| -> DiResult<Produced> {
                if let Some(value) = resolved.get() {
                    return Ok(Produced::plain(value.clone()));
                }
                let root = scope.root();
                let value = root.get_or_produce(cache_key, || inner(&root))?;
                Ok(Produced::plain(resolved.get_or_init(|| value).clone()))
            })
        }
        CallSiteKind::Enumerable(items) => {
            let items: Vec<_> = items.iter().map(compile_value).collect();
            Arc::new(move |scope: &Scope| -> DiResult<Produced> {
                let values = items.iter().map(|item| item(scope)).collect::<DiResult<Vec<_>>>()?;
                Ok(Produced::plain(Arc::new(values) as AnyArc))
            })
        }
        CallSiteKind::ServiceProviderSelf => {
            Arc::new(|scope: &Scope| -> DiResult<Produced> { Ok(Produced::plain(Arc::new(scope.clone()) as AnyArc)) })
        }
        CallSiteKind::ScopeFactorySelf => Arc::new(|scope: &Scope| -> DiResult<Produced> {
            Ok(Produced::plain(Arc::new(ScopeFactory::new(scope.engine.clone())) as AnyArc))
        }),
    }
}
