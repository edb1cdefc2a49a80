use aspect_di::{
    key_of_trait, CallSiteType, Constructor, Injectable, Lifetime, Resolver, ServiceCollection, ServiceDescriptor,
    ServiceRequest,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

trait Plugin: Send + Sync {
    fn name(&self) -> &str;
}

struct PluginA;
impl Plugin for PluginA {
    fn name(&self) -> &str {
        "PluginA"
    }
}

struct PluginB;
impl Plugin for PluginB {
    fn name(&self) -> &str {
        "PluginB"
    }
}

struct PluginC;
impl Plugin for PluginC {
    fn name(&self) -> &str {
        "PluginC"
    }
}

fn names(plugins: &[Arc<dyn Plugin>]) -> Vec<&str> {
    plugins.iter().map(|p| p.name()).collect()
}

#[test]
fn test_multi_binding_preserves_registration_order() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton_trait::<dyn Plugin>(Arc::new(PluginA));
    sc.add_transient_trait_factory::<dyn Plugin, _>(|_| Arc::new(PluginB));
    sc.add_singleton_trait::<dyn Plugin>(Arc::new(PluginC));

    let sp = sc.build();
    let plugins = sp.get_all_trait::<dyn Plugin>().unwrap();
    assert_eq!(names(&plugins), vec!["PluginA", "PluginB", "PluginC"]);

    // Single resolution takes the last registration
    assert_eq!(sp.get_required_trait::<dyn Plugin>().name(), "PluginC");

    let again = sp.get_all_trait::<dyn Plugin>().unwrap();
    assert!(Arc::ptr_eq(&plugins[0], &again[0]));
    assert!(!Arc::ptr_eq(&plugins[1], &again[1]));
}

#[test]
fn test_unregistered_enumerable_is_empty() {
    let sp = ServiceCollection::new().build();
    assert!(sp.get_all_trait::<dyn Plugin>().unwrap().is_empty());
    assert!(sp.get_all::<u64>().unwrap().is_empty());
    assert!(sp.try_get_trait::<dyn Plugin>().unwrap().is_none());
}

#[test]
fn test_last_singleton_is_shared_between_single_and_enumerable() {
    let created = Arc::new(AtomicUsize::new(0));
    let mut sc = ServiceCollection::new();
    for _ in 0..2 {
        let created = created.clone();
        sc.add_singleton_factory::<u32, _>(move |_| created.fetch_add(1, Ordering::SeqCst) as u32);
    }

    let sp = sc.build();
    let single = sp.get_required::<u32>();
    let all = sp.get_all::<u32>().unwrap();

    assert_eq!(all.len(), 2);
    assert!(Arc::ptr_eq(&single, &all[1]));
    assert!(!Arc::ptr_eq(&all[0], &all[1]));
    assert_eq!(created.load(Ordering::SeqCst), 2);
}

#[test]
fn test_scoped_enumerable_items_are_cached_per_scope() {
    let mut sc = ServiceCollection::new();
    sc.add_scoped_trait_factory::<dyn Plugin, _>(|_| Arc::new(PluginA));
    sc.add_scoped_trait_factory::<dyn Plugin, _>(|_| Arc::new(PluginB));

    let sp = sc.build();
    let scope1 = sp.create_scope();
    let scope2 = sp.create_scope();

    let first = scope1.get_all_trait::<dyn Plugin>().unwrap();
    let second = scope1.get_all_trait::<dyn Plugin>().unwrap();
    let other = scope2.get_all_trait::<dyn Plugin>().unwrap();

    assert!(Arc::ptr_eq(&first[0], &second[0]));
    assert!(Arc::ptr_eq(&first[1], &second[1]));
    assert!(!Arc::ptr_eq(&first[0], &other[0]));
}

#[test]
fn test_enumerable_constructor_parameter() {
    struct Host {
        plugins: Vec<Arc<dyn Plugin>>,
    }

    impl Injectable for Host {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(|args| Ok(Host { plugins: args.next_all_trait()? }))
                .param_all_trait::<dyn Plugin>()]
        }
    }

    let mut sc = ServiceCollection::new();
    sc.add_singleton_type::<Host>();
    sc.add_singleton_trait::<dyn Plugin>(Arc::new(PluginB));
    sc.add_singleton_trait::<dyn Plugin>(Arc::new(PluginA));

    // Registrations made after the consumer still count
    let sp = sc.build();
    let host = sp.get_required::<Host>();
    assert_eq!(names(&host.plugins), vec!["PluginB", "PluginA"]);
}

#[test]
fn test_enumerable_parameter_satisfied_without_registrations() {
    struct Host {
        plugins: Vec<Arc<dyn Plugin>>,
    }

    impl Injectable for Host {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(|args| Ok(Host { plugins: args.next_all_trait()? }))
                .param_all_trait::<dyn Plugin>()]
        }
    }

    let mut sc = ServiceCollection::new();
    sc.add_transient_type::<Host>();
    assert!(sc.build().get_required::<Host>().plugins.is_empty());
}

#[test]
fn test_enumerable_call_site_shape() {
    let mut sc = ServiceCollection::new();
    sc.add_singleton_trait::<dyn Plugin>(Arc::new(PluginA));
    sc.add_scoped_trait_factory::<dyn Plugin, _>(|_| Arc::new(PluginB));

    let sp = sc.build();
    let site = sp.call_site(ServiceRequest::All(key_of_trait::<dyn Plugin>())).unwrap().unwrap();
    assert_eq!(site.call_site_type(), CallSiteType::Enumerable);

    let kinds: Vec<_> = site.children().iter().map(|child| child.call_site_type()).collect();
    assert_eq!(kinds, vec![CallSiteType::Constant, CallSiteType::Scoped]);
    assert_eq!(site.children()[1].cache_key().unwrap().slot, 0);
}

#[test]
fn test_try_add_enumerable_distinguishes_implementations() {
    struct Audit;
    impl Plugin for Audit {
        fn name(&self) -> &str {
            "Audit"
        }
    }
    impl Injectable for Audit {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(|_| Ok(Audit))]
        }
    }

    struct Metrics;
    impl Plugin for Metrics {
        fn name(&self) -> &str {
            "Metrics"
        }
    }
    impl Injectable for Metrics {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(|_| Ok(Metrics))]
        }
    }

    let audit = || ServiceDescriptor::trait_implementation::<dyn Plugin, Audit, _>(Lifetime::Singleton, |a| a as Arc<dyn Plugin>);
    let metrics =
        || ServiceDescriptor::trait_implementation::<dyn Plugin, Metrics, _>(Lifetime::Singleton, |m| m as Arc<dyn Plugin>);

    let mut sc = ServiceCollection::new();
    assert!(sc.try_add_enumerable(audit()).unwrap());
    assert!(sc.try_add_enumerable(metrics()).unwrap());
    assert!(!sc.try_add_enumerable(audit()).unwrap());

    // A trait instance is named after the trait itself
    let err = sc.try_add_enumerable(ServiceDescriptor::trait_instance::<dyn Plugin>(Arc::new(PluginA)));
    assert!(err.is_err());

    let plugins = sc.build().get_all_trait::<dyn Plugin>().unwrap();
    assert_eq!(names(&plugins), vec!["Audit", "Metrics"]);
}
