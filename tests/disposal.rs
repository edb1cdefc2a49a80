use aspect_di::{BoxError, Constructor, DiError, Dispose, Injectable, Resolver, ServiceCollection};
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<String>>>;

struct Tracked {
    name: &'static str,
    log: Log,
    fail: bool,
}

impl Dispose for Tracked {
    fn dispose(&self) -> Result<(), BoxError> {
        self.log.lock().unwrap().push(self.name.to_string());
        if self.fail {
            Err(format!("{} failed to close", self.name).into())
        } else {
            Ok(())
        }
    }
}

/// Registers a factory for `Arc<Tracked>` under the marker type `M`,
/// capturing the instance for disposal.
fn tracked<M: Send + Sync + 'static>(
    sc: &mut ServiceCollection,
    lifetime: aspect_di::Lifetime,
    name: &'static str,
    log: &Log,
    fail: bool,
    wrap: fn(Arc<Tracked>) -> M,
) {
    let log = log.clone();
    sc.add_factory::<M, _>(lifetime, move |r| {
        let service = Arc::new(Tracked { name, log: log.clone(), fail });
        r.register_disposer(service.clone());
        wrap(service)
    });
}

struct First(Arc<Tracked>);
struct Second(Arc<Tracked>);
struct Third(Arc<Tracked>);

#[test]
fn test_disposal_runs_in_reverse_capture_order() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut sc = ServiceCollection::new();
    tracked(&mut sc, aspect_di::Lifetime::Scoped, "first", &log, false, First);
    tracked(&mut sc, aspect_di::Lifetime::Scoped, "second", &log, false, Second);
    tracked(&mut sc, aspect_di::Lifetime::Transient, "third", &log, false, Third);

    let sp = sc.build();
    let scope = sp.create_scope();
    scope.get_required::<Second>();
    scope.get_required::<First>();
    scope.get_required::<Third>();
    assert_eq!(scope.pending_disposals(), 3);

    scope.dispose().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["third", "first", "second"]);
    assert_eq!(scope.pending_disposals(), 0);
}

#[test]
fn test_failures_are_aggregated_and_do_not_stop_disposal() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut sc = ServiceCollection::new();
    tracked(&mut sc, aspect_di::Lifetime::Scoped, "first", &log, true, First);
    tracked(&mut sc, aspect_di::Lifetime::Scoped, "second", &log, false, Second);
    tracked(&mut sc, aspect_di::Lifetime::Scoped, "third", &log, true, Third);

    let scope = sc.build().create_scope();
    scope.get_required::<First>();
    scope.get_required::<Second>();
    scope.get_required::<Third>();

    let err = scope.dispose().unwrap_err();
    assert_eq!(*log.lock().unwrap(), vec!["third", "second", "first"]);
    let messages: Vec<String> = err.failures.iter().map(|e| e.to_string()).collect();
    assert_eq!(messages, vec!["third failed to close", "first failed to close"]);
    assert_eq!(err.to_string(), "2 disposable(s) failed during disposal");
}

#[test]
fn test_panicking_disposer_is_reported() {
    struct Exploding;
    impl Dispose for Exploding {
        fn dispose(&self) -> Result<(), BoxError> {
            panic!("boom");
        }
    }

    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut sc = ServiceCollection::new();
    tracked(&mut sc, aspect_di::Lifetime::Scoped, "first", &log, false, First);
    sc.add_scoped_factory::<Arc<Exploding>, _>(|r| {
        let service = Arc::new(Exploding);
        r.register_disposer(service.clone());
        service
    });

    let scope = sc.build().create_scope();
    scope.get_required::<First>();
    scope.get_required::<Arc<Exploding>>();

    let err = scope.dispose().unwrap_err();
    assert_eq!(err.failures.len(), 1);
    assert_eq!(err.failures[0].to_string(), "boom");
    assert_eq!(*log.lock().unwrap(), vec!["first"]);
}

#[test]
fn test_dispose_is_idempotent_and_blocks_resolution() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut sc = ServiceCollection::new();
    tracked(&mut sc, aspect_di::Lifetime::Scoped, "first", &log, false, First);

    let sp = sc.build();
    let scope = sp.create_scope();
    scope.get_required::<First>();

    scope.dispose().unwrap();
    scope.dispose().unwrap();
    assert_eq!(log.lock().unwrap().len(), 1);
    assert!(scope.is_disposed());
    assert!(matches!(scope.get::<First>(), Err(DiError::Disposed)));

    // Other scopes are unaffected
    assert!(sp.create_scope().get::<First>().is_ok());
}

#[test]
fn test_singletons_are_disposed_with_the_root() {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut sc = ServiceCollection::new();
    tracked(&mut sc, aspect_di::Lifetime::Singleton, "singleton", &log, false, First);
    tracked(&mut sc, aspect_di::Lifetime::Scoped, "scoped", &log, false, Second);

    let sp = sc.build();
    let scope = sp.create_scope();
    scope.get_required::<First>();
    scope.get_required::<Second>();

    // The singleton belongs to the root, not to the scope that resolved it
    scope.dispose().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["scoped"]);

    sp.dispose().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["scoped", "singleton"]);
    assert!(sp.is_disposed());
    assert!(matches!(sp.get::<First>(), Err(DiError::Disposed)));
    assert!(matches!(sp.create_scope().get::<Second>(), Err(DiError::Disposed)));
}

#[test]
fn test_injectable_disposer_is_captured() {
    struct Connection {
        log: Arc<Log>,
    }

    impl Dispose for Connection {
        fn dispose(&self) -> Result<(), BoxError> {
            self.log.lock().unwrap().push("connection".to_string());
            Ok(())
        }
    }

    impl Injectable for Connection {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(|args| Ok(Connection { log: args.next()? })).param::<Log>()]
        }

        fn disposer(instance: &Arc<Self>) -> Option<Arc<dyn Dispose>> {
            Some(instance.clone())
        }
    }

    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut sc = ServiceCollection::new();
    sc.add_singleton(log.clone());
    sc.add_transient_type::<Connection>();

    let scope = sc.build().create_scope();
    scope.get_required::<Connection>();
    scope.get_required::<Connection>();
    assert_eq!(scope.pending_disposals(), 2);

    scope.dispose().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["connection", "connection"]);
}

#[test]
fn test_scoped_instance_is_captured_once() {
    struct Pool {
        log: Arc<Log>,
    }

    impl Dispose for Pool {
        fn dispose(&self) -> Result<(), BoxError> {
            self.log.lock().unwrap().push("pool".to_string());
            Ok(())
        }
    }

    impl Injectable for Pool {
        fn constructors() -> Vec<Constructor<Self>> {
            vec![Constructor::new(|args| Ok(Pool { log: args.next()? })).param::<Log>()]
        }

        fn disposer(instance: &Arc<Self>) -> Option<Arc<dyn Dispose>> {
            Some(instance.clone())
        }
    }

    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut sc = ServiceCollection::new();
    sc.add_singleton(log.clone());
    sc.add_scoped_type::<Pool>();

    let scope = sc.build().create_scope();
    for _ in 0..3 {
        scope.get_required::<Pool>();
    }
    scope.dispose().unwrap();
    assert_eq!(*log.lock().unwrap(), vec!["pool"]);
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn test_dropped_scope_does_not_dispose() {
    init_tracing();
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let mut sc = ServiceCollection::new();
    tracked(&mut sc, aspect_di::Lifetime::Scoped, "first", &log, false, First);

    let sp = sc.build();
    let scope = sp.create_scope();
    let first = scope.get_required::<First>();
    drop(scope);

    // Only an explicit dispose runs disposers
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(first.0.name, "first");
}

#[test]
fn test_dispose_inside_production_releases_the_cache() {
    init_tracing();
    struct Settings;
    struct Session;

    let mut sc = ServiceCollection::new();
    sc.add_scoped_factory::<Settings, _>(|_| Settings);
    sc.add_scoped_factory::<Session, _>(|r| {
        r.get_required::<aspect_di::Scope>().dispose().unwrap();
        Session
    });

    let sp = sc.build();
    let scope = sp.create_scope();
    let settings = Arc::downgrade(&scope.get_required::<Settings>());
    assert_eq!(scope.cached_count(), 1);

    let session = Arc::downgrade(&scope.get_required::<Session>());

    assert!(scope.is_disposed());
    assert_eq!(scope.cached_count(), 0);
    assert!(settings.upgrade().is_none());
    assert!(session.upgrade().is_none());
    assert!(matches!(scope.get::<Settings>(), Err(DiError::Disposed)));
}
