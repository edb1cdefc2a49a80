use aspect_di::*;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::sync::Arc;

const MODES: [ServiceProviderMode; 3] =
    [ServiceProviderMode::Runtime, ServiceProviderMode::Compiled, ServiceProviderMode::Dynamic];

struct Config {
    retries: u32,
}

struct Repository {
    config: Arc<Config>,
}

struct Handler {
    repository: Arc<Repository>,
    config: Arc<Config>,
}

impl Injectable for Repository {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| Ok(Repository { config: args.next()? })).param::<Config>()]
    }
}

impl Injectable for Handler {
    fn constructors() -> Vec<Constructor<Self>> {
        vec![Constructor::new(|args| Ok(Handler { repository: args.next()?, config: args.next()? }))
            .param::<Repository>()
            .param::<Config>()]
    }
}

fn provider(mode: ServiceProviderMode, repository: Lifetime, handler: Lifetime) -> ServiceProvider {
    let mut sc = ServiceCollection::new();
    sc.add_singleton(Config { retries: 3 });
    sc.add_type::<Repository>(repository);
    sc.add_type::<Handler>(handler);
    sc.build_with_options(ServiceProviderOptions::default().with_mode(mode))
}

// ===== Micro Benchmarks =====

fn bench_singleton_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("singleton_hit");
    for mode in MODES {
        let sp = provider(mode, Lifetime::Singleton, Lifetime::Singleton);
        let _ = sp.get::<Handler>().unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(mode), &sp, |b, sp| {
            b.iter(|| black_box(sp.get::<Handler>().unwrap()))
        });
    }
    group.finish();
}

fn bench_transient_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("transient_graph");
    for mode in MODES {
        let sp = provider(mode, Lifetime::Transient, Lifetime::Transient);
        let scope = sp.create_scope();

        group.bench_with_input(BenchmarkId::from_parameter(mode), &scope, |b, scope| {
            b.iter(|| {
                let handler = scope.get::<Handler>().unwrap();
                black_box(handler.repository.config.retries + handler.config.retries)
            })
        });
    }
    group.finish();
}

fn bench_scoped_in_fresh_scope(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoped_fresh_scope");
    for mode in MODES {
        let sp = provider(mode, Lifetime::Scoped, Lifetime::Transient);

        group.bench_with_input(BenchmarkId::from_parameter(mode), &sp, |b, sp| {
            b.iter(|| {
                let scope = sp.create_scope();
                let handler = scope.get::<Handler>().unwrap();
                black_box(handler.repository.clone());
            })
        });
    }
    group.finish();
}

fn bench_first_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("first_resolution");
    for mode in MODES {
        group.bench_function(BenchmarkId::from_parameter(mode), |b| {
            b.iter_batched(
                || provider(mode, Lifetime::Transient, Lifetime::Transient),
                |sp| black_box(sp.create_scope().get::<Handler>().unwrap()),
                criterion::BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_concrete_vs_trait(c: &mut Criterion) {
    trait Value: Send + Sync {
        fn value(&self) -> u64;
    }

    struct Fixed(u64);

    impl Value for Fixed {
        fn value(&self) -> u64 {
            self.0
        }
    }

    let mut sc = ServiceCollection::new();
    sc.add_transient_factory::<Fixed, _>(|_| Fixed(42));
    sc.add_transient_trait_factory::<dyn Value, _>(|_| Arc::new(Fixed(42)));
    let scope = sc.build().create_scope();

    let mut group = c.benchmark_group("concrete_vs_trait");
    group.bench_function("concrete", |b| b.iter(|| black_box(scope.get::<Fixed>().unwrap().0)));
    group.bench_function("trait", |b| b.iter(|| black_box(scope.get_trait::<dyn Value>().unwrap().value())));
    group.finish();
}

fn bench_enumerable_scaling(c: &mut Criterion) {
    trait Plugin: Send + Sync {
        fn id(&self) -> usize;
    }

    struct Numbered(usize);

    impl Plugin for Numbered {
        fn id(&self) -> usize {
            self.0
        }
    }

    let mut group = c.benchmark_group("enumerable_scaling");
    for count in [1usize, 10, 100] {
        let mut sc = ServiceCollection::new();
        for i in 0..count {
            sc.add_singleton_trait::<dyn Plugin>(Arc::new(Numbered(i)));
        }
        let sp = sc.build();

        group.bench_with_input(BenchmarkId::from_parameter(count), &sp, |b, sp| {
            b.iter(|| {
                let plugins = sp.get_all_trait::<dyn Plugin>().unwrap();
                black_box(plugins.iter().map(|p| p.id()).sum::<usize>())
            })
        });
    }
    group.finish();
}

// ===== Macro Benchmarks =====

fn bench_scope_lifecycle(c: &mut Criterion) {
    struct Connection;

    impl Dispose for Connection {
        fn dispose(&self) -> Result<(), BoxError> {
            Ok(())
        }
    }

    let mut sc = ServiceCollection::new();
    sc.add_scoped_factory::<Arc<Connection>, _>(|r| {
        let connection = Arc::new(Connection);
        r.register_disposer(connection.clone());
        connection
    });
    let sp = sc.build();

    c.bench_function("scope_create_resolve_dispose", |b| {
        b.iter(|| {
            let scope = sp.create_scope();
            black_box(scope.get::<Arc<Connection>>().unwrap());
            scope.dispose().unwrap();
        })
    });
}

fn bench_interception_overhead(c: &mut Criterion) {
    trait Greeter: Send + Sync {
        fn greet(&self) -> usize;
    }

    struct Plain;

    impl Greeter for Plain {
        fn greet(&self) -> usize {
            1
        }
    }

    struct Proxy {
        target: Arc<dyn Greeter>,
        chain: InterceptorChain,
    }

    impl Greeter for Proxy {
        fn greet(&self) -> usize {
            self.chain.invoke("greet", &[], || self.target.greet()).unwrap_or(0)
        }
    }

    struct Passthrough;

    impl Interceptor for Passthrough {
        fn intercept(&self, invocation: &mut Invocation<'_>) {
            invocation.proceed();
        }
    }

    let mut group = c.benchmark_group("interception");
    for intercepted in [false, true] {
        let registry = Arc::new(InterceptionRegistry::new());
        if intercepted {
            registry.register_name_pattern("greeter").unwrap();
            registry.register_interceptor(Arc::new(Passthrough));
        }

        let mut sc = ServiceCollection::new();
        sc.with_interception(registry);
        sc.add_interface_proxy::<dyn Greeter, _>(|target, chain| Arc::new(Proxy { target, chain }));
        sc.add_transient_trait_factory::<dyn Greeter, _>(|_| Arc::new(Plain));
        let scope = sc.build().create_scope();

        let name = if intercepted { "proxied" } else { "raw" };
        group.bench_function(name, |b| {
            b.iter(|| black_box(scope.get_required_trait::<dyn Greeter>().greet()))
        });
    }
    group.finish();
}

criterion_group!(
    micro_benches,
    bench_singleton_hit,
    bench_transient_graph,
    bench_scoped_in_fresh_scope,
    bench_first_resolution,
    bench_concrete_vs_trait,
    bench_enumerable_scaling,
);

criterion_group!(macro_benches, bench_scope_lifecycle, bench_interception_overhead);

criterion_main!(micro_benches, macro_benches);
