/// Concurrent access tests
///
/// These tests verify that intercepted services keep their lifetime guarantees
/// under concurrent resolution and that one interceptor instance can serve
/// calls from many threads.

use crossbeam_utils::thread;
use ferrous_intercept::{
    interceptable, interceptor_fn, predicates, DiObserver, Key, Lifetime, Resolver, ServiceCollection,
    ServiceType, TimingInterceptor,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

interceptable! {
    trait Counter {
        fn increment(&self) -> usize;
    }
}

#[derive(Default)]
struct AtomicCounter {
    value: AtomicUsize,
}

impl Counter for AtomicCounter {
    fn increment(&self) -> usize {
        self.value.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[derive(Default)]
struct ProxyCounter {
    proxies: AtomicUsize,
}

impl DiObserver for ProxyCounter {
    fn resolving(&self, _key: &Key) {}

    fn resolved(&self, _key: &Key, _duration: Duration) {}

    fn proxy_created(&self, _service_type: &ServiceType) {
        self.proxies.fetch_add(1, Ordering::SeqCst);
    }
}

const THREADS: usize = 8;
const CALLS: usize = 250;

#[test]
fn singleton_proxy_is_shared_across_threads() {
    let constructed = Arc::new(AtomicUsize::new(0));
    let built = constructed.clone();
    let observer = Arc::new(ProxyCounter::default());

    let mut services = ServiceCollection::new();
    services.add_observer(observer.clone());
    services.add_singleton_trait_factory::<dyn Counter, _>(move |_| {
        built.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(5));
        Arc::new(AtomicCounter::default())
    });
    services.intercept_with_lifetime::<TimingInterceptor>(Lifetime::Singleton, predicates::is::<dyn Counter>());

    let provider = services.build();
    let barrier = Barrier::new(THREADS);

    let resolved: Vec<Arc<dyn Counter>> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|_| {
                    barrier.wait();
                    let counter = provider.get_required_trait::<dyn Counter>();
                    for _ in 0..CALLS {
                        counter.increment();
                    }
                    counter
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    })
    .unwrap();

    // Racing constructors may run, but only one proxy is ever published.
    for counter in &resolved[1..] {
        assert!(Arc::ptr_eq(&resolved[0], counter));
    }
    assert_eq!(resolved[0].increment(), THREADS * CALLS + 1);
    assert!(constructed.load(Ordering::SeqCst) >= 1);
    assert_eq!(observer.proxies.load(Ordering::SeqCst), constructed.load(Ordering::SeqCst));

    let timing = provider.get_required::<TimingInterceptor>();
    assert_eq!(timing.stats_of::<dyn Counter>("increment").unwrap().call_count as usize, THREADS * CALLS + 1);
}

#[test]
fn scoped_proxies_stay_per_scope_under_contention() {
    let mut services = ServiceCollection::new();
    services.add_scoped_trait_factory::<dyn Counter, _>(|_| Arc::new(AtomicCounter::default()));
    services.intercept_with_instance(interceptor_fn(|invocation| invocation.proceed()), predicates::is::<dyn Counter>());

    let provider = services.build();
    let scopes: Vec<_> = (0..THREADS).map(|_| provider.create_scope()).collect();

    thread::scope(|s| {
        for scope in &scopes {
            s.spawn(move |_| {
                for _ in 0..CALLS {
                    scope.get_required_trait::<dyn Counter>().increment();
                }
            });
        }
    })
    .unwrap();

    for scope in &scopes {
        assert_eq!(scope.get_required_trait::<dyn Counter>().increment(), CALLS + 1);
    }
}

#[test]
fn shared_interceptor_counts_every_call() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = calls.clone();

    let mut services = ServiceCollection::new();
    services.add_transient_trait_factory::<dyn Counter, _>(|_| Arc::new(AtomicCounter::default()));
    services.intercept_with_instance(
        interceptor_fn(move |invocation| {
            counted.fetch_add(1, Ordering::SeqCst);
            invocation.proceed();
        }),
        predicates::is::<dyn Counter>(),
    );

    let provider = services.build();

    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(|_| {
                for _ in 0..CALLS {
                    provider.get_required_trait::<dyn Counter>().increment();
                }
            });
        }
    })
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), THREADS * CALLS);
}
