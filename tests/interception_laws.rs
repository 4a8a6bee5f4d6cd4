/// Property-based tests for interception
///
/// These tests verify that a proxy is observationally the real instance when
/// its interceptors only proceed, and that short-circuiting never reaches it.

use ferrous_intercept::{interceptable, interceptor_fn, predicates, Resolver, ServiceCollection};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

interceptable! {
    trait Calculator {
        fn add(&self, a: i64, b: i64) -> i64;
        fn label(&self, prefix: String, n: u32) -> String;
    }
}

#[derive(Default)]
struct RealCalculator {
    calls: AtomicUsize,
}

impl Calculator for RealCalculator {
    fn add(&self, a: i64, b: i64) -> i64 {
        self.calls.fetch_add(1, Ordering::SeqCst);
        a.wrapping_add(b)
    }

    fn label(&self, prefix: String, n: u32) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}", prefix, n)
    }
}

fn with_pass_through(depth: usize) -> (Arc<dyn Calculator>, Arc<RealCalculator>) {
    let real = Arc::new(RealCalculator::default());
    let mut services = ServiceCollection::new();
    services.add_singleton_trait::<dyn Calculator>(real.clone());
    for _ in 0..depth {
        services.intercept_with_instance(interceptor_fn(|invocation| invocation.proceed()), predicates::is::<dyn Calculator>());
    }
    (services.build().get_required_trait::<dyn Calculator>(), real)
}

// Property: pass-through interceptors are transparent at any chain depth
proptest! {
    #[test]
    fn pass_through_chain_is_transparent(
        a in any::<i64>(),
        b in any::<i64>(),
        prefix in "\\PC{0,20}",
        n in any::<u32>(),
        depth in 0usize..5,
    ) {
        let (proxy, real) = with_pass_through(depth);
        let direct = RealCalculator::default();

        prop_assert_eq!(proxy.add(a, b), direct.add(a, b));
        prop_assert_eq!(proxy.label(prefix.clone(), n), direct.label(prefix, n));
        prop_assert_eq!(real.calls.load(Ordering::SeqCst), 2);
        prop_assert_eq!(proxy.runtime_type(), std::any::type_name::<RealCalculator>());
    }
}

// Property: a short-circuiting interceptor decides the result and the real
// instance is never called, whatever sits inside it
proptest! {
    #[test]
    fn short_circuit_never_reaches_target(
        a in any::<i64>(),
        b in any::<i64>(),
        fixed in any::<i64>(),
        inner_depth in 0usize..3,
    ) {
        let real = Arc::new(RealCalculator::default());
        let inner_calls = Arc::new(AtomicUsize::new(0));

        let mut services = ServiceCollection::new();
        services.add_singleton_trait::<dyn Calculator>(real.clone());
        for _ in 0..inner_depth {
            let counted = inner_calls.clone();
            services.intercept_with_instance(
                interceptor_fn(move |invocation| {
                    counted.fetch_add(1, Ordering::SeqCst);
                    invocation.proceed();
                }),
                predicates::is::<dyn Calculator>(),
            );
        }
        services.intercept_with_instance(
            interceptor_fn(move |invocation| {
                invocation.set_return_value(fixed).unwrap();
            }),
            predicates::is::<dyn Calculator>(),
        );

        let proxy = services.build().get_required_trait::<dyn Calculator>();
        prop_assert_eq!(proxy.add(a, b), fixed);
        prop_assert_eq!(real.calls.load(Ordering::SeqCst), 0);
        prop_assert_eq!(inner_calls.load(Ordering::SeqCst), 0);
    }
}

// Property: rewriting an argument is equivalent to calling with the rewritten value
proptest! {
    #[test]
    fn rewritten_arguments_reach_target(a in any::<i64>(), b in any::<i64>(), replacement in any::<i64>()) {
        let mut services = ServiceCollection::new();
        services.add_singleton_trait::<dyn Calculator>(Arc::new(RealCalculator::default()));
        services.intercept_with_instance(
            interceptor_fn(move |invocation| {
                invocation.arguments_mut().set(1, replacement).unwrap();
                invocation.proceed();
            }),
            predicates::is::<dyn Calculator>(),
        );

        let proxy = services.build().get_required_trait::<dyn Calculator>();
        prop_assert_eq!(proxy.add(a, b), a.wrapping_add(replacement));
    }
}
