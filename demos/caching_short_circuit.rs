//! A caching interceptor that answers repeated lookups without calling the
//! real service.

use ferrous_intercept::{interceptable, predicates, Interceptor, Invocation, Resolver, ServiceCollection};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

interceptable! {
    pub trait ExchangeRates {
        fn rate(&self, from: String, to: String) -> f64;
    }
}

#[derive(Default)]
struct SlowRateService {
    lookups: AtomicUsize,
}

impl ExchangeRates for SlowRateService {
    fn rate(&self, from: String, to: String) -> f64 {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        match (from.as_str(), to.as_str()) {
            ("EUR", "USD") => 1.08,
            ("USD", "EUR") => 0.93,
            _ => 1.0,
        }
    }
}

/// Memoizes `f64` results keyed by method and arguments.
#[derive(Default)]
struct CachingInterceptor {
    entries: Mutex<HashMap<String, f64>>,
    hits: AtomicUsize,
}

impl Interceptor for CachingInterceptor {
    fn intercept(&self, invocation: &mut Invocation<'_>) {
        let key = format!("{}{:?}", invocation.method(), invocation.arguments());

        let cached = self.entries.lock().unwrap().get(&key).copied();
        if let Some(value) = cached {
            self.hits.fetch_add(1, Ordering::SeqCst);
            if invocation.set_return_value(value).is_ok() {
                return;
            }
        }

        invocation.proceed();
        if let Some(value) = invocation.return_value::<f64>() {
            self.entries.lock().unwrap().insert(key, *value);
        }
    }
}

fn main() {
    println!("💱 Caching interceptor demo");

    let real = Arc::new(SlowRateService::default());

    let mut services = ServiceCollection::new();
    services.add_singleton(CachingInterceptor::default());
    services.add_singleton_trait::<dyn ExchangeRates>(real.clone());
    services.intercept_with::<CachingInterceptor>(predicates::is::<dyn ExchangeRates>());

    let provider = services.build();
    let rates = provider.get_required_trait::<dyn ExchangeRates>();

    for (from, to) in [("EUR", "USD"), ("EUR", "USD"), ("USD", "EUR"), ("EUR", "USD")] {
        let started = Instant::now();
        let rate = rates.rate(from.to_string(), to.to_string());
        println!("  {} -> {} = {:.2} in {:?}", from, to, rate, started.elapsed());
    }

    let cache = provider.get_required::<CachingInterceptor>();
    println!(
        "✅ {} real lookups, {} cache hits",
        real.lookups.load(Ordering::SeqCst),
        cache.hits.load(Ordering::SeqCst)
    );
}
