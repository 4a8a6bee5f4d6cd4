//! Logging and timing every call of a repository without touching its code.
//!
//! Run with `RUST_LOG=debug cargo run --example repository_logging`.

use ferrous_intercept::{
    interceptable, predicates, Lifetime, LoggingInterceptor, LoggingObserver, Resolver, ServiceCollection,
    TimingInterceptor,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct User {
    id: u32,
    name: String,
}

interceptable! {
    /// Storage for users.
    pub trait UserRepository {
        fn save(&self, id: u32, name: String) -> Result<(), String>;
        fn find(&self, id: u32) -> Option<String>;
        fn count(&self) -> usize;
    }
}

#[derive(Default)]
struct InMemoryUserRepository {
    users: Mutex<HashMap<u32, User>>,
}

impl UserRepository for InMemoryUserRepository {
    fn save(&self, id: u32, name: String) -> Result<(), String> {
        if name.trim().is_empty() {
            return Err(format!("user {} has no name", id));
        }
        self.users.lock().unwrap().insert(id, User { id, name });
        Ok(())
    }

    fn find(&self, id: u32) -> Option<String> {
        self.users.lock().unwrap().get(&id).map(|u| format!("{} ({})", u.name, u.id))
    }

    fn count(&self) -> usize {
        self.users.lock().unwrap().len()
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("📦 Repository interception demo");

    let mut services = ServiceCollection::new();
    services.add_observer(Arc::new(LoggingObserver::new()));
    services.add_singleton_trait::<dyn UserRepository>(Arc::new(InMemoryUserRepository::default()));

    // Timing is registered first, so logging wraps it.
    services.intercept_with_lifetime::<TimingInterceptor>(Lifetime::Singleton, predicates::is::<dyn UserRepository>());
    services.intercept_with::<LoggingInterceptor>(predicates::name_contains("Repository"));

    let provider = services.build();
    let repo = provider.get_required_trait::<dyn UserRepository>();

    repo.save(1, "Alice".to_string()).unwrap();
    repo.save(2, "Bob".to_string()).unwrap();
    if let Err(e) = repo.save(3, "  ".to_string()) {
        println!("❌ Rejected: {}", e);
    }
    println!("🔍 Found: {:?}", repo.find(1));
    println!("🔍 Found: {:?}", repo.find(9));
    println!("📊 Users stored: {}", repo.count());
    println!("🏷️  Runtime type: {}", repo.runtime_type());

    let timing = provider.get_required::<TimingInterceptor>();
    let mut stats: Vec<_> = timing.stats().into_iter().collect();
    stats.sort_by(|a, b| a.0.cmp(&b.0));
    for (method, stats) in stats {
        println!(
            "⏱️  {}: {} call(s), avg {:?}",
            method,
            stats.call_count,
            stats.average_time()
        );
    }
}
