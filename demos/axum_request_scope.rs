//! Request-scoped services behind an application-wide interceptor.
//!
//! The audit interceptor is created once, yet every call it sees is tagged
//! with the id of the request that made it.
//!
//! Run with `cargo run --example axum_request_scope --features axum-integration`.

use axum::routing::get;
use ferrous_intercept::{
    axum_integration::{create_app_with_di, DiScope},
    interceptable, interceptor_fn, predicates, RequestContext, Resolver, ServiceCollection,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;

struct RequestId(usize);

interceptable! {
    pub trait Catalog {
        fn price(&self, sku: String) -> Option<u32>;
    }
}

struct StaticCatalog;

impl Catalog for StaticCatalog {
    fn price(&self, sku: String) -> Option<u32> {
        match sku.as_str() {
            "apple" => Some(120),
            "pear" => Some(95),
            _ => None,
        }
    }
}

async fn price_handler(scope: DiScope) -> String {
    let catalog = scope.get_required_trait::<dyn Catalog>();
    match catalog.price("apple".to_string()) {
        Some(cents) => format!("apple costs {} cents\n", cents),
        None => "unknown item\n".to_string(),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let ids = Arc::new(AtomicUsize::new(1));

    let mut services = ServiceCollection::new();
    services.add_scoped_factory::<RequestId, _>(move |_| RequestId(ids.fetch_add(1, Ordering::SeqCst)));
    services.add_singleton_trait::<dyn Catalog>(Arc::new(StaticCatalog));
    services.intercept_with_instance(
        interceptor_fn(|invocation| {
            let request = RequestContext::current()
                .and_then(|scope| scope.get::<RequestId>().ok())
                .map(|id| id.0);
            tracing::info!(request = ?request, method = %invocation.method(), "audit");
            invocation.proceed();
        }),
        predicates::any_interface(),
    );

    let app = create_app_with_di(services.build(), |router| router.route("/price", get(price_handler)));

    let listener = match TcpListener::bind("127.0.0.1:3000").await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("❌ Could not bind 127.0.0.1:3000: {}", e);
            return;
        }
    };
    println!("🚀 Listening on http://127.0.0.1:3000/price");
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("❌ Server error: {}", e);
    }
}
