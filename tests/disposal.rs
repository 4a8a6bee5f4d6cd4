use async_trait::async_trait;
use ferrous_intercept::{
    interceptable, interceptor_fn, predicates, AsyncDispose, Dispose, Resolver, ServiceCollection,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Log = Arc<Mutex<Vec<String>>>;

struct Tracked {
    name: String,
    order: Log,
}

impl Tracked {
    fn new(name: impl Into<String>, order: &Log) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            order: order.clone(),
        })
    }
}

impl Dispose for Tracked {
    fn dispose(&self) {
        self.order.lock().unwrap().push(format!("sync-{}", self.name));
    }
}

struct AsyncTracked {
    name: String,
    order: Log,
}

#[async_trait]
impl AsyncDispose for AsyncTracked {
    async fn dispose(&self) {
        tokio::time::sleep(tokio::time::Duration::from_millis(1)).await;
        self.order.lock().unwrap().push(format!("async-{}", self.name));
    }
}

struct First;
struct Second;
struct Third;

#[test]
fn test_sync_disposal_lifo_order() {
    let order: Log = Arc::new(Mutex::new(Vec::new()));

    let mut sc = ServiceCollection::new();
    let o = order.clone();
    sc.add_singleton_factory::<First, _>(move |r| {
        r.register_disposer(Tracked::new("First", &o));
        First
    });
    let o = order.clone();
    sc.add_singleton_factory::<Second, _>(move |r| {
        r.register_disposer(Tracked::new("Second", &o));
        Second
    });
    let o = order.clone();
    sc.add_transient_factory::<Third, _>(move |r| {
        r.register_disposer(Tracked::new("Third", &o));
        Third
    });

    let sp = sc.build();
    let _first = sp.get_required::<First>();
    let _second = sp.get_required::<Second>();
    let _third = sp.get_required::<Third>();

    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(sp.dispose_all());

    assert_eq!(*order.lock().unwrap(), vec!["sync-Third", "sync-Second", "sync-First"]);
}

#[tokio::test]
async fn test_async_disposal_before_sync() {
    let order: Log = Arc::new(Mutex::new(Vec::new()));

    let mut sc = ServiceCollection::new();
    let o = order.clone();
    sc.add_singleton_factory::<First, _>(move |r| {
        r.register_async_disposer(Arc::new(AsyncTracked {
            name: "A".to_string(),
            order: o.clone(),
        }));
        First
    });
    let o = order.clone();
    sc.add_singleton_factory::<Second, _>(move |r| {
        r.register_disposer(Tracked::new("B", &o));
        Second
    });

    let sp = sc.build();
    let _first = sp.get_required::<First>();
    let _second = sp.get_required::<Second>();

    sp.dispose_all().await;

    assert_eq!(*order.lock().unwrap(), vec!["async-A", "sync-B"]);
}

#[tokio::test]
async fn test_scoped_disposal_isolation() {
    let order: Log = Arc::new(Mutex::new(Vec::new()));
    let ids = Arc::new(AtomicUsize::new(0));

    let mut sc = ServiceCollection::new();
    let o = order.clone();
    sc.add_scoped_factory::<First, _>(move |r| {
        let id = ids.fetch_add(1, Ordering::SeqCst);
        r.register_disposer(Tracked::new(format!("scoped-{}", id), &o));
        First
    });

    let sp = sc.build();
    let scope1 = sp.create_scope();
    let scope2 = sp.create_scope();

    let _service1 = scope1.get_required::<First>();
    let _service2 = scope2.get_required::<First>();

    scope1.dispose_all().await;
    assert_eq!(*order.lock().unwrap(), vec!["sync-scoped-0"]);

    // Disposing twice is a no-op.
    scope1.dispose_all().await;
    assert_eq!(order.lock().unwrap().len(), 1);

    scope2.dispose_all().await;
    sp.dispose_all().await;
    assert_eq!(*order.lock().unwrap(), vec!["sync-scoped-0", "sync-scoped-1"]);
}

#[tokio::test]
async fn test_singleton_resolved_in_scope_is_disposed_by_root() {
    let order: Log = Arc::new(Mutex::new(Vec::new()));

    let mut sc = ServiceCollection::new();
    let o = order.clone();
    sc.add_singleton_factory::<First, _>(move |r| {
        r.register_disposer(Tracked::new("root", &o));
        First
    });

    let sp = sc.build();
    let scope = sp.create_scope();
    let _first = scope.get_required::<First>();

    scope.dispose_all().await;
    assert!(order.lock().unwrap().is_empty());

    sp.dispose_all().await;
    assert_eq!(*order.lock().unwrap(), vec!["sync-root"]);
}

interceptable! {
    trait Connection {
        fn execute(&self, sql: String) -> usize;
    }
}

struct PooledConnection {
    name: String,
    order: Log,
}

impl Connection for PooledConnection {
    fn execute(&self, sql: String) -> usize {
        sql.len()
    }
}

impl Dispose for PooledConnection {
    fn dispose(&self) {
        self.order.lock().unwrap().push(format!("sync-{}", self.name));
    }
}

#[tokio::test]
async fn test_intercepted_service_disposes_real_instance() {
    let order: Log = Arc::new(Mutex::new(Vec::new()));

    let mut sc = ServiceCollection::new();
    let o = order.clone();
    sc.add_scoped_trait_factory::<dyn Connection, _>(move |r| {
        let connection = Arc::new(PooledConnection {
            name: "conn".to_string(),
            order: o.clone(),
        });
        r.register_disposer(connection.clone());
        connection
    });
    sc.intercept_with_instance(interceptor_fn(|invocation| invocation.proceed()), predicates::is::<dyn Connection>());

    let sp = sc.build();
    let scope = sp.create_scope();
    assert_eq!(scope.get_required_trait::<dyn Connection>().execute("SELECT 1".to_string()), 8);

    scope.dispose_all().await;
    assert_eq!(*order.lock().unwrap(), vec!["sync-conn"]);
}
