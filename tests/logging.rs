use ferrous_intercept::{interceptable, predicates, LoggingInterceptor, Resolver, ServiceCollection};
use std::io;
use std::sync::{Arc, Mutex};

interceptable! {
    trait Inventory {
        fn reserve(&self, sku: String, quantity: u32) -> bool;
    }
}

struct Warehouse;

impl Inventory for Warehouse {
    fn reserve(&self, _sku: String, quantity: u32) -> bool {
        quantity <= 10
    }
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture<F: FnOnce()>(f: F) -> String {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    captured.contents()
}

#[test]
fn logging_interceptor_reports_method_and_arguments() {
    let output = capture(|| {
        let mut services = ServiceCollection::new();
        services.add_singleton_trait::<dyn Inventory>(Arc::new(Warehouse));
        services.intercept_with::<LoggingInterceptor>(predicates::is::<dyn Inventory>());

        let inventory = services.build().get_required_trait::<dyn Inventory>();
        assert!(inventory.reserve("widget".to_string(), 3));
    });

    assert!(output.contains("reserve"), "missing method in {}", output);
    assert!(output.contains("\"widget\""), "missing argument in {}", output);
    assert!(output.contains("DEBUG"), "wrong level in {}", output);
}

#[test]
fn interception_setup_is_logged() {
    let output = capture(|| {
        let mut services = ServiceCollection::new();
        services.add_transient_trait_factory::<dyn Inventory, _>(|_| Arc::new(Warehouse));
        services.intercept_with::<LoggingInterceptor>(predicates::is::<dyn Inventory>());
        let _ = services.build();
    });

    assert!(output.contains("interception attached"), "no setup event in {}", output);
}

#[test]
fn concrete_match_is_warned_about() {
    let output = capture(|| {
        let mut services = ServiceCollection::new();
        services.add_singleton(7u16);
        services.intercept_with::<LoggingInterceptor>(predicates::is::<u16>());
        assert!(services.try_build().is_err());
    });

    assert!(output.contains("WARN"), "no warning in {}", output);
    assert!(output.contains("u16"), "service not named in {}", output);
}
