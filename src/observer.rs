//! Diagnostic observers for resolution and interception events.

use std::sync::Arc;
use std::time::Duration;

use crate::key::Key;
use crate::service_type::ServiceType;

/// Observer of container resolution events.
///
/// Calls are made synchronously on the resolving thread, so implementations
/// should stay cheap.
///
/// # Examples
///
/// ```
/// use ferrous_intercept::{DiObserver, ServiceCollection, Key, ServiceType};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct ProxyCounter {
///     proxies: AtomicUsize,
/// }
///
/// impl DiObserver for ProxyCounter {
///     fn resolving(&self, _key: &Key) {}
///     fn resolved(&self, _key: &Key, _duration: Duration) {}
///
///     fn proxy_created(&self, _service_type: &ServiceType) {
///         self.proxies.fetch_add(1, Ordering::Relaxed);
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_observer(Arc::new(ProxyCounter::default()));
/// ```
pub trait DiObserver: Send + Sync {
    /// Called before a registration's constructor runs.
    fn resolving(&self, key: &Key);

    /// Called after resolution finished, successfully or not.
    fn resolved(&self, key: &Key, duration: Duration);

    /// Called whenever an intercepting proxy is built for a service.
    fn proxy_created(&self, service_type: &ServiceType) {
        let _ = service_type;
    }
}

/// Observer emitting every event as a `tracing` event.
///
/// Resolution events are logged at `trace`, proxy creation at `debug`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl LoggingObserver {
    pub fn new() -> Self {
        Self
    }
}

impl DiObserver for LoggingObserver {
    fn resolving(&self, key: &Key) {
        tracing::trace!(service = key.display_name(), "resolving");
    }

    fn resolved(&self, key: &Key, duration: Duration) {
        tracing::trace!(
            service = key.display_name(),
            elapsed_us = duration.as_micros() as u64,
            "resolved"
        );
    }

    fn proxy_created(&self, service_type: &ServiceType) {
        tracing::debug!(service = service_type.name(), "intercepting proxy created");
    }
}

/// Registered observers, fanned out in registration order.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn DiObserver>>,
}

impl Observers {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, observer: Arc<dyn DiObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    pub(crate) fn resolving(&self, key: &Key) {
        for observer in &self.observers {
            observer.resolving(key);
        }
    }

    pub(crate) fn resolved(&self, key: &Key, duration: Duration) {
        for observer in &self.observers {
            observer.resolved(key, duration);
        }
    }

    pub(crate) fn proxy_created(&self, service_type: &ServiceType) {
        for observer in &self.observers {
            observer.proxy_created(service_type);
        }
    }
}
