//! Ready-made interceptors for common cross-cutting concerns.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::Level;

use crate::interceptor::Interceptor;
use crate::invocation::Invocation;

/// Logs every call through `tracing` with its arguments and elapsed time.
///
/// # Examples
///
/// ```rust
/// use ferrous_intercept::{interceptable, LoggingInterceptor, ServiceCollection, Resolver, predicates};
/// use std::sync::Arc;
///
/// interceptable! {
///     pub trait Repo {
///         fn save(&self, name: String) -> bool;
///     }
/// }
///
/// struct MemoryRepo;
/// impl Repo for MemoryRepo {
///     fn save(&self, _name: String) -> bool { true }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton_trait::<dyn Repo>(Arc::new(MemoryRepo));
/// services.intercept_with::<LoggingInterceptor>(predicates::is::<dyn Repo>());
///
/// let repo = services.build().get_required_trait::<dyn Repo>();
/// assert!(repo.save("alice".to_string()));
/// ```
#[derive(Debug, Clone)]
pub struct LoggingInterceptor {
    level: Level,
    log_arguments: bool,
}

impl LoggingInterceptor {
    pub fn new() -> Self {
        Self::with_level(Level::DEBUG)
    }

    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            log_arguments: true,
        }
    }

    /// Leaves argument values out of the events.
    pub fn without_arguments(mut self) -> Self {
        self.log_arguments = false;
        self
    }

    fn emit(&self, message: std::fmt::Arguments<'_>) {
        match self.level {
            Level::TRACE => tracing::trace!("{}", message),
            Level::DEBUG => tracing::debug!("{}", message),
            Level::INFO => tracing::info!("{}", message),
            Level::WARN => tracing::warn!("{}", message),
            _ => tracing::error!("{}", message),
        }
    }
}

impl Default for LoggingInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl Interceptor for LoggingInterceptor {
    fn intercept(&self, invocation: &mut Invocation<'_>) {
        let method = *invocation.method();
        if self.log_arguments {
            self.emit(format_args!("→ {} args={:?}", method, invocation.arguments()));
        } else {
            self.emit(format_args!("→ {}", method));
        }

        let start = Instant::now();
        invocation.proceed();
        let elapsed = start.elapsed();

        self.emit(format_args!(
            "✓ {} in {:.2}ms",
            method,
            elapsed.as_secs_f64() * 1000.0
        ));
    }
}

/// Aggregated timings for one method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MethodStats {
    pub call_count: u64,
    pub total_time: Duration,
}

impl MethodStats {
    pub fn average_time(&self) -> Duration {
        if self.call_count == 0 {
            Duration::ZERO
        } else {
            let nanos = self.total_time.as_nanos() / u128::from(self.call_count);
            Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
        }
    }
}

/// Records call counts and cumulative time per method.
///
/// Register it as a singleton (or share one instance) to aggregate across
/// resolutions; a transient registration gives each proxy its own counters.
#[derive(Debug, Default)]
pub struct TimingInterceptor {
    stats: Mutex<HashMap<String, MethodStats>>,
}

impl TimingInterceptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot keyed by `Interface::method`.
    pub fn stats(&self) -> HashMap<String, MethodStats> {
        self.stats.lock().clone()
    }

    /// Stats for one method, keyed as in [`stats`](Self::stats).
    pub fn stats_for(&self, method: &str) -> Option<MethodStats> {
        self.stats.lock().get(method).copied()
    }

    /// Stats for `T::method`.
    pub fn stats_of<T: ?Sized + 'static>(&self, method: &str) -> Option<MethodStats> {
        self.stats_for(&format!("{}::{}", std::any::type_name::<T>(), method))
    }

    pub fn reset(&self) {
        self.stats.lock().clear();
    }
}

impl Interceptor for TimingInterceptor {
    fn intercept(&self, invocation: &mut Invocation<'_>) {
        let start = Instant::now();
        invocation.proceed();
        let elapsed = start.elapsed();

        let mut stats = self.stats.lock();
        let entry = stats.entry(invocation.method().to_string()).or_default();
        entry.call_count += 1;
        entry.total_time += elapsed;
    }
}
