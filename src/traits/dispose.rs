//! Teardown hooks for services that own resources.
//!
//! Hooks are registered from inside a factory through
//! [`Resolver::register_disposer`](crate::Resolver::register_disposer) and
//! land in the bag of whatever is constructing: the root provider for
//! singletons, the scope for scoped services. The factory of an intercepted
//! registration only ever sees the real instance, so its teardown bypasses
//! every interceptor.

/// Synchronous teardown.
///
/// Runs when the owning provider or scope is disposed, newest hook first.
///
/// ```
/// use ferrous_intercept::{Dispose, Resolver, ServiceCollection};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// struct Journal {
///     flushed: AtomicBool,
/// }
///
/// impl Dispose for Journal {
///     fn dispose(&self) {
///         self.flushed.store(true, Ordering::SeqCst);
///     }
/// }
///
/// let journal = Arc::new(Journal { flushed: AtomicBool::new(false) });
/// let handle = journal.clone();
///
/// let mut services = ServiceCollection::new();
/// services.add_scoped_factory::<u32, _>(move |resolver| {
///     resolver.register_disposer(handle.clone());
///     7
/// });
///
/// let provider = services.build();
/// let scope = provider.create_scope();
/// assert_eq!(*scope.get_required::<u32>(), 7);
/// assert!(!journal.flushed.load(Ordering::SeqCst));
/// ```
pub trait Dispose: Send + Sync + 'static {
    fn dispose(&self);
}

/// Asynchronous teardown, awaited before any [`Dispose`] hook of the same
/// bag.
///
/// ```
/// use async_trait::async_trait;
/// use ferrous_intercept::{AsyncDispose, Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// struct Outbox {
///     pending: usize,
/// }
///
/// #[async_trait]
/// impl AsyncDispose for Outbox {
///     async fn dispose(&self) {
///         // drain `pending` messages before shutdown
///         let _ = self.pending;
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton_factory::<usize, _>(|resolver| {
///     resolver.register_async_disposer(Arc::new(Outbox { pending: 3 }));
///     3
/// });
/// ```
#[async_trait::async_trait]
pub trait AsyncDispose: Send + Sync + 'static {
    async fn dispose(&self);
}
