//! Request-aware access to the "current" service provider.
//!
//! Code that is not handed a resolver (static helpers, interceptors created
//! once for the whole application) can still resolve request-scoped
//! services: a [`RequestScopeAccessor`] returns the scope of the request
//! being handled on this thread or task, and falls back to another accessor,
//! usually the root provider, when no request is active.
//!
//! The ambient scope is set explicitly with [`RequestContext::enter`], or by
//! the axum `RequestScopeLayer` when the `axum-integration` feature is on.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::DiResult;
use crate::internal::BoxFutureUnit;
use crate::key::Key;
use crate::provider::{Scope, ServiceProvider};
use crate::registration::AnyArc;
use crate::traits::{Resolver, ResolverCore};

thread_local! {
    static THREAD_SCOPES: RefCell<Vec<Arc<Scope>>> = const { RefCell::new(Vec::new()) };
}

#[cfg(feature = "axum-integration")]
tokio::task_local! {
    static TASK_SCOPE: Arc<Scope>;
}

/// Handle to the ambient request scope.
///
/// # Examples
///
/// ```
/// use ferrous_intercept::{RequestContext, ServiceCollection};
/// use std::sync::Arc;
///
/// let provider = ServiceCollection::new().build();
/// let scope = Arc::new(provider.create_scope());
///
/// assert!(RequestContext::current().is_none());
/// {
///     let _guard = RequestContext::enter(scope.clone());
///     assert!(Arc::ptr_eq(&RequestContext::current().unwrap(), &scope));
/// }
/// assert!(RequestContext::current().is_none());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequestContext;

impl RequestContext {
    /// Makes `scope` the current request scope on this thread until the
    /// guard is dropped. Nested enters stack.
    pub fn enter(scope: Arc<Scope>) -> RequestScopeGuard {
        let depth = THREAD_SCOPES.with(|scopes| {
            let mut scopes = scopes.borrow_mut();
            scopes.push(scope);
            scopes.len() - 1
        });
        tracing::trace!(depth, "request scope entered");

        RequestScopeGuard {
            depth,
            _not_send: PhantomData,
        }
    }

    /// The innermost active request scope, if any.
    ///
    /// A scope entered on this thread wins over the scope of the running
    /// task.
    pub fn current() -> Option<Arc<Scope>> {
        if let Some(scope) = THREAD_SCOPES.with(|scopes| scopes.borrow().last().cloned()) {
            return Some(scope);
        }

        #[cfg(feature = "axum-integration")]
        if let Ok(scope) = TASK_SCOPE.try_with(Arc::clone) {
            return Some(scope);
        }

        None
    }

    pub fn is_active() -> bool {
        Self::current().is_some()
    }

    /// Runs `future` with `scope` as the current request scope of the task.
    ///
    /// The scope follows the task across threads and await points.
    #[cfg(feature = "axum-integration")]
    pub async fn scope<F>(scope: Arc<Scope>, future: F) -> F::Output
    where
        F: std::future::Future,
    {
        TASK_SCOPE.scope(scope, future).await
    }
}

/// Restores the previous request scope when dropped.
///
/// Bound to the thread that created it.
#[must_use = "the request scope is left as soon as the guard is dropped"]
pub struct RequestScopeGuard {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl Drop for RequestScopeGuard {
    fn drop(&mut self) {
        let _ = THREAD_SCOPES.try_with(|scopes| scopes.borrow_mut().truncate(self.depth));
        tracing::trace!(depth = self.depth, "request scope left");
    }
}

impl std::fmt::Debug for RequestScopeGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestScopeGuard")
            .field("depth", &self.depth)
            .finish()
    }
}

/// The provider an accessor selected: the root or a request scope.
///
/// Resolves like either of them.
#[derive(Debug, Clone)]
pub enum CurrentProvider {
    Root(ServiceProvider),
    Request(Arc<Scope>),
}

impl CurrentProvider {
    pub fn is_request(&self) -> bool {
        matches!(self, CurrentProvider::Request(_))
    }

    /// The request scope, when one was selected.
    pub fn scope(&self) -> Option<&Arc<Scope>> {
        match self {
            CurrentProvider::Request(scope) => Some(scope),
            CurrentProvider::Root(_) => None,
        }
    }

    /// The root provider behind either variant.
    pub fn root(&self) -> &ServiceProvider {
        match self {
            CurrentProvider::Root(provider) => provider,
            CurrentProvider::Request(scope) => scope.root(),
        }
    }

    fn resolver(&self) -> &dyn ResolverCore {
        match self {
            CurrentProvider::Root(provider) => provider,
            CurrentProvider::Request(scope) => scope.as_ref(),
        }
    }
}

impl ResolverCore for CurrentProvider {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        self.resolver().resolve_any(key)
    }

    fn resolve_many(&self, key: &Key) -> DiResult<Vec<AnyArc>> {
        self.resolver().resolve_many(key)
    }

    fn push_sync_disposer(&self, f: Box<dyn FnOnce() + Send>) {
        self.resolver().push_sync_disposer(f);
    }

    fn push_async_disposer(&self, f: Box<dyn FnOnce() -> BoxFutureUnit + Send>) {
        self.resolver().push_async_disposer(f);
    }
}

impl Resolver for CurrentProvider {}

/// Source of the provider that should serve the current operation.
pub trait ServiceProviderAccessor: Send + Sync {
    fn current(&self) -> CurrentProvider;
}

/// Accessor that always returns the root provider.
#[derive(Debug, Clone)]
pub struct RootProviderAccessor {
    provider: ServiceProvider,
}

impl RootProviderAccessor {
    pub fn new(provider: ServiceProvider) -> Self {
        Self { provider }
    }
}

impl ServiceProviderAccessor for RootProviderAccessor {
    fn current(&self) -> CurrentProvider {
        CurrentProvider::Root(self.provider.clone())
    }
}

/// Accessor returning the ambient request scope, or whatever `fallback`
/// returns when no request is active.
///
/// Evaluated on every call; nothing is cached.
///
/// # Examples
///
/// ```
/// use ferrous_intercept::{
///     RequestContext, RequestScopeAccessor, RootProviderAccessor, ServiceCollection,
///     ServiceProviderAccessor,
/// };
/// use std::sync::Arc;
///
/// let provider = ServiceCollection::new().build();
/// let accessor = RequestScopeAccessor::new(RootProviderAccessor::new(provider.clone()));
///
/// assert!(!accessor.current().is_request());
///
/// let _guard = RequestContext::enter(Arc::new(provider.create_scope()));
/// assert!(accessor.current().is_request());
/// ```
#[derive(Debug, Clone)]
pub struct RequestScopeAccessor<F = RootProviderAccessor> {
    fallback: F,
}

impl<F: ServiceProviderAccessor> RequestScopeAccessor<F> {
    pub fn new(fallback: F) -> Self {
        Self { fallback }
    }

    pub fn fallback(&self) -> &F {
        &self.fallback
    }
}

impl<F: ServiceProviderAccessor> ServiceProviderAccessor for RequestScopeAccessor<F> {
    fn current(&self) -> CurrentProvider {
        match RequestContext::current() {
            Some(scope) => CurrentProvider::Request(scope),
            None => self.fallback.current(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collection::ServiceCollection;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn nested_enters_restore_previous_scope() {
        let provider = ServiceCollection::new().build();
        let outer = Arc::new(provider.create_scope());
        let inner = Arc::new(provider.create_scope());

        let _outer_guard = RequestContext::enter(outer.clone());
        {
            let _inner_guard = RequestContext::enter(inner.clone());
            assert!(Arc::ptr_eq(&RequestContext::current().unwrap(), &inner));
        }
        assert!(Arc::ptr_eq(&RequestContext::current().unwrap(), &outer));
    }

    #[test]
    fn scope_does_not_leak_to_other_threads() {
        let provider = ServiceCollection::new().build();
        let _guard = RequestContext::enter(Arc::new(provider.create_scope()));

        let seen = std::thread::spawn(RequestContext::is_active).join().unwrap();
        assert!(!seen);
        assert!(RequestContext::is_active());
    }

    #[test]
    fn current_provider_resolves_scoped_services_from_request() {
        let counter = Arc::new(AtomicUsize::new(0));
        let factory_counter = counter.clone();

        let mut services = ServiceCollection::new();
        services.add_scoped_factory::<usize, _>(move |_| factory_counter.fetch_add(1, Ordering::SeqCst));
        let provider = services.build();
        let accessor = RequestScopeAccessor::new(RootProviderAccessor::new(provider.clone()));

        assert!(accessor.current().get::<usize>().is_err());

        let scope = Arc::new(provider.create_scope());
        let _guard = RequestContext::enter(scope.clone());
        let current = accessor.current();
        assert!(Arc::ptr_eq(current.scope().unwrap(), &scope));
        assert_eq!(*current.get_required::<usize>(), 0);
        assert_eq!(*scope.get_required::<usize>(), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
