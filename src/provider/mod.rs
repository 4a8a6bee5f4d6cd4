//! Service provider: the root resolver built by `ServiceCollection`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::error::{DiError, DiResult};
use crate::internal::{with_circular_catch, BoxFutureUnit, DisposeBag};
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::observer::Observers;
use crate::registration::{AnyArc, Registration, Registry};
use crate::traits::{Resolver, ResolverCore};

mod context;
mod scope;

pub use context::ResolverContext;
pub use scope::Scope;

/// Root resolver produced by [`ServiceCollection::build`](crate::ServiceCollection::build).
///
/// Resolves services according to their registered lifetimes and owns the
/// singleton caches and root disposal hooks. Interception is already baked
/// into the registrations' constructors, so a matched trait service resolves
/// to its proxy and is cached like any other instance.
///
/// Cloning is cheap; clones share all state.
///
/// # Examples
///
/// ```
/// use ferrous_intercept::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct Database { url: String }
/// struct UserService { db: Arc<Database> }
///
/// let mut collection = ServiceCollection::new();
/// collection.add_singleton(Database { url: "postgres://localhost".to_string() });
/// collection.add_transient_factory::<UserService, _>(|resolver| {
///     UserService { db: resolver.get_required::<Database>() }
/// });
///
/// let provider = collection.build();
/// let user_service = provider.get_required::<UserService>();
/// assert_eq!(user_service.db.url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
}

pub(crate) struct ProviderInner {
    pub(crate) registry: Registry,
    /// Singleton cache for multi-bindings, keyed by `Key::MultiTrait`
    pub(crate) multi_singletons: Mutex<HashMap<Key, AnyArc>>,
    pub(crate) root_disposers: Mutex<DisposeBag>,
    pub(crate) observers: Observers,
}

impl ProviderInner {
    /// Runs `resolve` between the observers' `resolving`/`resolved` calls.
    #[inline]
    pub(crate) fn observed<F>(&self, key: &Key, resolve: F) -> DiResult<AnyArc>
    where
        F: FnOnce() -> DiResult<AnyArc>,
    {
        if !self.observers.has_observers() {
            return resolve();
        }

        let start = Instant::now();
        self.observers.resolving(key);
        let result = resolve();
        self.observers.resolved(key, start.elapsed());
        result
    }
}

impl ServiceProvider {
    pub(crate) fn new(registry: Registry, observers: Observers) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                registry,
                multi_singletons: Mutex::new(HashMap::new()),
                root_disposers: Mutex::new(DisposeBag::default()),
                observers,
            }),
        }
    }

    #[inline]
    pub(crate) fn inner(&self) -> &ProviderInner {
        &self.inner
    }

    /// Creates a new scope for resolving scoped services.
    ///
    /// Each scope caches its own scoped instances and shares singletons with
    /// the root.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_intercept::{ServiceCollection, Resolver};
    /// use std::sync::{Arc, Mutex};
    ///
    /// struct RequestId(String);
    ///
    /// let mut collection = ServiceCollection::new();
    /// let counter = Arc::new(Mutex::new(0));
    /// let counter_clone = counter.clone();
    ///
    /// collection.add_scoped_factory::<RequestId, _>(move |_| {
    ///     let mut c = counter_clone.lock().unwrap();
    ///     *c += 1;
    ///     RequestId(format!("req-{}", *c))
    /// });
    ///
    /// let provider = collection.build();
    /// let scope1 = provider.create_scope();
    /// let scope2 = provider.create_scope();
    ///
    /// let req1a = scope1.get_required::<RequestId>();
    /// let req1b = scope1.get_required::<RequestId>();
    /// let req2 = scope2.get_required::<RequestId>();
    ///
    /// assert!(Arc::ptr_eq(&req1a, &req1b));
    /// assert!(!Arc::ptr_eq(&req1a, &req2));
    /// ```
    pub fn create_scope(&self) -> Scope {
        Scope::new(self.clone())
    }

    /// Runs the root disposal hooks: async hooks first, then sync hooks,
    /// each in reverse registration order.
    ///
    /// ```
    /// use ferrous_intercept::{ServiceCollection, Dispose, Resolver};
    /// use std::sync::Arc;
    ///
    /// struct Cache;
    /// impl Dispose for Cache {
    ///     fn dispose(&self) {
    ///         println!("Cache disposed");
    ///     }
    /// }
    ///
    /// # async fn example() {
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton_factory::<Cache, _>(|r| {
    ///     r.register_disposer(Arc::new(Cache));
    ///     Cache
    /// });
    ///
    /// let provider = services.build();
    /// let _cache = provider.get_required::<Cache>();
    /// provider.dispose_all().await;
    /// # }
    /// ```
    pub async fn dispose_all(&self) {
        let bag = std::mem::take(&mut *self.inner.root_disposers.lock());
        bag.run_all().await;
    }

    /// Number of registrations, single and multi.
    pub fn registration_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Resolves a singleton registration, constructing it on first use.
    ///
    /// The constructor runs outside the cell so a cycle reaches the circular
    /// check instead of deadlocking; a racing constructor's value is dropped.
    pub(crate) fn resolve_singleton(&self, reg: &Registration) -> DiResult<AnyArc> {
        match &reg.single_runtime {
            Some(cell) => {
                if let Some(value) = cell.get() {
                    return Ok(value.clone());
                }
                let value = reg.ctor.invoke(&ResolverContext::new(self))?;
                Ok(cell.get_or_init(|| value).clone())
            }
            None => reg.ctor.invoke(&ResolverContext::new(self)),
        }
    }

    /// Resolves a singleton multi-binding through the shared multi cache.
    pub(crate) fn resolve_multi_singleton(&self, key: Key, reg: &Registration) -> DiResult<AnyArc> {
        if let Some(cached) = self.inner.multi_singletons.lock().get(&key) {
            return Ok(cached.clone());
        }

        let value = reg.ctor.invoke(&ResolverContext::new(self))?;

        let mut cache = self.inner.multi_singletons.lock();
        Ok(cache.entry(key).or_insert(value).clone())
    }

    fn resolve_multi_at(&self, name: &'static str, index: usize, reg: &Registration) -> DiResult<AnyArc> {
        match reg.lifetime {
            Lifetime::Singleton => self.resolve_multi_singleton(Key::MultiTrait(name, index), reg),
            Lifetime::Scoped => Err(DiError::WrongLifetime(
                "Cannot resolve scoped service from root provider",
            )),
            Lifetime::Transient => reg.ctor.invoke(&ResolverContext::new(self)),
        }
    }

    fn resolve_any_impl(&self, key: &Key) -> DiResult<AnyArc> {
        let inner = self.inner();

        if let Some(reg) = inner.registry.get(key) {
            return inner.observed(key, || match reg.lifetime {
                Lifetime::Singleton => self.resolve_singleton(reg),
                Lifetime::Scoped => Err(DiError::WrongLifetime(
                    "Cannot resolve scoped service from root provider",
                )),
                Lifetime::Transient => reg.ctor.invoke(&ResolverContext::new(self)),
            });
        }

        // A trait with only multi-bindings resolves to its last binding.
        if let &Key::Trait(name) = key {
            if let Some(regs) = inner.registry.many.get(name) {
                if let Some(last) = regs.last() {
                    let index = regs.len() - 1;
                    return inner.observed(key, || self.resolve_multi_at(name, index, last));
                }
            }
        }

        Err(DiError::NotFound(key.display_name()))
    }

    fn resolve_many_impl(&self, name: &'static str) -> DiResult<Vec<AnyArc>> {
        let Some(regs) = self.inner.registry.many.get(name) else {
            return Ok(Vec::new());
        };

        let mut results = Vec::with_capacity(regs.len());
        for (i, reg) in regs.iter().enumerate() {
            results.push(self.resolve_multi_at(name, i, reg)?);
        }
        Ok(results)
    }
}

impl std::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("registrations", &self.inner.registry.len())
            .finish()
    }
}

impl Drop for ServiceProvider {
    fn drop(&mut self) {
        if Arc::strong_count(&self.inner) == 1 {
            if let Some(bag) = self.inner.root_disposers.try_lock() {
                if !bag.is_empty() {
                    tracing::warn!(
                        "ServiceProvider dropped with undisposed resources; call dispose_all().await before dropping"
                    );
                }
            }
        }
    }
}

impl ResolverCore for ServiceProvider {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        with_circular_catch(key.display_name(), || self.resolve_any_impl(key))
    }

    fn resolve_many(&self, key: &Key) -> DiResult<Vec<AnyArc>> {
        match key {
            &Key::Trait(name) => with_circular_catch(name, || self.resolve_many_impl(name)),
            _ => Ok(Vec::new()),
        }
    }

    fn push_sync_disposer(&self, f: Box<dyn FnOnce() + Send>) {
        self.inner.root_disposers.lock().push_sync(f);
    }

    fn push_async_disposer(&self, f: Box<dyn FnOnce() -> BoxFutureUnit + Send>) {
        self.inner.root_disposers.lock().push_async(f);
    }
}

impl Resolver for ServiceProvider {}
