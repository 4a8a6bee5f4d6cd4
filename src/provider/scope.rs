//! Scoped service resolution and disposal.

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use super::{ResolverContext, ServiceProvider};
use crate::error::{DiError, DiResult};
use crate::internal::{with_circular_catch, BoxFutureUnit, DisposeBag};
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::registration::{AnyArc, Registration};
use crate::traits::{Resolver, ResolverCore};

/// Scoped service container, typically one per web request.
///
/// - **Singleton**: resolved and cached in the root provider
/// - **Scoped**: resolved and cached within this scope
/// - **Transient**: created on every resolution
///
/// Factories and interceptors constructed for scoped or transient services
/// resolve their own dependencies from this scope.
///
/// # Examples
///
/// ```
/// use ferrous_intercept::{ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// struct DatabaseConnection(String);
/// struct UserService {
///     db: Arc<DatabaseConnection>,
/// }
///
/// let mut collection = ServiceCollection::new();
/// collection.add_scoped_factory::<DatabaseConnection, _>(|_| {
///     DatabaseConnection("connection-123".to_string())
/// });
/// collection.add_transient_factory::<UserService, _>(|resolver| UserService {
///     db: resolver.get_required::<DatabaseConnection>(),
/// });
///
/// let provider = collection.build();
/// let scope = provider.create_scope();
///
/// let user1 = scope.get_required::<UserService>();
/// let user2 = scope.get_required::<UserService>();
/// assert!(Arc::ptr_eq(&user1.db, &user2.db));
/// ```
pub struct Scope {
    root: ServiceProvider,
    /// One cell per scoped registration, indexed by `Registration::scoped_slot`
    scoped_cells: Box<[OnceCell<AnyArc>]>,
    scoped_disposers: Mutex<DisposeBag>,
}

impl Scope {
    pub(crate) fn new(root: ServiceProvider) -> Self {
        let scoped_cells = (0..root.inner().registry.scoped_count)
            .map(|_| OnceCell::new())
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            root,
            scoped_cells,
            scoped_disposers: Mutex::new(DisposeBag::default()),
        }
    }

    /// The root provider this scope was created from.
    pub fn root(&self) -> &ServiceProvider {
        &self.root
    }

    /// Runs the scope's disposal hooks: async hooks first, then sync hooks,
    /// each in reverse registration order. Singletons are left to the root.
    ///
    /// ```
    /// use ferrous_intercept::{ServiceCollection, Dispose, Resolver};
    /// use std::sync::Arc;
    ///
    /// struct ScopedCache;
    /// impl Dispose for ScopedCache {
    ///     fn dispose(&self) {
    ///         println!("Disposing scoped cache");
    ///     }
    /// }
    ///
    /// # async fn example() {
    /// let mut services = ServiceCollection::new();
    /// services.add_scoped_factory::<ScopedCache, _>(|r| {
    ///     r.register_disposer(Arc::new(ScopedCache));
    ///     ScopedCache
    /// });
    ///
    /// let provider = services.build();
    /// let scope = provider.create_scope();
    /// let _cache = scope.get_required::<ScopedCache>();
    /// scope.dispose_all().await;
    /// # }
    /// ```
    pub async fn dispose_all(&self) {
        let bag = std::mem::take(&mut *self.scoped_disposers.lock());
        bag.run_all().await;
    }

    fn resolve_scoped(&self, reg: &Registration) -> DiResult<AnyArc> {
        let Some(cell) = reg.scoped_slot.and_then(|slot| self.scoped_cells.get(slot)) else {
            return reg.ctor.invoke(&ResolverContext::new(self));
        };

        if let Some(value) = cell.get() {
            return Ok(value.clone());
        }
        let value = reg.ctor.invoke(&ResolverContext::new(self))?;
        Ok(cell.get_or_init(|| value).clone())
    }

    fn resolve_multi_at(&self, name: &'static str, index: usize, reg: &Registration) -> DiResult<AnyArc> {
        match reg.lifetime {
            Lifetime::Singleton => self.root.resolve_multi_singleton(Key::MultiTrait(name, index), reg),
            Lifetime::Scoped => self.resolve_scoped(reg),
            Lifetime::Transient => reg.ctor.invoke(&ResolverContext::new(self)),
        }
    }

    fn resolve_any_impl(&self, key: &Key) -> DiResult<AnyArc> {
        let inner = self.root.inner();

        if let Some(reg) = inner.registry.get(key) {
            return inner.observed(key, || match reg.lifetime {
                Lifetime::Singleton => self.root.resolve_singleton(reg),
                Lifetime::Scoped => self.resolve_scoped(reg),
                Lifetime::Transient => reg.ctor.invoke(&ResolverContext::new(self)),
            });
        }

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
        let Some(regs) = self.root.inner().registry.many.get(name) else {
            return Ok(Vec::new());
        };

        let mut results = Vec::with_capacity(regs.len());
        for (i, reg) in regs.iter().enumerate() {
            results.push(self.resolve_multi_at(name, i, reg)?);
        }
        Ok(results)
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("scoped_slots", &self.scoped_cells.len())
            .finish()
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        if !self.scoped_disposers.get_mut().is_empty() {
            tracing::warn!("Scope dropped with undisposed resources; call dispose_all().await before dropping");
        }
    }
}

impl ResolverCore for Scope {
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
        self.scoped_disposers.lock().push_sync(f);
    }

    fn push_async_disposer(&self, f: Box<dyn FnOnce() -> BoxFutureUnit + Send>) {
        self.scoped_disposers.lock().push_async(f);
    }
}

impl Resolver for Scope {}
