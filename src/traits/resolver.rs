//! Resolver traits for service resolution.

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::internal::BoxFutureUnit;
use crate::key::Key;
use crate::traits::{AsyncDispose, Dispose};

/// Object-safe resolution core.
///
/// Implemented by [`ServiceProvider`](crate::ServiceProvider),
/// [`Scope`](crate::Scope), [`ResolverContext`](crate::ResolverContext) and
/// [`CurrentProvider`](crate::CurrentProvider). Most code should use the
/// generic methods of [`Resolver`] instead.
pub trait ResolverCore: Send + Sync {
    /// Resolves a single binding in its storage form.
    fn resolve_any(&self, key: &Key) -> DiResult<Arc<dyn Any + Send + Sync>>;

    /// Resolves every multi-binding of a trait in registration order.
    /// Anything other than a trait key yields an empty list.
    fn resolve_many(&self, key: &Key) -> DiResult<Vec<Arc<dyn Any + Send + Sync>>>;

    /// Registers a synchronous disposal hook with the owning provider or scope.
    fn push_sync_disposer(&self, f: Box<dyn FnOnce() + Send>);

    /// Registers an asynchronous disposal hook with the owning provider or scope.
    fn push_async_disposer(&self, f: Box<dyn FnOnce() -> BoxFutureUnit + Send>);
}

/// Typed resolution API.
///
/// Trait services resolve to the proxy when an interception hook matched
/// their type at build time; callers cannot tell the difference.
///
/// # Examples
///
/// ```
/// use ferrous_intercept::{interceptable, ServiceCollection, Resolver};
/// use std::sync::Arc;
///
/// interceptable! {
///     pub trait Logger {
///         fn log(&self, msg: String);
///     }
/// }
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {
///     fn log(&self, msg: String) {
///         println!("LOG: {}", msg);
///     }
/// }
///
/// let mut collection = ServiceCollection::new();
/// collection.add_singleton(42usize);
/// collection.add_singleton_trait(Arc::new(ConsoleLogger) as Arc<dyn Logger>);
///
/// let provider = collection.build();
///
/// let number = provider.get_required::<usize>();
/// assert_eq!(*number, 42);
///
/// let logger = provider.get_required_trait::<dyn Logger>();
/// logger.log("Service resolved successfully".to_string());
/// ```
pub trait Resolver: ResolverCore {
    /// Resolves a concrete service type.
    fn get<T: 'static + Send + Sync>(&self) -> DiResult<Arc<T>> {
        let key = Key::Type(TypeId::of::<T>(), std::any::type_name::<T>());
        let any = self.resolve_any(&key)?;
        any.downcast::<T>()
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Resolves a trait service.
    ///
    /// Falls back to the last multi-binding when no single binding exists.
    fn get_trait<T: ?Sized + 'static + Send + Sync>(&self) -> DiResult<Arc<T>> {
        let key = Key::Trait(std::any::type_name::<T>());
        let any = self.resolve_any(&key)?;
        any.downcast::<Arc<T>>()
            .map(|boxed| (*boxed).clone())
            .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))
    }

    /// Resolves every multi-binding of a trait.
    ///
    /// ```
    /// use ferrous_intercept::{interceptable, Lifetime, ServiceCollection, Resolver};
    /// use std::sync::Arc;
    ///
    /// interceptable! {
    ///     pub trait Plugin {
    ///         fn name(&self) -> String;
    ///     }
    /// }
    ///
    /// struct PluginA;
    /// impl Plugin for PluginA {
    ///     fn name(&self) -> String { "Plugin A".into() }
    /// }
    ///
    /// struct PluginB;
    /// impl Plugin for PluginB {
    ///     fn name(&self) -> String { "Plugin B".into() }
    /// }
    ///
    /// let mut collection = ServiceCollection::new();
    /// collection.add_trait_implementation(Arc::new(PluginA) as Arc<dyn Plugin>, Lifetime::Singleton);
    /// collection.add_trait_implementation(Arc::new(PluginB) as Arc<dyn Plugin>, Lifetime::Singleton);
    ///
    /// let plugins = collection.build().get_all_trait::<dyn Plugin>().unwrap();
    /// assert_eq!(plugins.len(), 2);
    /// assert_eq!(plugins[1].name(), "Plugin B");
    /// ```
    fn get_all_trait<T: ?Sized + 'static + Send + Sync>(&self) -> DiResult<Vec<Arc<T>>> {
        let key = Key::Trait(std::any::type_name::<T>());
        let anys = self.resolve_many(&key)?;

        let mut results = Vec::with_capacity(anys.len());
        for any in anys {
            let arc = any
                .downcast::<Arc<T>>()
                .map(|boxed| (*boxed).clone())
                .map_err(|_| DiError::TypeMismatch(std::any::type_name::<T>()))?;
            results.push(arc);
        }
        Ok(results)
    }

    /// Resolves a concrete service type, panicking on failure.
    fn get_required<T: 'static + Send + Sync>(&self) -> Arc<T> {
        self.get::<T>()
            .unwrap_or_else(|e| panic!("Failed to resolve {}: {:?}", std::any::type_name::<T>(), e))
    }

    /// Resolves a trait service, panicking on failure.
    fn get_required_trait<T: ?Sized + 'static + Send + Sync>(&self) -> Arc<T> {
        self.get_trait::<T>().unwrap_or_else(|e| {
            panic!("Failed to resolve trait {}: {:?}", std::any::type_name::<T>(), e)
        })
    }

    /// Registers a service for synchronous disposal. Hooks run LIFO.
    fn register_disposer<T: Dispose>(&self, service: Arc<T>) {
        self.push_sync_disposer(Box::new(move || service.dispose()));
    }

    /// Registers a service for asynchronous disposal. Async hooks run
    /// before sync hooks.
    fn register_async_disposer<T: AsyncDispose>(&self, service: Arc<T>) {
        self.push_async_disposer(Box::new(move || {
            Box::pin(async move {
                service.dispose().await;
            })
        }));
    }
}
