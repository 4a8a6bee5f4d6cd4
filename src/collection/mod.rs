//! Service registration and the interception registration API.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::hook::{
    ConstructionEvent, ConstructionHook, InterceptionContext, InterceptionHook, InterceptorSource,
    ResolvedInterceptor,
};
use crate::interceptor::Interceptor;
use crate::key::{key_of_trait, key_of_type, Key};
use crate::lifetime::Lifetime;
use crate::observer::{DiObserver, Observers};
use crate::options::InterceptionOptions;
use crate::provider::{ResolverContext, ServiceProvider};
use crate::proxy::{Interceptable, ProxyFactory};
use crate::registration::{AnyArc, Constructor, Registration, Registry};
use crate::service_type::ServiceType;

/// Interceptor type that must be registered before hooks run.
struct InterceptorType {
    key: Key,
    type_name: &'static str,
    lifetime: Option<Lifetime>,
    register: fn(Lifetime) -> Registration,
    resolved: ResolvedInterceptor,
}

fn default_interceptor_registration<I>(lifetime: Lifetime) -> Registration
where
    I: Interceptor + Default + 'static,
{
    Registration::new(
        ServiceType::concrete::<I>(),
        lifetime,
        Constructor::factory(|_| Ok(Arc::new(I::default()) as AnyArc)),
    )
}

/// Registration surface of the container.
///
/// Services are registered by concrete type or as trait objects. Trait
/// objects must come from an [`interceptable!`](crate::interceptable) trait,
/// which makes every trait registration eligible for interception.
/// Interceptors are attached with the `intercept_with*` methods and applied
/// by [`build`](Self::build).
///
/// # Examples
///
/// ```
/// use ferrous_intercept::{interceptable, predicates, LoggingInterceptor, Resolver, ServiceCollection};
/// use std::sync::Arc;
///
/// interceptable! {
///     pub trait Repo {
///         fn save(&self, id: u32) -> bool;
///     }
/// }
///
/// struct MemoryRepo;
/// impl Repo for MemoryRepo {
///     fn save(&self, _id: u32) -> bool { true }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton_trait(Arc::new(MemoryRepo) as Arc<dyn Repo>);
/// services.intercept_with::<LoggingInterceptor>(predicates::is::<dyn Repo>());
///
/// let repo = services.build().get_required_trait::<dyn Repo>();
/// assert!(repo.save(7));
/// ```
pub struct ServiceCollection {
    registry: Registry,
    observers: Observers,
    hooks: Vec<Arc<dyn ConstructionHook>>,
    interceptor_types: Vec<InterceptorType>,
    options: InterceptionOptions,
}

impl ServiceCollection {
    /// Creates a new empty service collection.
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            observers: Observers::new(),
            hooks: Vec::new(),
            interceptor_types: Vec::new(),
            options: InterceptionOptions::default(),
        }
    }

    // ----- Concrete Type Registrations -----

    /// Registers a singleton instance shared across the application.
    ///
    /// ```rust
    /// # use ferrous_intercept::ServiceCollection;
    /// struct Config {
    ///     database_url: String
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Config {
    ///     database_url: "postgres://localhost".to_string()
    /// });
    /// ```
    pub fn add_singleton<T: 'static + Send + Sync>(&mut self, value: T) -> &mut Self {
        self.registry.insert(
            key_of_type::<T>(),
            Registration::new(
                ServiceType::concrete::<T>(),
                Lifetime::Singleton,
                Constructor::Constant(Arc::new(value)),
            ),
        );
        self
    }

    /// Registers a factory run once, on first request.
    pub fn add_singleton_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Singleton, factory)
    }

    /// Registers a factory run once per scope.
    ///
    /// ```rust
    /// # use ferrous_intercept::{ServiceCollection, Resolver};
    /// # use std::sync::Arc;
    /// struct Database { url: String }
    /// struct RequestContext { request_id: String }
    /// struct UserService { db: Arc<Database>, context: Arc<RequestContext> }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Database { url: "postgres://localhost".to_string() });
    /// services.add_scoped_factory::<RequestContext, _>(|_| {
    ///     RequestContext { request_id: "req-123".to_string() }
    /// });
    /// services.add_scoped_factory::<UserService, _>(|resolver| {
    ///     UserService {
    ///         db: resolver.get_required::<Database>(),
    ///         context: resolver.get_required::<RequestContext>()
    ///     }
    /// });
    /// ```
    pub fn add_scoped_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Scoped, factory)
    }

    /// Registers a factory run on every request.
    pub fn add_transient_factory<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        self.add_factory(Lifetime::Transient, factory)
    }

    fn add_factory<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: 'static + Send + Sync,
        F: Fn(&ResolverContext) -> T + Send + Sync + 'static,
    {
        let ctor = Constructor::factory(move |r| Ok(Arc::new(factory(r)) as AnyArc));
        self.registry.insert(
            key_of_type::<T>(),
            Registration::new(ServiceType::concrete::<T>(), lifetime, ctor),
        );
        self
    }

    // ----- Trait Single-Binding Registrations -----

    /// Registers a pre-built trait implementation as a singleton.
    ///
    /// ```rust
    /// # use ferrous_intercept::{interceptable, ServiceCollection};
    /// # use std::sync::Arc;
    /// interceptable! {
    ///     pub trait Logger {
    ///         fn log(&self, message: String);
    ///     }
    /// }
    ///
    /// struct FileLogger { path: String }
    /// impl Logger for FileLogger {
    ///     fn log(&self, _message: String) {}
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// let logger = Arc::new(FileLogger { path: "/var/log/app.log".to_string() });
    /// services.add_singleton_trait::<dyn Logger>(logger);
    /// ```
    pub fn add_singleton_trait<T>(&mut self, value: Arc<T>) -> &mut Self
    where
        T: ?Sized + Interceptable,
    {
        // Trait objects are stored as Arc<Arc<dyn Trait>>
        let any_arc: AnyArc = Arc::new(value);
        self.registry.insert(
            key_of_trait::<T>(),
            trait_registration::<T>(Lifetime::Singleton, Constructor::Constant(any_arc)),
        );
        self
    }

    pub fn add_singleton_trait_factory<Trait, F>(&mut self, factory: F) -> &mut Self
    where
        Trait: ?Sized + Interceptable,
        F: Fn(&ResolverContext) -> Arc<Trait> + Send + Sync + 'static,
    {
        self.add_trait_factory_impl(Lifetime::Singleton, factory)
    }

    pub fn add_scoped_trait_factory<Trait, F>(&mut self, factory: F) -> &mut Self
    where
        Trait: ?Sized + Interceptable,
        F: Fn(&ResolverContext) -> Arc<Trait> + Send + Sync + 'static,
    {
        self.add_trait_factory_impl(Lifetime::Scoped, factory)
    }

    pub fn add_transient_trait_factory<Trait, F>(&mut self, factory: F) -> &mut Self
    where
        Trait: ?Sized + Interceptable,
        F: Fn(&ResolverContext) -> Arc<Trait> + Send + Sync + 'static,
    {
        self.add_trait_factory_impl(Lifetime::Transient, factory)
    }

    fn add_trait_factory_impl<Trait, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        Trait: ?Sized + Interceptable,
        F: Fn(&ResolverContext) -> Arc<Trait> + Send + Sync + 'static,
    {
        self.registry.insert(
            key_of_trait::<Trait>(),
            trait_registration::<Trait>(lifetime, trait_factory(factory)),
        );
        self
    }

    // ----- Trait Multi-Binding Registrations -----

    /// Appends a pre-built implementation to the trait's multi-binding list.
    pub fn add_trait_implementation<T>(&mut self, value: Arc<T>, lifetime: Lifetime) -> &mut Self
    where
        T: ?Sized + Interceptable,
    {
        let any_arc: AnyArc = Arc::new(value);
        self.registry.push_many(
            std::any::type_name::<T>(),
            trait_registration::<T>(lifetime, Constructor::Constant(any_arc)),
        );
        self
    }

    /// Appends a factory to the trait's multi-binding list.
    pub fn add_trait_factory<Trait, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        Trait: ?Sized + Interceptable,
        F: Fn(&ResolverContext) -> Arc<Trait> + Send + Sync + 'static,
    {
        self.registry.push_many(
            std::any::type_name::<Trait>(),
            trait_registration::<Trait>(lifetime, trait_factory(factory)),
        );
        self
    }

    /// Adds an observer notified of resolutions and proxy creation.
    pub fn add_observer(&mut self, observer: Arc<dyn DiObserver>) -> &mut Self {
        self.observers.add(observer);
        self
    }

    // ----- Interception -----

    /// Intercepts every service matching `predicate` with an interceptor of
    /// type `I` resolved from the container.
    ///
    /// `I::default()` is registered as a transient service at build time
    /// unless `I` is already registered, in which case that registration is
    /// used as-is.
    ///
    /// ```
    /// use ferrous_intercept::{interceptable, predicates, Interceptor, Invocation, Resolver, ServiceCollection};
    /// use std::sync::Arc;
    ///
    /// interceptable! {
    ///     pub trait Clock {
    ///         fn now(&self) -> u64;
    ///     }
    /// }
    ///
    /// struct FixedClock;
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> u64 { 1_000 }
    /// }
    ///
    /// #[derive(Default)]
    /// struct Frozen;
    /// impl Interceptor for Frozen {
    ///     fn intercept(&self, invocation: &mut Invocation<'_>) {
    ///         invocation.set_return_value(0u64).unwrap();
    ///     }
    /// }
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton_trait(Arc::new(FixedClock) as Arc<dyn Clock>);
    /// services.intercept_with::<Frozen>(predicates::is::<dyn Clock>());
    ///
    /// assert_eq!(services.build().get_required_trait::<dyn Clock>().now(), 0);
    /// ```
    pub fn intercept_with<I>(
        &mut self,
        predicate: impl Fn(&ServiceType) -> bool + Send + Sync + 'static,
    ) -> &mut Self
    where
        I: Interceptor + Default + 'static,
    {
        self.intercept_with_type::<I>(None, predicate)
    }

    /// Like [`intercept_with`](Self::intercept_with), with the interceptor
    /// registered under `lifetime`.
    ///
    /// Fails the build with [`DiError::Configuration`] when `I` is already
    /// registered under a different lifetime.
    pub fn intercept_with_lifetime<I>(
        &mut self,
        lifetime: Lifetime,
        predicate: impl Fn(&ServiceType) -> bool + Send + Sync + 'static,
    ) -> &mut Self
    where
        I: Interceptor + Default + 'static,
    {
        self.intercept_with_type::<I>(Some(lifetime), predicate)
    }

    fn intercept_with_type<I>(
        &mut self,
        lifetime: Option<Lifetime>,
        predicate: impl Fn(&ServiceType) -> bool + Send + Sync + 'static,
    ) -> &mut Self
    where
        I: Interceptor + Default + 'static,
    {
        let resolved = ResolvedInterceptor::of::<I>(lifetime);
        self.interceptor_types.push(InterceptorType {
            key: key_of_type::<I>(),
            type_name: std::any::type_name::<I>(),
            lifetime,
            register: default_interceptor_registration::<I>,
            resolved: resolved.clone(),
        });
        self.add_interception(InterceptorSource::Resolve(resolved), predicate)
    }

    /// Intercepts with an interceptor built by `factory` on every
    /// construction of a matching service.
    pub fn intercept_with_factory<F>(
        &mut self,
        factory: F,
        predicate: impl Fn(&ServiceType) -> bool + Send + Sync + 'static,
    ) -> &mut Self
    where
        F: Fn() -> Arc<dyn Interceptor> + Send + Sync + 'static,
    {
        self.add_interception(InterceptorSource::Factory(Arc::new(factory)), predicate)
    }

    /// Intercepts with an interceptor built from the resolution context on
    /// every construction of a matching service.
    pub fn intercept_with_context_factory<F>(
        &mut self,
        factory: F,
        predicate: impl Fn(&ServiceType) -> bool + Send + Sync + 'static,
    ) -> &mut Self
    where
        F: Fn(&InterceptionContext<'_>) -> Arc<dyn Interceptor> + Send + Sync + 'static,
    {
        self.add_interception(InterceptorSource::ContextFactory(Arc::new(factory)), predicate)
    }

    /// Intercepts with one fixed interceptor instance.
    pub fn intercept_with_instance(
        &mut self,
        interceptor: Arc<dyn Interceptor>,
        predicate: impl Fn(&ServiceType) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.add_interception(InterceptorSource::Instance(interceptor), predicate)
    }

    fn add_interception(
        &mut self,
        source: InterceptorSource,
        predicate: impl Fn(&ServiceType) -> bool + Send + Sync + 'static,
    ) -> &mut Self {
        self.add_construction_hook(Arc::new(InterceptionHook::new(source, predicate)))
    }

    /// Adds a hook run once per registration at build time, after the hooks
    /// added before it.
    pub fn add_construction_hook(&mut self, hook: Arc<dyn ConstructionHook>) -> &mut Self {
        self.hooks.push(hook);
        self
    }

    /// Replaces the interception options used at build time.
    pub fn configure_interception(&mut self, options: InterceptionOptions) -> &mut Self {
        self.options = options;
        self
    }

    // ----- Build -----

    /// Builds the provider, panicking on a configuration error.
    ///
    /// See [`try_build`](Self::try_build) for the fallible form.
    pub fn build(self) -> ServiceProvider {
        self.try_build()
            .unwrap_or_else(|e| panic!("Failed to build service provider: {}", e))
    }

    /// Builds the provider.
    ///
    /// Registers missing interceptor types, runs every construction hook over
    /// every registration and assigns scoped slots. Configuration errors
    /// surface here, before any service is constructed.
    ///
    /// ```
    /// use ferrous_intercept::{interceptor_fn, predicates, DiError, ServiceCollection};
    ///
    /// struct Settings;
    ///
    /// let mut services = ServiceCollection::new();
    /// services.add_singleton(Settings);
    /// services.intercept_with_instance(
    ///     interceptor_fn(|invocation| invocation.proceed()),
    ///     predicates::is::<Settings>(),
    /// );
    ///
    /// let err = services.try_build().unwrap_err();
    /// assert!(matches!(err, DiError::NotAnInterface(_)));
    /// ```
    pub fn try_build(mut self) -> DiResult<ServiceProvider> {
        self.register_interceptor_types()?;
        self.apply_construction_hooks()?;
        self.registry.finalize();

        tracing::debug!(
            registrations = self.registry.len(),
            hooks = self.hooks.len(),
            "service provider built"
        );
        Ok(ServiceProvider::new(self.registry, self.observers))
    }

    fn register_interceptor_types(&mut self) -> DiResult<()> {
        for requested in std::mem::take(&mut self.interceptor_types) {
            match self.registry.get(&requested.key) {
                Some(existing) => match requested.lifetime {
                    Some(lifetime) if lifetime != existing.lifetime => {
                        tracing::warn!(
                            interceptor = requested.type_name,
                            registered = ?existing.lifetime,
                            requested = ?lifetime,
                            "interceptor lifetime conflict"
                        );
                        return Err(DiError::Configuration(format!(
                            "interceptor {} is registered as {:?} but was requested as {:?}",
                            requested.type_name, existing.lifetime, lifetime
                        )));
                    }
                    _ => requested.resolved.record_registered_lifetime(existing.lifetime),
                },
                None => {
                    let lifetime = requested.lifetime.unwrap_or(Lifetime::DEFAULT);
                    requested.resolved.record_registered_lifetime(lifetime);
                    self.registry
                        .insert(requested.key, (requested.register)(lifetime));
                }
            }
        }
        Ok(())
    }

    fn apply_construction_hooks(&mut self) -> DiResult<()> {
        if self.hooks.is_empty() {
            return Ok(());
        }

        let hooks = &self.hooks;
        let options = &self.options;
        let observers = &self.observers;

        for (key, registration) in self.registry.iter_mut() {
            let mut event = ConstructionEvent::new(
                &key,
                registration.service_type,
                registration.lifetime,
                registration.ctor.clone(),
                registration.proxy.as_ref(),
                options,
                observers,
            );
            for hook in hooks {
                hook.on_construct(&mut event)?;
            }
            let ctor = event.into_constructor();
            registration.ctor = ctor;
        }
        Ok(())
    }
}

impl Default for ServiceCollection {
    fn default() -> Self {
        Self::new()
    }
}

fn trait_registration<T>(lifetime: Lifetime, ctor: Constructor) -> Registration
where
    T: ?Sized + Interceptable,
{
    Registration::new(ServiceType::interface::<T>(), lifetime, ctor).with_proxy(ProxyFactory::of::<T>())
}

fn trait_factory<Trait, F>(factory: F) -> Constructor
where
    Trait: ?Sized + Interceptable,
    F: Fn(&ResolverContext) -> Arc<Trait> + Send + Sync + 'static,
{
    Constructor::factory(move |r| Ok(Arc::new(factory(r)) as AnyArc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptor::interceptor_fn;
    use crate::service_type::predicates;
    use crate::traits::Resolver;

    #[derive(Default)]
    struct Passthrough;

    impl Interceptor for Passthrough {
        fn intercept(&self, invocation: &mut crate::Invocation<'_>) {
            invocation.proceed();
        }
    }

    #[test]
    fn interceptor_type_is_registered_when_absent() {
        let mut services = ServiceCollection::new();
        services.intercept_with_lifetime::<Passthrough>(Lifetime::Singleton, predicates::any_interface());

        let provider = services.build();
        let a = provider.get_required::<Passthrough>();
        let b = provider.get_required::<Passthrough>();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn default_request_keeps_existing_registration() {
        let mut services = ServiceCollection::new();
        services.add_singleton(Passthrough);
        services.intercept_with::<Passthrough>(predicates::any_interface());

        assert!(services.try_build().is_ok());
    }

    #[test]
    fn conflicting_interceptor_lifetime_is_a_configuration_error() {
        let mut services = ServiceCollection::new();
        services.add_singleton(Passthrough);
        services.intercept_with_lifetime::<Passthrough>(Lifetime::Scoped, predicates::any_interface());

        let err = services.try_build().unwrap_err();
        assert!(matches!(err, DiError::Configuration(_)));
    }

    #[test]
    fn hooks_run_once_per_registration() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let recorded = seen.clone();

        let mut services = ServiceCollection::new();
        services.add_singleton(1u8);
        services.add_construction_hook(Arc::new(move |event: &mut ConstructionEvent<'_>| -> DiResult<()> {
            recorded.lock().push(event.key().clone());
            Ok(())
        }));
        services.build();

        assert_eq!(*seen.lock(), vec![key_of_type::<u8>()]);
    }

    #[test]
    #[should_panic(expected = "Failed to build service provider")]
    fn build_panics_on_configuration_error() {
        let mut services = ServiceCollection::new();
        services.add_singleton(5u32);
        services.intercept_with_instance(interceptor_fn(|inv| inv.proceed()), predicates::is::<u32>());
        services.build();
    }
}
