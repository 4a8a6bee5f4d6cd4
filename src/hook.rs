//! Construction hooks: the build-time pipeline interception plugs into.
//!
//! [`ServiceCollection::build`](crate::ServiceCollection::build) hands every
//! registration, single and multi, to each [`ConstructionHook`] in the order
//! the hooks were added. A hook may replace the registration's
//! [`Constructor`]; the next hook sees the replacement, so later hooks wrap
//! earlier ones. [`InterceptionHook`] is the hook behind the
//! `intercept_with*` methods.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::{DiError, DiResult};
use crate::interceptor::Interceptor;
use crate::internal::BoxFutureUnit;
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::observer::Observers;
use crate::options::InterceptionOptions;
use crate::proxy::ProxyFactory;
use crate::registration::{AnyArc, Constructor, ResolverContext};
use crate::service_type::{Predicate, ServiceType};
use crate::traits::{Resolver, ResolverCore};

/// One registration as seen by construction hooks at build time.
pub struct ConstructionEvent<'a> {
    key: &'a Key,
    service_type: ServiceType,
    lifetime: Lifetime,
    constructor: Constructor,
    proxy: Option<&'a ProxyFactory>,
    options: &'a InterceptionOptions,
    observers: &'a Observers,
}

impl<'a> ConstructionEvent<'a> {
    pub(crate) fn new(
        key: &'a Key,
        service_type: ServiceType,
        lifetime: Lifetime,
        constructor: Constructor,
        proxy: Option<&'a ProxyFactory>,
        options: &'a InterceptionOptions,
        observers: &'a Observers,
    ) -> Self {
        Self {
            key,
            service_type,
            lifetime,
            constructor,
            proxy,
            options,
            observers,
        }
    }

    /// The key the registration resolves under.
    pub fn key(&self) -> &Key {
        self.key
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// The constructor as left by the previous hooks.
    pub fn constructor(&self) -> &Constructor {
        &self.constructor
    }

    pub fn set_constructor(&mut self, constructor: Constructor) {
        self.constructor = constructor;
    }

    /// Proxy builder for the registration's interface; `None` for concrete
    /// registrations.
    pub fn proxy_factory(&self) -> Option<&ProxyFactory> {
        self.proxy
    }

    pub fn options(&self) -> &InterceptionOptions {
        self.options
    }

    pub(crate) fn observers(&self) -> &Observers {
        self.observers
    }

    pub(crate) fn into_constructor(self) -> Constructor {
        self.constructor
    }
}

impl fmt::Debug for ConstructionEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructionEvent")
            .field("key", self.key)
            .field("service_type", &self.service_type)
            .field("lifetime", &self.lifetime)
            .field("constructor", &self.constructor)
            .finish()
    }
}

/// Build-time hook invoked once per registration.
///
/// Returning an error aborts [`try_build`](crate::ServiceCollection::try_build).
///
/// # Examples
///
/// ```
/// use ferrous_intercept::{ConstructionEvent, DiResult, Lifetime, ServiceCollection};
/// use std::sync::Arc;
///
/// let mut services = ServiceCollection::new();
/// services.add_transient_factory::<String, _>(|_| "hello".to_string());
/// services.add_construction_hook(Arc::new(|event: &mut ConstructionEvent<'_>| -> DiResult<()> {
///     assert_eq!(event.lifetime(), Lifetime::Transient);
///     Ok(())
/// }));
/// services.build();
/// ```
pub trait ConstructionHook: Send + Sync {
    fn on_construct(&self, event: &mut ConstructionEvent<'_>) -> DiResult<()>;
}

impl<F> ConstructionHook for F
where
    F: Fn(&mut ConstructionEvent<'_>) -> DiResult<()> + Send + Sync,
{
    fn on_construct(&self, event: &mut ConstructionEvent<'_>) -> DiResult<()> {
        self(event)
    }
}

type ResolveFn = dyn for<'a> Fn(&ResolverContext<'a>) -> DiResult<Arc<dyn Interceptor>> + Send + Sync;
type ContextFactoryFn = dyn for<'a> Fn(&InterceptionContext<'a>) -> Arc<dyn Interceptor> + Send + Sync;
type FactoryFn = dyn Fn() -> Arc<dyn Interceptor> + Send + Sync;

/// Interceptor type resolved from the container on every construction.
#[derive(Clone)]
pub struct ResolvedInterceptor {
    type_name: &'static str,
    lifetime: Option<Lifetime>,
    registered: Arc<OnceCell<Lifetime>>,
    resolve: Arc<ResolveFn>,
}

impl ResolvedInterceptor {
    pub(crate) fn of<I: Interceptor + 'static>(lifetime: Option<Lifetime>) -> Self {
        Self {
            type_name: std::any::type_name::<I>(),
            lifetime,
            registered: Arc::new(OnceCell::new()),
            resolve: Arc::new(|resolver: &ResolverContext<'_>| {
                let interceptor: Arc<dyn Interceptor> = resolver.get::<I>()?;
                Ok(interceptor)
            }),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The explicitly requested lifetime, if any.
    pub fn lifetime(&self) -> Option<Lifetime> {
        self.lifetime
    }

    /// The lifetime the interceptor type ended up registered under, known
    /// once the build has registered interceptor types.
    pub fn registered_lifetime(&self) -> Option<Lifetime> {
        self.registered.get().copied()
    }

    pub(crate) fn record_registered_lifetime(&self, lifetime: Lifetime) {
        let _ = self.registered.set(lifetime);
    }
}

/// Where an interception hook gets its interceptor.
#[derive(Clone)]
pub enum InterceptorSource {
    /// Resolve an interceptor type from the container.
    Resolve(ResolvedInterceptor),
    /// Build one per construction from the resolution context.
    ContextFactory(Arc<ContextFactoryFn>),
    /// Build one per construction.
    Factory(Arc<FactoryFn>),
    /// Reuse a fixed instance.
    Instance(Arc<dyn Interceptor>),
}

impl InterceptorSource {
    /// True when every construction would get the same interceptor.
    fn is_shared(&self) -> bool {
        match self {
            InterceptorSource::Resolve(resolved) => {
                resolved.registered_lifetime() == Some(Lifetime::Singleton)
            }
            InterceptorSource::Instance(_) => true,
            InterceptorSource::ContextFactory(_) | InterceptorSource::Factory(_) => false,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            InterceptorSource::Resolve(resolved) => resolved.type_name,
            InterceptorSource::ContextFactory(_) => "context factory",
            InterceptorSource::Factory(_) => "factory",
            InterceptorSource::Instance(_) => "instance",
        }
    }

    fn obtain(
        &self,
        resolver: &ResolverContext<'_>,
        service_type: ServiceType,
        key: &Key,
    ) -> DiResult<Arc<dyn Interceptor>> {
        match self {
            InterceptorSource::Resolve(resolved) => (resolved.resolve)(resolver),
            InterceptorSource::ContextFactory(factory) => {
                Ok(factory(&InterceptionContext::new(resolver, service_type, key)))
            }
            InterceptorSource::Factory(factory) => Ok(factory()),
            InterceptorSource::Instance(interceptor) => Ok(interceptor.clone()),
        }
    }
}

impl fmt::Debug for InterceptorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InterceptorSource({})", self.describe())
    }
}

/// Resolution context handed to interceptor context factories.
///
/// Resolves from the provider or scope constructing the intercepted service.
///
/// ```
/// use ferrous_intercept::{interceptor_fn, ServiceCollection, Resolver, predicates};
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(String::from("audit"));
/// services.intercept_with_context_factory(
///     |context| {
///         let channel = context.get_required::<String>();
///         assert!(context.service_type().is_interface());
///         interceptor_fn(move |invocation| {
///             let _ = &channel;
///             invocation.proceed();
///         })
///     },
///     predicates::any_interface(),
/// );
/// ```
pub struct InterceptionContext<'a> {
    resolver: &'a ResolverContext<'a>,
    service_type: ServiceType,
    key: &'a Key,
}

impl<'a> InterceptionContext<'a> {
    fn new(resolver: &'a ResolverContext<'a>, service_type: ServiceType, key: &'a Key) -> Self {
        Self {
            resolver,
            service_type,
            key,
        }
    }

    /// The intercepted service's type.
    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    pub fn key(&self) -> &Key {
        self.key
    }
}

impl ResolverCore for InterceptionContext<'_> {
    fn resolve_any(&self, key: &Key) -> DiResult<AnyArc> {
        self.resolver.resolve_any(key)
    }

    fn resolve_many(&self, key: &Key) -> DiResult<Vec<AnyArc>> {
        self.resolver.resolve_many(key)
    }

    fn push_sync_disposer(&self, f: Box<dyn FnOnce() + Send>) {
        self.resolver.push_sync_disposer(f);
    }

    fn push_async_disposer(&self, f: Box<dyn FnOnce() -> BoxFutureUnit + Send>) {
        self.resolver.push_async_disposer(f);
    }
}

impl Resolver for InterceptionContext<'_> {}

/// Wraps every matching trait registration in an intercepting proxy.
///
/// The rewritten constructor builds the inner instance, obtains the
/// interceptor and returns the proxy. Over a pre-built instance, an
/// interceptor that is the same for every construction is folded into a
/// single proxy unless [`InterceptionOptions::fold_constant_proxies`] is off:
/// a fixed instance at build time, a singleton interceptor type on first
/// resolution.
pub struct InterceptionHook {
    predicate: Box<Predicate>,
    source: InterceptorSource,
}

impl InterceptionHook {
    pub fn new<P>(source: InterceptorSource, predicate: P) -> Self
    where
        P: Fn(&ServiceType) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Box::new(predicate),
            source,
        }
    }

    pub fn source(&self) -> &InterceptorSource {
        &self.source
    }

    pub fn matches(&self, service_type: &ServiceType) -> bool {
        (self.predicate)(service_type)
    }
}

impl fmt::Debug for InterceptionHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptionHook")
            .field("source", &self.source)
            .finish()
    }
}

impl ConstructionHook for InterceptionHook {
    fn on_construct(&self, event: &mut ConstructionEvent<'_>) -> DiResult<()> {
        let service_type = event.service_type();
        if !self.matches(&service_type) {
            return Ok(());
        }

        let proxy = match event.proxy_factory() {
            Some(proxy) if service_type.is_interface() => proxy.clone(),
            _ => {
                tracing::warn!(
                    service = service_type.name(),
                    interceptor = self.source.describe(),
                    "interception predicate matched a concrete service"
                );
                return Err(DiError::NotAnInterface(service_type.name()));
            }
        };
        let observers = event.observers().clone();

        let fold = event.options().fold_constant_proxies
            && event.constructor().is_constant()
            && self.source.is_shared();

        if fold {
            let immediate = match (event.constructor(), &self.source) {
                (Constructor::Constant(target), InterceptorSource::Instance(interceptor)) => {
                    Some((target.clone(), interceptor.clone()))
                }
                _ => None,
            };
            if let Some((target, interceptor)) = immediate {
                let proxied = proxy.create(interceptor, target)?;
                observers.proxy_created(&service_type);
                tracing::trace!(service = service_type.name(), "proxy folded into constant registration");
                event.set_constructor(Constructor::Constant(proxied));
                return Ok(());
            }

            // The singleton interceptor only exists once the provider does.
            let target = event.constructor().clone();
            let source = self.source.clone();
            let key = event.key().clone();
            let folded: Arc<OnceCell<AnyArc>> = Arc::new(OnceCell::new());
            tracing::trace!(service = service_type.name(), "proxy folded on first resolution");
            event.set_constructor(Constructor::factory(move |resolver| {
                let proxied = folded.get_or_try_init(|| {
                    let interceptor = source.obtain(resolver, service_type, &key)?;
                    let proxied = proxy.create(interceptor, target.invoke(resolver)?)?;
                    observers.proxy_created(&service_type);
                    Ok::<_, DiError>(proxied)
                })?;
                Ok(proxied.clone())
            }));
            return Ok(());
        }

        tracing::debug!(
            service = service_type.name(),
            lifetime = ?event.lifetime(),
            interceptor = self.source.describe(),
            "interception attached"
        );

        let inner = event.constructor().clone();
        let source = self.source.clone();
        let key = event.key().clone();
        event.set_constructor(Constructor::factory(move |resolver| {
            let target = inner.invoke(resolver)?;
            let interceptor = source.obtain(resolver, service_type, &key)?;
            let proxied = proxy.create(interceptor, target)?;
            observers.proxy_created(&service_type);
            Ok(proxied)
        }));

        Ok(())
    }
}
