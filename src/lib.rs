//! # ferrous-intercept
//!
//! Interface interception for a type-safe dependency injection container,
//! plus request-aware access to the current provider.
//!
//! ## Features
//!
//! - **Interceptable interfaces**: `interceptable!` traits get a generated proxy
//!   that routes every call through an [`Interceptor`]
//! - **Predicate-driven interception**: `intercept_with*` wraps every matching
//!   registration at build time, for single and multi-bindings alike
//! - **Chaining**: several interceptors nest around one real instance, the
//!   last registered outermost
//! - **Container core**: Singleton, Scoped and Transient lifetimes, trait
//!   multi-bindings, circular dependency detection and disposal hooks
//! - **Request scopes**: [`RequestScopeAccessor`] resolves from the active
//!   request scope, falling back to the root provider
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_intercept::{interceptable, interceptor_fn, predicates, Resolver, ServiceCollection};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! interceptable! {
//!     pub trait Repo {
//!         fn save(&self, name: String) -> usize;
//!     }
//! }
//!
//! struct MemoryRepo;
//! impl Repo for MemoryRepo {
//!     fn save(&self, name: String) -> usize {
//!         name.len()
//!     }
//! }
//!
//! let calls = Arc::new(AtomicUsize::new(0));
//! let counted = calls.clone();
//!
//! let mut services = ServiceCollection::new();
//! services.add_singleton_trait(Arc::new(MemoryRepo) as Arc<dyn Repo>);
//! services.intercept_with_instance(
//!     interceptor_fn(move |invocation| {
//!         counted.fetch_add(1, Ordering::SeqCst);
//!         invocation.proceed();
//!     }),
//!     predicates::is::<dyn Repo>(),
//! );
//!
//! let repo = services.build().get_required_trait::<dyn Repo>();
//! assert_eq!(repo.save("ferris".to_string()), 6);
//! assert_eq!(calls.load(Ordering::SeqCst), 1);
//! ```
//!
//! ## Service Lifetimes
//!
//! - **Singleton**: Created once and shared across the entire application
//! - **Scoped**: Created once per scope (ideal for web request contexts)
//! - **Transient**: Created fresh on every resolution
//!
//! An intercepted registration keeps its lifetime: the proxy is cached
//! exactly where the real instance would have been.

pub mod accessor;
pub mod collection;
pub mod error;
pub mod hook;
pub mod interceptor;
pub mod interceptors;
pub mod invocation;
pub mod key;
pub mod lifetime;
pub mod observer;
pub mod options;
pub mod provider;
pub mod proxy;
pub mod service_type;
pub mod traits;

#[cfg(feature = "axum-integration")]
pub mod axum_integration;

mod internal;
mod registration;

pub use accessor::{
    CurrentProvider, RequestContext, RequestScopeAccessor, RequestScopeGuard, RootProviderAccessor,
    ServiceProviderAccessor,
};
pub use collection::ServiceCollection;
pub use error::{DiError, DiResult, InterceptError};
pub use hook::{
    ConstructionEvent, ConstructionHook, InterceptionContext, InterceptionHook, InterceptorSource,
    ResolvedInterceptor,
};
pub use interceptor::{interceptor_fn, FnInterceptor, Interceptor};
pub use interceptors::{LoggingInterceptor, MethodStats, TimingInterceptor};
pub use internal::{BoxFutureUnit, CircularPanic};
pub use invocation::{Argument, Arguments, ArgumentsMut, Invocation, Method};
pub use key::{key_of_trait, key_of_type, Key};
pub use lifetime::Lifetime;
pub use observer::{DiObserver, LoggingObserver};
pub use options::{InterceptionOptions, FOLD_CONSTANTS_ENV};
pub use provider::{ResolverContext, Scope, ServiceProvider};
pub use proxy::{create_proxy, Interceptable, ProxyFactory};
pub use registration::{AnyArc, Constructor, Ctor};
pub use service_type::{predicates, Predicate, ServiceKind, ServiceType};
pub use traits::{AsyncDispose, Dispose, Resolver, ResolverCore};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    crate::interceptable! {
        trait Plugin {
            fn name(&self) -> String;
        }
    }

    struct Named(&'static str);

    impl Plugin for Named {
        fn name(&self) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn test_singleton_resolution() {
        let mut sc = ServiceCollection::new();
        sc.add_singleton(42usize);

        let sp = sc.build();
        let a = sp.get_required::<usize>();
        let b = sp.get_required::<usize>();

        assert_eq!(*a, 42);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_transient_resolution() {
        let mut sc = ServiceCollection::new();
        let counter = Arc::new(Mutex::new(0));
        let counter_clone = counter.clone();

        sc.add_transient_factory::<String, _>(move |_| {
            let mut c = counter_clone.lock().unwrap();
            *c += 1;
            format!("instance-{}", *c)
        });

        let sp = sc.build();
        let a = sp.get_required::<String>();
        let b = sp.get_required::<String>();

        assert_eq!(a.as_str(), "instance-1");
        assert_eq!(b.as_str(), "instance-2");
    }

    #[test]
    fn test_scoped_resolution() {
        let mut sc = ServiceCollection::new();
        let counter = Arc::new(Mutex::new(0));
        let counter_clone = counter.clone();

        sc.add_scoped_factory::<String, _>(move |_| {
            let mut c = counter_clone.lock().unwrap();
            *c += 1;
            format!("scoped-{}", *c)
        });

        let sp = sc.build();

        let scope1 = sp.create_scope();
        let s1a = scope1.get_required::<String>();
        let s1b = scope1.get_required::<String>();
        assert!(Arc::ptr_eq(&s1a, &s1b));

        let scope2 = sp.create_scope();
        let s2 = scope2.get_required::<String>();
        assert!(!Arc::ptr_eq(&s1a, &s2));

        assert_eq!(
            sp.get::<String>().unwrap_err(),
            DiError::WrongLifetime("Cannot resolve scoped service from root provider")
        );
    }

    #[test]
    fn test_trait_resolution() {
        let mut sc = ServiceCollection::new();
        sc.add_singleton_trait::<dyn Plugin>(Arc::new(Named("solo")));

        let sp = sc.build();
        assert_eq!(sp.get_required_trait::<dyn Plugin>().name(), "solo");
    }

    #[test]
    fn test_multi_binding_singletons_are_cached() {
        let built = Arc::new(AtomicUsize::new(0));
        let counter = built.clone();

        let mut sc = ServiceCollection::new();
        sc.add_trait_implementation::<dyn Plugin>(Arc::new(Named("a")), Lifetime::Singleton);
        sc.add_trait_factory::<dyn Plugin, _>(Lifetime::Singleton, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(Named("b"))
        });

        let sp = sc.build();
        let first = sp.get_all_trait::<dyn Plugin>().unwrap();
        let second = sp.get_all_trait::<dyn Plugin>().unwrap();

        let names: Vec<_> = first.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(Arc::ptr_eq(&first[1], &second[1]));
        // The single-binding fallback shares the multi-binding cache.
        assert!(Arc::ptr_eq(&sp.get_required_trait::<dyn Plugin>(), &first[1]));
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_not_found() {
        let sp = ServiceCollection::new().build();
        assert!(matches!(sp.get::<u64>(), Err(DiError::NotFound(_))));
        assert!(sp.get_all_trait::<dyn Plugin>().unwrap().is_empty());
    }
}
