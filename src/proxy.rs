//! Proxy engine: interface proxies that route every call through an interceptor.
//!
//! Proxies are generated per trait by [`interceptable!`](crate::interceptable).
//! The macro defines the trait, a private proxy struct implementing it and an
//! [`Interceptable`] impl for the trait object, which is what
//! [`create_proxy`] and the container's interception hook build on.

use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::interceptor::Interceptor;
use crate::registration::AnyArc;
use crate::service_type::ServiceType;

/// Interface types that can be wrapped in an intercepting proxy.
///
/// Implemented for `dyn Trait` by [`interceptable!`](crate::interceptable).
/// A hand-written implementation must return an object whose every method,
/// except the `runtime_type` meta-operation, builds an
/// [`Invocation`](crate::Invocation) and passes it to `interceptor`.
///
/// [`service_type`](Self::service_type) classifies `Self` as an interface.
/// An implementation for a concrete type must override it with
/// [`ServiceType::concrete`]; [`create_proxy`] then refuses it.
pub trait Interceptable: Send + Sync + 'static {
    fn create_proxy(inner: Arc<Self>, interceptor: Arc<dyn Interceptor>) -> Arc<Self>;

    fn service_type() -> ServiceType {
        ServiceType::interface::<Self>()
    }
}

/// Wraps `target` in a proxy routing every call through `interceptor`.
///
/// Fails with [`DiError::NotAnInterface`] when `T` is not a trait object.
///
/// # Examples
///
/// ```rust
/// use ferrous_intercept::{create_proxy, interceptable, interceptor_fn};
/// use std::sync::Arc;
///
/// interceptable! {
///     pub trait Greeter {
///         fn greet(&self, name: String) -> String;
///     }
/// }
///
/// struct English;
/// impl Greeter for English {
///     fn greet(&self, name: String) -> String { format!("Hello, {}", name) }
/// }
///
/// let shouting = interceptor_fn(|invocation| {
///     invocation.proceed();
///     let loud = invocation.return_value::<String>().unwrap().to_uppercase();
///     invocation.set_return_value(loud).unwrap();
/// });
///
/// let real: Arc<dyn Greeter> = Arc::new(English);
/// let proxy = create_proxy(shouting, real).unwrap();
/// assert_eq!(proxy.greet("ferris".to_string()), "HELLO, FERRIS");
/// assert!(proxy.runtime_type().ends_with("English"));
/// ```
pub fn create_proxy<T>(interceptor: Arc<dyn Interceptor>, target: Arc<T>) -> DiResult<Arc<T>>
where
    T: ?Sized + Interceptable,
{
    let service_type = T::service_type();
    if !service_type.is_interface() {
        return Err(DiError::NotAnInterface(service_type.name()));
    }
    Ok(T::create_proxy(target, interceptor))
}

type ProxyFn = dyn Fn(AnyArc, Arc<dyn Interceptor>) -> DiResult<AnyArc> + Send + Sync;

/// Type-erased proxy constructor for one interface.
///
/// Every trait registration carries one, so interception can be applied to
/// registrations whose interface type is only known at build time. Operates
/// on the container's storage form, an `Arc<dyn Trait>` boxed as `dyn Any`.
#[derive(Clone)]
pub struct ProxyFactory {
    service_type: ServiceType,
    create: Arc<ProxyFn>,
}

impl ProxyFactory {
    pub fn of<T>() -> Self
    where
        T: ?Sized + Interceptable,
    {
        let name = std::any::type_name::<T>();
        let create = move |target: AnyArc, interceptor: Arc<dyn Interceptor>| -> DiResult<AnyArc> {
            let inner = target
                .downcast::<Arc<T>>()
                .map_err(|_| DiError::TypeMismatch(name))?;
            let proxy = create_proxy::<T>(interceptor, (*inner).clone())?;
            Ok(Arc::new(proxy) as AnyArc)
        };
        Self {
            service_type: T::service_type(),
            create: Arc::new(create),
        }
    }

    pub fn service_type(&self) -> ServiceType {
        self.service_type
    }

    /// Wraps a stored `Arc<dyn Trait>` in a proxy, returning it in the same
    /// storage form.
    pub fn create(&self, interceptor: Arc<dyn Interceptor>, target: AnyArc) -> DiResult<AnyArc> {
        (self.create)(target, interceptor)
    }
}

impl std::fmt::Debug for ProxyFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyFactory")
            .field("service_type", &self.service_type)
            .finish()
    }
}

/// Defines an interceptable interface.
///
/// Expands to the trait itself (with `Send + Sync` supertraits and an extra
/// provided method `runtime_type`), a proxy type implementing it and an
/// [`Interceptable`] impl for `dyn Trait`.
///
/// Methods take `&self` and owned parameters. Parameter types must be
/// `Clone + Debug + Send + Sync + 'static` and return types `Send + 'static`.
/// Generic traits and generic methods are not supported, and no method may be
/// called `runtime_type`.
///
/// `runtime_type` returns the implementing type's name. Proxies forward it to
/// the wrapped instance without interception, so a proxied service reports
/// the same runtime type as the real one.
///
/// ```rust
/// use ferrous_intercept::interceptable;
///
/// interceptable! {
///     /// Persists users.
///     pub trait UserRepo {
///         fn save(&self, id: u32, name: String) -> Result<(), String>;
///         fn count(&self) -> usize;
///         fn clear(&self);
///     }
/// }
/// ```
#[macro_export]
macro_rules! interceptable {
    (
        $(#[$trait_meta:meta])*
        $vis:vis trait $name:ident {
            $(
                $(#[$method_meta:meta])*
                fn $method:ident(&self $(, $arg:ident : $arg_ty:ty)*) $(-> $ret:ty)?;
            )*
        }
    ) => {
        $(#[$trait_meta])*
        $vis trait $name: ::core::marker::Send + ::core::marker::Sync {
            $(
                $(#[$method_meta])*
                fn $method(&self $(, $arg: $arg_ty)*) $(-> $ret)?;
            )*

            /// Name of the implementing type.
            fn runtime_type(&self) -> &'static str {
                ::core::any::type_name::<Self>()
            }
        }

        const _: () = {
            struct InterceptedProxy {
                inner: ::std::sync::Arc<dyn $name>,
                interceptor: ::std::sync::Arc<dyn $crate::Interceptor>,
            }

            impl $name for InterceptedProxy {
                $(
                    fn $method(&self $(, $arg: $arg_ty)*) $(-> $ret)? {
                        let __inner = &self.inner;
                        #[allow(unused_mut)]
                        let mut __arguments = $crate::Arguments::new();
                        $( __arguments.push($arg); )*
                        let __proceed = move |__args: &$crate::Arguments|
                            -> ::std::boxed::Box<dyn ::core::any::Any + ::core::marker::Send>
                        {
                            #[allow(unused_mut, unused_variables)]
                            let mut __reader = __args.reader();
                            $( let $arg: $arg_ty = __reader.next::<$arg_ty>(); )*
                            ::std::boxed::Box::new(__inner.$method($($arg),*))
                        };
                        let mut __invocation = $crate::Invocation::new(
                            $crate::Method::new::<dyn $name, $crate::__return_type!($($ret)?)>(
                                ::core::stringify!($method),
                            ),
                            &self.inner,
                            __arguments,
                            &__proceed,
                        );
                        self.interceptor.intercept(&mut __invocation);
                        $crate::__finish_invocation!(__invocation, $name, $method $(, $ret)?)
                    }
                )*

                fn runtime_type(&self) -> &'static str {
                    self.inner.runtime_type()
                }
            }

            impl $crate::Interceptable for dyn $name {
                fn create_proxy(
                    inner: ::std::sync::Arc<Self>,
                    interceptor: ::std::sync::Arc<dyn $crate::Interceptor>,
                ) -> ::std::sync::Arc<Self> {
                    ::std::sync::Arc::new(InterceptedProxy { inner, interceptor })
                }
            }
        };
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __return_type {
    () => { () };
    ($ret:ty) => { $ret };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __finish_invocation {
    ($invocation:ident, $name:ident, $method:ident) => {{
        let _ = $invocation.into_return_value::<()>();
    }};
    ($invocation:ident, $name:ident, $method:ident, $ret:ty) => {
        match $invocation.into_return_value::<$ret>() {
            ::core::option::Option::Some(value) => value,
            ::core::option::Option::None => ::core::panic!(
                "{}::{} produced no return value: the interceptor neither proceeded nor set one",
                ::core::stringify!($name),
                ::core::stringify!($method),
            ),
        }
    };
}
