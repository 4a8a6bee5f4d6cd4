//! The interceptor capability implemented by user code.

use std::fmt;
use std::sync::Arc;

use crate::invocation::Invocation;

/// Handler invoked in place of a direct method call on a proxied service.
///
/// An interceptor can inspect or rewrite the arguments, run the real call via
/// [`Invocation::proceed`] (once, several times or not at all) and replace the
/// result. Proxies call it synchronously on the caller's thread; an
/// interceptor shared by a singleton or scoped registration must tolerate
/// concurrent calls.
///
/// # Examples
///
/// ```rust
/// use ferrous_intercept::{interceptable, Interceptor, Invocation, ServiceCollection, Resolver, predicates};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// interceptable! {
///     pub trait Counter {
///         fn next(&self) -> u64;
///     }
/// }
///
/// struct Fixed;
/// impl Counter for Fixed {
///     fn next(&self) -> u64 { 1 }
/// }
///
/// #[derive(Default)]
/// struct Doubling { calls: AtomicUsize }
///
/// impl Interceptor for Doubling {
///     fn intercept(&self, invocation: &mut Invocation<'_>) {
///         self.calls.fetch_add(1, Ordering::Relaxed);
///         invocation.proceed();
///         let value = *invocation.return_value::<u64>().unwrap();
///         invocation.set_return_value(value * 2).unwrap();
///     }
/// }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton_trait::<dyn Counter>(Arc::new(Fixed));
/// services.intercept_with::<Doubling>(predicates::is::<dyn Counter>());
///
/// let provider = services.build();
/// let counter = provider.get_required_trait::<dyn Counter>();
/// assert_eq!(counter.next(), 2);
/// ```
pub trait Interceptor: Send + Sync {
    fn intercept(&self, invocation: &mut Invocation<'_>);
}

/// Adapter turning a closure into an [`Interceptor`].
pub struct FnInterceptor<F> {
    f: F,
}

impl<F> FnInterceptor<F>
where
    F: Fn(&mut Invocation<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Interceptor for FnInterceptor<F>
where
    F: Fn(&mut Invocation<'_>) + Send + Sync,
{
    fn intercept(&self, invocation: &mut Invocation<'_>) {
        (self.f)(invocation)
    }
}

impl<F> fmt::Debug for FnInterceptor<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnInterceptor")
    }
}

/// Wraps a closure as a shareable interceptor.
///
/// ```rust
/// use ferrous_intercept::interceptor_fn;
///
/// let passthrough = interceptor_fn(|invocation| invocation.proceed());
/// # let _ = passthrough;
/// ```
pub fn interceptor_fn<F>(f: F) -> Arc<dyn Interceptor>
where
    F: Fn(&mut Invocation<'_>) + Send + Sync + 'static,
{
    Arc::new(FnInterceptor::new(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::{Arguments, Method};
    use std::any::Any;

    trait Echo: Send + Sync {}
    struct Real;
    impl Echo for Real {}

    #[test]
    fn closure_interceptor_short_circuits() {
        let interceptor = interceptor_fn(|inv| {
            inv.set_return_value(String::from("cached")).unwrap();
        });
        let target: Arc<dyn Echo> = Arc::new(Real);
        let never = |_: &Arguments| -> Box<dyn Any + Send> { panic!("real call must not run") };
        let mut inv = Invocation::new(Method::new::<dyn Echo, String>("echo"), &target, Arguments::new(), &never);

        interceptor.intercept(&mut inv);

        assert_eq!(inv.proceed_count(), 0);
        assert_eq!(inv.into_return_value::<String>().as_deref(), Some("cached"));
    }
}
