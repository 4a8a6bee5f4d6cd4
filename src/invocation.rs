//! Per-call invocation context handed to interceptors.
//!
//! A proxy builds one [`Invocation`] for every intercepted call. The
//! interceptor may inspect the [`Method`], rewrite [`Arguments`], run the
//! wrapped call through [`Invocation::proceed`], or short-circuit by setting a
//! return value without proceeding.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::InterceptError;

/// Descriptor of the interface method being called.
///
/// # Examples
///
/// ```rust
/// use ferrous_intercept::Method;
///
/// trait Repo: Send + Sync {}
///
/// let method = Method::new::<dyn Repo, Option<String>>("find");
/// assert_eq!(method.name(), "find");
/// assert!(method.returns::<Option<String>>());
/// assert!(!method.returns::<String>());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Method {
    interface: &'static str,
    name: &'static str,
    return_type: TypeId,
    return_type_name: &'static str,
}

impl Method {
    /// Describes method `name` of interface `I` returning `R`.
    pub fn new<I: ?Sized + 'static, R: 'static>(name: &'static str) -> Self {
        Self {
            interface: std::any::type_name::<I>(),
            name,
            return_type: TypeId::of::<R>(),
            return_type_name: std::any::type_name::<R>(),
        }
    }

    /// Type name of the interface declaring the method.
    pub fn interface(&self) -> &'static str {
        self.interface
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn return_type(&self) -> TypeId {
        self.return_type
    }

    pub fn return_type_name(&self) -> &'static str {
        self.return_type_name
    }

    /// True when the method's declared return type is `R`.
    pub fn returns<R: 'static>(&self) -> bool {
        self.return_type == TypeId::of::<R>()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.interface, self.name)
    }
}

/// A single type-erased call argument.
///
/// Implemented for every `Clone + Debug + Send + Sync + 'static` type, which
/// is the bound proxied method parameters must satisfy.
pub trait Argument: Any + Send + Sync + fmt::Debug {
    fn clone_argument(&self) -> Box<dyn Argument>;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T> Argument for T
where
    T: Clone + fmt::Debug + Send + Sync + 'static,
{
    fn clone_argument(&self) -> Box<dyn Argument> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// Ordered, type-checked arguments of an intercepted call.
///
/// Values keep the type of the declared parameter: [`set`](Self::set) refuses
/// a replacement of any other type, so `proceed` can always hand the wrapped
/// method well-typed values.
///
/// ```rust
/// use ferrous_intercept::Arguments;
///
/// let mut args = Arguments::new();
/// args.push(String::from("alice"));
/// args.push(42u32);
///
/// assert_eq!(args.get::<String>(0).unwrap(), "alice");
/// args.set(1, 7u32).unwrap();
/// assert_eq!(*args.get::<u32>(1).unwrap(), 7);
/// assert!(args.set(1, "seven").is_err());
/// assert!(args.get::<u32>(2).is_err());
/// ```
#[derive(Default)]
pub struct Arguments {
    values: SmallVec<[Box<dyn Argument>; 4]>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<T: Argument>(&mut self, value: T) {
        self.values.push(Box::new(value));
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrows argument `index` as a `T`.
    pub fn get<T: 'static>(&self, index: usize) -> Result<&T, InterceptError> {
        let slot = self.slot(index)?;
        slot.as_any()
            .downcast_ref::<T>()
            .ok_or(InterceptError::ArgumentTypeMismatch {
                index,
                expected: slot.type_name(),
            })
    }

    /// Mutably borrows argument `index` as a `T`.
    pub fn get_mut<T: 'static>(&mut self, index: usize) -> Result<&mut T, InterceptError> {
        let len = self.values.len();
        let slot = self
            .values
            .get_mut(index)
            .ok_or(InterceptError::ArgumentOutOfRange { index, len })?;
        let expected = slot.type_name();
        slot.as_any_mut()
            .downcast_mut::<T>()
            .ok_or(InterceptError::ArgumentTypeMismatch { index, expected })
    }

    /// Replaces argument `index`. The value must have the parameter's type.
    pub fn set<T: 'static>(&mut self, index: usize, value: T) -> Result<(), InterceptError> {
        *self.get_mut::<T>(index)? = value;
        Ok(())
    }

    /// Type name of argument `index`.
    pub fn type_name(&self, index: usize) -> Result<&'static str, InterceptError> {
        self.slot(index).map(|slot| slot.type_name())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Argument> {
        self.values.iter().map(|value| &**value)
    }

    /// Sequential reader cloning arguments out in declaration order.
    #[doc(hidden)]
    pub fn reader(&self) -> ArgumentReader<'_> {
        ArgumentReader { arguments: self, position: 0 }
    }

    fn slot(&self, index: usize) -> Result<&dyn Argument, InterceptError> {
        self.values
            .get(index)
            .map(|value| &**value)
            .ok_or(InterceptError::ArgumentOutOfRange {
                index,
                len: self.values.len(),
            })
    }
}

impl Clone for Arguments {
    fn clone(&self) -> Self {
        Self {
            values: self.values.iter().map(|value| (**value).clone_argument()).collect(),
        }
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.values.iter()).finish()
    }
}

/// Mutable view of an invocation's arguments.
///
/// Values can be read and replaced in place but the list itself is fixed:
/// nothing can be added, removed or swapped for another list, so every
/// `proceed` sees exactly the declared parameters.
///
/// ```compile_fail
/// use ferrous_intercept::{Arguments, Invocation};
///
/// fn reset(invocation: &mut Invocation<'_>) {
///     *invocation.arguments_mut() = Arguments::new();
/// }
/// ```
pub struct ArgumentsMut<'a> {
    arguments: &'a mut Arguments,
}

impl ArgumentsMut<'_> {
    /// Mutably borrows argument `index` as a `T`.
    pub fn get_mut<T: 'static>(&mut self, index: usize) -> Result<&mut T, InterceptError> {
        self.arguments.get_mut(index)
    }

    /// Replaces argument `index`. The value must have the parameter's type.
    pub fn set<T: 'static>(&mut self, index: usize, value: T) -> Result<(), InterceptError> {
        self.arguments.set(index, value)
    }
}

impl std::ops::Deref for ArgumentsMut<'_> {
    type Target = Arguments;

    fn deref(&self) -> &Arguments {
        &*self.arguments
    }
}

impl fmt::Debug for ArgumentsMut<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.arguments, f)
    }
}

/// Cursor used by generated proxies to rebuild typed parameters.
#[doc(hidden)]
pub struct ArgumentReader<'a> {
    arguments: &'a Arguments,
    position: usize,
}

impl<'a> ArgumentReader<'a> {
    /// Clones the next argument out as a `T`.
    ///
    /// Argument types are fixed when the invocation is built and `set` keeps
    /// them, so a mismatch here is a broken invariant.
    pub fn next<T: Clone + 'static>(&mut self) -> T {
        let index = self.position;
        self.position += 1;
        match self.arguments.get::<T>(index) {
            Ok(value) => value.clone(),
            Err(e) => panic!("Proxy argument invariant violated: {}", e),
        }
    }
}

type Proceed<'a> = dyn Fn(&Arguments) -> Box<dyn Any + Send> + 'a;

/// One intercepted call.
///
/// Created by a proxy per call and dropped when the call returns.
///
/// `proceed` runs the next inner layer (another proxy or the real instance)
/// with the *current* arguments and stores the result in the return slot.
/// Every call to `proceed` re-executes the inner layer and overwrites the
/// previous result, which allows retry-style interceptors. Not calling it at
/// all is valid: the interceptor then provides the result itself.
///
/// A method with a return type needs a value in the slot once the interceptor
/// returns, either from `proceed` or from [`set_return_value`](Self::set_return_value).
/// The proxy panics if the slot is empty. Methods without a return type never
/// need one.
///
/// # Examples
///
/// ```rust
/// use ferrous_intercept::{Arguments, Invocation, Method};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {}
///
/// let target: Arc<dyn Greeter> = {
///     struct Real;
///     impl Greeter for Real {}
///     Arc::new(Real)
/// };
/// let mut args = Arguments::new();
/// args.push(String::from("world"));
///
/// let real = |args: &Arguments| {
///     let name = args.get::<String>(0).unwrap();
///     Box::new(format!("hello {}", name)) as Box<dyn std::any::Any + Send>
/// };
/// let mut invocation = Invocation::new(
///     Method::new::<dyn Greeter, String>("greet"),
///     &target,
///     args,
///     &real,
/// );
///
/// invocation.arguments_mut().set(0, String::from("rust")).unwrap();
/// invocation.proceed();
/// assert_eq!(invocation.return_value::<String>().unwrap(), "hello rust");
/// assert_eq!(invocation.proceed_count(), 1);
/// ```
pub struct Invocation<'a> {
    method: Method,
    target: &'a (dyn Any + Send + Sync),
    arguments: Arguments,
    return_value: Option<Box<dyn Any + Send>>,
    proceed: &'a Proceed<'a>,
    proceed_count: usize,
}

impl<'a> Invocation<'a> {
    /// Builds an invocation. `target` is the next inner instance, stored as
    /// the `Arc<dyn Trait>` it is held in.
    pub fn new(
        method: Method,
        target: &'a (dyn Any + Send + Sync),
        arguments: Arguments,
        proceed: &'a Proceed<'a>,
    ) -> Self {
        Self {
            method,
            target,
            arguments,
            return_value: None,
            proceed,
            proceed_count: 0,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The next inner instance, for inspection.
    ///
    /// Returns `None` unless `T` is the intercepted interface.
    pub fn target<T: ?Sized + 'static>(&self) -> Option<&Arc<T>> {
        self.target.downcast_ref::<Arc<T>>()
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    /// In-place access to the arguments `proceed` will pass on.
    pub fn arguments_mut(&mut self) -> ArgumentsMut<'_> {
        ArgumentsMut {
            arguments: &mut self.arguments,
        }
    }

    /// Runs the wrapped call with the current arguments.
    pub fn proceed(&mut self) {
        let result = (self.proceed)(&self.arguments);
        self.return_value = Some(result);
        self.proceed_count += 1;
    }

    /// How many times `proceed` has run for this call.
    pub fn proceed_count(&self) -> usize {
        self.proceed_count
    }

    /// Current content of the return slot, if it holds a `T`.
    pub fn return_value<T: 'static>(&self) -> Option<&T> {
        self.return_value.as_ref()?.downcast_ref::<T>()
    }

    pub fn return_value_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.return_value.as_mut()?.downcast_mut::<T>()
    }

    pub fn has_return_value(&self) -> bool {
        self.return_value.is_some()
    }

    /// Stores `value` as the call's result.
    ///
    /// Fails unless `T` is the method's declared return type.
    pub fn set_return_value<T: Send + 'static>(&mut self, value: T) -> Result<(), InterceptError> {
        if !self.method.returns::<T>() {
            return Err(InterceptError::ReturnTypeMismatch {
                method: self.method.name,
                expected: self.method.return_type_name,
            });
        }
        self.return_value = Some(Box::new(value));
        Ok(())
    }

    /// Consumes the invocation, yielding the result for the caller.
    pub fn into_return_value<T: 'static>(self) -> Option<T> {
        self.return_value?.downcast::<T>().ok().map(|value| *value)
    }
}

impl fmt::Debug for Invocation<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("method", &format_args!("{}", self.method))
            .field("arguments", &self.arguments)
            .field("has_return_value", &self.return_value.is_some())
            .field("proceed_count", &self.proceed_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    trait Calc: Send + Sync {}
    struct Real;
    impl Calc for Real {}

    fn target() -> Arc<dyn Calc> {
        Arc::new(Real)
    }

    fn add(args: &Arguments) -> Box<dyn Any + Send> {
        let a = *args.get::<i32>(0).unwrap();
        let b = *args.get::<i32>(1).unwrap();
        Box::new(a + b)
    }

    fn two_args(a: i32, b: i32) -> Arguments {
        let mut args = Arguments::new();
        args.push(a);
        args.push(b);
        args
    }

    #[test]
    fn proceed_uses_current_arguments() {
        let target = target();
        let mut inv = Invocation::new(Method::new::<dyn Calc, i32>("add"), &target, two_args(1, 2), &add);
        inv.arguments_mut().set(1, 40i32).unwrap();
        inv.proceed();
        assert_eq!(inv.into_return_value::<i32>(), Some(41));
    }

    #[test]
    fn repeated_proceed_reexecutes() {
        let runs = AtomicUsize::new(0);
        let counted = |args: &Arguments| {
            runs.fetch_add(1, Ordering::SeqCst);
            add(args)
        };
        let target = target();
        let mut inv = Invocation::new(Method::new::<dyn Calc, i32>("add"), &target, two_args(2, 3), &counted);
        inv.proceed();
        inv.arguments_mut().set(0, 10i32).unwrap();
        inv.proceed();
        assert_eq!(inv.proceed_count(), 2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(inv.return_value::<i32>(), Some(&13));
    }

    #[test]
    fn argument_handle_keeps_the_declared_shape() {
        let target = target();
        let mut inv = Invocation::new(Method::new::<dyn Calc, i32>("add"), &target, two_args(1, 2), &add);
        {
            let mut args = inv.arguments_mut();
            assert_eq!(args.len(), 2);
            assert_eq!(args.set(2, 9i32), Err(InterceptError::ArgumentOutOfRange { index: 2, len: 2 }));
            assert!(args.set(0, "one").is_err());
            *args.get_mut::<i32>(0).unwrap() += 10;
            assert_eq!(*args.get::<i32>(0).unwrap(), 11);
            assert_eq!(format!("{:?}", args), "[11, 2]");
        }
        inv.proceed();
        assert_eq!(inv.arguments().len(), 2);
        assert_eq!(inv.into_return_value::<i32>(), Some(13));
    }

    #[test]
    fn return_slot_is_type_checked() {
        let target = target();
        let mut inv = Invocation::new(Method::new::<dyn Calc, i32>("add"), &target, two_args(0, 0), &add);
        let err = inv.set_return_value("nope").unwrap_err();
        assert_eq!(
            err,
            InterceptError::ReturnTypeMismatch { method: "add", expected: "i32" }
        );
        assert!(!inv.has_return_value());
        inv.set_return_value(99i32).unwrap();
        assert_eq!(inv.proceed_count(), 0);
        assert_eq!(inv.into_return_value::<i32>(), Some(99));
    }

    #[test]
    fn argument_errors() {
        let mut args = two_args(1, 2);
        assert_eq!(
            args.set(5, 1i32),
            Err(InterceptError::ArgumentOutOfRange { index: 5, len: 2 })
        );
        assert_eq!(
            args.set(0, 1u8),
            Err(InterceptError::ArgumentTypeMismatch { index: 0, expected: "i32" })
        );
        assert_eq!(format!("{:?}", args), "[1, 2]");
    }

    #[test]
    fn target_downcasts_to_interface_only() {
        let target = target();
        let inv = Invocation::new(Method::new::<dyn Calc, i32>("add"), &target, Arguments::new(), &add);
        assert!(inv.target::<dyn Calc>().is_some());
        assert!(inv.target::<Real>().is_none());
    }

    #[test]
    fn reader_clones_in_order() {
        let mut args = Arguments::new();
        args.push(String::from("a"));
        args.push(7u64);
        let mut reader = args.reader();
        assert_eq!(reader.next::<String>(), "a");
        assert_eq!(reader.next::<u64>(), 7);
        assert_eq!(args.len(), 2);
    }
}
