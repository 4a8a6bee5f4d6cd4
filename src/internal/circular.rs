//! Circular dependency detection during resolution.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};

use crate::error::{DiError, DiResult};

const MAX_DEPTH: usize = 512;

thread_local! {
    static RESOLUTION_STACK: RefCell<Vec<&'static str>> = const { RefCell::new(Vec::new()) };
}

/// Panic payload carrying the dependency cycle, e.g. `["A", "B", "A"]`.
///
/// Raised where the cycle closes and turned into [`DiError::Circular`] by the
/// enclosing resolution.
#[derive(Debug)]
pub struct CircularPanic {
    pub path: Box<[&'static str]>,
}

struct StackGuard;

impl StackGuard {
    fn enter(name: &'static str) -> Self {
        let violation = RESOLUTION_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            if stack.contains(&name) {
                let mut path = stack.clone();
                path.push(name);
                return Some(Box::new(CircularPanic { path: path.into_boxed_slice() }) as Box<dyn std::any::Any + Send>);
            }
            if stack.len() >= MAX_DEPTH {
                return Some(Box::new(DiError::DepthExceeded(stack.len())) as Box<dyn std::any::Any + Send>);
            }
            stack.push(name);
            None
        });

        if let Some(payload) = violation {
            panic::resume_unwind(payload);
        }
        StackGuard
    }
}

impl Drop for StackGuard {
    fn drop(&mut self) {
        RESOLUTION_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Runs `f` with `name` pushed on the thread's resolution stack.
///
/// A cycle closing directly below surfaces here as `DiError::Circular`. Any
/// other panic, including one raised by a user factory or interceptor, is
/// resumed unchanged.
pub(crate) fn with_circular_catch<T, F>(name: &'static str, f: F) -> DiResult<T>
where
    F: FnOnce() -> DiResult<T>,
{
    let _guard = StackGuard::enter(name);

    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            if let Some(circular) = payload.downcast_ref::<CircularPanic>() {
                return Err(DiError::Circular(circular.path.to_vec()));
            }
            if let Some(DiError::DepthExceeded(depth)) = payload.downcast_ref::<DiError>() {
                return Err(DiError::DepthExceeded(*depth));
            }
            panic::resume_unwind(payload)
        }
    }
}
