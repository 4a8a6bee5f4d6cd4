//! Disposal hooks collected by providers and scopes.

use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by async disposal hooks.
pub type BoxFutureUnit = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Disposal hooks, run LIFO: async hooks first, then sync hooks.
#[derive(Default)]
pub(crate) struct DisposeBag {
    sync: Vec<Box<dyn FnOnce() + Send>>,
    asyncs: Vec<Box<dyn FnOnce() -> BoxFutureUnit + Send>>,
}

impl DisposeBag {
    pub(crate) fn push_sync(&mut self, f: Box<dyn FnOnce() + Send>) {
        self.sync.push(f);
    }

    pub(crate) fn push_async(&mut self, f: Box<dyn FnOnce() -> BoxFutureUnit + Send>) {
        self.asyncs.push(f);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.sync.is_empty() && self.asyncs.is_empty()
    }

    /// Runs every hook. Takes the bag by value so callers can release their
    /// lock before awaiting.
    pub(crate) async fn run_all(mut self) {
        while let Some(f) = self.asyncs.pop() {
            f().await;
        }
        while let Some(f) = self.sync.pop() {
            f();
        }
    }
}
