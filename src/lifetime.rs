//! Service lifetime definitions.

/// Service lifetimes controlling instance caching behavior.
///
/// Interception follows the lifetime of the registration it wraps: a proxied
/// singleton is built once and shared, a proxied scoped service once per
/// scope, a proxied transient on every resolution.
///
/// # Examples
///
/// ```rust
/// use ferrous_intercept::{ServiceCollection, Resolver};
///
/// struct Database { url: String }
/// struct RequestModel { id: u32 }
///
/// let mut services = ServiceCollection::new();
/// services.add_singleton(Database { url: "postgres://localhost".to_string() });
/// services.add_transient_factory::<RequestModel, _>(|_| RequestModel { id: 7 });
///
/// let provider = services.build();
///
/// let db1 = provider.get_required::<Database>();
/// let db2 = provider.create_scope().get_required::<Database>();
/// assert!(std::ptr::eq(&*db1, &*db2));
///
/// let m1 = provider.get_required::<RequestModel>();
/// let m2 = provider.get_required::<RequestModel>();
/// assert!(!std::ptr::eq(&*m1, &*m2));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Single instance per root provider, cached forever
    Singleton,
    /// Single instance per scope, cached for the scope's lifetime
    Scoped,
    /// New instance per resolution, never cached
    Transient,
}

impl Lifetime {
    /// Lifetime used when an interceptor type is registered without an
    /// explicit lifetime.
    pub const DEFAULT: Lifetime = Lifetime::Transient;
}

impl Default for Lifetime {
    fn default() -> Self {
        Lifetime::DEFAULT
    }
}
