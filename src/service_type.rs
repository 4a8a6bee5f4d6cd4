//! Service type descriptors and the predicates that select them for interception.

use std::any::TypeId;
use std::fmt;

/// Whether a service is exposed as an interface (trait object) or as a
/// concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    /// `dyn Trait` services; the only kind that can be proxied
    Interface,
    /// Sized types registered directly
    Concrete,
}

/// Descriptor of a registered service type.
///
/// Interception predicates receive one of these for every registration the
/// container compiles. Identity is the `TypeId`; the name is the
/// `std::any::type_name` of the service type.
///
/// # Examples
///
/// ```rust
/// use ferrous_intercept::{ServiceType, ServiceKind};
///
/// trait Repo: Send + Sync {}
///
/// let repo = ServiceType::interface::<dyn Repo>();
/// assert!(repo.is_interface());
/// assert!(repo.is::<dyn Repo>());
///
/// let number = ServiceType::concrete::<u64>();
/// assert_eq!(number.kind(), ServiceKind::Concrete);
/// assert_eq!(number.name(), "u64");
/// ```
#[derive(Clone, Copy)]
pub struct ServiceType {
    type_id: TypeId,
    name: &'static str,
    kind: ServiceKind,
}

impl ServiceType {
    /// Descriptor for a trait-object service type.
    pub fn interface<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            kind: ServiceKind::Interface,
        }
    }

    /// Descriptor for a concrete service type.
    pub fn concrete<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            kind: ServiceKind::Concrete,
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    pub fn is_interface(&self) -> bool {
        self.kind == ServiceKind::Interface
    }

    /// True when this descriptor is for `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }
}

impl PartialEq for ServiceType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ServiceType {}

impl std::hash::Hash for ServiceType {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceType")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish()
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Predicate selecting which service types get intercepted.
pub type Predicate = dyn Fn(&ServiceType) -> bool + Send + Sync;

/// Ready-made interception predicates.
///
/// Any `Fn(&ServiceType) -> bool + Send + Sync` works as a predicate; these
/// cover the common cases.
///
/// ```rust
/// use ferrous_intercept::{ServiceType, predicates};
///
/// trait Repo: Send + Sync {}
/// trait Clock: Send + Sync {}
///
/// let only_repo = predicates::is::<dyn Repo>();
/// assert!(only_repo(&ServiceType::interface::<dyn Repo>()));
/// assert!(!only_repo(&ServiceType::interface::<dyn Clock>()));
///
/// let not_clock = predicates::not(predicates::is::<dyn Clock>());
/// assert!(not_clock(&ServiceType::interface::<dyn Repo>()));
/// ```
pub mod predicates {
    use super::ServiceType;

    /// Matches exactly the service type `T`.
    pub fn is<T: ?Sized + 'static>() -> impl Fn(&ServiceType) -> bool + Send + Sync + 'static {
        |t: &ServiceType| t.is::<T>()
    }

    /// Matches every interface service.
    pub fn any_interface() -> impl Fn(&ServiceType) -> bool + Send + Sync + 'static {
        |t: &ServiceType| t.is_interface()
    }

    /// Matches service types whose name contains `fragment`.
    pub fn name_contains(
        fragment: &'static str,
    ) -> impl Fn(&ServiceType) -> bool + Send + Sync + 'static {
        move |t: &ServiceType| t.name().contains(fragment)
    }

    /// Negates another predicate.
    pub fn not<P>(predicate: P) -> impl Fn(&ServiceType) -> bool + Send + Sync + 'static
    where
        P: Fn(&ServiceType) -> bool + Send + Sync + 'static,
    {
        move |t: &ServiceType| !predicate(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Repo {}
    struct Plain;

    #[test]
    fn identity_ignores_kind() {
        assert_eq!(ServiceType::interface::<Plain>(), ServiceType::concrete::<Plain>());
        assert_ne!(ServiceType::concrete::<Plain>(), ServiceType::concrete::<u8>());
    }

    #[test]
    fn name_contains_matches_path() {
        let p = predicates::name_contains("Repo");
        assert!(p(&ServiceType::interface::<dyn Repo>()));
        assert!(!p(&ServiceType::concrete::<Plain>()));
        assert!(predicates::any_interface()(&ServiceType::interface::<dyn Repo>()));
    }
}
