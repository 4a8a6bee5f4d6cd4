//! Service keys used for registry storage and lookup.

use std::any::TypeId;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Key for service storage and lookup.
///
/// Concrete services are keyed by `TypeId`; trait-object services by the
/// trait's type name, with an index for multi-bindings.
///
/// # Examples
///
/// ```rust
/// use ferrous_intercept::{Key, key_of_type};
/// use std::any::TypeId;
///
/// let key = key_of_type::<String>();
/// assert_eq!(key, Key::Type(TypeId::of::<String>(), "alloc::string::String"));
/// assert_eq!(key.display_name(), "alloc::string::String");
/// assert!(!key.is_trait());
///
/// let repo = Key::Trait("dyn app::Repo");
/// assert!(repo.is_trait());
/// ```
#[derive(Debug, Clone)]
pub enum Key {
    /// Concrete type key with TypeId and name for diagnostics
    Type(TypeId, &'static str),
    /// Single trait binding key
    Trait(&'static str),
    /// Multi-trait binding with index
    MultiTrait(&'static str, usize),
}

impl Key {
    /// The type or trait name (`std::any::type_name`) for display.
    pub fn display_name(&self) -> &'static str {
        match self {
            Key::Type(_, name) => name,
            Key::Trait(name) => name,
            Key::MultiTrait(name, _) => name,
        }
    }

    /// True for trait-object keys, single or multi.
    pub fn is_trait(&self) -> bool {
        matches!(self, Key::Trait(_) | Key::MultiTrait(_, _))
    }

    fn rank(&self) -> u8 {
        match self {
            Key::Type(_, _) => 0,
            Key::Trait(_) => 1,
            Key::MultiTrait(_, _) => 2,
        }
    }
}

// The name in `Type` is diagnostic only; identity is the TypeId.
impl PartialEq for Key {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Key::Type(a, _), Key::Type(b, _)) => a == b,
            (Key::Trait(a), Key::Trait(b)) => a == b,
            (Key::MultiTrait(a, i), Key::MultiTrait(b, j)) => a == b && i == j,
            _ => false,
        }
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Key::Type(a, _), Key::Type(b, _)) => a.cmp(b),
            (Key::Trait(a), Key::Trait(b)) => a.cmp(b),
            (Key::MultiTrait(a, i), Key::MultiTrait(b, j)) => a.cmp(b).then_with(|| i.cmp(j)),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Key {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Key::Type(id, _) => id.hash(state),
            Key::Trait(name) => name.hash(state),
            Key::MultiTrait(name, idx) => {
                name.hash(state);
                idx.hash(state);
            }
        }
    }
}

/// Key for a concrete type.
#[inline(always)]
pub fn key_of_type<T: 'static>() -> Key {
    Key::Type(TypeId::of::<T>(), std::any::type_name::<T>())
}

/// Key for a single trait binding.
#[inline(always)]
pub fn key_of_trait<T: ?Sized + 'static>() -> Key {
    Key::Trait(std::any::type_name::<T>())
}
