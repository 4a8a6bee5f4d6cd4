//! Service registration types.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::error::DiResult;
use crate::key::Key;
use crate::lifetime::Lifetime;
use crate::proxy::ProxyFactory;
use crate::service_type::ServiceType;

pub(crate) use crate::provider::ResolverContext;

/// Type-erased storage form of a service instance.
///
/// Concrete services are stored as `Arc<T>`, trait services as
/// `Arc<Arc<dyn Trait>>`.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Construction closure of a registration.
pub type Ctor = Arc<dyn for<'a> Fn(&ResolverContext<'a>) -> DiResult<AnyArc> + Send + Sync>;

/// How a registration produces its instance.
///
/// `Constant` is a pre-built instance (the `add_singleton*` instance
/// registrations and `add_trait_implementation`); `Factory` runs on every
/// construction the lifetime asks for.
#[derive(Clone)]
pub enum Constructor {
    Constant(AnyArc),
    Factory(Ctor),
}

impl Constructor {
    pub fn factory<F>(f: F) -> Self
    where
        F: for<'a> Fn(&ResolverContext<'a>) -> DiResult<AnyArc> + Send + Sync + 'static,
    {
        Constructor::Factory(Arc::new(f))
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, Constructor::Constant(_))
    }

    pub fn invoke(&self, resolver: &ResolverContext<'_>) -> DiResult<AnyArc> {
        match self {
            Constructor::Constant(value) => Ok(value.clone()),
            Constructor::Factory(ctor) => ctor(resolver),
        }
    }
}

impl std::fmt::Debug for Constructor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constructor::Constant(_) => f.write_str("Constructor::Constant"),
            Constructor::Factory(_) => f.write_str("Constructor::Factory"),
        }
    }
}

/// Service registration with lifetime and constructor
pub(crate) struct Registration {
    pub(crate) service_type: ServiceType,
    pub(crate) lifetime: Lifetime,
    pub(crate) ctor: Constructor,
    /// Present for trait registrations; lets interception wrap the instance
    pub(crate) proxy: Option<ProxyFactory>,
    /// Singleton cache, filled on first resolution
    pub(crate) single_runtime: Option<OnceCell<AnyArc>>,
    /// Index into a scope's cells, assigned by `Registry::finalize`
    pub(crate) scoped_slot: Option<usize>,
}

impl Registration {
    pub(crate) fn new(service_type: ServiceType, lifetime: Lifetime, ctor: Constructor) -> Self {
        let single_runtime = match lifetime {
            Lifetime::Singleton => Some(OnceCell::new()),
            _ => None,
        };

        Self {
            service_type,
            lifetime,
            ctor,
            proxy: None,
            single_runtime,
            scoped_slot: None,
        }
    }

    pub(crate) fn with_proxy(mut self, proxy: ProxyFactory) -> Self {
        self.proxy = Some(proxy);
        self
    }
}

/// Service registry holding all registrations
#[derive(Default)]
pub(crate) struct Registry {
    /// Single bindings in registration order
    one: Vec<(Key, Registration)>,
    index: HashMap<Key, usize>,
    /// Multi-binding registrations (append-only)
    pub(crate) many: HashMap<&'static str, Vec<Registration>>,
    /// Total count of scoped registrations for slot allocation
    pub(crate) scoped_count: usize,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts a registration; a later registration for the same key replaces
    /// the earlier one.
    pub(crate) fn insert(&mut self, key: Key, registration: Registration) {
        match self.index.get(&key) {
            Some(&pos) => self.one[pos] = (key, registration),
            None => {
                self.index.insert(key.clone(), self.one.len());
                self.one.push((key, registration));
            }
        }
    }

    pub(crate) fn push_many(&mut self, name: &'static str, registration: Registration) {
        self.many.entry(name).or_default().push(registration);
    }

    #[inline]
    pub(crate) fn get(&self, key: &Key) -> Option<&Registration> {
        self.index.get(key).map(|&pos| &self.one[pos].1)
    }

    pub(crate) fn contains_key(&self, key: &Key) -> bool {
        self.index.contains_key(key)
    }

    /// Every registration, single bindings first, each with the key the
    /// container resolves it under.
    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (Key, &mut Registration)> {
        let singles = self.one.iter_mut().map(|(k, r)| (k.clone(), r));
        let multis = self.many.iter_mut().flat_map(|(&name, regs)| {
            regs.iter_mut()
                .enumerate()
                .map(move |(i, r)| (Key::MultiTrait(name, i), r))
        });
        singles.chain(multis)
    }

    pub(crate) fn len(&self) -> usize {
        self.one.len() + self.many.values().map(Vec::len).sum::<usize>()
    }

    /// Assigns scoped slot indices.
    pub(crate) fn finalize(&mut self) {
        let mut next_scoped_slot = 0;

        for (_, reg) in self.one.iter_mut() {
            if reg.lifetime == Lifetime::Scoped {
                reg.scoped_slot = Some(next_scoped_slot);
                next_scoped_slot += 1;
            }
        }

        for regs in self.many.values_mut() {
            for reg in regs.iter_mut() {
                if reg.lifetime == Lifetime::Scoped {
                    reg.scoped_slot = Some(next_scoped_slot);
                    next_scoped_slot += 1;
                }
            }
        }

        self.scoped_count = next_scoped_slot;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::key_of_type;

    fn constant(value: u32) -> Registration {
        Registration::new(
            ServiceType::concrete::<u32>(),
            Lifetime::Scoped,
            Constructor::Constant(Arc::new(value)),
        )
    }

    #[test]
    fn insert_replaces_and_keeps_order() {
        let mut registry = Registry::new();
        registry.insert(key_of_type::<u32>(), constant(1));
        registry.insert(key_of_type::<u8>(), constant(2));
        registry.insert(key_of_type::<u32>(), constant(3));

        assert_eq!(registry.len(), 2);
        assert!(registry.contains_key(&key_of_type::<u8>()));
        let keys: Vec<_> = registry.iter_mut().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![key_of_type::<u32>(), key_of_type::<u8>()]);
    }

    #[test]
    fn finalize_assigns_distinct_slots() {
        let mut registry = Registry::new();
        registry.insert(key_of_type::<u32>(), constant(1));
        registry.push_many("dyn Plugin", constant(2));
        registry.push_many("dyn Plugin", constant(3));
        registry.finalize();

        assert_eq!(registry.scoped_count, 3);
        let mut slots: Vec<_> = registry.iter_mut().filter_map(|(_, r)| r.scoped_slot).collect();
        slots.sort();
        assert_eq!(slots, vec![0, 1, 2]);
    }
}
