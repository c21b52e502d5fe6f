//! Hook registry and bound-capability slots.
//!
//! A generic engine never branches on the hardware variant. Instead it owns a
//! [`Hook`] per customisation point, resolved once from a [`HookRegistry`]
//! while the machine is being configured. Unbound hooks are legal: callers
//! fall back to their built-in default behaviour.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::error::{VideoError, VideoResult};

/// One customisation point: a named, optionally bound callable.
pub struct Hook<F: ?Sized> {
    name: &'static str,
    bound: Option<Rc<F>>,
}

impl<F: ?Sized> Hook<F> {
    pub fn unbound(name: &'static str) -> Self {
        Self { name, bound: None }
    }

    pub fn bound(name: &'static str, callable: Rc<F>) -> Self {
        Self {
            name,
            bound: Some(callable),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    /// The bound callable, or `None` when the caller must use its default.
    pub fn get(&self) -> Option<&F> {
        self.bound.as_deref()
    }
}

impl<F: ?Sized> Clone for Hook<F> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            bound: self.bound.clone(),
        }
    }
}

impl<F: ?Sized> fmt::Debug for Hook<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hook")
            .field("name", &self.name)
            .field("bound", &self.is_bound())
            .finish()
    }
}

/// Configuration-time store of callables, at most one per slot.
///
/// Once [`seal`](Self::seal)ed the registry is read-only; any later binding
/// attempt is reported as [`VideoError::RegistrySealed`].
pub struct HookRegistry<K, F: ?Sized> {
    label: &'static str,
    slots: BTreeMap<K, Rc<F>>,
    sealed: bool,
}

impl<K, F> HookRegistry<K, F>
where
    K: Ord + Copy + fmt::Debug,
    F: ?Sized,
{
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            slots: BTreeMap::new(),
            sealed: false,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Binds `callable` to `slot`, returning whatever was bound before.
    pub fn bind(&mut self, slot: K, callable: Rc<F>) -> VideoResult<Option<Rc<F>>> {
        if self.sealed {
            return Err(VideoError::RegistrySealed {
                registry: self.label,
            });
        }
        log::debug!("{}: bound {:?}", self.label, slot);
        Ok(self.slots.insert(slot, callable))
    }

    pub fn unbind(&mut self, slot: K) -> VideoResult<Option<Rc<F>>> {
        if self.sealed {
            return Err(VideoError::RegistrySealed {
                registry: self.label,
            });
        }
        Ok(self.slots.remove(&slot))
    }

    pub fn resolve(&self, slot: K) -> Option<Rc<F>> {
        self.slots.get(&slot).cloned()
    }

    /// Resolves `slot` into a capability the engine keeps for its lifetime.
    pub fn capability(&self, slot: K, name: &'static str) -> Hook<F> {
        match self.resolve(slot) {
            Some(callable) => Hook::bound(name, callable),
            None => {
                log::debug!("{}: {:?} unbound, {} uses its default", self.label, slot, name);
                Hook::unbound(name)
            }
        }
    }

    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<K: fmt::Debug, F: ?Sized> fmt::Debug for HookRegistry<K, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("label", &self.label)
            .field("slots", &self.slots.keys().collect::<Vec<_>>())
            .field("sealed", &self.sealed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Doubler = dyn Fn(u32) -> u32;

    #[test]
    fn test_bind_replaces_previous_binding() {
        let mut registry: HookRegistry<u8, Doubler> = HookRegistry::new("test");
        assert!(registry.bind(0, Rc::new(|v: u32| v * 2)).unwrap().is_none());
        let previous = registry.bind(0, Rc::new(|v: u32| v * 3)).unwrap();
        assert_eq!(previous.map(|f| f(5)), Some(10));
        assert_eq!(registry.resolve(0).map(|f| f(5)), Some(15));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unbound_slot_resolves_to_absent() {
        let registry: HookRegistry<u8, Doubler> = HookRegistry::new("test");
        assert!(registry.resolve(7).is_none());
        let hook = registry.capability(7, "doubler");
        assert!(!hook.is_bound());
        assert_eq!(hook.get().map(|f| f(1)).unwrap_or(1), 1);
    }

    #[test]
    fn test_capability_calls_through_bound_function() {
        let mut registry: HookRegistry<u8, Doubler> = HookRegistry::new("test");
        registry.bind(1, Rc::new(|v: u32| v << 4)).unwrap();
        let hook = registry.capability(1, "shift");
        assert_eq!(hook.name(), "shift");
        assert_eq!(hook.get().map(|f| f(1)), Some(16));
        let copy = hook.clone();
        assert!(copy.is_bound());
    }

    #[test]
    fn test_sealed_registry_rejects_binding() {
        let mut registry: HookRegistry<u8, Doubler> = HookRegistry::new("sealed");
        registry.bind(0, Rc::new(|v: u32| v)).unwrap();
        registry.seal();
        assert!(registry.is_sealed());
        assert!(matches!(
            registry.bind(0, Rc::new(|v: u32| v + 1)),
            Err(VideoError::RegistrySealed { registry: "sealed" })
        ));
        assert!(registry.unbind(0).is_err());
        assert_eq!(registry.resolve(0).map(|f| f(9)), Some(9));
    }
}
