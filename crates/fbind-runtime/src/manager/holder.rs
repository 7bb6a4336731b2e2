#![forbid(unsafe_code)]

//! Indices of live bindings by target object.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use fbind_core::{Component, Metadata, Object, Registrar, Value};

use super::lifecycle::{BindingLifecycleListener, BindingLifecycleState};
use super::BindingManager;
use crate::binding::{Binding, BindingState};

/// Manager component indexing bindings by their target.
pub trait BindingHolder {
    /// Index `binding`. Returns `false` if this holder does not accept it.
    fn try_register(&self, binding: &Rc<dyn Binding>, metadata: Option<&Metadata>) -> bool;

    /// Drop `binding` from the index. Returns `false` if it was not held.
    fn try_unregister(&self, binding: &Rc<dyn Binding>, metadata: Option<&Metadata>) -> bool;

    /// Bindings on `target`, optionally only those on `path`.
    fn try_get_bindings(
        &self,
        target: &Value,
        path: Option<&str>,
        metadata: Option<&Metadata>,
    ) -> Vec<Rc<dyn Binding>>;
}

fn same_binding(a: &Rc<dyn Binding>, b: &Rc<dyn Binding>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

fn object_key(object: &Rc<dyn Object>) -> usize {
    Rc::as_ptr(object).cast::<()>() as usize
}

struct Slot {
    target: Weak<dyn Object>,
    bindings: Vec<Rc<dyn Binding>>,
}

impl Slot {
    fn holds(&self, object: &Rc<dyn Object>) -> bool {
        self.target
            .upgrade()
            .is_some_and(|live| Rc::ptr_eq(&live, object))
    }
}

/// Per-target index keyed weakly by object identity.
///
/// Holds bindings strongly and targets weakly; slots whose target died are
/// purged (and their bindings disposed) on the next register or lookup.
/// Lookups skip bindings disposed without telling the manager.
/// Primitive targets have no identity and are rejected.
pub struct WeakTargetBindingHolder {
    slots: RefCell<AHashMap<usize, Slot>>,
    replace_existing: bool,
}

impl WeakTargetBindingHolder {
    /// Holder that disposes a previous binding on the same target and path
    /// when `replace_existing` is set.
    #[must_use]
    pub fn new(replace_existing: bool) -> Rc<Self> {
        Rc::new(Self {
            slots: RefCell::new(AHashMap::new()),
            replace_existing,
        })
    }

    /// Number of targets with at least one binding.
    #[must_use]
    pub fn target_count(&self) -> usize {
        self.slots.borrow().len()
    }

    /// Remove slots of dead targets and dispose their bindings.
    pub fn purge(&self) -> usize {
        let dead: Vec<Slot> = {
            let mut slots = self.slots.borrow_mut();
            let keys: Vec<usize> = slots
                .iter()
                .filter(|(_, slot)| slot.target.strong_count() == 0)
                .map(|(key, _)| *key)
                .collect();
            keys.iter().filter_map(|key| slots.remove(key)).collect()
        };
        let count = dead.len();
        for slot in dead {
            for binding in slot.bindings.into_iter().rev() {
                binding.dispose();
            }
        }
        if count > 0 {
            tracing::debug!(count, "purged bindings of dropped targets");
        }
        count
    }
}

impl BindingHolder for WeakTargetBindingHolder {
    fn try_register(&self, binding: &Rc<dyn Binding>, _metadata: Option<&Metadata>) -> bool {
        let Value::Object(object) = binding.target().target() else {
            return false;
        };
        self.purge();
        let path = binding.target_path().to_owned();
        let replaced: Vec<Rc<dyn Binding>> = {
            let mut slots = self.slots.borrow_mut();
            let slot = slots.entry(object_key(&object)).or_insert_with(|| Slot {
                target: Rc::downgrade(&object),
                bindings: Vec::new(),
            });
            if !slot.holds(&object) {
                // Address reused by a new object.
                slot.target = Rc::downgrade(&object);
                slot.bindings.clear();
            }
            if slot.bindings.iter().any(|b| same_binding(b, binding)) {
                return true;
            }
            let replaced = if self.replace_existing {
                let (old, keep): (Vec<_>, Vec<_>) = slot
                    .bindings
                    .drain(..)
                    .partition(|b| b.target_path() == path);
                slot.bindings = keep;
                old
            } else {
                Vec::new()
            };
            slot.bindings.push(Rc::clone(binding));
            replaced
        };
        for old in replaced {
            tracing::debug!(path = %path, "replacing existing binding");
            old.dispose();
        }
        true
    }

    fn try_unregister(&self, binding: &Rc<dyn Binding>, _metadata: Option<&Metadata>) -> bool {
        let Value::Object(object) = binding.target().target() else {
            return false;
        };
        let mut slots = self.slots.borrow_mut();
        let key = object_key(&object);
        let Some(slot) = slots.get_mut(&key) else {
            return false;
        };
        let before = slot.bindings.len();
        slot.bindings.retain(|b| !same_binding(b, binding));
        let removed = slot.bindings.len() != before;
        if slot.bindings.is_empty() {
            slots.remove(&key);
        }
        removed
    }

    fn try_get_bindings(
        &self,
        target: &Value,
        path: Option<&str>,
        _metadata: Option<&Metadata>,
    ) -> Vec<Rc<dyn Binding>> {
        let Value::Object(object) = target else {
            return Vec::new();
        };
        self.purge();
        let slots = self.slots.borrow();
        let Some(slot) = slots.get(&object_key(object)).filter(|slot| slot.holds(object)) else {
            return Vec::new();
        };
        slot.bindings
            .iter()
            .filter(|b| b.state() != BindingState::Disposed)
            .filter(|b| path.is_none_or(|p| b.target_path() == p))
            .cloned()
            .collect()
    }
}

impl Component<BindingManager> for WeakTargetBindingHolder {
    fn register(self: Rc<Self>, registrar: &mut Registrar) {
        registrar.provide::<dyn BindingHolder>(self);
    }
}

impl fmt::Debug for WeakTargetBindingHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakTargetBindingHolder")
            .field("targets", &self.target_count())
            .field("replace_existing", &self.replace_existing)
            .finish()
    }
}

/// Keeps every holder of the manager in sync with lifecycle events.
#[derive(Debug, Default)]
pub struct HolderLifecycleListener;

impl BindingLifecycleListener for HolderLifecycleListener {
    fn on_lifecycle_changed(
        &self,
        manager: &BindingManager,
        binding: &Rc<dyn Binding>,
        state: BindingLifecycleState,
        _extra: Option<&Value>,
        metadata: Option<&Metadata>,
    ) {
        let holders = manager.components().get::<dyn BindingHolder>();
        match state {
            BindingLifecycleState::Initialized => {
                let accepted = holders
                    .iter()
                    .filter(|h| h.try_register(binding, metadata))
                    .count();
                if accepted == 0 {
                    tracing::trace!(path = binding.target_path(), "no holder accepted binding");
                }
            }
            BindingLifecycleState::Disposed => {
                for holder in holders.iter() {
                    holder.try_unregister(binding, metadata);
                }
            }
        }
    }
}

impl Component<BindingManager> for HolderLifecycleListener {
    fn register(self: Rc<Self>, registrar: &mut Registrar) {
        registrar.provide::<dyn BindingLifecycleListener>(self);
    }
}
