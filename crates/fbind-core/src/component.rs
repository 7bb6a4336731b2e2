#![forbid(unsafe_code)]

//! Typed component collection: the extensibility substrate of bindings and
//! the binding manager.
//!
//! A component declares the capability interfaces it implements when it is
//! added ([`Component::register`]). The collection keeps, per interface, a
//! cached snapshot `Rc<[Rc<dyn I>]>` ordered by priority, so hot paths fetch
//! "all target listeners" with one hash lookup and no scan.
//!
//! # Invariants
//!
//! 1. Components are ordered by descending priority, then insertion order.
//! 2. A snapshot returned by [`ComponentCollection::get`] never changes; any
//!    add or remove invalidates the cache and the next `get` rebuilds it.
//! 3. Attach/detach hooks run outside internal borrows, so hooks may add or
//!    remove components.
//!
//! # Example
//!
//! ```
//! use fbind_core::component::{Component, ComponentCollection, Registrar};
//! use std::rc::Rc;
//!
//! trait Greeter { fn greet(&self) -> &'static str; }
//!
//! struct Hello;
//! impl Greeter for Hello { fn greet(&self) -> &'static str { "hello" } }
//! impl Component<()> for Hello {
//!     fn register(self: Rc<Self>, registrar: &mut Registrar) {
//!         registrar.provide::<dyn Greeter>(self);
//!     }
//! }
//!
//! let components = ComponentCollection::<()>::new();
//! assert!(components.add(&(), Rc::new(Hello)));
//! let greeters = components.get::<dyn Greeter>();
//! assert_eq!(greeters[0].greet(), "hello");
//! ```

use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::value::AsAny;

/// A pluggable behavior hosted by an owner `O`.
pub trait Component<O: ?Sized>: AsAny {
    /// Higher priorities come first in every snapshot.
    fn priority(&self) -> i32 {
        0
    }

    /// Declare the capability interfaces this component provides.
    fn register(self: Rc<Self>, registrar: &mut Registrar);

    /// Veto hook; returning `false` rejects the component.
    fn on_attaching(&self, _owner: &O) -> bool {
        true
    }

    /// Called after the component became visible in snapshots.
    fn on_attached(&self, _owner: &O) {}

    /// Called after the component was removed.
    fn on_detached(&self, _owner: &O) {}
}

/// Collects the capabilities a component provides.
#[derive(Default)]
pub struct Registrar {
    capabilities: Vec<(TypeId, Box<dyn Any>)>,
}

impl Registrar {
    /// Declare that the component implements interface `I`.
    pub fn provide<I: ?Sized + 'static>(&mut self, capability: Rc<I>) {
        self.capabilities
            .push((TypeId::of::<I>(), Box::new(capability)));
    }

    /// Number of declared capabilities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    /// Whether nothing was declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

struct Entry<O: ?Sized> {
    priority: i32,
    component: Rc<dyn Component<O>>,
    capabilities: Rc<Vec<(TypeId, Box<dyn Any>)>>,
}

impl<O: ?Sized> Clone for Entry<O> {
    fn clone(&self) -> Self {
        Self {
            priority: self.priority,
            component: Rc::clone(&self.component),
            capabilities: Rc::clone(&self.capabilities),
        }
    }
}

/// Priority-ordered components with cached per-interface snapshots.
pub struct ComponentCollection<O: ?Sized + 'static> {
    entries: RefCell<Vec<Entry<O>>>,
    snapshots: RefCell<AHashMap<TypeId, Box<dyn Any>>>,
    rebuilds: Cell<u64>,
}

impl<O: ?Sized + 'static> Default for ComponentCollection<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O: ?Sized + 'static> ComponentCollection<O> {
    /// Create an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
            snapshots: RefCell::new(AHashMap::new()),
            rebuilds: Cell::new(0),
        }
    }

    /// Add a component. Returns `false` if it vetoed attachment or is
    /// already present.
    pub fn add<C: Component<O>>(&self, owner: &O, component: Rc<C>) -> bool {
        self.add_dyn(owner, component)
    }

    /// Add a type-erased component.
    pub fn add_dyn(&self, owner: &O, component: Rc<dyn Component<O>>) -> bool {
        if self.contains(&component) || !component.on_attaching(owner) {
            return false;
        }
        let mut registrar = Registrar::default();
        Rc::clone(&component).register(&mut registrar);
        let priority = component.priority();
        {
            let mut entries = self.entries.borrow_mut();
            let pos = entries
                .iter()
                .position(|e| e.priority < priority)
                .unwrap_or(entries.len());
            entries.insert(
                pos,
                Entry {
                    priority,
                    component: Rc::clone(&component),
                    capabilities: Rc::new(registrar.capabilities),
                },
            );
        }
        self.invalidate();
        component.on_attached(owner);
        true
    }

    /// Remove a component by identity.
    pub fn remove(&self, owner: &O, component: &Rc<dyn Component<O>>) -> bool {
        let removed = {
            let mut entries = self.entries.borrow_mut();
            entries
                .iter()
                .position(|e| Rc::ptr_eq(&e.component, component))
                .map(|pos| entries.remove(pos))
        };
        match removed {
            Some(entry) => {
                self.invalidate();
                entry.component.on_detached(owner);
                true
            }
            None => false,
        }
    }

    /// Remove every component, last-added first.
    pub fn clear(&self, owner: &O) {
        let removed = std::mem::take(&mut *self.entries.borrow_mut());
        self.invalidate();
        for entry in removed.into_iter().rev() {
            entry.component.on_detached(owner);
        }
    }

    /// Whether `component` is present.
    #[must_use]
    pub fn contains(&self, component: &Rc<dyn Component<O>>) -> bool {
        self.entries
            .borrow()
            .iter()
            .any(|e| Rc::ptr_eq(&e.component, component))
    }

    /// First component of concrete type `C`.
    #[must_use]
    pub fn find<C: Component<O>>(&self) -> Option<Rc<C>> {
        let entries: Vec<Entry<O>> = self.entries.borrow().clone();
        entries
            .into_iter()
            .find_map(|e| e.component.into_any_rc().downcast::<C>().ok())
    }

    /// Snapshot of every component providing interface `I`, in priority order.
    #[must_use]
    pub fn get<I: ?Sized + 'static>(&self) -> Rc<[Rc<I>]> {
        let key = TypeId::of::<I>();
        if let Some(cached) = self
            .snapshots
            .borrow()
            .get(&key)
            .and_then(|s| s.downcast_ref::<Rc<[Rc<I>]>>())
        {
            return Rc::clone(cached);
        }

        let snapshot: Rc<[Rc<I>]> = self
            .entries
            .borrow()
            .iter()
            .flat_map(|e| e.capabilities.iter())
            .filter(|(id, _)| *id == key)
            .filter_map(|(_, cap)| cap.downcast_ref::<Rc<I>>().cloned())
            .collect();
        self.rebuilds.set(self.rebuilds.get() + 1);
        self.snapshots
            .borrow_mut()
            .insert(key, Box::new(Rc::clone(&snapshot)));
        snapshot
    }

    /// Whether any component provides `I`.
    #[must_use]
    pub fn has<I: ?Sized + 'static>(&self) -> bool {
        !self.get::<I>().is_empty()
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// How many snapshots were rebuilt since creation.
    #[must_use]
    pub fn snapshot_rebuilds(&self) -> u64 {
        self.rebuilds.get()
    }

    fn invalidate(&self) {
        let stale = std::mem::take(&mut *self.snapshots.borrow_mut());
        drop(stale);
    }
}

impl<O: ?Sized + 'static> fmt::Debug for ComponentCollection<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentCollection")
            .field("len", &self.len())
            .field("cached_interfaces", &self.snapshots.borrow().len())
            .finish()
    }
}
