#![forbid(unsafe_code)]

//! Member resolution: `(type, name) -> member accessor`.
//!
//! [`MemberProvider`] is the seam platform adapters implement. The bundled
//! [`MemberRegistry`] covers explicit registrations, typed indexers, and the
//! built-in [`PropertyBag`](crate::object::PropertyBag) /
//! [`ObservableList`](crate::object::ObservableList) objects.
//!
//! # Resolution order
//!
//! 1. Members registered for the exact type, filtered by kind.
//! 2. An indexer factory registered for the type, when the name is an
//!    indexer segment (`[0]`, `["key"]`).
//! 3. Built-in members of bags and lists.
//!
//! Results, including misses, are cached per `(type, name, kinds)`. Any
//! registration clears the cache.

use std::any::TypeId;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::member::{MemberInfo, MemberKinds};
use crate::object::{
    COLLECTION_CHANGED_EVENT, COUNT_MEMBER, ObservableList, PROPERTY_CHANGED_EVENT, PropertyBag,
    bag_changed_event, bag_property, list_changed_event, list_count, list_indexer,
};
use crate::path::{indexer_args, is_indexer};
use crate::value::{Object, TypeKey, Value};

/// Resolves members of runtime types.
pub trait MemberProvider {
    /// Find the member `name` of type `ty` whose kind is in `kinds`.
    fn try_get_member(&self, ty: TypeKey, name: &str, kinds: MemberKinds) -> Option<Rc<dyn MemberInfo>>;

    /// Resolve against a live value. Null has no members.
    fn try_get_member_of(&self, target: &Value, name: &str, kinds: MemberKinds) -> Option<Rc<dyn MemberInfo>> {
        self.try_get_member(target.type_key()?, name, kinds)
    }
}

type IndexerFactory = Rc<dyn Fn(&str, &[Value]) -> Option<Rc<dyn MemberInfo>>>;
type CacheKey = (TypeId, Box<str>, u8);

/// Registry-backed member provider with a resolution cache.
#[derive(Default)]
pub struct MemberRegistry {
    members: RefCell<AHashMap<(TypeId, Rc<str>), Vec<Rc<dyn MemberInfo>>>>,
    indexers: RefCell<AHashMap<TypeId, IndexerFactory>>,
    cache: RefCell<AHashMap<CacheKey, Option<Rc<dyn MemberInfo>>>>,
    misses: Cell<u64>,
}

impl MemberRegistry {
    /// Create a registry that knows only the built-in objects.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `member` for type `ty`.
    pub fn register(&self, ty: TypeKey, member: Rc<dyn MemberInfo>) {
        let name: Rc<str> = Rc::from(member.name());
        self.members
            .borrow_mut()
            .entry((ty.id(), name))
            .or_default()
            .push(member);
        self.cache.borrow_mut().clear();
    }

    /// Register `member` for the object type `T`.
    pub fn register_for<T: Object>(&self, member: Rc<dyn MemberInfo>) {
        self.register(TypeKey::of::<T>(), member);
    }

    /// Register an indexer factory for `T`. The factory receives the raw
    /// segment and its parsed arguments.
    pub fn register_indexer<T: Object>(
        &self,
        factory: impl Fn(&str, &[Value]) -> Option<Rc<dyn MemberInfo>> + 'static,
    ) {
        self.indexers
            .borrow_mut()
            .insert(TypeId::of::<T>(), Rc::new(factory));
        self.cache.borrow_mut().clear();
    }

    /// Number of cached resolutions (hits and misses).
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Number of lookups that had to resolve from scratch.
    #[must_use]
    pub fn resolve_count(&self) -> u64 {
        self.misses.get()
    }

    fn resolve(&self, ty: TypeKey, name: &str, kinds: MemberKinds) -> Option<Rc<dyn MemberInfo>> {
        let registered = self
            .members
            .borrow()
            .get(&(ty.id(), Rc::from(name)))
            .and_then(|list| {
                list.iter()
                    .find(|m| kinds.contains(m.kind().as_kinds()))
                    .cloned()
            });
        if registered.is_some() {
            return registered;
        }

        if kinds.contains(MemberKinds::ACCESSOR) && is_indexer(name) {
            let factory = self.indexers.borrow().get(&ty.id()).cloned();
            if let Some(factory) = factory {
                let args = indexer_args(name).unwrap_or_default();
                if let Some(member) = factory(name, &args) {
                    return Some(member);
                }
            }
        }

        builtin_member(ty, name, kinds)
    }
}

fn builtin_member(ty: TypeKey, name: &str, kinds: MemberKinds) -> Option<Rc<dyn MemberInfo>> {
    if ty.id() == TypeId::of::<PropertyBag>() {
        if kinds.contains(MemberKinds::EVENT) && name == PROPERTY_CHANGED_EVENT {
            return Some(bag_changed_event());
        }
        if kinds.contains(MemberKinds::ACCESSOR) && !is_indexer(name) {
            return Some(bag_property(name));
        }
        return None;
    }

    if ty.id() == TypeId::of::<ObservableList>() {
        if kinds.contains(MemberKinds::EVENT) && name == COLLECTION_CHANGED_EVENT {
            return Some(list_changed_event());
        }
        if !kinds.contains(MemberKinds::ACCESSOR) {
            return None;
        }
        if name == COUNT_MEMBER {
            return Some(list_count());
        }
        let index = indexer_args(name)
            .filter(|args| args.len() == 1)
            .and_then(|args| args[0].as_int())
            .and_then(|i| usize::try_from(i).ok())?;
        return Some(list_indexer(name, index));
    }

    None
}

impl MemberProvider for MemberRegistry {
    fn try_get_member(&self, ty: TypeKey, name: &str, kinds: MemberKinds) -> Option<Rc<dyn MemberInfo>> {
        let key: CacheKey = (ty.id(), Box::from(name), kinds.bits());
        if let Some(hit) = self.cache.borrow().get(&key) {
            return hit.clone();
        }
        self.misses.set(self.misses.get() + 1);
        let resolved = self.resolve(ty, name, kinds);

        #[cfg(feature = "tracing")]
        if resolved.is_none() {
            tracing::trace!(type_name = ty.name(), member = name, "member not resolved");
        }

        self.cache.borrow_mut().insert(key, resolved.clone());
        resolved
    }
}

impl fmt::Debug for MemberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberRegistry")
            .field("registered", &self.members.borrow().len())
            .field("indexers", &self.indexers.borrow().len())
            .field("cached", &self.cache_len())
            .finish()
    }
}
