#![forbid(unsafe_code)]

//! Built-in observable objects.
//!
//! [`PropertyBag`] is a dynamic object with named properties and
//! property-changed notifications; [`ObservableList`] is an indexable
//! collection with a coarse change signal. The default member registry
//! understands both without any registration, which makes them the plain
//! "observable object" of this crate: view models, fixtures, and tests build
//! their graphs out of them.
//!
//! # Notifications
//!
//! | Object | Mutation | Message |
//! |--------|----------|---------|
//! | `PropertyBag` | `set(name, v)` with `v != old` | `Message::Member(name)` |
//! | `PropertyBag` | `raise_all_changed()` | `Message::Member("")` |
//! | `ObservableList` | any change | `Message::Empty` |
//!
//! Setting a property to a value equal to the current one (identity for
//! objects) raises nothing.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;

use crate::error::{BindResult, BindingError};
use crate::event::{ActionToken, EventListener, EventListenerCollection, Message};
use crate::member::{AccessorMember, EventMember, MemberInfo};
use crate::value::{Object, Value};

/// Name of the bag-wide change event.
pub const PROPERTY_CHANGED_EVENT: &str = "PropertyChanged";
/// Name of the list-wide change event.
pub const COLLECTION_CHANGED_EVENT: &str = "Changed";
/// Name of the list length member.
pub const COUNT_MEMBER: &str = "Count";

/// Forwards only the messages that concern one member.
struct MemberFilter {
    member: Rc<str>,
    inner: Rc<dyn EventListener>,
}

impl EventListener for MemberFilter {
    fn is_alive(&self) -> bool {
        self.inner.is_alive()
    }

    fn is_weak(&self) -> bool {
        self.inner.is_weak()
    }

    fn try_handle(&self, sender: &Value, message: &Message) -> bool {
        if message.affects(&self.member) {
            self.inner.try_handle(sender, message)
        } else {
            true
        }
    }
}

/// Dynamic object with observable named properties.
///
/// # Example
///
/// ```
/// use fbind_core::object::PropertyBag;
/// use fbind_core::value::Value;
///
/// let person = PropertyBag::from_pairs([("Name", Value::from("Ann"))]);
/// assert_eq!(person.get("Name"), Some(Value::from("Ann")));
/// assert!(person.set("Name", "Bea"));
/// assert!(!person.set("Name", "Bea"));
/// ```
pub struct PropertyBag {
    self_ref: Weak<PropertyBag>,
    values: RefCell<AHashMap<Rc<str>, Value>>,
    changed: EventListenerCollection,
}

impl Object for PropertyBag {
    fn type_name(&self) -> &'static str {
        "PropertyBag"
    }
}

impl PropertyBag {
    /// Create an empty bag.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            self_ref: Weak::clone(self_ref),
            values: RefCell::new(AHashMap::new()),
            changed: EventListenerCollection::new(),
        })
    }

    /// Create a bag pre-filled with `pairs` (no notifications).
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Rc<Self>
    where
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        let bag = Self::new();
        {
            let mut values = bag.values.borrow_mut();
            for (k, v) in pairs {
                values.insert(k.into(), v.into());
            }
        }
        bag
    }

    /// This bag as a [`Value`].
    #[must_use]
    pub fn to_value(&self) -> Value {
        self.self_ref
            .upgrade()
            .map_or(Value::Null, |rc| Value::Object(rc))
    }

    /// Current value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.borrow().get(name).cloned()
    }

    /// Whether `name` has been set.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.borrow().contains_key(name)
    }

    /// Set `name` and notify observers. Returns `false` if the value was
    /// already equal and nothing was raised.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        let (key, previous) = {
            let mut values = self.values.borrow_mut();
            if values.get(name) == Some(&value) {
                return false;
            }
            let key: Rc<str> = Rc::from(name);
            let previous = values.insert(Rc::clone(&key), value);
            (key, previous)
        };
        // The old value may own observers; drop it outside the borrow.
        drop(previous);
        self.changed.raise(&self.to_value(), &Message::Member(key));
        true
    }

    /// Remove `name`, notifying observers if it existed.
    pub fn remove(&self, name: &str) -> Option<Value> {
        let removed = self.values.borrow_mut().remove(name);
        if removed.is_some() {
            self.changed.raise(&self.to_value(), &Message::member(name));
        }
        removed
    }

    /// Notify that every property may have changed.
    pub fn raise_all_changed(&self) {
        self.changed.raise(&self.to_value(), &Message::member(""));
    }

    /// Observe every property change.
    pub fn observe(&self, listener: Rc<dyn EventListener>) -> ActionToken {
        self.changed.add(listener)
    }

    /// Observe changes of one property.
    pub fn observe_member(&self, name: &str, listener: Rc<dyn EventListener>) -> ActionToken {
        self.changed.add(Rc::new(MemberFilter {
            member: Rc::from(name),
            inner: listener,
        }))
    }

    /// Number of registered change listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.changed.len()
    }

    /// Sorted property names.
    #[must_use]
    pub fn keys(&self) -> Vec<Rc<str>> {
        let mut keys: Vec<Rc<str>> = self.values.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl fmt::Debug for PropertyBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyBag")
            .field("keys", &self.keys())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Accessor for a named property of any [`PropertyBag`].
pub(crate) fn bag_property(name: &str) -> Rc<dyn MemberInfo> {
    let key: Rc<str> = Rc::from(name);
    let get_key = Rc::clone(&key);
    let set_key = Rc::clone(&key);
    let observe_key = Rc::clone(&key);
    AccessorMember::new(key)
        .getter_for::<PropertyBag>(move |bag| bag.get(&get_key).unwrap_or(Value::Null))
        .setter_for::<PropertyBag>(move |bag, value| {
            bag.set(&set_key, value);
            Ok(())
        })
        .observer(move |target, listener| {
            target
                .downcast_ref::<PropertyBag>()
                .map(|bag| bag.observe_member(&observe_key, listener))
        })
        .build()
}

/// Bag-wide change event.
pub(crate) fn bag_changed_event() -> Rc<dyn MemberInfo> {
    Rc::new(EventMember::new(PROPERTY_CHANGED_EVENT, |target, listener| {
        target
            .downcast_ref::<PropertyBag>()
            .map(|bag| bag.observe(listener))
    }))
}

/// Indexable collection with a coarse change notification.
pub struct ObservableList {
    self_ref: Weak<ObservableList>,
    items: RefCell<Vec<Value>>,
    changed: EventListenerCollection,
}

impl Object for ObservableList {
    fn type_name(&self) -> &'static str {
        "ObservableList"
    }
}

impl ObservableList {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Self::from_vec(Vec::new())
    }

    /// Create a list holding `items`.
    #[must_use]
    pub fn from_vec(items: Vec<Value>) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            self_ref: Weak::clone(self_ref),
            items: RefCell::new(items),
            changed: EventListenerCollection::new(),
        })
    }

    /// This list as a [`Value`].
    #[must_use]
    pub fn to_value(&self) -> Value {
        self.self_ref
            .upgrade()
            .map_or(Value::Null, |rc| Value::Object(rc))
    }

    /// Number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Item at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.items.borrow().get(index).cloned()
    }

    /// Replace the item at `index`.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> BindResult<()> {
        let value = value.into();
        let previous = {
            let mut items = self.items.borrow_mut();
            let len = items.len();
            let slot = items.get_mut(index).ok_or_else(|| {
                BindingError::access(format!("[{index}]"), format!("index out of range (len {len})"))
            })?;
            if *slot == value {
                return Ok(());
            }
            std::mem::replace(slot, value)
        };
        drop(previous);
        self.notify();
        Ok(())
    }

    /// Append an item.
    pub fn push(&self, value: impl Into<Value>) {
        self.items.borrow_mut().push(value.into());
        self.notify();
    }

    /// Remove the item at `index`.
    pub fn remove(&self, index: usize) -> Option<Value> {
        let removed = {
            let mut items = self.items.borrow_mut();
            (index < items.len()).then(|| items.remove(index))
        };
        if removed.is_some() {
            self.notify();
        }
        removed
    }

    /// Remove every item.
    pub fn clear(&self) {
        let removed = std::mem::take(&mut *self.items.borrow_mut());
        if !removed.is_empty() {
            drop(removed);
            self.notify();
        }
    }

    /// Observe every change.
    pub fn observe(&self, listener: Rc<dyn EventListener>) -> ActionToken {
        self.changed.add(listener)
    }

    /// Number of registered change listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.changed.len()
    }

    fn notify(&self) {
        self.changed.raise(&self.to_value(), &Message::Empty);
    }
}

impl fmt::Debug for ObservableList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableList")
            .field("len", &self.len())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

fn observe_list(target: &Value, listener: Rc<dyn EventListener>) -> Option<ActionToken> {
    target
        .downcast_ref::<ObservableList>()
        .map(|list| list.observe(listener))
}

/// `Count` accessor of any [`ObservableList`].
pub(crate) fn list_count() -> Rc<dyn MemberInfo> {
    AccessorMember::new(COUNT_MEMBER)
        .value_type(crate::value::ValueType::Int)
        .getter_for::<ObservableList>(|list| {
            Value::Int(i64::try_from(list.len()).unwrap_or(i64::MAX))
        })
        .observer(observe_list)
        .build()
}

/// List-wide change event.
pub(crate) fn list_changed_event() -> Rc<dyn MemberInfo> {
    Rc::new(EventMember::new(COLLECTION_CHANGED_EVENT, observe_list))
}

/// Indexer accessor bound to `[index]`.
pub(crate) fn list_indexer(segment: &str, index: usize) -> Rc<dyn MemberInfo> {
    AccessorMember::new(segment)
        .indexer()
        .getter_for::<ObservableList>(move |list| list.get(index).unwrap_or(Value::Null))
        .setter_for::<ObservableList>(move |list, value| list.set(index, value))
        .observer(observe_list)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::FnEventListener;
    use std::cell::Cell;

    fn counter() -> (Rc<Cell<u32>>, Rc<dyn EventListener>) {
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        (hits, FnEventListener::shared(move |_, _| h.set(h.get() + 1)))
    }

    #[test]
    fn bag_set_notifies_once_per_change() {
        let bag = PropertyBag::new();
        let (hits, listener) = counter();
        let _token = bag.observe(listener);
        assert!(bag.set("A", 1));
        assert!(!bag.set("A", 1));
        assert!(bag.set("A", 2));
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn bag_member_filter() {
        let bag = PropertyBag::new();
        let (hits, listener) = counter();
        let _token = bag.observe_member("Name", listener);
        bag.set("Age", 3);
        assert_eq!(hits.get(), 0);
        bag.set("Name", "Ann");
        assert_eq!(hits.get(), 1);
        bag.raise_all_changed();
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn bag_sender_is_self() {
        let bag = PropertyBag::new();
        let seen = Rc::new(RefCell::new(Value::Null));
        let s = Rc::clone(&seen);
        let _token = bag.observe(FnEventListener::shared(move |sender, _| {
            *s.borrow_mut() = sender.clone();
        }));
        bag.set("X", true);
        assert_eq!(*seen.borrow(), bag.to_value());
    }

    #[test]
    fn bag_property_member_round_trip() {
        let bag = PropertyBag::from_pairs([("Name", "Ann")]);
        let member = bag_property("Name");
        let target = bag.to_value();
        assert_eq!(member.get_value(&target).unwrap(), Value::from("Ann"));
        member.set_value(&target, Value::from("Bea")).unwrap();
        assert_eq!(bag.get("Name"), Some(Value::from("Bea")));
        assert_eq!(bag_property("Missing").get_value(&target).unwrap(), Value::Null);
    }

    #[test]
    fn bag_remove_notifies() {
        let bag = PropertyBag::from_pairs([("A", 1)]);
        let (hits, listener) = counter();
        let _token = bag.observe(listener);
        assert_eq!(bag.remove("A"), Some(Value::Int(1)));
        assert_eq!(bag.remove("A"), None);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn list_mutations_notify() {
        let list = ObservableList::new();
        let (hits, listener) = counter();
        let _token = list.observe(listener);
        list.push(1);
        list.push(2);
        list.set(0, 10).unwrap();
        list.set(0, 10).unwrap();
        assert_eq!(list.remove(1), Some(Value::Int(2)));
        assert_eq!(list.remove(5), None);
        list.clear();
        list.clear();
        assert_eq!(hits.get(), 5);
        assert!(list.set(3, 1).is_err());
    }

    #[test]
    fn list_members() {
        let list = ObservableList::from_vec(vec![Value::from("a"), Value::from("b")]);
        let target = list.to_value();
        assert_eq!(list_count().get_value(&target).unwrap(), Value::Int(2));
        let idx = list_indexer("[1]", 1);
        assert_eq!(idx.get_value(&target).unwrap(), Value::from("b"));
        idx.set_value(&target, Value::from("c")).unwrap();
        assert_eq!(list.get(1), Some(Value::from("c")));
        assert_eq!(list_indexer("[9]", 9).get_value(&target).unwrap(), Value::Null);
    }
}
