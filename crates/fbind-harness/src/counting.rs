#![forbid(unsafe_code)]

//! Observable objects that count what the engine does to them.
//!
//! A [`CountingNode`] behaves like a property bag, but every member access
//! made through [`CountingProvider`] is tallied on a shared [`Probe`]:
//! subscriptions opened, subscriptions released, reads, and writes. Direct
//! calls to [`CountingNode::set`] are test mutations and are not counted as
//! writes.
//!
//! ```
//! use fbind_harness::counting::{CountingNode, Probe};
//!
//! let probe = Probe::new();
//! let node = CountingNode::with(&probe, [("Name", "Ann")]);
//! node.set("Name", "Bea");
//! assert_eq!(probe.counts().writes, 0);
//! ```

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use fbind_core::{
    AccessorMember, ActionToken, EventListener, EventListenerCollection, MemberInfo, MemberKinds,
    MemberProvider, MemberRegistry, Message, Object, TypeKey, Value,
};

/// Snapshot of a [`Probe`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeCounts {
    /// Subscriptions opened through a member.
    pub subscribes: u64,
    /// Subscriptions released.
    pub unsubscribes: u64,
    /// Member reads.
    pub reads: u64,
    /// Member writes that reached the node.
    pub writes: u64,
}

impl ProbeCounts {
    /// Subscriptions currently open.
    #[must_use]
    pub fn live(&self) -> u64 {
        self.subscribes.saturating_sub(self.unsubscribes)
    }
}

/// Shared tally for a group of nodes.
#[derive(Default)]
pub struct Probe {
    subscribes: Cell<u64>,
    unsubscribes: Cell<u64>,
    reads: Cell<u64>,
    writes: Cell<u64>,
}

impl Probe {
    /// New zeroed probe.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Current counts.
    #[must_use]
    pub fn counts(&self) -> ProbeCounts {
        ProbeCounts {
            subscribes: self.subscribes.get(),
            unsubscribes: self.unsubscribes.get(),
            reads: self.reads.get(),
            writes: self.writes.get(),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.subscribes.set(0);
        self.unsubscribes.set(0);
        self.reads.set(0);
        self.writes.set(0);
    }

    fn bump(cell: &Cell<u64>) {
        cell.set(cell.get() + 1);
    }
}

impl fmt::Debug for Probe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.counts(), f)
    }
}

/// Bag-like object whose member traffic is counted.
pub struct CountingNode {
    self_ref: Weak<CountingNode>,
    probe: Rc<Probe>,
    values: RefCell<AHashMap<Rc<str>, Value>>,
    changed: EventListenerCollection,
}

impl Object for CountingNode {
    fn type_name(&self) -> &'static str {
        "CountingNode"
    }
}

impl CountingNode {
    /// Empty node reporting to `probe`.
    #[must_use]
    pub fn new(probe: &Rc<Probe>) -> Rc<Self> {
        Rc::new_cyclic(|self_ref| Self {
            self_ref: Weak::clone(self_ref),
            probe: Rc::clone(probe),
            values: RefCell::new(AHashMap::new()),
            changed: EventListenerCollection::new(),
        })
    }

    /// Node pre-filled with `pairs`.
    pub fn with<K, V>(probe: &Rc<Probe>, pairs: impl IntoIterator<Item = (K, V)>) -> Rc<Self>
    where
        K: Into<Rc<str>>,
        V: Into<Value>,
    {
        let node = Self::new(probe);
        node.values
            .borrow_mut()
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        node
    }

    /// This node as a [`Value`].
    #[must_use]
    pub fn to_value(&self) -> Value {
        self.self_ref
            .upgrade()
            .map_or(Value::Null, |rc| Value::Object(rc))
    }

    /// Current value of `name`, without counting a read.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.borrow().get(name).cloned()
    }

    /// Change `name` and notify. Equal values raise nothing.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        let previous = {
            let mut values = self.values.borrow_mut();
            if values.get(name) == Some(&value) {
                return false;
            }
            values.insert(Rc::from(name), value)
        };
        drop(previous);
        self.changed.raise(&self.to_value(), &Message::member(name));
        true
    }

    /// Open subscriptions on this node.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.changed.len()
    }

    fn subscribe(&self, name: &str, listener: Rc<dyn EventListener>) -> ActionToken {
        Probe::bump(&self.probe.subscribes);
        let inner = self.changed.add(Rc::new(NamedListener {
            member: Rc::from(name),
            inner: listener,
        }));
        let probe = Rc::clone(&self.probe);
        ActionToken::new(move || {
            Probe::bump(&probe.unsubscribes);
            inner.dispose();
        })
    }
}

impl fmt::Debug for CountingNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountingNode")
            .field("values", &self.values.borrow().len())
            .field("listeners", &self.changed.len())
            .finish()
    }
}

struct NamedListener {
    member: Rc<str>,
    inner: Rc<dyn EventListener>,
}

impl EventListener for NamedListener {
    fn is_alive(&self) -> bool {
        self.inner.is_alive()
    }

    fn is_weak(&self) -> bool {
        self.inner.is_weak()
    }

    fn try_handle(&self, sender: &Value, message: &Message) -> bool {
        !message.affects(&self.member) || self.inner.try_handle(sender, message)
    }
}

fn counting_member(name: &str) -> Rc<dyn MemberInfo> {
    let key: Rc<str> = Rc::from(name);
    let (get_key, set_key, observe_key) = (Rc::clone(&key), Rc::clone(&key), Rc::clone(&key));
    AccessorMember::new(key)
        .getter_for::<CountingNode>(move |node| {
            Probe::bump(&node.probe.reads);
            node.get(&get_key).unwrap_or(Value::Null)
        })
        .setter_for::<CountingNode>(move |node, value| {
            Probe::bump(&node.probe.writes);
            node.set(&set_key, value);
            Ok(())
        })
        .observer(move |target, listener| {
            target
                .downcast_ref::<CountingNode>()
                .map(|node| node.subscribe(&observe_key, listener))
        })
        .build()
}

/// Provider that resolves every plain member of a [`CountingNode`] and
/// defers everything else to a [`MemberRegistry`].
#[derive(Default)]
pub struct CountingProvider {
    fallback: MemberRegistry,
}

impl CountingProvider {
    /// Provider over a fresh registry.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Registry used for non-node types.
    #[must_use]
    pub fn registry(&self) -> &MemberRegistry {
        &self.fallback
    }
}

impl MemberProvider for CountingProvider {
    fn try_get_member(&self, ty: TypeKey, name: &str, kinds: MemberKinds) -> Option<Rc<dyn MemberInfo>> {
        if ty == TypeKey::of::<CountingNode>() {
            return (kinds.contains(MemberKinds::ACCESSOR) && !name.starts_with('['))
                .then(|| counting_member(name));
        }
        self.fallback.try_get_member(ty, name, kinds)
    }
}

impl fmt::Debug for CountingProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CountingProvider")
            .field("fallback", &self.fallback)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fbind_core::FnEventListener;

    #[test]
    fn member_traffic_is_counted() {
        let probe = Probe::new();
        let node = CountingNode::with(&probe, [("Name", "Ann")]);
        let provider = CountingProvider::new();
        let member = provider
            .try_get_member_of(&node.to_value(), "Name", MemberKinds::ACCESSOR)
            .unwrap();

        assert_eq!(member.get_value(&node.to_value()).unwrap(), Value::from("Ann"));
        member.set_value(&node.to_value(), Value::from("Bea")).unwrap();
        let token = member
            .try_observe(&node.to_value(), FnEventListener::shared(|_, _| {}))
            .unwrap();
        assert_eq!(node.listener_count(), 1);
        token.dispose();

        assert_eq!(
            probe.counts(),
            ProbeCounts { subscribes: 1, unsubscribes: 1, reads: 1, writes: 1 }
        );
        assert_eq!(node.listener_count(), 0);
    }

    #[test]
    fn only_named_member_changes_are_delivered() {
        let probe = Probe::new();
        let node = CountingNode::new(&probe);
        let hits = Rc::new(Cell::new(0));
        let seen = Rc::clone(&hits);
        let _token = node.subscribe("A", FnEventListener::shared(move |_, _| seen.set(seen.get() + 1)));
        node.set("B", 1);
        node.set("A", 1);
        node.set("A", 1);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn other_types_fall_back_to_the_registry() {
        let provider = CountingProvider::new();
        let bag = fbind_core::PropertyBag::new();
        assert!(
            provider
                .try_get_member_of(&bag.to_value(), "Any", MemberKinds::ACCESSOR)
                .is_some()
        );
        let probe = Probe::new();
        let node = CountingNode::new(&probe);
        assert!(
            provider
                .try_get_member_of(&node.to_value(), "[0]", MemberKinds::ACCESSOR)
                .is_none()
        );
    }
}
