#![forbid(unsafe_code)]

//! Member accessors: the capability interface every path segment resolves to.
//!
//! A member is resolved once per `(type, name)` and then shared. Three kinds
//! exist behind the single [`MemberInfo`] trait:
//!
//! | Kind | Typical flags | Used for |
//! |------|---------------|----------|
//! | [`MemberKind::Accessor`] | `READ`, `WRITE`, `OBSERVE` | properties, fields, indexers |
//! | [`MemberKind::Method`] | none | invocable members |
//! | [`MemberKind::Event`] | `OBSERVE` | coarse "something changed" signals |
//!
//! Capabilities are explicit flags; calling an operation the member does not
//! support returns an error instead of panicking.

use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;

use crate::error::{BindResult, BindingError};
use crate::event::{ActionToken, EventListener};
use crate::value::{Object, Value, ValueType};

bitflags! {
    /// Capabilities of a resolved member.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MemberFlags: u8 {
        /// Value can be read.
        const READ = 1 << 0;
        /// Value can be written.
        const WRITE = 1 << 1;
        /// Changes can be observed.
        const OBSERVE = 1 << 2;
        /// Member is an indexer bound to fixed arguments.
        const INDEXER = 1 << 3;
    }
}

bitflags! {
    /// Member kinds accepted by a lookup.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MemberKinds: u8 {
        /// Properties, fields, indexers.
        const ACCESSOR = 1 << 0;
        /// Invocable members.
        const METHOD = 1 << 1;
        /// Events.
        const EVENT = 1 << 2;
    }
}

/// Kind of a resolved member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    /// Readable and/or writable value.
    Accessor,
    /// Invocable member.
    Method,
    /// Observable signal without a value.
    Event,
}

impl MemberKind {
    /// The lookup filter matching this kind.
    #[must_use]
    pub fn as_kinds(self) -> MemberKinds {
        match self {
            Self::Accessor => MemberKinds::ACCESSOR,
            Self::Method => MemberKinds::METHOD,
            Self::Event => MemberKinds::EVENT,
        }
    }
}

/// A resolved member of some type.
pub trait MemberInfo {
    /// Member name as it appears in a path.
    fn name(&self) -> &str;

    /// Member kind.
    fn kind(&self) -> MemberKind;

    /// Capability flags.
    fn flags(&self) -> MemberFlags;

    /// Declared value type. Writes of other types go through conversion.
    fn value_type(&self) -> ValueType {
        ValueType::Any
    }

    /// Whether [`MemberInfo::get_value`] is supported.
    fn can_read(&self) -> bool {
        self.flags().contains(MemberFlags::READ)
    }

    /// Whether [`MemberInfo::set_value`] is supported.
    fn can_write(&self) -> bool {
        self.flags().contains(MemberFlags::WRITE)
    }

    /// Whether [`MemberInfo::try_observe`] can succeed.
    fn can_observe(&self) -> bool {
        self.flags().contains(MemberFlags::OBSERVE)
    }

    /// Read the member from `target`.
    fn get_value(&self, _target: &Value) -> BindResult<Value> {
        Err(BindingError::NotReadable {
            member: self.name().to_owned(),
        })
    }

    /// Write `value` to the member on `target`.
    fn set_value(&self, _target: &Value, _value: Value) -> BindResult<()> {
        Err(BindingError::NotWritable {
            member: self.name().to_owned(),
        })
    }

    /// Invoke a method member.
    fn invoke(&self, _target: &Value, _args: &[Value]) -> BindResult<Value> {
        Err(BindingError::NotInvocable {
            member: self.name().to_owned(),
        })
    }

    /// Subscribe `listener` to changes of this member on `target`.
    ///
    /// Returns `None` when the member or the target cannot notify.
    fn try_observe(&self, _target: &Value, _listener: Rc<dyn EventListener>) -> Option<ActionToken> {
        None
    }
}

impl fmt::Debug for dyn MemberInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberInfo")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .field("flags", &self.flags())
            .finish()
    }
}

type Getter = Rc<dyn Fn(&Value) -> BindResult<Value>>;
type Setter = Rc<dyn Fn(&Value, Value) -> BindResult<()>>;
type Subscriber = Rc<dyn Fn(&Value, Rc<dyn EventListener>) -> Option<ActionToken>>;
type Invoker = Rc<dyn Fn(&Value, &[Value]) -> BindResult<Value>>;

fn wrong_target<T: Object>(member: &str) -> BindingError {
    BindingError::access(
        member,
        format!("target is not {}", std::any::type_name::<T>()),
    )
}

/// Accessor built from closures.
///
/// # Example
///
/// ```
/// use fbind_core::member::{AccessorMember, MemberInfo};
/// use fbind_core::value::{Object, Value};
/// use std::cell::Cell;
///
/// struct Counter { hits: Cell<i64> }
/// impl Object for Counter {}
///
/// let member = AccessorMember::new("Hits")
///     .getter_for::<Counter>(|c| Value::Int(c.hits.get()))
///     .setter_for::<Counter>(|c, v| {
///         c.hits.set(v.as_int().unwrap_or_default());
///         Ok(())
///     });
/// let target = Value::object(Counter { hits: Cell::new(1) });
/// member.set_value(&target, Value::Int(5)).unwrap();
/// assert_eq!(member.get_value(&target).unwrap(), Value::Int(5));
/// ```
#[derive(Clone)]
pub struct AccessorMember {
    name: Rc<str>,
    value_type: ValueType,
    extra_flags: MemberFlags,
    getter: Option<Getter>,
    setter: Option<Setter>,
    subscriber: Option<Subscriber>,
}

impl AccessorMember {
    /// Member with no capabilities yet.
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Self {
            name: name.into(),
            value_type: ValueType::Any,
            extra_flags: MemberFlags::empty(),
            getter: None,
            setter: None,
            subscriber: None,
        }
    }

    /// Declare the value type.
    #[must_use]
    pub fn value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    /// Mark as an indexer.
    #[must_use]
    pub fn indexer(mut self) -> Self {
        self.extra_flags |= MemberFlags::INDEXER;
        self
    }

    /// Read through `getter`.
    #[must_use]
    pub fn getter(mut self, getter: impl Fn(&Value) -> BindResult<Value> + 'static) -> Self {
        self.getter = Some(Rc::new(getter));
        self
    }

    /// Read through a typed getter; other targets fail with an access error.
    #[must_use]
    pub fn getter_for<T: Object>(self, getter: impl Fn(&T) -> Value + 'static) -> Self {
        let name = Rc::clone(&self.name);
        self.getter(move |target| {
            target
                .downcast_ref::<T>()
                .map(&getter)
                .ok_or_else(|| wrong_target::<T>(&name))
        })
    }

    /// Write through `setter`.
    #[must_use]
    pub fn setter(mut self, setter: impl Fn(&Value, Value) -> BindResult<()> + 'static) -> Self {
        self.setter = Some(Rc::new(setter));
        self
    }

    /// Write through a typed setter; other targets fail with an access error.
    #[must_use]
    pub fn setter_for<T: Object>(
        self,
        setter: impl Fn(&T, Value) -> BindResult<()> + 'static,
    ) -> Self {
        let name = Rc::clone(&self.name);
        self.setter(move |target, value| match target.downcast_ref::<T>() {
            Some(t) => setter(t, value),
            None => Err(wrong_target::<T>(&name)),
        })
    }

    /// Observe through `subscriber`.
    #[must_use]
    pub fn observer(
        mut self,
        subscriber: impl Fn(&Value, Rc<dyn EventListener>) -> Option<ActionToken> + 'static,
    ) -> Self {
        self.subscriber = Some(Rc::new(subscriber));
        self
    }

    /// Finish into a shared member.
    #[must_use]
    pub fn build(self) -> Rc<dyn MemberInfo> {
        Rc::new(self)
    }
}

impl MemberInfo for AccessorMember {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> MemberKind {
        MemberKind::Accessor
    }

    fn flags(&self) -> MemberFlags {
        let mut flags = self.extra_flags;
        flags.set(MemberFlags::READ, self.getter.is_some());
        flags.set(MemberFlags::WRITE, self.setter.is_some());
        flags.set(MemberFlags::OBSERVE, self.subscriber.is_some());
        flags
    }

    fn value_type(&self) -> ValueType {
        self.value_type
    }

    fn get_value(&self, target: &Value) -> BindResult<Value> {
        match &self.getter {
            Some(getter) => getter(target),
            None => Err(BindingError::NotReadable {
                member: self.name.to_string(),
            }),
        }
    }

    fn set_value(&self, target: &Value, value: Value) -> BindResult<()> {
        match &self.setter {
            Some(setter) => setter(target, value),
            None => Err(BindingError::NotWritable {
                member: self.name.to_string(),
            }),
        }
    }

    fn try_observe(&self, target: &Value, listener: Rc<dyn EventListener>) -> Option<ActionToken> {
        self.subscriber.as_ref().and_then(|s| s(target, listener))
    }
}

/// Invocable member built from a closure.
#[derive(Clone)]
pub struct MethodMember {
    name: Rc<str>,
    invoker: Invoker,
}

impl MethodMember {
    /// Method named `name` executing `invoker`.
    pub fn new(
        name: impl Into<Rc<str>>,
        invoker: impl Fn(&Value, &[Value]) -> BindResult<Value> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            invoker: Rc::new(invoker),
        }
    }
}

impl MemberInfo for MethodMember {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> MemberKind {
        MemberKind::Method
    }

    fn flags(&self) -> MemberFlags {
        MemberFlags::empty()
    }

    fn invoke(&self, target: &Value, args: &[Value]) -> BindResult<Value> {
        (self.invoker)(target, args)
    }
}

/// Event member built from a subscribe closure.
#[derive(Clone)]
pub struct EventMember {
    name: Rc<str>,
    subscriber: Subscriber,
}

impl EventMember {
    /// Event named `name` subscribing through `subscriber`.
    pub fn new(
        name: impl Into<Rc<str>>,
        subscriber: impl Fn(&Value, Rc<dyn EventListener>) -> Option<ActionToken> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            subscriber: Rc::new(subscriber),
        }
    }
}

impl MemberInfo for EventMember {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> MemberKind {
        MemberKind::Event
    }

    fn flags(&self) -> MemberFlags {
        MemberFlags::OBSERVE
    }

    fn try_observe(&self, target: &Value, listener: Rc<dyn EventListener>) -> Option<ActionToken> {
        (self.subscriber)(target, listener)
    }
}

/// Read-only accessor that yields its target; the last member of an empty path.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelfMember;

impl MemberInfo for SelfMember {
    fn name(&self) -> &str {
        ""
    }

    fn kind(&self) -> MemberKind {
        MemberKind::Accessor
    }

    fn flags(&self) -> MemberFlags {
        MemberFlags::READ
    }

    fn get_value(&self, target: &Value) -> BindResult<Value> {
        Ok(target.clone())
    }
}
