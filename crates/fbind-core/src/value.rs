#![forbid(unsafe_code)]

//! Dynamic values flowing through member paths and bindings.
//!
//! A binding does not know the static types of the graph it walks, so every
//! read and write goes through [`Value`]. Primitives are stored inline;
//! anything with members is an [`Object`] behind an `Rc`.
//!
//! # Invariants
//!
//! 1. `Value` equality is *identity* for objects (`Rc::ptr_eq`) and value
//!    equality for primitives. Path re-resolution relies on this: replacing
//!    an intermediate object with a structurally equal but distinct object
//!    is a change.
//! 2. A [`RootRef::Weak`] never extends the lifetime of its referent; once the
//!    referent is dropped the root reads as [`Value::Null`].

use std::any::{Any, TypeId};
use std::fmt;
use std::rc::{Rc, Weak};

/// Blanket helper that gives every object an `Any` view.
pub trait AsAny: Any {
    /// Borrow as `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
    /// Convert a shared handle into `Rc<dyn Any>` for owned downcasting.
    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// An object that can sit in a member path.
///
/// Member lookup is keyed by the concrete type, so implementors usually need
/// nothing beyond `impl Object for MyType {}`.
pub trait Object: AsAny {
    /// Human-readable type name used in errors and logs.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Identity of a runtime type, used as the member-resolution cache key.
///
/// Equality and hashing use the `TypeId` only; the name is diagnostic.
#[derive(Clone, Copy, Debug)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl std::hash::Hash for TypeKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl TypeKey {
    /// Key for a static type.
    #[must_use]
    pub fn of<T: Any + ?Sized>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Key for a live object.
    #[must_use]
    pub fn of_object(object: &dyn Object) -> Self {
        Self {
            id: object.as_any().type_id(),
            name: object.type_name(),
        }
    }

    /// Underlying `TypeId`.
    #[must_use]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Type name for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    /// Absence of a value. Path walks stop here without error.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Immutable shared string.
    Str(Rc<str>),
    /// Reference to an object with members.
    Object(Rc<dyn Object>),
}

impl Value {
    /// Wrap an object.
    pub fn object<T: Object>(object: T) -> Self {
        Self::Object(Rc::new(object))
    }

    /// Wrap an already shared object.
    pub fn from_rc<T: Object>(object: Rc<T>) -> Self {
        Self::Object(object)
    }

    /// Whether this is [`Value::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Boolean payload, if any.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer payload, if any.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Float payload, if any.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// String payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Object payload, if any.
    #[must_use]
    pub fn as_object(&self) -> Option<&Rc<dyn Object>> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Borrow the object payload as a concrete type.
    #[must_use]
    pub fn downcast_ref<T: Object>(&self) -> Option<&T> {
        // Go through `&dyn Object`: `Rc<dyn Object>` is itself `Any`.
        let object: &dyn Object = self.as_object()?.as_ref();
        object.as_any().downcast_ref::<T>()
    }

    /// Clone the object payload as a concrete shared handle.
    #[must_use]
    pub fn downcast_rc<T: Object>(&self) -> Option<Rc<T>> {
        let object = Rc::clone(self.as_object()?);
        object.into_any_rc().downcast::<T>().ok()
    }

    /// Runtime type key, `None` for null.
    #[must_use]
    pub fn type_key(&self) -> Option<TypeKey> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(TypeKey::of::<bool>()),
            Self::Int(_) => Some(TypeKey::of::<i64>()),
            Self::Float(_) => Some(TypeKey::of::<f64>()),
            Self::Str(_) => Some(TypeKey::of::<str>()),
            Self::Object(o) => Some(TypeKey::of_object(o.as_ref())),
        }
    }

    /// Coarse classification of this value.
    #[must_use]
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Null => ValueType::Any,
            Self::Bool(_) => ValueType::Bool,
            Self::Int(_) => ValueType::Int,
            Self::Float(_) => ValueType::Float,
            Self::Str(_) => ValueType::Str,
            Self::Object(_) => ValueType::Object,
        }
    }

    /// Short label used in conversion errors.
    #[must_use]
    pub fn type_label(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::Object(o) => o.type_name(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(b) => write!(f, "Bool({b})"),
            Self::Int(i) => write!(f, "Int({i})"),
            Self::Float(v) => write!(f, "Float({v})"),
            Self::Str(s) => write!(f, "Str({s:?})"),
            Self::Object(o) => write!(f, "Object({}@{:p})", o.type_name(), Rc::as_ptr(o)),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(Rc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(Rc::from(v))
    }
}

impl From<Rc<str>> for Value {
    fn from(v: Rc<str>) -> Self {
        Self::Str(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Declared type of a member's value, used to decide whether a conversion
/// is needed before a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueType {
    /// Accepts every value.
    #[default]
    Any,
    /// Booleans only.
    Bool,
    /// Integers only.
    Int,
    /// Floats only.
    Float,
    /// Strings only.
    Str,
    /// Objects only.
    Object,
}

impl ValueType {
    /// Whether `value` can be written without conversion. Null is accepted
    /// by every type.
    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        self == Self::Any || value.is_null() || value.value_type() == self
    }

    /// Short label used in conversion errors.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
            Self::Object => "object",
        }
    }
}

/// Strong or weak handle to an observer root.
#[derive(Clone)]
pub enum RootRef {
    /// Keeps the root alive.
    Strong(Value),
    /// Observes the root without owning it.
    Weak(Weak<dyn Object>),
}

impl RootRef {
    /// Hold `value` strongly.
    #[must_use]
    pub fn strong(value: Value) -> Self {
        Self::Strong(value)
    }

    /// Hold `value` weakly. Primitives have no identity to share and are
    /// stored by value.
    #[must_use]
    pub fn weak(value: &Value) -> Self {
        match value {
            Value::Object(o) => Self::Weak(Rc::downgrade(o)),
            other => Self::Strong(other.clone()),
        }
    }

    /// Current root value; a dead weak root reads as null.
    #[must_use]
    pub fn get(&self) -> Value {
        match self {
            Self::Strong(v) => v.clone(),
            Self::Weak(w) => w.upgrade().map_or(Value::Null, Value::Object),
        }
    }

    /// Whether the referent still exists.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        match self {
            Self::Strong(_) => true,
            Self::Weak(w) => w.strong_count() > 0,
        }
    }

    /// Whether this is a weak handle.
    #[must_use]
    pub fn is_weak(&self) -> bool {
        matches!(self, Self::Weak(_))
    }
}

impl fmt::Debug for RootRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RootRef")
            .field("weak", &self.is_weak())
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Probe;
    impl Object for Probe {}

    #[test]
    fn object_equality_is_identity() {
        let a = Value::object(Probe);
        let b = Value::object(Probe);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn primitive_equality_is_structural() {
        assert_eq!(Value::from("x"), Value::from(String::from("x")));
        assert_eq!(Value::from(3), Value::Int(3));
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }

    #[test]
    fn downcast_round_trips() {
        let v = Value::object(Probe);
        assert!(v.downcast_ref::<Probe>().is_some());
        assert!(v.downcast_rc::<Probe>().is_some());
        assert!(Value::Int(1).downcast_ref::<Probe>().is_none());
    }

    #[test]
    fn type_key_distinguishes_types() {
        let probe = Value::object(Probe);
        assert_eq!(probe.type_key(), Some(TypeKey::of::<Probe>()));
        assert_eq!(Value::Int(1).type_key(), Some(TypeKey::of::<i64>()));
        assert_eq!(Value::Null.type_key(), None);
    }

    #[test]
    fn weak_root_does_not_keep_alive() {
        let v = Value::object(Probe);
        let root = RootRef::weak(&v);
        assert!(root.is_alive());
        assert_eq!(root.get(), v);
        drop(v);
        assert!(!root.is_alive());
        assert!(root.get().is_null());
    }

    #[test]
    fn weak_root_of_primitive_is_strong() {
        let root = RootRef::weak(&Value::Int(7));
        assert!(!root.is_weak());
        assert_eq!(root.get(), Value::Int(7));
    }

    #[test]
    fn value_type_accepts_null() {
        assert!(ValueType::Int.accepts(&Value::Null));
        assert!(ValueType::Int.accepts(&Value::Int(1)));
        assert!(!ValueType::Int.accepts(&Value::from("1")));
        assert!(ValueType::Any.accepts(&Value::from("1")));
    }
}
