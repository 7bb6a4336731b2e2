#![forbid(unsafe_code)]

//! The live binding.
//!
//! `update_target` reads the source (aggregating multi-source values in
//! order), runs [`TargetValueInterceptor`]s, converts the result when the
//! target member's declared type does not accept it, and writes it unless
//! it equals the current target value. `update_source` mirrors this for a
//! single observed source.
//!
//! # Failure Modes
//!
//! | Situation | Reported as |
//! |-----------|-------------|
//! | Source or target path unresolved | `on_*_update_canceled` |
//! | Interceptor returns `Cancel` | `on_*_update_canceled` |
//! | Path error, read, convert, or write failure | `on_*_update_failed` |
//! | `update_source` on a multi-source or constant binding | `on_source_update_failed` (`NotWritable`) |

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use fbind_core::{BindResult, BindingError, Component, ComponentCollection, Value, ValueType};

use super::components::{
    BindingObserverListener, BindingStateListener, InterceptResult, SourceListener,
    SourceValueInterceptor, TargetListener, TargetValueInterceptor, UpdateDispatch,
    ValueFormatter,
};
use super::converter::{DefaultValueConverter, ValueConverter};
use super::{Binding, BindingState, ObserverRole};
use crate::observer::{
    MemberPathLastMember, MemberPathObserver, MemberPathObserverListener,
};

/// One input of a binding.
#[derive(Clone)]
pub enum SourceParameter {
    /// Value read through a member path observer.
    Observer(Rc<dyn MemberPathObserver>),
    /// Fixed value.
    Constant(Value),
}

impl SourceParameter {
    /// Current value; `Ok(None)` when the path is unresolved.
    pub fn read(&self) -> BindResult<Option<Value>> {
        match self {
            Self::Observer(observer) => observer.get_last_member(None).get_value(),
            Self::Constant(value) => Ok(Some(value.clone())),
        }
    }

    fn observer(&self) -> Option<&Rc<dyn MemberPathObserver>> {
        match self {
            Self::Observer(observer) => Some(observer),
            Self::Constant(_) => None,
        }
    }
}

impl fmt::Debug for SourceParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Observer(observer) => f.debug_tuple("Observer").field(&observer.path().path()).finish(),
            Self::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
        }
    }
}

/// Where a binding reads from.
#[derive(Clone)]
pub enum BindingSource {
    /// One parameter, writable back when it is an observer.
    Single(SourceParameter),
    /// Several parameters combined by a formatter. Not writable back.
    Multi {
        /// Inputs, in order.
        parameters: Rc<[SourceParameter]>,
        /// Aggregation of the inputs.
        formatter: Rc<dyn ValueFormatter>,
    },
}

impl BindingSource {
    /// Source observing `observer`.
    #[must_use]
    pub fn observer(observer: Rc<dyn MemberPathObserver>) -> Self {
        Self::Single(SourceParameter::Observer(observer))
    }

    /// Source yielding a constant.
    #[must_use]
    pub fn constant(value: impl Into<Value>) -> Self {
        Self::Single(SourceParameter::Constant(value.into()))
    }

    /// Source combining `parameters` through `formatter`.
    #[must_use]
    pub fn multi(parameters: Vec<SourceParameter>, formatter: Rc<dyn ValueFormatter>) -> Self {
        Self::Multi {
            parameters: Rc::from(parameters),
            formatter,
        }
    }

    fn parameters(&self) -> &[SourceParameter] {
        match self {
            Self::Single(parameter) => std::slice::from_ref(parameter),
            Self::Multi { parameters, .. } => parameters,
        }
    }

    fn read(&self) -> BindResult<Option<Value>> {
        match self {
            Self::Single(parameter) => parameter.read(),
            Self::Multi {
                parameters,
                formatter,
            } => {
                let mut values = Vec::with_capacity(parameters.len());
                for parameter in parameters.iter() {
                    match parameter.read()? {
                        Some(value) => values.push(value),
                        None => return Ok(None),
                    }
                }
                formatter.format(&values).map(Some)
            }
        }
    }
}

impl fmt::Debug for BindingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(parameter) => f.debug_tuple("Single").field(parameter).finish(),
            Self::Multi { parameters, .. } => f.debug_tuple("Multi").field(parameters).finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Target,
    Source,
}

enum Outcome {
    Updated(Value),
    Unchanged,
    Canceled,
    Failed(BindingError),
}

impl From<BindResult<Outcome>> for Outcome {
    fn from(result: BindResult<Outcome>) -> Self {
        result.unwrap_or_else(Outcome::Failed)
    }
}

/// Relays observer notifications to the owning binding.
struct ObserverRelay {
    binding: Weak<DataBinding>,
    role: ObserverRole,
}

impl MemberPathObserverListener for ObserverRelay {
    fn is_alive(&self) -> bool {
        self.binding.strong_count() > 0
    }

    fn on_path_members_changed(&self, _observer: &dyn MemberPathObserver) {
        if let Some(binding) = self.binding.upgrade() {
            binding.on_observer_changed(self.role);
        }
    }

    fn on_last_member_changed(&self, _observer: &dyn MemberPathObserver) {
        if let Some(binding) = self.binding.upgrade() {
            binding.on_observer_changed(self.role);
        }
    }

    fn on_error(&self, observer: &dyn MemberPathObserver, error: &BindingError) {
        if let Some(binding) = self.binding.upgrade() {
            tracing::debug!(path = %observer.path(), role = ?self.role, %error, "binding observer error");
            for listener in binding.components.get::<dyn BindingObserverListener>().iter() {
                listener.on_observer_error(&binding, self.role, error);
            }
        }
    }
}

/// Clears the in-flight direction and leaves `Suspended` when dropped.
struct UpdateScope<'a> {
    binding: &'a DataBinding,
    resumed: bool,
}

impl Drop for UpdateScope<'_> {
    fn drop(&mut self) {
        self.binding.updating.set(None);
        if self.resumed && self.binding.state.get() == BindingState::Suspended {
            self.binding.state.set(BindingState::Attached);
        }
    }
}

/// Binding between a target path and its source(s).
///
/// # Example
///
/// ```
/// use std::rc::Rc;
/// use fbind_core::{MemberPath, MemberProvider, MemberRegistry, PropertyBag, Value};
/// use fbind_runtime::binding::{Binding, BindingMode, BindingSource, DataBinding};
/// use fbind_runtime::observer::{create_observer, ObserverRequest};
///
/// let provider: Rc<dyn MemberProvider> = Rc::new(MemberRegistry::new());
/// let view = PropertyBag::new();
/// let model = PropertyBag::from_pairs([("Name", "Ann")]);
///
/// let target = create_observer(
///     ObserverRequest::new(view.to_value(), MemberPath::parse("Text").unwrap()),
///     Rc::clone(&provider),
/// );
/// let source = create_observer(
///     ObserverRequest::new(model.to_value(), MemberPath::parse("Name").unwrap()),
///     provider,
/// );
/// let binding = DataBinding::new(target, BindingSource::observer(source));
/// binding.add_component(BindingMode::TwoWay.component());
/// binding.attach();
/// assert_eq!(view.get("Text"), Some(Value::from("Ann")));
///
/// model.set("Name", "Bea");
/// assert_eq!(view.get("Text"), Some(Value::from("Bea")));
/// view.set("Text", "Cid");
/// assert_eq!(model.get("Name"), Some(Value::from("Cid")));
/// ```
pub struct DataBinding {
    self_ref: Weak<DataBinding>,
    target: Rc<dyn MemberPathObserver>,
    source: BindingSource,
    components: ComponentCollection<DataBinding>,
    converter: RefCell<Option<Rc<dyn ValueConverter>>>,
    equality_check: Cell<bool>,
    state: Cell<BindingState>,
    updating: Cell<Option<Direction>>,
    target_relay: Rc<dyn MemberPathObserverListener>,
    source_relay: Rc<dyn MemberPathObserverListener>,
}

impl DataBinding {
    /// Create a binding in the `Created` state with the default converter
    /// and equality suppression on.
    pub fn new(target: Rc<dyn MemberPathObserver>, source: BindingSource) -> Rc<Self> {
        Rc::new_cyclic(|self_ref: &Weak<DataBinding>| Self {
            self_ref: Weak::clone(self_ref),
            target,
            source,
            components: ComponentCollection::new(),
            converter: RefCell::new(Some(Rc::new(DefaultValueConverter))),
            equality_check: Cell::new(true),
            state: Cell::new(BindingState::Created),
            updating: Cell::new(None),
            target_relay: Rc::new(ObserverRelay {
                binding: Weak::clone(self_ref),
                role: ObserverRole::Target,
            }),
            source_relay: Rc::new(ObserverRelay {
                binding: Weak::clone(self_ref),
                role: ObserverRole::Source,
            }),
        })
    }

    /// Shared handle to this binding, if it is still owned somewhere.
    #[must_use]
    pub fn to_rc(&self) -> Option<Rc<DataBinding>> {
        self.self_ref.upgrade()
    }

    /// The source description.
    #[must_use]
    pub fn source(&self) -> &BindingSource {
        &self.source
    }

    /// Observers among the sources, in order.
    #[must_use]
    pub fn source_observers(&self) -> Vec<Rc<dyn MemberPathObserver>> {
        self.source
            .parameters()
            .iter()
            .filter_map(SourceParameter::observer)
            .cloned()
            .collect()
    }

    /// Hosted components.
    #[must_use]
    pub fn components(&self) -> &ComponentCollection<DataBinding> {
        &self.components
    }

    /// Add a component. Returns `false` if it was rejected or already present.
    pub fn add_component<C: Component<DataBinding>>(&self, component: Rc<C>) -> bool {
        self.components.add(self, component)
    }

    /// Remove a component.
    pub fn remove_component(&self, component: &Rc<dyn Component<DataBinding>>) -> bool {
        self.components.remove(self, component)
    }

    /// Replace the converter used when the target type does not accept a
    /// value. `None` disables conversion.
    pub fn set_value_converter(&self, converter: Option<Rc<dyn ValueConverter>>) {
        *self.converter.borrow_mut() = converter;
    }

    /// Skip the write when the new value equals the current one (default).
    pub fn set_equality_check(&self, enabled: bool) {
        self.equality_check.set(enabled);
    }

    /// Whether equal values are suppressed.
    #[must_use]
    pub fn equality_check(&self) -> bool {
        self.equality_check.get()
    }

    /// Stop observing sources while keeping them readable.
    pub fn unsubscribe_sources(&self) {
        for observer in self.source_observers() {
            observer.remove_listener(&self.source_relay);
            observer.unsubscribe();
        }
    }

    fn set_state(&self, new: BindingState) {
        let old = self.state.replace(new);
        if old == new {
            return;
        }
        tracing::debug!(target_path = %self.target.path(), %old, %new, "binding state changed");
        for listener in self.components.get::<dyn BindingStateListener>().iter() {
            listener.on_state_changed(self, old, new);
        }
    }

    fn begin_update(&self, direction: Direction) -> Option<UpdateScope<'_>> {
        if let Some(current) = self.updating.get() {
            tracing::trace!(?current, ?direction, "re-entrant binding update skipped");
            return None;
        }
        self.updating.set(Some(direction));
        let resumed = self.state.get() == BindingState::Attached;
        if resumed {
            // Silent transition: listeners only see lifecycle changes.
            self.state.set(BindingState::Suspended);
        }
        Some(UpdateScope {
            binding: self,
            resumed,
        })
    }

    fn on_observer_changed(&self, role: ObserverRole) {
        if !self.state.get().reacts_to_changes() {
            return;
        }
        let dispatcher = self.components.get::<dyn UpdateDispatch>().first().cloned();
        match dispatcher {
            Some(dispatcher) => {
                let binding = Weak::clone(&self.self_ref);
                dispatcher.dispatch(
                    self,
                    Box::new(move || {
                        if let Some(binding) = binding.upgrade() {
                            binding.react(role);
                        }
                    }),
                );
            }
            None => self.react(role),
        }
    }

    fn react(&self, role: ObserverRole) {
        if !self.state.get().reacts_to_changes() {
            return;
        }
        for listener in self.components.get::<dyn BindingObserverListener>().iter() {
            match role {
                ObserverRole::Source => listener.on_source_changed(self),
                ObserverRole::Target => listener.on_target_changed(self),
            }
        }
    }

    fn coerce(&self, value: Value, to: ValueType) -> BindResult<Value> {
        if to.accepts(&value) {
            return Ok(value);
        }
        let converter = self.converter.borrow().clone();
        match converter {
            Some(converter) => converter.convert(value, to),
            None => Err(BindingError::Conversion {
                from: value.type_label(),
                to: to.label(),
            }),
        }
    }

    /// Write `value` through `last`, honouring conversion and equality.
    fn write(&self, last: MemberPathLastMember, value: Value) -> BindResult<Outcome> {
        let (target, member) = match last {
            MemberPathLastMember::Resolved { target, member } => (target, member),
            MemberPathLastMember::Unresolved => return Ok(Outcome::Canceled),
            MemberPathLastMember::Error(e) => return Err(e),
        };
        if !member.can_write() {
            return Err(BindingError::NotWritable {
                member: member.name().to_owned(),
            });
        }
        let value = self.coerce(value, member.value_type())?;
        if self.equality_check.get() && member.can_read() {
            if let Ok(current) = member.get_value(&target) {
                if current == value {
                    return Ok(Outcome::Unchanged);
                }
            }
        }
        member.set_value(&target, value.clone())?;
        Ok(Outcome::Updated(value))
    }

    fn update_target_inner(&self) -> BindResult<Outcome> {
        let Some(mut value) = self.source.read()? else {
            return Ok(Outcome::Canceled);
        };
        for interceptor in self.components.get::<dyn TargetValueInterceptor>().iter() {
            match interceptor.intercept_target_value(self, value)? {
                InterceptResult::Value(next) => value = next,
                InterceptResult::Cancel => return Ok(Outcome::Canceled),
            }
        }
        self.write(self.target.get_last_member(None), value)
    }

    fn update_source_inner(&self) -> BindResult<Outcome> {
        let source = match &self.source {
            BindingSource::Single(SourceParameter::Observer(observer)) => Rc::clone(observer),
            BindingSource::Single(SourceParameter::Constant(_)) => {
                return Err(BindingError::NotWritable {
                    member: "constant source".to_owned(),
                });
            }
            BindingSource::Multi { .. } => {
                return Err(BindingError::NotWritable {
                    member: "multi-source binding".to_owned(),
                });
            }
        };
        let Some(mut value) = self.target.get_last_member(None).get_value()? else {
            return Ok(Outcome::Canceled);
        };
        for interceptor in self.components.get::<dyn SourceValueInterceptor>().iter() {
            match interceptor.intercept_source_value(self, value)? {
                InterceptResult::Value(next) => value = next,
                InterceptResult::Cancel => return Ok(Outcome::Canceled),
            }
        }
        self.write(source.get_last_member(None), value)
    }

    fn report_target(&self, outcome: Outcome) {
        let listeners = self.components.get::<dyn TargetListener>();
        match outcome {
            Outcome::Updated(value) => {
                for listener in listeners.iter() {
                    listener.on_target_updated(self, &value);
                }
            }
            Outcome::Unchanged => {}
            Outcome::Canceled => {
                for listener in listeners.iter() {
                    listener.on_target_update_canceled(self);
                }
            }
            Outcome::Failed(error) => {
                tracing::debug!(target_path = %self.target.path(), %error, "target update failed");
                for listener in listeners.iter() {
                    listener.on_target_update_failed(self, &error);
                }
            }
        }
    }

    fn report_source(&self, outcome: Outcome) {
        let listeners = self.components.get::<dyn SourceListener>();
        match outcome {
            Outcome::Updated(value) => {
                for listener in listeners.iter() {
                    listener.on_source_updated(self, &value);
                }
            }
            Outcome::Unchanged => {}
            Outcome::Canceled => {
                for listener in listeners.iter() {
                    listener.on_source_update_canceled(self);
                }
            }
            Outcome::Failed(error) => {
                tracing::debug!(target_path = %self.target.path(), %error, "source update failed");
                for listener in listeners.iter() {
                    listener.on_source_update_failed(self, &error);
                }
            }
        }
    }

    fn add_relays(&self) {
        self.target.add_listener(&self.target_relay);
        for observer in self.source_observers() {
            observer.add_listener(&self.source_relay);
        }
    }

    fn remove_relays(&self) {
        self.target.remove_listener(&self.target_relay);
        for observer in self.source_observers() {
            observer.remove_listener(&self.source_relay);
        }
    }
}

impl Binding for DataBinding {
    fn state(&self) -> BindingState {
        self.state.get()
    }

    fn target(&self) -> &Rc<dyn MemberPathObserver> {
        &self.target
    }

    fn update_target(&self) -> BindResult<()> {
        if !self.state.get().accepts_updates() {
            return Ok(());
        }
        let Some(scope) = self.begin_update(Direction::Target) else {
            return Ok(());
        };
        let outcome = Outcome::from(self.update_target_inner());
        drop(scope);
        self.report_target(outcome);
        Ok(())
    }

    fn update_source(&self) -> BindResult<()> {
        if !self.state.get().accepts_updates() {
            return Ok(());
        }
        let Some(scope) = self.begin_update(Direction::Source) else {
            return Ok(());
        };
        let outcome = Outcome::from(self.update_source_inner());
        drop(scope);
        self.report_source(outcome);
        Ok(())
    }

    fn attach(&self) {
        if self.state.get() != BindingState::Created {
            return;
        }
        self.set_state(BindingState::Attaching);
        self.add_relays();
        if self.state.get() == BindingState::Attaching {
            self.set_state(BindingState::Attached);
        }
    }

    fn detach(&self) {
        if self.state.get().is_finished() || self.state.get() == BindingState::Detaching {
            return;
        }
        self.set_state(BindingState::Detaching);
        self.remove_relays();
        self.set_state(BindingState::Detached);
    }

    fn dispose(&self) {
        if self.state.get() == BindingState::Disposed {
            return;
        }
        self.detach();
        self.set_state(BindingState::Disposed);
        self.target.dispose();
        for observer in self.source_observers() {
            observer.dispose();
        }
        self.components.clear(self);
    }
}

impl fmt::Debug for DataBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataBinding")
            .field("target", &self.target.path().path())
            .field("source", &self.source)
            .field("state", &self.state.get())
            .field("components", &self.components.len())
            .field("equality_check", &self.equality_check.get())
            .finish()
    }
}
