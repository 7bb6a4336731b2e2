#![forbid(unsafe_code)]

//! Listeners that record what they were told, in order.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use fbind_core::{BindingError, Component, Registrar, Value};
use fbind_runtime::binding::{
    BindingObserverListener, BindingStateListener, ObserverRole, SourceListener, TargetListener,
};
use fbind_runtime::{BindingState, DataBinding, MemberPathObserver, MemberPathObserverListener};

/// One observer callback.
#[derive(Debug, Clone, PartialEq)]
pub enum ObserverEvent {
    /// The resolved chain changed.
    PathMembersChanged,
    /// The last member or its value changed.
    LastMemberChanged,
    /// Resolution failed.
    Error(BindingError),
}

/// Observer listener that can be switched off to test pruning.
pub struct RecordingListener {
    events: RefCell<Vec<ObserverEvent>>,
    alive: Cell<bool>,
}

impl RecordingListener {
    /// Live listener with an empty log.
    #[must_use]
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            events: RefCell::new(Vec::new()),
            alive: Cell::new(true),
        })
    }

    /// Same listener as the trait object observers take.
    #[must_use]
    pub fn shared(self: &Rc<Self>) -> Rc<dyn MemberPathObserverListener> {
        Rc::clone(self) as Rc<dyn MemberPathObserverListener>
    }

    /// Report dead from now on.
    pub fn kill(&self) {
        self.alive.set(false);
    }

    /// Recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<ObserverEvent> {
        self.events.borrow().clone()
    }

    /// Number of recorded `event`s.
    #[must_use]
    pub fn count(&self, event: &ObserverEvent) -> usize {
        self.events.borrow().iter().filter(|e| *e == event).count()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    fn push(&self, event: ObserverEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl MemberPathObserverListener for RecordingListener {
    fn is_alive(&self) -> bool {
        self.alive.get()
    }

    fn on_path_members_changed(&self, _observer: &dyn MemberPathObserver) {
        self.push(ObserverEvent::PathMembersChanged);
    }

    fn on_last_member_changed(&self, _observer: &dyn MemberPathObserver) {
        self.push(ObserverEvent::LastMemberChanged);
    }

    fn on_error(&self, _observer: &dyn MemberPathObserver, error: &BindingError) {
        self.push(ObserverEvent::Error(error.clone()));
    }
}

/// One binding callback.
#[derive(Debug, Clone, PartialEq)]
pub enum BindingEvent {
    /// Target written.
    TargetUpdated(Value),
    /// Target update failed.
    TargetFailed(BindingError),
    /// Target update abandoned.
    TargetCanceled,
    /// Source written.
    SourceUpdated(Value),
    /// Source update failed.
    SourceFailed(BindingError),
    /// Source update abandoned.
    SourceCanceled,
    /// Lifecycle transition.
    State(BindingState, BindingState),
    /// Observer error with the observer's role.
    ObserverError(ObserverRole, BindingError),
}

/// Binding component recording every outcome it hears about.
///
/// Registers with a low priority so it observes after the components that
/// act on the same callbacks.
#[derive(Default)]
pub struct BindingRecorder {
    events: RefCell<Vec<BindingEvent>>,
}

impl BindingRecorder {
    /// Create and attach a recorder to `binding`.
    pub fn attach_to(binding: &DataBinding) -> Rc<Self> {
        let recorder = Rc::new(Self::default());
        binding.add_component(Rc::clone(&recorder));
        recorder
    }

    /// Recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<BindingEvent> {
        self.events.borrow().clone()
    }

    /// Values written to the target.
    #[must_use]
    pub fn target_values(&self) -> Vec<Value> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                BindingEvent::TargetUpdated(v) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }

    /// Values written to the source.
    #[must_use]
    pub fn source_values(&self) -> Vec<Value> {
        self.events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                BindingEvent::SourceUpdated(v) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    fn push(&self, event: BindingEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl TargetListener for BindingRecorder {
    fn on_target_updated(&self, _binding: &DataBinding, value: &Value) {
        self.push(BindingEvent::TargetUpdated(value.clone()));
    }

    fn on_target_update_failed(&self, _binding: &DataBinding, error: &BindingError) {
        self.push(BindingEvent::TargetFailed(error.clone()));
    }

    fn on_target_update_canceled(&self, _binding: &DataBinding) {
        self.push(BindingEvent::TargetCanceled);
    }
}

impl SourceListener for BindingRecorder {
    fn on_source_updated(&self, _binding: &DataBinding, value: &Value) {
        self.push(BindingEvent::SourceUpdated(value.clone()));
    }

    fn on_source_update_failed(&self, _binding: &DataBinding, error: &BindingError) {
        self.push(BindingEvent::SourceFailed(error.clone()));
    }

    fn on_source_update_canceled(&self, _binding: &DataBinding) {
        self.push(BindingEvent::SourceCanceled);
    }
}

impl BindingStateListener for BindingRecorder {
    fn on_state_changed(&self, _binding: &DataBinding, old: BindingState, new: BindingState) {
        self.push(BindingEvent::State(old, new));
    }
}

impl BindingObserverListener for BindingRecorder {
    fn on_observer_error(&self, _binding: &DataBinding, role: ObserverRole, error: &BindingError) {
        self.push(BindingEvent::ObserverError(role, error.clone()));
    }
}

impl Component<DataBinding> for BindingRecorder {
    fn priority(&self) -> i32 {
        -100
    }

    fn register(self: Rc<Self>, registrar: &mut Registrar) {
        registrar.provide::<dyn TargetListener>(Rc::clone(&self) as Rc<dyn TargetListener>);
        registrar.provide::<dyn SourceListener>(Rc::clone(&self) as Rc<dyn SourceListener>);
        registrar.provide::<dyn BindingStateListener>(Rc::clone(&self) as Rc<dyn BindingStateListener>);
        registrar.provide::<dyn BindingObserverListener>(self);
    }
}
