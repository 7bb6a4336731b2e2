#![forbid(unsafe_code)]

use std::fmt;
use std::rc::{Rc, Weak};

use fbind_core::{Component, Metadata, Registrar, Value};

use super::BindingManager;
use crate::binding::{Binding, BindingState, BindingStateListener, DataBinding};

/// Lifecycle events reported to a [`BindingManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingLifecycleState {
    /// The binding was built and attached.
    Initialized,
    /// The binding was disposed.
    Disposed,
}

/// Manager component notified of binding lifecycle events.
pub trait BindingLifecycleListener {
    /// `binding` entered `state`. `extra` carries caller-defined context.
    fn on_lifecycle_changed(
        &self,
        manager: &BindingManager,
        binding: &Rc<dyn Binding>,
        state: BindingLifecycleState,
        extra: Option<&Value>,
        metadata: Option<&Metadata>,
    );
}

/// Binding component forwarding disposal back to the manager that built
/// the binding.
pub struct ManagerLifecycleRelay {
    manager: Weak<BindingManager>,
}

impl ManagerLifecycleRelay {
    pub(crate) fn new(manager: Weak<BindingManager>) -> Rc<Self> {
        Rc::new(Self { manager })
    }
}

impl BindingStateListener for ManagerLifecycleRelay {
    fn on_state_changed(&self, binding: &DataBinding, _old: BindingState, new: BindingState) {
        if new != BindingState::Disposed {
            return;
        }
        let (Some(manager), Some(binding)) = (self.manager.upgrade(), binding.to_rc()) else {
            return;
        };
        let binding: Rc<dyn Binding> = binding;
        manager.on_lifecycle_changed(&binding, BindingLifecycleState::Disposed, None, None);
    }
}

impl Component<DataBinding> for ManagerLifecycleRelay {
    fn priority(&self) -> i32 {
        i32::MIN
    }

    fn register(self: Rc<Self>, registrar: &mut Registrar) {
        registrar.provide::<dyn BindingStateListener>(self);
    }
}

impl fmt::Debug for ManagerLifecycleRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerLifecycleRelay")
            .field("manager_alive", &(self.manager.strong_count() > 0))
            .finish()
    }
}
