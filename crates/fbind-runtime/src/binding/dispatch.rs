#![forbid(unsafe_code)]

use std::fmt;
use std::rc::Rc;

use fbind_core::{Component, ExecutionMode, Registrar, ThreadDispatcher};

use super::components::UpdateDispatch;
use super::data::DataBinding;

/// Routes a binding's change reactions through a [`ThreadDispatcher`].
///
/// Reactions run inline when the dispatcher allows it for the configured
/// mode and are handed to [`ThreadDispatcher::execute`] otherwise.
pub struct DispatchComponent {
    mode: ExecutionMode,
    dispatcher: Rc<dyn ThreadDispatcher>,
}

impl DispatchComponent {
    /// Dispatch reactions with `mode` on `dispatcher`.
    #[must_use]
    pub fn new(mode: ExecutionMode, dispatcher: Rc<dyn ThreadDispatcher>) -> Rc<Self> {
        Rc::new(Self { mode, dispatcher })
    }

    /// Configured execution mode.
    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }
}

impl UpdateDispatch for DispatchComponent {
    fn dispatch(&self, _binding: &DataBinding, handler: Box<dyn FnOnce()>) {
        if self.dispatcher.can_execute_inline(self.mode) {
            handler();
        } else {
            self.dispatcher.execute(self.mode, handler);
        }
    }
}

impl Component<DataBinding> for DispatchComponent {
    fn priority(&self) -> i32 {
        100
    }

    fn register(self: Rc<Self>, registrar: &mut Registrar) {
        registrar.provide::<dyn UpdateDispatch>(self);
    }
}

impl fmt::Debug for DispatchComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchComponent")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
