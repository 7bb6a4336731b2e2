#![forbid(unsafe_code)]

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use fbind_core::{BindResult, BindingError};

use super::{Binding, BindingState};
use crate::observer::MemberPathObserver;

/// A binding whose construction failed.
///
/// It keeps the target observer and the target path as written, so holders
/// index it under that path even when the path itself failed to parse.
/// Every update call returns the construction error.
pub struct InvalidBinding {
    target: Rc<dyn MemberPathObserver>,
    target_path: Rc<str>,
    error: BindingError,
    state: Cell<BindingState>,
}

impl InvalidBinding {
    /// Capture `error` for a binding on `target`.
    #[must_use]
    pub fn new(target: Rc<dyn MemberPathObserver>, error: BindingError) -> Rc<Self> {
        let target_path = Rc::from(target.path().path());
        Self::with_target_path(target, target_path, error)
    }

    /// Capture `error` for a binding whose target path `target_path` did not
    /// parse; `target` observes the target object itself.
    #[must_use]
    pub fn with_target_path(
        target: Rc<dyn MemberPathObserver>,
        target_path: Rc<str>,
        error: BindingError,
    ) -> Rc<Self> {
        tracing::debug!(target_path = %target_path, %error, "invalid binding created");
        Rc::new(Self {
            target,
            target_path,
            error,
            state: Cell::new(BindingState::Created),
        })
    }

    /// The construction error.
    #[must_use]
    pub fn error(&self) -> &BindingError {
        &self.error
    }
}

impl Binding for InvalidBinding {
    fn state(&self) -> BindingState {
        self.state.get()
    }

    fn target(&self) -> &Rc<dyn MemberPathObserver> {
        &self.target
    }

    fn target_path(&self) -> &str {
        &self.target_path
    }

    fn update_target(&self) -> BindResult<()> {
        Err(self.error.clone())
    }

    fn update_source(&self) -> BindResult<()> {
        Err(self.error.clone())
    }

    fn attach(&self) {
        if self.state.get() == BindingState::Created {
            self.state.set(BindingState::Attached);
        }
    }

    fn detach(&self) {
        if !self.state.get().is_finished() {
            self.state.set(BindingState::Detached);
        }
    }

    fn dispose(&self) {
        if self.state.replace(BindingState::Disposed) != BindingState::Disposed {
            self.target.dispose();
        }
    }
}

impl fmt::Debug for InvalidBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvalidBinding")
            .field("target", &self.target_path)
            .field("error", &self.error)
            .field("state", &self.state.get())
            .finish()
    }
}
