#![forbid(unsafe_code)]

//! Update direction policies.

use std::fmt;
use std::rc::Rc;

use fbind_core::{Component, Registrar};

use super::components::{BindingObserverListener, BindingStateListener};
use super::data::DataBinding;
use super::{Binding, BindingState};

/// When and in which direction a binding propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BindingMode {
    /// Push to the target once on attach, then stop observing sources.
    OneTime,
    /// Push to the target on attach and on every source change.
    #[default]
    OneWay,
    /// Push to the source on attach and on every target change.
    OneWayToSource,
    /// `OneWay` plus target changes pushed back to the source.
    TwoWay,
    /// Never propagate on its own; only explicit update calls.
    None,
}

impl BindingMode {
    /// Component implementing this mode.
    #[must_use]
    pub fn component(self) -> Rc<ModeComponent> {
        Rc::new(ModeComponent { mode: self })
    }

    /// Whether source changes reach the target.
    #[must_use]
    pub fn updates_target(self) -> bool {
        matches!(self, Self::OneWay | Self::TwoWay)
    }

    /// Whether target changes reach the source.
    #[must_use]
    pub fn updates_source(self) -> bool {
        matches!(self, Self::OneWayToSource | Self::TwoWay)
    }

    /// Parse a mode name, case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let mode = match name.to_ascii_lowercase().as_str() {
            "onetime" => Self::OneTime,
            "oneway" => Self::OneWay,
            "onewaytosource" => Self::OneWayToSource,
            "twoway" => Self::TwoWay,
            "none" => Self::None,
            _ => return None,
        };
        Some(mode)
    }
}

fn report(binding: &DataBinding, result: fbind_core::BindResult<()>) {
    if let Err(error) = result {
        tracing::debug!(target_path = %binding.target().path(), %error, "mode update failed");
    }
}

/// Binding component driving updates for a [`BindingMode`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ModeComponent {
    mode: BindingMode,
}

impl ModeComponent {
    /// The implemented mode.
    #[must_use]
    pub fn mode(&self) -> BindingMode {
        self.mode
    }
}

impl BindingStateListener for ModeComponent {
    fn on_state_changed(&self, binding: &DataBinding, _old: BindingState, new: BindingState) {
        if new != BindingState::Attached {
            return;
        }
        match self.mode {
            BindingMode::OneTime => {
                report(binding, binding.update_target());
                binding.unsubscribe_sources();
            }
            BindingMode::OneWay | BindingMode::TwoWay => report(binding, binding.update_target()),
            BindingMode::OneWayToSource => report(binding, binding.update_source()),
            BindingMode::None => {}
        }
    }
}

impl BindingObserverListener for ModeComponent {
    fn on_source_changed(&self, binding: &DataBinding) {
        if self.mode.updates_target() {
            report(binding, binding.update_target());
        }
    }

    fn on_target_changed(&self, binding: &DataBinding) {
        if self.mode.updates_source() {
            report(binding, binding.update_source());
        }
    }
}

impl Component<DataBinding> for ModeComponent {
    fn register(self: Rc<Self>, registrar: &mut Registrar) {
        registrar.provide::<dyn BindingStateListener>(Rc::clone(&self) as Rc<dyn BindingStateListener>);
        registrar.provide::<dyn BindingObserverListener>(self);
    }

    /// One mode per binding.
    fn on_attaching(&self, binding: &DataBinding) -> bool {
        binding.components().find::<ModeComponent>().is_none()
    }
}

impl fmt::Debug for ModeComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModeComponent").field(&self.mode).finish()
    }
}
