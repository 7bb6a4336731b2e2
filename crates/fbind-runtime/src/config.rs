#![forbid(unsafe_code)]

//! Binding defaults applied by the [`BindingManager`](crate::manager::BindingManager).
//!
//! With the `policy-config` feature the defaults can be loaded from TOML:
//!
//! ```toml
//! mode = "TwoWay"
//! execution = "MainAsync"
//! optional_members = true
//! observe_last_member = true
//! equality_check = true
//! replace_existing = false
//! ```

use fbind_core::ExecutionMode;

use crate::binding::BindingMode;
use crate::observer::ObserverFlags;

/// Defaults for bindings built by a manager.
#[derive(Debug, Clone, PartialEq)]
pub struct BindingConfig {
    /// Mode used when a builder does not name one.
    /// Default: `OneWay`
    pub default_mode: BindingMode,

    /// Unknown members resolve as unresolved instead of failing.
    /// Default: false
    pub optional_members: bool,

    /// Subscribe to the last segment of every path.
    /// Default: true
    pub observe_last_member: bool,

    /// Skip writes of values equal to the current one.
    /// Default: true
    pub equality_check: bool,

    /// Execution mode for change reactions. `Current` runs them inline
    /// without a dispatch component.
    /// Default: `Current`
    pub execution_mode: ExecutionMode,

    /// Registering a binding on a target and path that already has one
    /// disposes the previous binding.
    /// Default: true
    pub replace_existing: bool,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            default_mode: BindingMode::OneWay,
            optional_members: false,
            observe_last_member: true,
            equality_check: true,
            execution_mode: ExecutionMode::Current,
            replace_existing: true,
        }
    }
}

impl BindingConfig {
    /// Set the default mode.
    #[must_use]
    pub fn with_default_mode(mut self, mode: BindingMode) -> Self {
        self.default_mode = mode;
        self
    }

    /// Treat unknown members as unresolved.
    #[must_use]
    pub fn with_optional_members(mut self, optional: bool) -> Self {
        self.optional_members = optional;
        self
    }

    /// Toggle last-segment observation.
    #[must_use]
    pub fn with_observe_last_member(mut self, observe: bool) -> Self {
        self.observe_last_member = observe;
        self
    }

    /// Toggle equality suppression.
    #[must_use]
    pub fn with_equality_check(mut self, enabled: bool) -> Self {
        self.equality_check = enabled;
        self
    }

    /// Set the execution mode for change reactions.
    #[must_use]
    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    /// Toggle replacement of existing bindings in holders.
    #[must_use]
    pub fn with_replace_existing(mut self, replace: bool) -> Self {
        self.replace_existing = replace;
        self
    }

    /// Observer flags implied by this configuration.
    #[must_use]
    pub fn observer_flags(&self) -> ObserverFlags {
        let mut flags = ObserverFlags::OBSERVABLE;
        flags.set(ObserverFlags::OPTIONAL, self.optional_members);
        flags.set(ObserverFlags::OBSERVE_LAST, self.observe_last_member);
        flags
    }
}

/// Parse an execution mode name, case-insensitively.
#[must_use]
pub fn parse_execution_mode(name: &str) -> Option<ExecutionMode> {
    let mode = match name.to_ascii_lowercase().as_str() {
        "current" => ExecutionMode::Current,
        "main" => ExecutionMode::Main,
        "mainasync" => ExecutionMode::MainAsync,
        "background" => ExecutionMode::Background,
        _ => return None,
    };
    Some(mode)
}

#[cfg(feature = "policy-config")]
mod file {
    use fbind_core::{BindResult, BindingError};
    use serde::Deserialize;

    use super::{parse_execution_mode, BindingConfig};
    use crate::binding::BindingMode;

    #[derive(Debug, Default, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct ConfigFile {
        mode: Option<String>,
        execution: Option<String>,
        optional_members: Option<bool>,
        observe_last_member: Option<bool>,
        equality_check: Option<bool>,
        replace_existing: Option<bool>,
    }

    impl BindingConfig {
        /// Load a configuration from TOML; absent keys keep their defaults.
        pub fn from_toml_str(input: &str) -> BindResult<Self> {
            let file: ConfigFile = toml::from_str(input)
                .map_err(|e| BindingError::Custom(format!("invalid binding config: {e}")))?;
            let mut config = Self::default();
            if let Some(name) = file.mode {
                config.default_mode = BindingMode::parse(&name)
                    .ok_or_else(|| BindingError::Custom(format!("unknown binding mode '{name}'")))?;
            }
            if let Some(name) = file.execution {
                config.execution_mode = parse_execution_mode(&name)
                    .ok_or_else(|| BindingError::Custom(format!("unknown execution mode '{name}'")))?;
            }
            if let Some(v) = file.optional_members {
                config.optional_members = v;
            }
            if let Some(v) = file.observe_last_member {
                config.observe_last_member = v;
            }
            if let Some(v) = file.equality_check {
                config.equality_check = v;
            }
            if let Some(v) = file.replace_existing {
                config.replace_existing = v;
            }
            Ok(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_observe_last_member() {
        let config = BindingConfig::default();
        assert_eq!(config.observer_flags(), ObserverFlags::default());
        assert!(config.equality_check);
    }

    #[test]
    fn builders_compose() {
        let config = BindingConfig::default()
            .with_default_mode(BindingMode::TwoWay)
            .with_optional_members(true)
            .with_observe_last_member(false)
            .with_execution_mode(ExecutionMode::Main);
        assert_eq!(config.default_mode, BindingMode::TwoWay);
        assert_eq!(config.execution_mode, ExecutionMode::Main);
        assert_eq!(
            config.observer_flags(),
            ObserverFlags::OBSERVABLE | ObserverFlags::OPTIONAL
        );
    }

    #[test]
    fn execution_mode_names() {
        assert_eq!(parse_execution_mode("MainAsync"), Some(ExecutionMode::MainAsync));
        assert_eq!(parse_execution_mode("later"), None);
    }

    #[cfg(feature = "policy-config")]
    #[test]
    fn loads_from_toml() {
        let config = BindingConfig::from_toml_str(
            "mode = \"TwoWay\"\nexecution = \"Background\"\nreplace_existing = false\n",
        )
        .unwrap();
        assert_eq!(config.default_mode, BindingMode::TwoWay);
        assert_eq!(config.execution_mode, ExecutionMode::Background);
        assert!(!config.replace_existing);
        assert!(config.equality_check);

        assert!(BindingConfig::from_toml_str("mode = \"Sideways\"").is_err());
        assert!(BindingConfig::from_toml_str("unknown = 1").is_err());
    }
}
