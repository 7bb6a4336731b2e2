#![forbid(unsafe_code)]

//! Declarative description of one binding, turned into a live binding by
//! [`BindingManager::build`](super::BindingManager::build).

use std::fmt;
use std::rc::Rc;

use fbind_core::{BindResult, BindingError, Component, ExecutionMode, MemberPath, Value};

use super::lifecycle::ManagerLifecycleRelay;
use super::BindingManager;
use crate::binding::{
    Binding, BindingConverter, BindingMode, BindingSource, ConverterInterceptor, DataBinding,
    DispatchComponent, InvalidBinding, SourceParameter, ValueFormatter,
};
use crate::config::BindingConfig;
use crate::observer::{create_observer, MemberPathObserver, ObserverFlags, ObserverRequest};

/// One input of a built binding.
#[derive(Clone, PartialEq)]
pub enum SourceSpec {
    /// Member path over the source object; `""` is the source itself.
    Path(Rc<str>),
    /// Fixed value.
    Constant(Value),
}

impl fmt::Debug for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Constant(value) => f.debug_tuple("Constant").field(value).finish(),
        }
    }
}

/// Builder of a [`DataBinding`].
///
/// Paths are kept as text and parsed when the binding is built; a path
/// that fails to parse yields an [`InvalidBinding`] carrying the error.
/// Unset options fall back to the manager's [`BindingConfig`].
#[derive(Clone)]
pub struct BindingBuilder {
    target_path: Rc<str>,
    sources: Vec<SourceSpec>,
    formatter: Option<Rc<dyn ValueFormatter>>,
    mode: Option<BindingMode>,
    equality_check: Option<bool>,
    execution_mode: Option<ExecutionMode>,
    optional: Option<bool>,
    trigger: Option<Rc<str>>,
    converter: Option<(Rc<dyn BindingConverter>, Value)>,
    components: Vec<Rc<dyn Component<DataBinding>>>,
}

impl BindingBuilder {
    /// Binding on `target_path` of the target object.
    #[must_use]
    pub fn new(target_path: &str) -> Self {
        Self {
            target_path: Rc::from(target_path),
            sources: Vec::new(),
            formatter: None,
            mode: None,
            equality_check: None,
            execution_mode: None,
            optional: None,
            trigger: None,
            converter: None,
            components: Vec::new(),
        }
    }

    /// Add a source path over the source object.
    #[must_use]
    pub fn source_path(mut self, path: &str) -> Self {
        self.sources.push(SourceSpec::Path(Rc::from(path)));
        self
    }

    /// Add a constant source.
    #[must_use]
    pub fn constant(mut self, value: impl Into<Value>) -> Self {
        self.sources.push(SourceSpec::Constant(value.into()));
        self
    }

    /// Combine the sources with `formatter`. Required for more than one
    /// source.
    #[must_use]
    pub fn formatter(mut self, formatter: Rc<dyn ValueFormatter>) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Propagation mode.
    #[must_use]
    pub fn mode(mut self, mode: BindingMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Toggle equality suppression.
    #[must_use]
    pub fn equality_check(mut self, enabled: bool) -> Self {
        self.equality_check = Some(enabled);
        self
    }

    /// Run change reactions through the manager's dispatcher with `mode`.
    #[must_use]
    pub fn execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = Some(mode);
        self
    }

    /// Treat unknown members as unresolved.
    #[must_use]
    pub fn optional(mut self, optional: bool) -> Self {
        self.optional = Some(optional);
        self
    }

    /// Re-walk paths when the event member `name` fires.
    #[must_use]
    pub fn trigger(mut self, name: &str) -> Self {
        self.trigger = Some(Rc::from(name));
        self
    }

    /// Install a converter with its parameter.
    #[must_use]
    pub fn converter(mut self, converter: Rc<dyn BindingConverter>, parameter: Value) -> Self {
        self.converter = Some((converter, parameter));
        self
    }

    /// Add a custom component to the built binding.
    #[must_use]
    pub fn component(mut self, component: Rc<dyn Component<DataBinding>>) -> Self {
        self.components.push(component);
        self
    }

    /// Target path text.
    #[must_use]
    pub fn target_path(&self) -> &str {
        &self.target_path
    }

    /// Declared sources, in order.
    #[must_use]
    pub fn sources(&self) -> &[SourceSpec] {
        &self.sources
    }

    /// Mode, if set.
    #[must_use]
    pub fn mode_override(&self) -> Option<BindingMode> {
        self.mode
    }

    fn flags(&self, config: &BindingConfig) -> ObserverFlags {
        let mut flags = config.observer_flags();
        if let Some(optional) = self.optional {
            flags.set(ObserverFlags::OPTIONAL, optional);
        }
        flags
    }

    fn observer(
        &self,
        manager: &BindingManager,
        root: &Value,
        path: MemberPath,
        flags: ObserverFlags,
    ) -> Rc<dyn MemberPathObserver> {
        let mut request = ObserverRequest::new(root.clone(), path).flags(flags);
        if let Some(trigger) = &self.trigger {
            request = request.trigger(trigger);
        }
        create_observer(request, manager.provider())
    }

    fn source(&self, manager: &BindingManager, root: &Value, flags: ObserverFlags) -> BindResult<BindingSource> {
        let parameter = |spec: &SourceSpec| -> BindResult<SourceParameter> {
            Ok(match spec {
                SourceSpec::Path(raw) => {
                    let path = manager.parse_path(raw)?;
                    SourceParameter::Observer(self.observer(manager, root, path, flags))
                }
                SourceSpec::Constant(value) => SourceParameter::Constant(value.clone()),
            })
        };
        match (self.sources.as_slice(), &self.formatter) {
            ([], None) => Ok(BindingSource::observer(self.observer(
                manager,
                root,
                MemberPath::empty(),
                flags,
            ))),
            ([single], None) => parameter(single).map(BindingSource::Single),
            (_, None) => Err(BindingError::Custom(
                "a binding with several sources needs a value formatter".to_owned(),
            )),
            (specs, Some(formatter)) => {
                let parameters = specs.iter().map(parameter).collect::<BindResult<Vec<_>>>()?;
                Ok(BindingSource::multi(parameters, Rc::clone(formatter)))
            }
        }
    }

    /// Build the binding without attaching it.
    pub(crate) fn create(&self, manager: &BindingManager, target: &Value, source: &Value) -> Rc<dyn Binding> {
        let config = manager.config();
        let flags = self.flags(config);
        let target_flags = flags | ObserverFlags::WEAK_TARGET;

        let target_path = match manager.parse_path(&self.target_path) {
            Ok(path) => path,
            Err(error) => {
                let observer = self.observer(manager, target, MemberPath::empty(), target_flags);
                let raw = Rc::from(self.target_path.trim());
                return InvalidBinding::with_target_path(observer, raw, error);
            }
        };
        let target_observer = self.observer(manager, target, target_path, target_flags);
        let source = match self.source(manager, source, flags) {
            Ok(source) => source,
            Err(error) => return InvalidBinding::new(target_observer, error),
        };

        let binding = DataBinding::new(target_observer, source);
        binding.set_equality_check(self.equality_check.unwrap_or(config.equality_check));
        binding.add_component(self.mode.unwrap_or(config.default_mode).component());
        if let Some((converter, parameter)) = &self.converter {
            binding.add_component(ConverterInterceptor::new(Rc::clone(converter), parameter.clone()));
        }
        let execution = self.execution_mode.unwrap_or(config.execution_mode);
        if execution != ExecutionMode::Current {
            match manager.dispatcher() {
                Some(dispatcher) => {
                    binding.add_component(DispatchComponent::new(execution, dispatcher));
                }
                None => {
                    tracing::debug!(?execution, "no dispatcher configured; reactions run inline");
                }
            }
        }
        for component in &self.components {
            binding.components().add_dyn(&binding, Rc::clone(component));
        }
        binding.add_component(ManagerLifecycleRelay::new(manager.weak()));
        binding
    }
}

impl fmt::Debug for BindingBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingBuilder")
            .field("target_path", &self.target_path)
            .field("sources", &self.sources)
            .field("mode", &self.mode)
            .field("has_formatter", &self.formatter.is_some())
            .field("components", &self.components.len())
            .finish_non_exhaustive()
    }
}
