use std::cell::RefCell;
use std::rc::Rc;

use fbind_core::{
    BindResult, BindingError, Component, ExecutionMode, MemberProvider, MemberRegistry, Metadata,
    PropertyBag, QueueDispatcher, Registrar, ThreadDispatcher, Value,
};

use super::*;
use crate::binding::{BindingMode, BindingState, InvalidBinding};
use crate::config::BindingConfig;

fn provider() -> Rc<dyn MemberProvider> {
    Rc::new(MemberRegistry::new())
}

fn view_model() -> (Rc<PropertyBag>, Rc<PropertyBag>) {
    let view = PropertyBag::new();
    let model = PropertyBag::from_pairs([("Name", "Ann"), ("Age", "7")]);
    (view, model)
}

#[test]
fn text_expression_builds_live_bindings() {
    let manager = BindingManager::new(provider());
    let (view, model) = view_model();
    let bindings = manager
        .bind(&"Text = Name, Mode=TwoWay; Label = 'fixed'", &view.to_value(), &model.to_value(), None)
        .unwrap();
    assert_eq!(bindings.len(), 2);
    assert!(bindings.iter().all(|b| b.state() == BindingState::Attached));
    assert_eq!(view.get("Text"), Some(Value::from("Ann")));
    assert_eq!(view.get("Label"), Some(Value::from("fixed")));

    view.set("Text", "Bea");
    assert_eq!(model.get("Name"), Some(Value::from("Bea")));
}

#[test]
fn builders_pass_through() {
    let manager = BindingManager::new(provider());
    let (view, model) = view_model();
    let builder = BindingBuilder::new("Text").source_path("Age");
    let builders = manager.try_parse_binding_expression(&builder, None).unwrap();
    assert_eq!(builders.len(), 1);
    let binding = manager.build(&builders[0], &view.to_value(), &model.to_value(), None);
    assert_eq!(view.get("Text"), Some(Value::from("7")));
    assert_eq!(binding.target().path().path(), "Text");
}

#[test]
fn unknown_expressions_are_rejected() {
    let manager = BindingManager::empty(provider(), BindingConfig::default());
    let err = manager.try_parse_binding_expression(&"Text = Name", None).unwrap_err();
    assert!(matches!(err, BindingError::UnsupportedExpression(_)));

    let manager = BindingManager::new(provider());
    assert!(manager.try_parse_binding_expression(&3.5_f64, None).is_err());
}

#[test]
fn bad_paths_become_invalid_bindings() {
    let manager = BindingManager::new(provider());
    let (view, model) = view_model();
    let bindings = manager
        .bind(&"Text = Owner..Name", &view.to_value(), &model.to_value(), None)
        .unwrap();
    let binding = &bindings[0];
    let first = binding.update_target().unwrap_err();
    assert!(first.is_format());
    assert_eq!(binding.update_target().unwrap_err(), first);
    assert_eq!(binding.update_source().unwrap_err(), first);

    let broken_target = manager.build(
        &BindingBuilder::new("Items[").source_path("Name"),
        &view.to_value(),
        &model.to_value(),
        None,
    );
    assert!(broken_target.update_target().unwrap_err().is_format());
}

#[test]
fn invalid_targets_are_held_under_the_path_as_written() {
    let manager = BindingManager::new(provider());
    let (view, model) = view_model();
    let build = |path: &str| {
        manager.build(
            &BindingBuilder::new(path).source_path("Name"),
            &view.to_value(),
            &model.to_value(),
            None,
        )
    };
    let items = build("Items[");
    let rows = build("Rows[");
    assert_eq!(items.target_path(), "Items[");

    // Different unparsable paths do not replace each other.
    assert_eq!(items.state(), BindingState::Attached);
    let found = manager.get_bindings(&view.to_value(), Some("Items["), None);
    assert_eq!(found.len(), 1);
    assert!(std::ptr::addr_eq(Rc::as_ptr(&found[0]), Rc::as_ptr(&items)));
    assert_eq!(manager.get_bindings(&view.to_value(), Some("Rows["), None).len(), 1);
    assert!(manager.get_bindings(&view.to_value(), Some(""), None).is_empty());

    // The same unparsable path does.
    let again = build("Rows[");
    assert_eq!(rows.state(), BindingState::Disposed);
    assert_eq!(again.state(), BindingState::Attached);
    assert_eq!(manager.get_bindings(&view.to_value(), None, None).len(), 2);
}

#[test]
fn several_sources_need_a_formatter() {
    let manager = BindingManager::new(provider());
    let (view, model) = view_model();
    let builder = BindingBuilder::new("Text").source_path("Name").source_path("Age");
    let binding = manager.build(&builder, &view.to_value(), &model.to_value(), None);
    assert!(matches!(binding.update_target(), Err(BindingError::Custom(_))));

    let join = |values: &[Value]| -> BindResult<Value> {
        Ok(Value::from(format!(
            "{} ({})",
            values[0].as_str().unwrap_or_default(),
            values[1].as_str().unwrap_or_default()
        )))
    };
    let builder = builder.formatter(Rc::new(join));
    manager.build(&builder, &view.to_value(), &model.to_value(), None);
    assert_eq!(view.get("Text"), Some(Value::from("Ann (7)")));
    model.set("Age", "8");
    assert_eq!(view.get("Text"), Some(Value::from("Ann (8)")));
}

#[test]
fn holders_index_by_target_and_path() {
    let manager = BindingManager::new(provider());
    let (view, model) = view_model();
    let other = PropertyBag::new();
    manager
        .bind(&"Text = Name; Title = Age", &view.to_value(), &model.to_value(), None)
        .unwrap();
    manager
        .bind(&"Text = Name", &other.to_value(), &model.to_value(), None)
        .unwrap();

    assert_eq!(manager.get_bindings(&view.to_value(), None, None).len(), 2);
    let titles = manager.get_bindings(&view.to_value(), Some("Title"), None);
    assert_eq!(titles.len(), 1);
    assert_eq!(titles[0].target().path().path(), "Title");
    assert_eq!(manager.get_bindings(&other.to_value(), None, None).len(), 1);
    assert!(manager.get_bindings(&Value::Int(1), None, None).is_empty());
}

#[test]
fn same_target_and_path_replaces_previous_binding() {
    let manager = BindingManager::new(provider());
    let (view, model) = view_model();
    let first = manager.bind(&"Text = Name", &view.to_value(), &model.to_value(), None).unwrap();
    let second = manager.bind(&"Text = Age", &view.to_value(), &model.to_value(), None).unwrap();
    assert_eq!(first[0].state(), BindingState::Disposed);
    assert_eq!(view.get("Text"), Some(Value::from("7")));

    model.set("Name", "Bea");
    assert_eq!(view.get("Text"), Some(Value::from("7")));
    let held = manager.get_bindings(&view.to_value(), Some("Text"), None);
    assert_eq!(held.len(), 1);
    assert!(std::ptr::addr_eq(Rc::as_ptr(&held[0]), Rc::as_ptr(&second[0])));
}

#[test]
fn replacement_can_be_disabled() {
    let config = BindingConfig::default().with_replace_existing(false);
    let manager = BindingManager::with_config(provider(), config);
    let (view, model) = view_model();
    let first = manager.bind(&"Text = Name", &view.to_value(), &model.to_value(), None).unwrap();
    manager.bind(&"Text = Age", &view.to_value(), &model.to_value(), None).unwrap();
    assert_eq!(first[0].state(), BindingState::Attached);
    assert_eq!(manager.get_bindings(&view.to_value(), Some("Text"), None).len(), 2);
}

#[test]
fn disposal_unregisters_through_the_relay() {
    let manager = BindingManager::new(provider());
    let (view, model) = view_model();
    let bindings = manager.bind(&"Text = Name", &view.to_value(), &model.to_value(), None).unwrap();
    bindings[0].dispose();
    assert!(manager.get_bindings(&view.to_value(), None, None).is_empty());
}

#[test]
fn dropped_targets_are_purged() {
    let manager = BindingManager::new(provider());
    let model = PropertyBag::from_pairs([("Name", "Ann")]);
    let view = PropertyBag::new();
    let bindings = manager.bind(&"Text = Name", &view.to_value(), &model.to_value(), None).unwrap();
    let binding = Rc::clone(&bindings[0]);
    drop(bindings);
    assert_eq!(model.listener_count(), 1);

    drop(view);
    let other = PropertyBag::new();
    assert!(manager.get_bindings(&other.to_value(), None, None).is_empty());
    assert_eq!(binding.state(), BindingState::Disposed);
    assert_eq!(model.listener_count(), 0);
}

#[test]
fn lifecycle_listeners_see_every_event() {
    #[derive(Default)]
    struct Log(RefCell<Vec<(String, BindingLifecycleState, Option<Value>)>>);
    impl BindingLifecycleListener for Log {
        fn on_lifecycle_changed(
            &self,
            _manager: &BindingManager,
            binding: &Rc<dyn Binding>,
            state: BindingLifecycleState,
            extra: Option<&Value>,
            _metadata: Option<&Metadata>,
        ) {
            self.0
                .borrow_mut()
                .push((binding.target().path().path().to_owned(), state, extra.cloned()));
        }
    }
    impl Component<BindingManager> for Log {
        fn register(self: Rc<Self>, registrar: &mut Registrar) {
            registrar.provide::<dyn BindingLifecycleListener>(self);
        }
    }

    let manager = BindingManager::new(provider());
    let log = Rc::new(Log::default());
    manager.components().add(&manager, Rc::clone(&log));
    let (view, model) = view_model();
    let bindings = manager.bind(&"Text = Name", &view.to_value(), &model.to_value(), None).unwrap();
    manager.on_lifecycle_changed(&bindings[0], BindingLifecycleState::Initialized, Some(&Value::Int(1)), None);
    bindings[0].dispose();

    let log = log.0.borrow();
    assert_eq!(log.len(), 3);
    assert_eq!(log[0], ("Text".to_owned(), BindingLifecycleState::Initialized, None));
    assert_eq!(log[1].2, Some(Value::Int(1)));
    assert_eq!(log[2].1, BindingLifecycleState::Disposed);
}

#[test]
fn external_holders_get_registrations() {
    #[derive(Default)]
    struct Counting(RefCell<Vec<Rc<dyn Binding>>>);
    impl BindingHolder for Counting {
        fn try_register(&self, binding: &Rc<dyn Binding>, _metadata: Option<&Metadata>) -> bool {
            self.0.borrow_mut().push(Rc::clone(binding));
            true
        }
        fn try_unregister(&self, binding: &Rc<dyn Binding>, _metadata: Option<&Metadata>) -> bool {
            let mut held = self.0.borrow_mut();
            let before = held.len();
            held.retain(|b| !std::ptr::addr_eq(Rc::as_ptr(b), Rc::as_ptr(binding)));
            held.len() != before
        }
        fn try_get_bindings(&self, _target: &Value, _path: Option<&str>, _metadata: Option<&Metadata>) -> Vec<Rc<dyn Binding>> {
            self.0.borrow().clone()
        }
    }
    impl Component<BindingManager> for Counting {
        fn register(self: Rc<Self>, registrar: &mut Registrar) {
            registrar.provide::<dyn BindingHolder>(self);
        }
    }

    let manager = BindingManager::new(provider());
    let counting = Rc::new(Counting::default());
    manager.components().add(&manager, Rc::clone(&counting));
    let (view, model) = view_model();
    let bindings = manager.bind(&"Text = Name", &view.to_value(), &model.to_value(), None).unwrap();
    assert_eq!(counting.0.borrow().len(), 1);
    // Both holders report the same binding; the merge keeps one.
    assert_eq!(manager.get_bindings(&view.to_value(), None, None).len(), 1);
    bindings[0].dispose();
    assert!(counting.0.borrow().is_empty());
}

#[test]
fn config_defaults_reach_builders() {
    let config = BindingConfig::default()
        .with_default_mode(BindingMode::TwoWay)
        .with_execution_mode(ExecutionMode::MainAsync);
    let manager = BindingManager::with_config(provider(), config);
    let dispatcher = Rc::new(QueueDispatcher::new());
    manager.set_dispatcher(Some(dispatcher.clone() as Rc<dyn ThreadDispatcher>));
    let (view, model) = view_model();
    manager.bind(&"Text = Name", &view.to_value(), &model.to_value(), None).unwrap();
    assert_eq!(view.get("Text"), Some(Value::from("Ann")));

    view.set("Text", "Bea");
    assert_eq!(model.get("Name"), Some(Value::from("Ann")));
    dispatcher.drain();
    assert_eq!(model.get("Name"), Some(Value::from("Bea")));
}

#[test]
fn optional_members_do_not_error() {
    use crate::binding::{BindingObserverListener, DataBinding, ObserverRole};

    struct Errors(RefCell<u32>);
    impl BindingObserverListener for Errors {
        fn on_observer_error(&self, _binding: &DataBinding, _role: ObserverRole, _error: &BindingError) {
            *self.0.borrow_mut() += 1;
        }
    }
    impl Component<DataBinding> for Errors {
        fn register(self: Rc<Self>, registrar: &mut Registrar) {
            registrar.provide::<dyn BindingObserverListener>(self);
        }
    }

    struct Plain;
    impl fbind_core::Object for Plain {}

    let manager = BindingManager::new(provider());
    let view = PropertyBag::new();
    let source = Value::object(Plain);
    let errors = Rc::new(Errors(RefCell::new(0)));
    let strict = BindingBuilder::new("Text")
        .source_path("Missing.Name")
        .component(errors.clone());
    manager.build(&strict, &view.to_value(), &source, None);
    assert_eq!(*errors.0.borrow(), 1);

    let lenient = BindingBuilder::new("Other")
        .source_path("Missing.Name")
        .optional(true)
        .component(errors.clone());
    manager.build(&lenient, &view.to_value(), &source, None);
    assert_eq!(*errors.0.borrow(), 1);
    assert!(!view.contains("Other"));
}

#[test]
fn invalid_bindings_are_held_too() {
    let manager = BindingManager::new(provider());
    let view = PropertyBag::new();
    let invalid: Rc<dyn Binding> = InvalidBinding::new(
        crate::observer::create_observer(
            crate::observer::ObserverRequest::new(view.to_value(), fbind_core::MemberPath::empty()),
            provider(),
        ),
        BindingError::Custom("broken".into()),
    );
    manager.on_lifecycle_changed(&invalid, BindingLifecycleState::Initialized, None, None);
    assert_eq!(manager.get_bindings(&view.to_value(), Some(""), None).len(), 1);
    manager.on_lifecycle_changed(&invalid, BindingLifecycleState::Disposed, None, None);
    assert!(manager.get_bindings(&view.to_value(), None, None).is_empty());
}
