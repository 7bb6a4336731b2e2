#![no_main]

use std::rc::Rc;

use arbitrary::Arbitrary;
use fbind_core::{MemberProvider, MemberRegistry, PropertyBag, Value};
use fbind_runtime::{Binding, BindingManager};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    expression: String,
    writes: Vec<(String, i64)>,
}

fuzz_target!(|input: Input| {
    let provider: Rc<dyn MemberProvider> = Rc::new(MemberRegistry::new());
    let manager = BindingManager::new(provider);
    let inner = PropertyBag::from_pairs([("Name", "Ann")]);
    let model = PropertyBag::from_pairs([("Owner", inner.to_value()), ("Count", Value::Int(1))]);
    let view = PropertyBag::new();

    let Ok(bindings) = manager.bind(&input.expression.as_str(), &view.to_value(), &model.to_value(), None)
    else {
        return;
    };
    for (name, value) in input.writes.iter().take(16) {
        view.set(name, *value);
        model.set(name, *value);
    }
    for binding in &bindings {
        let _ = binding.update_target();
        let _ = binding.update_source();
        binding.dispose();
    }
    assert!(manager.get_bindings(&view.to_value(), None, None).is_empty());
});
