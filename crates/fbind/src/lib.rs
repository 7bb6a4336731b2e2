#![forbid(unsafe_code)]

//! FrankenBind public facade.
//!
//! Re-exports the member model from [`core`] and the observers, bindings,
//! and manager from [`runtime`]. Most applications only need the
//! [`prelude`].
//!
//! ```
//! use fbind::prelude::*;
//!
//! let manager = BindingManager::new(Rc::new(MemberRegistry::new()));
//! let model = PropertyBag::from_pairs([("Name", "Ann")]);
//! let view = PropertyBag::new();
//! manager
//!     .bind(&"Text = Name, Mode=TwoWay", &view.to_value(), &model.to_value(), None)
//!     .unwrap();
//! assert_eq!(view.get("Text"), Some(Value::from("Ann")));
//!
//! view.set("Text", "Bea");
//! assert_eq!(model.get("Name"), Some(Value::from("Bea")));
//! ```

pub use fbind_core as core;
pub use fbind_runtime as runtime;

pub use fbind_core::{BindResult, BindingError, MemberPath, Value};
pub use fbind_runtime::{Binding, BindingManager, BindingMode, BindingScope};

/// Everything needed to observe paths and build bindings.
pub mod prelude {
    pub use std::rc::Rc;

    pub use fbind_core::{
        BindResult, BindingError, Component, ExecutionMode, MemberPath, MemberProvider,
        MemberRegistry, Metadata, Object, ObservableList, PropertyBag, ThreadDispatcher, Value,
    };
    pub use fbind_runtime::{
        Binding, BindingBuilder, BindingConfig, BindingManager, BindingMode, BindingScope,
        BindingState, DataBinding, MemberPathObserver, MemberPathObserverListener, ObserverFlags,
        ObserverRequest, create_observer,
    };
}
