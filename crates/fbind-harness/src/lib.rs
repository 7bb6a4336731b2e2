#![forbid(unsafe_code)]

//! Test harness and reference fixtures for FrankenBind.
//!
//! - [`counting`]: observable objects and a provider that count
//!   subscriptions, reads, and writes.
//! - [`recording`]: observer listeners and binding components that log
//!   every callback in order.
//! - [`trace`]: capture of `tracing` events for assertions on log output.
//!
//! The integration tests in `tests/` exercise the engine end to end through
//! these fixtures.

pub mod counting;
pub mod recording;
pub mod trace;

use std::rc::Rc;

use fbind_core::{BindResult, MemberPath, MemberProvider, Value};
use fbind_runtime::{
    BindingSource, DataBinding, MemberPathObserver, ObserverFlags, ObserverRequest,
    create_observer,
};

pub use counting::{CountingNode, CountingProvider, Probe, ProbeCounts};
pub use recording::{BindingEvent, BindingRecorder, ObserverEvent, RecordingListener};
pub use trace::{CaptureLayer, CapturedEvent, capture};

/// Observer for `path` over `root` with default flags.
pub fn observe(root: &Value, path: &str, provider: &Rc<dyn MemberProvider>) -> BindResult<Rc<dyn MemberPathObserver>> {
    observe_with(root, path, ObserverFlags::default(), provider)
}

/// Observer for `path` over `root` with `flags`.
pub fn observe_with(
    root: &Value,
    path: &str,
    flags: ObserverFlags,
    provider: &Rc<dyn MemberProvider>,
) -> BindResult<Rc<dyn MemberPathObserver>> {
    let path = MemberPath::parse(path)?;
    Ok(create_observer(
        ObserverRequest::new(root.clone(), path).flags(flags),
        Rc::clone(provider),
    ))
}

/// Unattached single-source binding from `source.source_path` to
/// `target.target_path`.
pub fn data_binding(
    target: &Value,
    target_path: &str,
    source: &Value,
    source_path: &str,
    provider: &Rc<dyn MemberProvider>,
) -> BindResult<Rc<DataBinding>> {
    Ok(DataBinding::new(
        observe(target, target_path, provider)?,
        BindingSource::observer(observe(source, source_path, provider)?),
    ))
}
