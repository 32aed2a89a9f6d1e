#![doc = r"Core runtime for weft: function components, hooks, keyed reconciliation, a cooperative scheduler and context cells."]

//! A [`Component`] is a `static` render function. Rendering it inside a
//! [`Root`] produces a persistent tree of [`InstanceNode`]s whose hook slots
//! survive across renders. State setters and context writes enqueue nodes on
//! the [`Scheduler`], and [`Scheduler::drain`] re-renders them and runs their
//! effects.

pub extern crate self as weft_core;

pub mod collections;
mod context;
pub mod debug;
mod deps;
mod descriptor;
mod diagnostics;
mod effect;
mod error;
mod hook_context;
mod hook_storage;
mod hooks;
mod node;
mod owned;
pub mod platform;
mod props;
mod reconcile;
mod root;
mod scheduler;
mod services;

pub use context::{ContextCell, ContextToken, PROVIDER};
pub use debug::{dump_tree, RenderTrace, TraceEvent};
pub use deps::Deps;
pub use descriptor::{Component, Descriptor, DescriptorBuilder, Output, RenderFn};
pub use diagnostics::Diagnostic;
pub use effect::{Cleanup, LocalFuture};
pub use error::{HookError, RenderError, ServiceError};
pub use hook_context::{current_node, current_phase, Phase};
pub use hooks::{
    spawn_local, use_async_effect, use_callback, use_context, use_effect, use_memo, use_reducer,
    use_reducer_with, use_ref, use_service, use_state, use_state_with, Dispatch, EffectScope,
    ReducerOptions, SetState,
};
pub use node::{InstanceNode, NodeId, WeakNode};
pub use owned::Owned;
pub use platform::RuntimeScheduler;
pub use props::{Callback, Key, PropValue, Props};
pub use reconcile::IdentityKey;
pub use root::Root;
pub use scheduler::{
    DrainReport, Dispatcher, IdleSignal, ManualScheduler, Port, Scheduler, SchedulerConfig,
    SchedulerHandle, TaskHandle,
};
pub use services::ServiceRegistry;

#[cfg(test)]
#[path = "tests/hooks_tests.rs"]
mod hooks_tests;

#[cfg(test)]
#[path = "tests/reconcile_tests.rs"]
mod reconcile_tests;

#[cfg(test)]
#[path = "tests/scheduler_tests.rs"]
mod scheduler_tests;

#[cfg(test)]
#[path = "tests/context_tests.rs"]
mod context_tests;

#[cfg(test)]
#[path = "tests/effect_tests.rs"]
mod effect_tests;

#[doc(hidden)]
pub mod __private {
    use crate::{Output, RenderError};

    pub fn into_render_result<T, E>(result: Result<T, E>) -> Result<Output, RenderError>
    where
        T: Into<Output>,
        E: Into<RenderError>,
    {
        result.map(Into::into).map_err(Into::into)
    }
}
