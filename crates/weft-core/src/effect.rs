use std::fmt;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;

use crate::diagnostics::{panic_message, Diagnostic};
use crate::node::InstanceNode;

/// Boxed single-threaded future driven by the scheduler.
pub type LocalFuture = Pin<Box<dyn Future<Output = ()>>>;

/// What an effect leaves behind for its next run or for unmount.
#[derive(Default)]
pub enum Cleanup {
    #[default]
    None,
    Sync(Box<dyn FnOnce()>),
    /// Produces a future that is spawned on the scheduler and not awaited.
    Async(Box<dyn FnOnce() -> LocalFuture>),
}

impl Cleanup {
    pub fn none() -> Self {
        Cleanup::None
    }

    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Cleanup::Sync(Box::new(f))
    }

    pub fn from_async<F, Fut>(f: F) -> Self
    where
        F: FnOnce() -> Fut + 'static,
        Fut: Future<Output = ()> + 'static,
    {
        Cleanup::Async(Box::new(move || Box::pin(f()) as LocalFuture))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Cleanup::None)
    }
}

impl From<()> for Cleanup {
    fn from(_: ()) -> Self {
        Cleanup::None
    }
}

impl From<Option<Cleanup>> for Cleanup {
    fn from(cleanup: Option<Cleanup>) -> Self {
        cleanup.unwrap_or_default()
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Cleanup::None => "Cleanup::None",
            Cleanup::Sync(_) => "Cleanup::Sync",
            Cleanup::Async(_) => "Cleanup::Async",
        })
    }
}

/// Effect queued by the render that scheduled it; runs after the subtree commits.
pub(crate) struct PendingEffect {
    pub(crate) slot: usize,
    pub(crate) run: Box<dyn FnOnce() -> Cleanup>,
}

/// Runs a cleanup, swallowing panics into diagnostics.
pub(crate) fn run_cleanup(cleanup: Cleanup, node: &InstanceNode, slot: usize) {
    let outcome = match cleanup {
        Cleanup::None => return,
        Cleanup::Sync(f) => catch_unwind(AssertUnwindSafe(f)),
        Cleanup::Async(make) => catch_unwind(AssertUnwindSafe(make)).map(|future| {
            if node.scheduler().spawn_local(future).is_none() {
                log::debug!(
                    "dropping async cleanup of <{}>: scheduler is gone",
                    node.name()
                );
            }
        }),
    };
    if let Err(payload) = outcome {
        node.scheduler().report(Diagnostic::CleanupPanicked {
            component: node.name(),
            slot,
            message: panic_message(payload.as_ref()),
        });
    }
}
