//! Standard runtime services backed by Rust's `std` library.
//!
//! [`StdScheduler`] implements [`weft_core::RuntimeScheduler`] by recording
//! drain requests and invoking an optional waker, so a host loop can sleep
//! until there is work. [`StdRuntime`] bundles it with a
//! [`weft_core::Scheduler`], and [`AppRunner`] owns a whole application on a
//! dedicated render thread.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use weft_core::{DrainReport, RenderError, RuntimeScheduler, Scheduler, SchedulerConfig};

mod runner;

pub use runner::{AppRunner, RunnerConfig, RunnerError};

type DrainHook = Arc<dyn Fn() + Send + Sync + 'static>;

/// Host side of a [`Scheduler`] for ordinary threads.
///
/// `schedule_drain` may be called from any thread (ports, dispatchers and
/// wakers all end up here). It raises a flag that the render loop consumes
/// with [`StdScheduler::take_drain_request`] and then pokes the registered
/// waker, typically one that unparks the render thread.
#[derive(Default)]
pub struct StdScheduler {
    requested: AtomicBool,
    waker: RwLock<Option<DrainHook>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the pending drain request, if any.
    pub fn take_drain_request(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }

    pub fn is_drain_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Replaces the waker. A request raised before this call is not replayed;
    /// check [`StdScheduler::take_drain_request`] after installing it.
    pub fn set_drain_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.replace_waker(Some(Arc::new(waker)));
    }

    pub fn clear_drain_waker(&self) {
        self.replace_waker(None);
    }

    fn replace_waker(&self, waker: Option<DrainHook>) {
        *self.waker.write().unwrap_or_else(PoisonError::into_inner) = waker;
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let has_waker = self
            .waker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        f.debug_struct("StdScheduler")
            .field("requested", &self.is_drain_requested())
            .field("has_waker", &has_waker)
            .finish()
    }
}

impl RuntimeScheduler for StdScheduler {
    fn schedule_drain(&self) {
        self.requested.store(true, Ordering::SeqCst);
        // The waker runs outside the lock.
        let waker = self
            .waker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

/// A [`Scheduler`] wired to a [`StdScheduler`].
///
/// Not `Send`: create it on the render thread and hand other threads the
/// [`StdRuntime::platform`] or a dispatcher instead.
#[derive(Clone)]
pub struct StdRuntime {
    platform: Arc<StdScheduler>,
    scheduler: Scheduler,
}

impl StdRuntime {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        let platform = Arc::new(StdScheduler::default());
        let scheduler = Scheduler::with_config(platform.clone(), config);
        Self {
            platform,
            scheduler,
        }
    }

    pub fn scheduler(&self) -> Scheduler {
        self.scheduler.clone()
    }

    pub fn platform(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.platform)
    }

    pub fn take_drain_request(&self) -> bool {
        self.platform.take_drain_request()
    }

    pub fn set_drain_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.platform.set_drain_waker(waker);
    }

    pub fn clear_drain_waker(&self) {
        self.platform.clear_drain_waker();
    }

    /// One iteration of a polling host loop: drains when asked to or when
    /// renders are still queued, otherwise does nothing.
    pub fn drain_if_requested(&self) -> Result<Option<DrainReport>, RenderError> {
        if !self.take_drain_request() && !self.scheduler.has_pending() {
            return Ok(None);
        }
        self.scheduler.drain().map(Some)
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("platform", &self.platform)
            .field("queued", &self.scheduler.queue_len())
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "tests/std_runtime_tests.rs"]
mod tests;
