//! Platform abstraction traits for the weft runtime.
//!
//! The core never blocks or spawns threads on its own. Whenever work becomes
//! available (a node is enqueued, a remote message is posted, or a local task
//! is woken) it asks the host to run a drain pass through [`RuntimeScheduler`].

/// Schedules drain passes for the weft runtime.
///
/// Implementations must be safe to call from any thread: wakers of local
/// tasks and [`crate::Dispatcher`] posts invoke it off the scheduler thread.
pub trait RuntimeScheduler: Send + Sync {
    /// Request that the host run [`crate::Scheduler::drain`] soon.
    fn schedule_drain(&self);
}
