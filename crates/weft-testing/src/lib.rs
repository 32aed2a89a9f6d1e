//! Testing utilities and harness for weft

mod event_log;
mod test_root;

pub use event_log::{use_event_log, EventLog, EVENT_LOG_SERVICE};
pub use test_root::{TestRoot, TestScheduler};

pub mod prelude {
    pub use crate::event_log::{use_event_log, EventLog};
    pub use crate::test_root::{TestRoot, TestScheduler};
}
