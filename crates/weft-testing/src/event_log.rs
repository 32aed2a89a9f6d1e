use std::cell::RefCell;
use std::rc::Rc;

use weft_core::{use_service, HookError};

/// Name under which [`use_event_log`] registers the log.
pub const EVENT_LOG_SERVICE: &str = "weft.testing.event_log";

/// Ordered record of what components did, shared through the root's services.
#[derive(Default, Debug)]
pub struct EventLog {
    entries: RefCell<Vec<String>>,
}

impl EventLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    /// Returns everything recorded so far and starts over.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

/// The root's [`EventLog`]. Usable during render and from effects.
pub fn use_event_log() -> Result<Rc<EventLog>, HookError> {
    use_service(EVENT_LOG_SERVICE, EventLog::default)
}
