use std::cell::{Cell, RefCell};

use weft_core::{deps, use_effect, use_service, Callback, Cleanup, HookError, Root};

/// Service name of the app's [`InputBus`].
pub const INPUT_BUS: &str = "terminal.input";

/// Fans terminal lines out to every subscribed component.
#[derive(Default)]
pub struct InputBus {
    next_id: Cell<u64>,
    subscribers: RefCell<Vec<(u64, Callback<String>)>>,
}

impl InputBus {
    pub fn subscribe(&self, callback: Callback<String>) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.subscribers.borrow_mut().push((id, callback));
        id
    }

    pub fn unsubscribe(&self, id: u64) {
        self.subscribers.borrow_mut().retain(|(own, _)| *own != id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Delivers `line` to every subscriber and returns how many received it.
    pub fn publish(&self, line: &str) -> usize {
        // Handlers may subscribe or unsubscribe while we iterate.
        let subscribers = self.subscribers.borrow().clone();
        for (_, callback) in &subscribers {
            callback.call(line.to_string());
        }
        subscribers.len()
    }
}

/// Calls `handler` with every line published while the component is mounted.
pub fn use_input(handler: impl Fn(String) + 'static) -> Result<(), HookError> {
    let bus = use_service(INPUT_BUS, InputBus::default)?;
    use_effect(deps![], move || {
        let id = bus.subscribe(Callback::new(handler));
        Cleanup::new(move || bus.unsubscribe(id))
    })
}

/// Publishes `line` on the root's bus. Returns `0` if nothing subscribed yet.
pub fn publish_line(root: &Root, line: &str) -> usize {
    match root.services().get::<InputBus>(INPUT_BUS) {
        Ok(Some(bus)) => bus.publish(line),
        Ok(None) => 0,
        Err(err) => {
            log::warn!("input bus unavailable: {err}");
            0
        }
    }
}
