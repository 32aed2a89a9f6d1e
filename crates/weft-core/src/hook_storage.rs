use std::any::Any;

use crate::deps::Deps;
use crate::effect::Cleanup;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum HookKind {
    State,
    Reducer,
    Memo,
    Callback,
    Ref,
    Context,
    Provider,
}

pub(crate) struct EffectSlot {
    pub(crate) deps: Option<Deps>,
    pub(crate) cleanup: Option<Cleanup>,
}

pub(crate) enum HookSlot {
    Value { kind: HookKind, value: Box<dyn Any> },
    Effect(EffectSlot),
}

impl HookSlot {
    pub(crate) fn value(kind: HookKind, value: impl Any) -> Self {
        HookSlot::Value {
            kind,
            value: Box::new(value),
        }
    }
}

/// Ordered per-node hook slots, addressed by call order within a render.
#[derive(Default)]
pub(crate) struct HookStorage {
    slots: Vec<HookSlot>,
    cursor: usize,
}

impl HookStorage {
    pub(crate) fn begin(&mut self) {
        self.cursor = 0;
    }

    pub(crate) fn advance(&mut self) -> usize {
        let index = self.cursor;
        self.cursor += 1;
        index
    }

    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn push(&mut self, slot: HookSlot) -> usize {
        self.slots.push(slot);
        self.slots.len() - 1
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut HookSlot> {
        self.slots.get_mut(index)
    }

    /// Detaches every pending cleanup in slot order.
    pub(crate) fn take_cleanups(&mut self) -> Vec<(usize, Cleanup)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                HookSlot::Effect(effect) => effect.cleanup.take().map(|cleanup| (index, cleanup)),
                HookSlot::Value { .. } => None,
            })
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.cursor = 0;
    }
}
