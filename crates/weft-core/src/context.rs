use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::collections::map::HashMap;
use crate::descriptor::{Component, Descriptor, Output};
use crate::error::{HookError, RenderError};
use crate::hooks;
use crate::node::{InstanceNode, NodeId, WeakNode};
use crate::props::{PropValue, Props};

static NEXT_CELL_ID: AtomicUsize = AtomicUsize::new(1);

/// An ambient value shared down the tree without threading props.
///
/// The cell holds the value visible to whoever reads it right now. Providers
/// overwrite it while their subtree renders and restore it afterwards, so the
/// nearest enclosing provider wins. Readers subscribe through
/// [`crate::use_context`] and are re-rendered when a write changes the value.
pub struct ContextCell<T> {
    inner: Rc<CellInner<T>>,
}

struct CellInner<T> {
    id: usize,
    name: &'static str,
    value: RefCell<T>,
    subscribers: RefCell<HashMap<NodeId, WeakNode>>,
}

impl<T> Clone for ContextCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + 'static> ContextCell<T> {
    pub fn new(default: T) -> Self {
        Self::named("context", default)
    }

    pub fn named(name: &'static str, default: T) -> Self {
        Self {
            inner: Rc::new(CellInner {
                id: NEXT_CELL_ID.fetch_add(1, Ordering::Relaxed),
                name,
                value: RefCell::new(default),
                subscribers: RefCell::new(HashMap::default()),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn get(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Replaces the value and notifies every subscriber.
    pub fn write(&self, value: T) -> ContextToken<T> {
        let previous = self.inner.value.replace(value);
        self.notify_subscribers();
        ContextToken {
            cell: self.inner.id,
            previous,
        }
    }

    /// Puts back the value a [`ContextCell::write`] replaced. Does not notify.
    pub fn restore(&self, token: ContextToken<T>) {
        debug_assert_eq!(
            token.cell, self.inner.id,
            "context token restored into a different cell"
        );
        *self.inner.value.borrow_mut() = token.previous;
    }

    /// Descriptor that makes `value` visible to `children` during their render.
    pub fn provider(&self, value: T, children: impl Into<Output>) -> Descriptor {
        let scope: Rc<dyn ProvideScope> = Rc::new(Provided {
            cell: self.clone(),
            value,
        });
        let children: Output = children.into();
        PROVIDER
            .el()
            .prop(PROVIDED_PROP, PropValue::shared(ProvidedValue(scope)))
            .children(children)
            .build()
    }

    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.inner.subscribers.borrow_mut();
        subscribers.retain(|_, node| node.upgrade().is_some_and(|node| node.is_mounted()));
        subscribers.len()
    }

    pub(crate) fn subscribe(&self, node: &InstanceNode) {
        let fresh = self
            .inner
            .subscribers
            .borrow_mut()
            .insert(node.id(), node.downgrade())
            .is_none();
        if fresh {
            let subscription: Rc<dyn Subscription> = self.inner.clone();
            node.record_subscription(self.inner.id, Rc::downgrade(&subscription));
        }
    }

    pub(crate) fn notify_subscribers(&self) {
        let nodes: Vec<InstanceNode> = self
            .inner
            .subscribers
            .borrow()
            .values()
            .filter_map(WeakNode::upgrade)
            .collect();
        log::trace!(
            "context `{}` changed; notifying {} subscribers",
            self.inner.name,
            nodes.len()
        );
        for node in nodes {
            node.schedule_render();
        }
    }

    pub(crate) fn scoped(&self) -> Rc<dyn ScopedCell> {
        self.inner.clone()
    }
}

impl<T: fmt::Debug> fmt::Debug for ContextCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextCell")
            .field("name", &self.inner.name)
            .field("value", &self.inner.value.borrow())
            .finish()
    }
}

/// Proof of a [`ContextCell::write`], holding the value it replaced.
#[must_use = "restore the token to undo the write"]
pub struct ContextToken<T> {
    cell: usize,
    previous: T,
}

impl<T> ContextToken<T> {
    pub fn previous(&self) -> &T {
        &self.previous
    }
}

pub(crate) trait Subscription {
    fn unsubscribe(&self, node: NodeId);
}

impl<T> Subscription for CellInner<T> {
    fn unsubscribe(&self, node: NodeId) {
        self.subscribers.borrow_mut().remove(&node);
    }
}

/// Type-erased access a scope frame needs to swap a cell's value.
pub(crate) trait ScopedCell {
    /// Installs `value`, returning the displaced one.
    fn enter(&self, value: &Rc<dyn Any>) -> Option<Box<dyn Any>>;
    fn exit(&self, previous: Box<dyn Any>);
}

impl<T: Clone + 'static> ScopedCell for CellInner<T> {
    fn enter(&self, value: &Rc<dyn Any>) -> Option<Box<dyn Any>> {
        let value = value.downcast_ref::<T>()?;
        Some(Box::new(self.value.replace(value.clone())))
    }

    fn exit(&self, previous: Box<dyn Any>) {
        if let Ok(previous) = previous.downcast::<T>() {
            *self.value.borrow_mut() = *previous;
        }
    }
}

/// Who pushed a frame: a provider during its own render, or a node restoring
/// its captured ancestry before being rendered on its own.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum FrameOwner {
    Provider(NodeId),
    Restore(NodeId),
}

/// A provided value captured for replay.
#[derive(Clone)]
pub(crate) struct ScopeEntry {
    cell: Rc<dyn ScopedCell>,
    value: Rc<dyn Any>,
}

struct ScopeFrame {
    entry: ScopeEntry,
    previous: Option<Box<dyn Any>>,
    owner: FrameOwner,
}

/// Stack of active provider frames, owned by the scheduler.
#[derive(Default)]
pub(crate) struct ScopeStack {
    frames: RefCell<Vec<ScopeFrame>>,
    pushes: Cell<u64>,
    pops: Cell<u64>,
}

impl ScopeStack {
    pub(crate) fn push(&self, cell: Rc<dyn ScopedCell>, value: Rc<dyn Any>, owner: FrameOwner) {
        self.push_entry(ScopeEntry { cell, value }, owner);
    }

    pub(crate) fn push_entry(&self, entry: ScopeEntry, owner: FrameOwner) {
        let previous = entry.cell.enter(&entry.value);
        self.frames.borrow_mut().push(ScopeFrame {
            entry,
            previous,
            owner,
        });
        self.pushes.set(self.pushes.get() + 1);
    }

    /// Pops the contiguous run of frames owned by `owner` at the top.
    pub(crate) fn pop_owned(&self, owner: FrameOwner) -> usize {
        let mut popped = 0;
        loop {
            let frame = {
                let mut frames = self.frames.borrow_mut();
                match frames.last() {
                    Some(frame) if frame.owner == owner => frames.pop(),
                    _ => None,
                }
            };
            let Some(frame) = frame else { break };
            if let Some(previous) = frame.previous {
                frame.entry.cell.exit(previous);
            }
            self.pops.set(self.pops.get() + 1);
            popped += 1;
        }
        popped
    }

    pub(crate) fn snapshot(&self) -> Vec<ScopeEntry> {
        self.frames
            .borrow()
            .iter()
            .map(|frame| frame.entry.clone())
            .collect()
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.borrow().len()
    }

    pub(crate) fn counters(&self) -> (u64, u64) {
        (self.pushes.get(), self.pops.get())
    }
}

/// Pops `owner`'s frames when dropped, including on early return.
pub(crate) struct ScopeExit<'a> {
    pub(crate) stack: &'a ScopeStack,
    pub(crate) owner: FrameOwner,
}

impl Drop for ScopeExit<'_> {
    fn drop(&mut self) {
        self.stack.pop_owned(self.owner);
    }
}

const PROVIDED_PROP: &str = "context";

trait ProvideScope {
    fn provide(&self) -> Result<(), HookError>;
}

struct Provided<T> {
    cell: ContextCell<T>,
    value: T,
}

impl<T: Clone + PartialEq + 'static> ProvideScope for Provided<T> {
    fn provide(&self) -> Result<(), HookError> {
        hooks::use_provider(&self.cell, self.value.clone())
    }
}

struct ProvidedValue(Rc<dyn ProvideScope>);

/// Shared component behind [`ContextCell::provider`].
pub static PROVIDER: Component = Component::new("Provider", render_provider);

fn render_provider(props: &Props) -> Result<Output, RenderError> {
    let provided = props
        .get_shared::<ProvidedValue>(PROVIDED_PROP)
        .ok_or_else(|| RenderError::msg("missing required prop `context`"))?;
    provided.0.provide()?;
    Ok(Output::from(props.children()))
}
