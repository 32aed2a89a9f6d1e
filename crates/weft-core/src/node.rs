use std::any::{type_name, Any};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::context::{FrameOwner, ScopeEntry, ScopeExit, Subscription};
use crate::descriptor::{Component, Descriptor, Output};
use crate::diagnostics::{panic_message, Diagnostic};
use crate::effect::{run_cleanup, Cleanup, PendingEffect};
use crate::error::{HookError, RenderError};
use crate::hook_context::{self, Phase};
use crate::hook_storage::{EffectSlot, HookKind, HookSlot, HookStorage};
use crate::props::{Key, Props};
use crate::reconcile;
use crate::scheduler::{Scheduler, SchedulerHandle};
use crate::services::ServiceRegistry;

pub type NodeId = usize;

static NEXT_NODE_ID: AtomicUsize = AtomicUsize::new(1);

pub(crate) struct NodeInner {
    id: NodeId,
    component: &'static Component,
    key: Option<Key>,
    depth: usize,
    props: RefCell<Props>,
    hooks: RefCell<HookStorage>,
    effects: RefCell<Vec<PendingEffect>>,
    children: RefCell<Vec<InstanceNode>>,
    mounted: Cell<bool>,
    rendering: Cell<bool>,
    render_count: Cell<u64>,
    subscriptions: RefCell<Vec<(usize, Weak<dyn Subscription>)>>,
    scope_snapshot: RefCell<Vec<ScopeEntry>>,
    scheduler: SchedulerHandle,
    services: Rc<ServiceRegistry>,
}

/// The persistent, stateful counterpart of a [`Descriptor`].
///
/// A node owns its hook slots and children for as long as reconciliation keeps
/// matching it. Handles are cheap to clone and compare by identity.
#[derive(Clone)]
pub struct InstanceNode {
    inner: Rc<NodeInner>,
}

/// Non-owning node handle held by setters, context cells and the render queue.
#[derive(Clone)]
pub struct WeakNode {
    inner: Weak<NodeInner>,
}

impl WeakNode {
    pub fn upgrade(&self) -> Option<InstanceNode> {
        self.inner.upgrade().map(|inner| InstanceNode { inner })
    }
}

impl fmt::Debug for WeakNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(node) => write!(f, "WeakNode({node:?})"),
            None => f.write_str("WeakNode(<dropped>)"),
        }
    }
}

struct RenderingFlag<'a>(&'a Cell<bool>);

impl Drop for RenderingFlag<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl InstanceNode {
    pub(crate) fn new(
        descriptor: Descriptor,
        scheduler: SchedulerHandle,
        services: Rc<ServiceRegistry>,
        depth: usize,
    ) -> Self {
        let (component, props, key) = descriptor.into_parts();
        Self {
            inner: Rc::new(NodeInner {
                id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
                component,
                key,
                depth,
                props: RefCell::new(props),
                hooks: RefCell::new(HookStorage::default()),
                effects: RefCell::new(Vec::new()),
                children: RefCell::new(Vec::new()),
                mounted: Cell::new(true),
                rendering: Cell::new(false),
                render_count: Cell::new(0),
                subscriptions: RefCell::new(Vec::new()),
                scope_snapshot: RefCell::new(Vec::new()),
                scheduler,
                services,
            }),
        }
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn component(&self) -> &'static Component {
        self.inner.component
    }

    pub fn name(&self) -> &'static str {
        self.inner.component.name()
    }

    pub fn key(&self) -> Option<&Key> {
        self.inner.key.as_ref()
    }

    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    pub fn props(&self) -> Props {
        self.inner.props.borrow().clone()
    }

    pub fn children(&self) -> Vec<InstanceNode> {
        self.inner.children.borrow().clone()
    }

    pub fn child_count(&self) -> usize {
        self.inner.children.borrow().len()
    }

    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.get()
    }

    pub fn is_rendering(&self) -> bool {
        self.inner.rendering.get()
    }

    pub fn render_count(&self) -> u64 {
        self.inner.render_count.get()
    }

    pub fn hook_count(&self) -> usize {
        self.inner.hooks.borrow().len()
    }

    pub fn pending_effect_count(&self) -> usize {
        self.inner.effects.borrow().len()
    }

    pub fn services(&self) -> Rc<ServiceRegistry> {
        Rc::clone(&self.inner.services)
    }

    pub fn scheduler(&self) -> SchedulerHandle {
        self.inner.scheduler.clone()
    }

    pub fn downgrade(&self) -> WeakNode {
        WeakNode {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn ptr_eq(&self, other: &InstanceNode) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Queues this node for re-render. Returns `false` once unmounted.
    pub fn schedule_render(&self) -> bool {
        self.is_mounted() && self.inner.scheduler.enqueue(self)
    }

    /// Renders this node and, recursively, its reconciled children.
    ///
    /// Effects are collected but not run; call [`InstanceNode::run_effects`]
    /// once the subtree has committed. Rendering an unmounted node is a no-op.
    /// Outside a render pass, a nested node replays the provider frames it
    /// saw under its parent.
    pub fn render(&self) -> Result<(), RenderError> {
        if self.inner.depth > 0 {
            if let Some(scheduler) = self.inner.scheduler.upgrade() {
                if scheduler.scopes().depth() == 0 {
                    return self.render_standalone(&scheduler);
                }
            }
        }
        self.render_in_scope()
    }

    /// Renders with whatever provider frames are active and records them for
    /// later standalone renders.
    fn render_in_scope(&self) -> Result<(), RenderError> {
        let inner = &self.inner;
        if !inner.mounted.get() {
            return Ok(());
        }
        if inner.rendering.replace(true) {
            return Err(RenderError::Reentrant {
                component: self.name(),
            });
        }
        let _rendering = RenderingFlag(&inner.rendering);
        let scheduler = inner.scheduler.upgrade();
        let _trace = scheduler.as_ref().map(|s| s.trace_enter(self));
        if let Some(scheduler) = &scheduler {
            *inner.scope_snapshot.borrow_mut() = scheduler.scopes().snapshot();
        }
        let _provided = scheduler.as_ref().map(|s| ScopeExit {
            stack: s.scopes(),
            owner: FrameOwner::Provider(inner.id),
        });

        let output = self.invoke_component()?;
        inner.render_count.set(inner.render_count.get() + 1);

        let previous = std::mem::take(&mut *inner.children.borrow_mut());
        let reconciled = reconcile::reconcile(self, previous, output.into_vec());
        *inner.children.borrow_mut() = reconciled.children.clone();
        for orphan in reconciled.orphans {
            orphan.unmount();
        }
        for child in &reconciled.children {
            child.render_in_scope()?;
        }
        Ok(())
    }

    /// Renders a node popped from the queue, replaying the provider frames
    /// that were active when it last rendered under its parent.
    pub(crate) fn render_standalone(&self, scheduler: &Scheduler) -> Result<(), RenderError> {
        let owner = FrameOwner::Restore(self.inner.id);
        let snapshot = self.inner.scope_snapshot.borrow().clone();
        for entry in snapshot {
            scheduler.scopes().push_entry(entry, owner);
        }
        let _restore = ScopeExit {
            stack: scheduler.scopes(),
            owner,
        };
        self.render_in_scope()
    }

    fn invoke_component(&self) -> Result<Output, RenderError> {
        let props = self.props();
        self.inner.hooks.borrow_mut().begin();
        let result = {
            let _frame = hook_context::enter(self, Phase::Render);
            self.inner.component.invoke(&props)
        };
        let output = result.map_err(|err| err.in_component(self.name()))?;
        let hooks = self.inner.hooks.borrow();
        if self.inner.render_count.get() > 0 && hooks.cursor() != hooks.len() {
            return Err(HookError::HookCountChanged {
                component: self.name(),
                expected: hooks.len(),
                actual: hooks.cursor(),
            }
            .into());
        }
        Ok(output)
    }

    /// Runs effects queued by the last render, then those of every child.
    ///
    /// Returns the number of effect bodies executed.
    pub fn run_effects(&self) -> usize {
        if !self.is_mounted() {
            return 0;
        }
        let pending = std::mem::take(&mut *self.inner.effects.borrow_mut());
        let mut ran = 0;
        for effect in pending {
            if !self.is_mounted() {
                break;
            }
            self.run_effect(effect);
            ran += 1;
        }
        for child in self.children() {
            ran += child.run_effects();
        }
        ran
    }

    fn run_effect(&self, effect: PendingEffect) {
        let slot = effect.slot;
        if let Some(previous) = self.take_cleanup(slot) {
            run_cleanup(previous, self, slot);
        }
        let outcome = {
            let _frame = hook_context::enter(self, Phase::Effect);
            catch_unwind(AssertUnwindSafe(effect.run))
        };
        match outcome {
            Ok(cleanup) if self.is_mounted() => self.store_cleanup(slot, cleanup),
            Ok(cleanup) => run_cleanup(cleanup, self, slot),
            Err(payload) => self.inner.scheduler.report(Diagnostic::EffectPanicked {
                component: self.name(),
                slot,
                message: panic_message(payload.as_ref()),
            }),
        }
    }

    /// Tears down this node and its subtree. Idempotent.
    ///
    /// Cleanups run in slot order, subscriptions are dropped, children are
    /// unmounted, and the node is left with no hooks and no children.
    pub fn unmount(&self) {
        let inner = &self.inner;
        if !inner.mounted.get() {
            return;
        }
        log::trace!("unmounting <{}>#{}", self.name(), inner.id);
        let cleanups = inner.hooks.borrow_mut().take_cleanups();
        for (slot, cleanup) in cleanups {
            run_cleanup(cleanup, self, slot);
        }
        let subscriptions = std::mem::take(&mut *inner.subscriptions.borrow_mut());
        for (_, subscription) in subscriptions {
            if let Some(cell) = subscription.upgrade() {
                cell.unsubscribe(inner.id);
            }
        }
        let children = std::mem::take(&mut *inner.children.borrow_mut());
        for child in children {
            child.unmount();
        }
        inner.hooks.borrow_mut().clear();
        inner.effects.borrow_mut().clear();
        inner.scope_snapshot.borrow_mut().clear();
        inner.mounted.set(false);
    }

    pub(crate) fn create_child(&self, descriptor: Descriptor) -> InstanceNode {
        InstanceNode::new(
            descriptor,
            self.inner.scheduler.clone(),
            Rc::clone(&self.inner.services),
            self.inner.depth + 1,
        )
    }

    pub(crate) fn replace_props(&self, props: Props) {
        *self.inner.props.borrow_mut() = props;
    }

    pub(crate) fn record_subscription(&self, cell: usize, subscription: Weak<dyn Subscription>) {
        let mut subscriptions = self.inner.subscriptions.borrow_mut();
        if !subscriptions.iter().any(|(id, _)| *id == cell) {
            subscriptions.push((cell, subscription));
        }
    }

    /// Claims the next hook slot. `Ok((index, true))` means the caller must
    /// push the slot's initial value.
    pub(crate) fn claim_slot(&self) -> Result<(usize, bool), HookError> {
        let mut hooks = self.inner.hooks.borrow_mut();
        let index = hooks.advance();
        if index < hooks.len() {
            Ok((index, false))
        } else if self.inner.render_count.get() == 0 {
            Ok((index, true))
        } else {
            Err(HookError::HookCountChanged {
                component: self.name(),
                expected: hooks.len(),
                actual: index + 1,
            })
        }
    }

    pub(crate) fn push_slot(&self, slot: HookSlot) -> usize {
        self.inner.hooks.borrow_mut().push(slot)
    }

    /// Runs `f` against the typed value held in slot `index`.
    ///
    /// The hook storage is borrowed for the duration of `f`, so `f` must not
    /// call back into hooks or setters.
    pub(crate) fn with_value<T: 'static, R>(
        &self,
        index: usize,
        kind: HookKind,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, HookError> {
        let mut hooks = self.inner.hooks.borrow_mut();
        match hooks.get_mut(index) {
            Some(HookSlot::Value { kind: found, value }) if *found == kind => value
                .downcast_mut::<T>()
                .map(f)
                .ok_or_else(|| self.slot_mismatch::<T>(index, kind)),
            _ => Err(self.slot_mismatch::<T>(index, kind)),
        }
    }

    pub(crate) fn with_effect_slot<R>(
        &self,
        index: usize,
        f: impl FnOnce(&mut EffectSlot) -> R,
    ) -> Result<R, HookError> {
        let mut hooks = self.inner.hooks.borrow_mut();
        match hooks.get_mut(index) {
            Some(HookSlot::Effect(slot)) => Ok(f(slot)),
            _ => Err(HookError::SlotMismatch {
                component: self.name(),
                index,
                expected: "an effect".to_string(),
            }),
        }
    }

    fn slot_mismatch<T: Any>(&self, index: usize, kind: HookKind) -> HookError {
        HookError::SlotMismatch {
            component: self.name(),
            index,
            expected: format!("{kind:?}<{}>", type_name::<T>()),
        }
    }

    /// Queues an effect, replacing one already queued for the same slot.
    pub(crate) fn queue_effect(&self, effect: PendingEffect) {
        let mut effects = self.inner.effects.borrow_mut();
        match effects.iter_mut().find(|queued| queued.slot == effect.slot) {
            Some(queued) => *queued = effect,
            None => effects.push(effect),
        }
    }

    fn take_cleanup(&self, slot: usize) -> Option<Cleanup> {
        self.with_effect_slot(slot, |effect| effect.cleanup.take())
            .ok()
            .flatten()
    }

    fn store_cleanup(&self, slot: usize, cleanup: Cleanup) {
        if cleanup.is_none() {
            return;
        }
        if let Err(err) = self.with_effect_slot(slot, move |effect| effect.cleanup = Some(cleanup)) {
            log::warn!("dropping cleanup of <{}>: {err}", self.name());
        }
    }
}

impl PartialEq for InstanceNode {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for InstanceNode {}

impl fmt::Debug for InstanceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>#{}", self.name(), self.inner.id)?;
        if let Some(key) = &self.inner.key {
            write!(f, "[key={key}]")?;
        }
        Ok(())
    }
}
