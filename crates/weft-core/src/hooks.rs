//! Hook primitives.
//!
//! Every hook claims the next slot of the rendering node. The number and order
//! of hook calls must be identical on every render of a node; a render that
//! calls more hooks than the previous one fails with
//! [`HookError::HookCountChanged`], and a slot holding a different kind of
//! hook fails with [`HookError::SlotMismatch`].

use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::context::{ContextCell, FrameOwner};
use crate::deps::{deps_changed, Deps};
use crate::effect::{Cleanup, PendingEffect};
use crate::error::HookError;
use crate::hook_context::{with_active_node, with_render_node};
use crate::hook_storage::{EffectSlot, HookKind, HookSlot};
use crate::node::{InstanceNode, WeakNode};
use crate::owned::Owned;
use crate::props::Callback;
use crate::scheduler::TaskHandle;

/// Writes a [`use_state`] slot and schedules the owning node.
pub struct SetState<T> {
    node: WeakNode,
    slot: usize,
    _marker: PhantomData<fn(T)>,
}

impl<T> Clone for SetState<T> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            slot: self.slot,
            _marker: PhantomData,
        }
    }
}

impl<T: Clone + PartialEq + 'static> SetState<T> {
    pub fn set(&self, value: T) {
        self.update(move |_| value);
    }

    /// Resolves `f` against the current value. Equal results are dropped
    /// without scheduling a render.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let Some(node) = self.node.upgrade().filter(InstanceNode::is_mounted) else {
            return;
        };
        let Ok(current) = node.with_value(self.slot, HookKind::State, |value: &mut T| value.clone())
        else {
            return;
        };
        let next = f(&current);
        if next == current {
            return;
        }
        if node
            .with_value(self.slot, HookKind::State, |value: &mut T| *value = next)
            .is_ok()
        {
            node.schedule_render();
        }
    }

    /// The value a render would observe right now.
    pub fn get(&self) -> Option<T> {
        let node = self.node.upgrade().filter(InstanceNode::is_mounted)?;
        node.with_value(self.slot, HookKind::State, |value: &mut T| value.clone())
            .ok()
    }

    pub fn is_live(&self) -> bool {
        self.node.upgrade().is_some_and(|node| node.is_mounted())
    }

    pub fn to_callback(&self) -> Callback<T> {
        let setter = self.clone();
        Callback::new(move |value| setter.set(value))
    }
}

impl<T> fmt::Debug for SetState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SetState")
            .field("node", &self.node)
            .field("slot", &self.slot)
            .finish()
    }
}

/// Declares a piece of local state.
pub fn use_state<T: Clone + PartialEq + 'static>(initial: T) -> Result<(T, SetState<T>), HookError> {
    use_state_with(move || initial)
}

/// [`use_state`] with a lazily computed initial value.
pub fn use_state_with<T: Clone + PartialEq + 'static>(
    init: impl FnOnce() -> T,
) -> Result<(T, SetState<T>), HookError> {
    with_render_node("use_state", |node| {
        let (slot, fresh) = node.claim_slot()?;
        let value = if fresh {
            let value = init();
            node.push_slot(HookSlot::value(HookKind::State, value.clone()));
            value
        } else {
            node.with_value(slot, HookKind::State, |value: &mut T| value.clone())?
        };
        Ok((
            value,
            SetState {
                node: node.downgrade(),
                slot,
                _marker: PhantomData,
            },
        ))
    })
}

type Reducer<S, A> = Rc<dyn Fn(&S, A) -> S>;

struct ReducerState<S, A> {
    state: S,
    reducer: Reducer<S, A>,
    deps: Option<Deps>,
}

/// Sends actions through the most recently supplied reducer.
pub struct Dispatch<A> {
    send: Rc<dyn Fn(A)>,
}

impl<A> Clone for Dispatch<A> {
    fn clone(&self) -> Self {
        Self {
            send: Rc::clone(&self.send),
        }
    }
}

impl<A> Dispatch<A> {
    pub fn dispatch(&self, action: A) {
        (self.send)(action)
    }
}

impl<A> fmt::Debug for Dispatch<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Dispatch")
    }
}

/// Optional behaviour for [`use_reducer_with`].
pub struct ReducerOptions<S> {
    init: Option<Box<dyn FnOnce(S) -> S>>,
    deps: Option<Deps>,
}

impl<S> Default for ReducerOptions<S> {
    fn default() -> Self {
        Self {
            init: None,
            deps: None,
        }
    }
}

impl<S> ReducerOptions<S> {
    /// Derives the starting state from `initial` on first render and on reset.
    pub fn init(mut self, init: impl FnOnce(S) -> S + 'static) -> Self {
        self.init = Some(Box::new(init));
        self
    }

    /// Resets the state whenever these deps change.
    pub fn deps(mut self, deps: Option<Deps>) -> Self {
        self.deps = deps;
        self
    }

    fn initial_state(self, initial: S) -> (S, Option<Deps>) {
        let state = match self.init {
            Some(init) => init(initial),
            None => initial,
        };
        (state, self.deps)
    }
}

pub fn use_reducer<S, A>(
    reducer: impl Fn(&S, A) -> S + 'static,
    initial: S,
) -> Result<(S, Dispatch<A>), HookError>
where
    S: Clone + PartialEq + 'static,
    A: 'static,
{
    use_reducer_with(reducer, initial, ReducerOptions::default())
}

pub fn use_reducer_with<S, A>(
    reducer: impl Fn(&S, A) -> S + 'static,
    initial: S,
    options: ReducerOptions<S>,
) -> Result<(S, Dispatch<A>), HookError>
where
    S: Clone + PartialEq + 'static,
    A: 'static,
{
    with_render_node("use_reducer", |node| {
        let (slot, fresh) = node.claim_slot()?;
        let reducer: Reducer<S, A> = Rc::new(reducer);
        let state = if fresh {
            let (state, deps) = options.initial_state(initial);
            node.push_slot(HookSlot::value(
                HookKind::Reducer,
                ReducerState {
                    state: state.clone(),
                    reducer,
                    deps,
                },
            ));
            state
        } else {
            let reset = node.with_value(
                slot,
                HookKind::Reducer,
                |stored: &mut ReducerState<S, A>| deps_changed(&options.deps, &stored.deps),
            )?;
            let (reset_state, deps) = if reset {
                let (state, deps) = options.initial_state(initial);
                (Some(state), deps)
            } else {
                (None, options.deps)
            };
            node.with_value(slot, HookKind::Reducer, |stored: &mut ReducerState<S, A>| {
                if let Some(state) = reset_state {
                    stored.state = state;
                }
                if deps.is_some() {
                    stored.deps = deps;
                }
                stored.reducer = reducer;
                stored.state.clone()
            })?
        };
        let target = node.downgrade();
        let dispatch = Dispatch {
            send: Rc::new(move |action: A| dispatch_action::<S, A>(&target, slot, action)),
        };
        Ok((state, dispatch))
    })
}

fn dispatch_action<S, A>(target: &WeakNode, slot: usize, action: A)
where
    S: Clone + PartialEq + 'static,
    A: 'static,
{
    let Some(node) = target.upgrade().filter(InstanceNode::is_mounted) else {
        return;
    };
    let Ok((current, reducer)) =
        node.with_value(slot, HookKind::Reducer, |stored: &mut ReducerState<S, A>| {
            (stored.state.clone(), Rc::clone(&stored.reducer))
        })
    else {
        return;
    };
    let next = reducer(&current, action);
    if next == current {
        return;
    }
    if node
        .with_value(slot, HookKind::Reducer, |stored: &mut ReducerState<S, A>| {
            stored.state = next
        })
        .is_ok()
    {
        node.schedule_render();
    }
}

/// Runs `effect` after the render that queued it has committed.
///
/// With `None` deps the effect runs after the first render only. Otherwise it
/// re-runs whenever `deps` change, after the previous cleanup.
pub fn use_effect<R>(deps: Option<Deps>, effect: impl FnOnce() -> R + 'static) -> Result<(), HookError>
where
    R: Into<Cleanup>,
{
    with_render_node("use_effect", |node| {
        let (slot, fresh) = node.claim_slot()?;
        let should_run = if fresh {
            node.push_slot(HookSlot::Effect(EffectSlot {
                deps: deps.clone(),
                cleanup: None,
            }));
            true
        } else {
            node.with_effect_slot(slot, |stored| {
                let changed = deps_changed(&deps, &stored.deps);
                if changed {
                    stored.deps = deps.clone();
                }
                changed
            })?
        };
        if should_run {
            node.queue_effect(PendingEffect {
                slot,
                run: Box::new(move || effect().into()),
            });
        }
        Ok(())
    })
}

/// Cancellation view handed to [`use_async_effect`] bodies.
#[derive(Clone)]
pub struct EffectScope {
    active: Rc<Cell<bool>>,
}

impl EffectScope {
    /// `false` once deps changed or the node unmounted.
    pub fn is_active(&self) -> bool {
        self.active.get()
    }
}

/// Spawns `effect`'s future as a local task, cancelling it when deps change
/// or the node unmounts.
pub fn use_async_effect<F, Fut>(deps: Option<Deps>, effect: F) -> Result<(), HookError>
where
    F: FnOnce(EffectScope) -> Fut + 'static,
    Fut: Future<Output = ()> + 'static,
{
    use_effect(deps, move || {
        let active = Rc::new(Cell::new(true));
        let future = effect(EffectScope {
            active: Rc::clone(&active),
        });
        let task = spawn_local(future).ok();
        Cleanup::new(move || {
            active.set(false);
            if let Some(task) = task {
                task.cancel();
            }
        })
    })
}

struct Memoized<T> {
    value: T,
    deps: Option<Deps>,
}

/// Caches `factory`'s result until `deps` change.
pub fn use_memo<T: Clone + 'static>(deps: Option<Deps>, factory: impl FnOnce() -> T) -> Result<T, HookError> {
    with_render_node("use_memo", |node| memoize(node, HookKind::Memo, deps, factory))
}

/// Keeps the first callback until `deps` change, so it stays pointer-equal.
pub fn use_callback<A: 'static>(
    deps: Option<Deps>,
    f: impl Fn(A) + 'static,
) -> Result<Callback<A>, HookError> {
    with_render_node("use_callback", |node| {
        memoize(node, HookKind::Callback, deps, move || Callback::new(f))
    })
}

fn memoize<T: Clone + 'static>(
    node: &InstanceNode,
    kind: HookKind,
    deps: Option<Deps>,
    factory: impl FnOnce() -> T,
) -> Result<T, HookError> {
    let (slot, fresh) = node.claim_slot()?;
    if fresh {
        let value = factory();
        node.push_slot(HookSlot::value(
            kind,
            Memoized {
                value: value.clone(),
                deps,
            },
        ));
        return Ok(value);
    }
    let cached = node.with_value(slot, kind, |memo: &mut Memoized<T>| {
        (!deps_changed(&deps, &memo.deps)).then(|| memo.value.clone())
    })?;
    if let Some(value) = cached {
        return Ok(value);
    }
    let value = factory();
    node.with_value(slot, kind, |memo: &mut Memoized<T>| {
        memo.value = value.clone();
        memo.deps = deps;
    })?;
    Ok(value)
}

/// A mutable box that survives renders without triggering them.
pub fn use_ref<T: 'static>(init: impl FnOnce() -> T) -> Result<Owned<T>, HookError> {
    with_render_node("use_ref", |node| {
        let (slot, fresh) = node.claim_slot()?;
        if fresh {
            let owned = Owned::new(init());
            node.push_slot(HookSlot::value(HookKind::Ref, owned.clone()));
            return Ok(owned);
        }
        node.with_value(slot, HookKind::Ref, |owned: &mut Owned<T>| owned.clone())
    })
}

/// Reads `cell` and subscribes the rendering node to its writes.
pub fn use_context<T: Clone + PartialEq + 'static>(cell: &ContextCell<T>) -> Result<T, HookError> {
    with_render_node("use_context", |node| {
        cell.subscribe(node);
        let value = cell.get();
        let (slot, fresh) = node.claim_slot()?;
        if fresh {
            node.push_slot(HookSlot::value(HookKind::Context, value.clone()));
            return Ok(value);
        }
        let changed = node.with_value(slot, HookKind::Context, |seen: &mut T| {
            let changed = *seen != value;
            if changed {
                *seen = value.clone();
            }
            changed
        })?;
        if changed {
            node.schedule_render();
        }
        Ok(value)
    })
}

/// Pushes `value` for `cell` until the rendering node's subtree finishes.
/// Subscribers are notified only when the value differs from the last render.
pub(crate) fn use_provider<T: Clone + PartialEq + 'static>(
    cell: &ContextCell<T>,
    value: T,
) -> Result<(), HookError> {
    with_render_node("use_provider", |node| {
        let (slot, fresh) = node.claim_slot()?;
        let changed = if fresh {
            node.push_slot(HookSlot::value(HookKind::Provider, value.clone()));
            false
        } else {
            node.with_value(slot, HookKind::Provider, |last: &mut T| {
                let changed = *last != value;
                if changed {
                    *last = value.clone();
                }
                changed
            })?
        };
        match node.scheduler().upgrade() {
            Some(scheduler) => scheduler.scopes().push(
                cell.scoped(),
                Rc::new(value),
                FrameOwner::Provider(node.id()),
            ),
            None => log::warn!(
                "<{}> provides `{}` without a scheduler; value not scoped",
                node.name(),
                cell.name()
            ),
        }
        if changed {
            cell.notify_subscribers();
        }
        Ok(())
    })
}

/// Resolves the root-scoped service `name`, creating it on first use.
pub fn use_service<T: 'static>(name: &str, factory: impl FnOnce() -> T) -> Result<Rc<T>, HookError> {
    with_active_node("use_service", |node| {
        Ok(node.services().get_or_init(name, factory)?)
    })
}

/// Spawns a future on the scheduler that owns the executing node.
pub fn spawn_local(future: impl Future<Output = ()> + 'static) -> Result<TaskHandle, HookError> {
    with_active_node("spawn_local", |node| {
        node.scheduler()
            .spawn_local(Box::pin(future))
            .ok_or(HookError::IllegalHookContext {
                hook: "spawn_local",
                phase: None,
            })
    })
}
