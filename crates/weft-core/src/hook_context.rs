use std::cell::RefCell;

use crate::error::HookError;
use crate::node::InstanceNode;

/// What the active node is doing on this thread.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Render,
    Effect,
}

struct ActiveFrame {
    node: InstanceNode,
    phase: Phase,
}

// Thread-local stack of executing nodes. Nested frames appear when a render
// or effect synchronously renders another subtree.
thread_local! {
    static NODE_STACK: RefCell<Vec<ActiveFrame>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the node stack on drop.
#[must_use = "HookScopeGuard pops the node stack on drop"]
pub(crate) struct HookScopeGuard;

impl Drop for HookScopeGuard {
    fn drop(&mut self) {
        NODE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Marks `node` as executing in `phase` until the guard drops.
pub(crate) fn enter(node: &InstanceNode, phase: Phase) -> HookScopeGuard {
    NODE_STACK.with(|stack| {
        stack.borrow_mut().push(ActiveFrame {
            node: node.clone(),
            phase,
        });
    });
    HookScopeGuard
}

fn top() -> Option<(InstanceNode, Phase)> {
    NODE_STACK.with(|stack| {
        stack
            .borrow()
            .last()
            .map(|frame| (frame.node.clone(), frame.phase))
    })
}

/// Runs `f` with the rendering node, failing outside the render phase.
pub(crate) fn with_render_node<R>(
    hook: &'static str,
    f: impl FnOnce(&InstanceNode) -> Result<R, HookError>,
) -> Result<R, HookError> {
    match top() {
        Some((node, Phase::Render)) => f(&node),
        Some((_, phase)) => Err(HookError::IllegalHookContext {
            hook,
            phase: Some(phase),
        }),
        None => Err(HookError::IllegalHookContext { hook, phase: None }),
    }
}

/// Runs `f` with the executing node in either phase.
pub(crate) fn with_active_node<R>(
    hook: &'static str,
    f: impl FnOnce(&InstanceNode) -> Result<R, HookError>,
) -> Result<R, HookError> {
    match top() {
        Some((node, _)) => f(&node),
        None => Err(HookError::IllegalHookContext { hook, phase: None }),
    }
}

/// The node whose render or effect is executing on this thread.
pub fn current_node() -> Option<InstanceNode> {
    top().map(|(node, _)| node)
}

pub fn current_phase() -> Option<Phase> {
    top().map(|(_, phase)| phase)
}
