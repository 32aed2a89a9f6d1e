use super::*;
use crate as weft_core;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::Arc;
use weft_macros::component;

fn scheduler() -> Scheduler {
    Scheduler::new(Arc::new(ManualScheduler))
}

thread_local! {
    static RENDERS: Cell<usize> = const { Cell::new(0) };
    static SEEN: Cell<i64> = const { Cell::new(0) };
    static SETTER: RefCell<Option<SetState<i64>>> = const { RefCell::new(None) };
    static EXTRA_HOOK: Cell<bool> = const { Cell::new(false) };
    static SWAP_KIND: Cell<bool> = const { Cell::new(false) };
    static EFFECT_HOOK_RESULT: RefCell<Option<HookError>> = const { RefCell::new(None) };
}

fn renders() -> usize {
    RENDERS.with(Cell::get)
}

fn seen() -> i64 {
    SEEN.with(Cell::get)
}

fn setter() -> SetState<i64> {
    SETTER.with(|slot| slot.borrow().clone().expect("component rendered"))
}

#[component]
fn StateHolder() -> Result<Output, RenderError> {
    let (value, set) = use_state(0i64)?;
    RENDERS.with(|count| count.set(count.get() + 1));
    SEEN.with(|slot| slot.set(value));
    SETTER.with(|slot| *slot.borrow_mut() = Some(set));
    Ok(Output::empty())
}

#[test]
fn equal_writes_do_not_schedule() {
    let scheduler = scheduler();
    let root = Root::new(&scheduler, StateHolder.el());
    root.mount().unwrap();
    assert_eq!(renders(), 1);

    let set = setter();
    set.set(0);
    set.update(|value| *value);
    assert_eq!(scheduler.queue_len(), 0);
    assert!(!scheduler.has_pending());

    set.set(5);
    assert_eq!(scheduler.queue_len(), 1);
    scheduler.drain().unwrap();
    assert_eq!(renders(), 2);
    assert_eq!(seen(), 5);
}

#[test]
fn updater_resolves_against_latest_value() {
    let scheduler = scheduler();
    let root = Root::new(&scheduler, StateHolder.el());
    root.mount().unwrap();

    let set = setter();
    set.update(|value| value + 1);
    set.update(|value| value + 1);
    set.update(|value| value * 10);
    assert_eq!(set.get(), Some(20));

    let report = scheduler.drain().unwrap();
    assert_eq!(report.renders, 1);
    assert_eq!(seen(), 20);
}

#[test]
fn setter_after_unmount_is_noop() {
    let scheduler = scheduler();
    let root = Root::new(&scheduler, StateHolder.el());
    root.mount().unwrap();
    let set = setter();
    assert!(set.is_live());

    root.unmount();
    set.set(42);
    assert!(!set.is_live());
    assert_eq!(set.get(), None);
    assert_eq!(scheduler.queue_len(), 0);
    assert_eq!(root.node().hook_count(), 0);
}

#[component]
fn Branchy() -> Result<Output, RenderError> {
    use_state(1i64)?;
    if EXTRA_HOOK.with(Cell::get) {
        use_state(2i64)?;
    }
    Ok(Output::empty())
}

#[test]
fn hook_count_is_stable_across_renders() {
    let scheduler = scheduler();
    let root = Root::new(&scheduler, Branchy.el());
    root.mount().unwrap();
    let count = root.node().hook_count();
    for _ in 0..3 {
        root.node().schedule_render();
        scheduler.drain().unwrap();
        assert_eq!(root.node().hook_count(), count);
    }
    assert_eq!(root.node().render_count(), 4);
}

#[test]
fn extra_hook_on_rerender_fails() {
    let scheduler = scheduler();
    let root = Root::new(&scheduler, Branchy.el());
    root.mount().unwrap();

    EXTRA_HOOK.with(|flag| flag.set(true));
    root.node().schedule_render();
    let err = scheduler.drain().unwrap_err();
    assert_eq!(
        err,
        RenderError::Hook(HookError::HookCountChanged {
            component: "Branchy",
            expected: 1,
            actual: 2,
        })
    );
}

#[test]
fn missing_hook_on_rerender_fails() {
    EXTRA_HOOK.with(|flag| flag.set(true));
    let scheduler = scheduler();
    let root = Root::new(&scheduler, Branchy.el());
    root.mount().unwrap();
    assert_eq!(root.node().hook_count(), 2);

    EXTRA_HOOK.with(|flag| flag.set(false));
    let err = root.render().unwrap_err();
    assert!(matches!(
        err,
        RenderError::Hook(HookError::HookCountChanged {
            expected: 2,
            actual: 1,
            ..
        })
    ));
}

#[component]
fn KindSwapper() -> Result<Output, RenderError> {
    if SWAP_KIND.with(Cell::get) {
        use_memo(None, || 0i64)?;
    } else {
        use_state(0i64)?;
    }
    Ok(Output::empty())
}

#[test]
fn swapped_hook_kind_reports_slot_mismatch() {
    let scheduler = scheduler();
    let root = Root::new(&scheduler, KindSwapper.el());
    root.mount().unwrap();

    SWAP_KIND.with(|flag| flag.set(true));
    let err = root.render().unwrap_err();
    assert!(
        matches!(
            err,
            RenderError::Hook(HookError::SlotMismatch {
                component: "KindSwapper",
                index: 0,
                ..
            })
        ),
        "{err}"
    );
}

#[test]
fn hooks_outside_render_are_rejected() {
    let err = use_state(0i64).unwrap_err();
    assert_eq!(
        err,
        HookError::IllegalHookContext {
            hook: "use_state",
            phase: None,
        }
    );
    assert!(use_effect(None, || ()).is_err());
    assert!(current_node().is_none());
}

#[component]
fn HookInEffect() -> Result<Output, RenderError> {
    use_effect(deps![], || {
        let result = use_state(1i64).err();
        EFFECT_HOOK_RESULT.with(|slot| *slot.borrow_mut() = result);
    })?;
    Ok(Output::empty())
}

#[test]
fn slot_hooks_inside_effects_are_rejected() {
    let scheduler = scheduler();
    let root = Root::new(&scheduler, HookInEffect.el());
    root.mount().unwrap();
    let err = EFFECT_HOOK_RESULT.with(|slot| slot.borrow_mut().take());
    assert_eq!(
        err,
        Some(HookError::IllegalHookContext {
            hook: "use_state",
            phase: Some(Phase::Effect),
        })
    );
}

thread_local! {
    static STEP: Cell<i64> = const { Cell::new(1) };
    static DISPATCH: RefCell<Option<Dispatch<i64>>> = const { RefCell::new(None) };
    static TOTAL: Cell<i64> = const { Cell::new(0) };
}

fn dispatch() -> Dispatch<i64> {
    DISPATCH.with(|slot| slot.borrow().clone().expect("component rendered"))
}

#[component]
fn Accumulator() -> Result<Output, RenderError> {
    let step = STEP.with(Cell::get);
    let (total, dispatch) = use_reducer(move |total: &i64, times: i64| total + step * times, 0)?;
    TOTAL.with(|slot| slot.set(total));
    DISPATCH.with(|slot| *slot.borrow_mut() = Some(dispatch));
    RENDERS.with(|count| count.set(count.get() + 1));
    Ok(Output::empty())
}

#[test]
fn dispatch_applies_most_recent_reducer() {
    let scheduler = scheduler();
    let root = Root::new(&scheduler, Accumulator.el());
    root.mount().unwrap();

    dispatch().dispatch(1);
    scheduler.drain().unwrap();
    assert_eq!(TOTAL.with(Cell::get), 1);

    STEP.with(|step| step.set(10));
    // Still the step-1 reducer: it was supplied by the last render.
    dispatch().dispatch(1);
    scheduler.drain().unwrap();
    assert_eq!(TOTAL.with(Cell::get), 2);

    dispatch().dispatch(1);
    scheduler.drain().unwrap();
    assert_eq!(TOTAL.with(Cell::get), 12);
}

#[test]
fn dispatch_without_change_does_not_schedule() {
    let scheduler = scheduler();
    let root = Root::new(&scheduler, Accumulator.el());
    root.mount().unwrap();
    let before = renders();

    dispatch().dispatch(0);
    assert_eq!(scheduler.queue_len(), 0);
    scheduler.drain().unwrap();
    assert_eq!(renders(), before);
}

#[component]
fn Seeded(props: &Props) -> Result<Output, RenderError> {
    let seed = props.get_int("seed").unwrap_or(0);
    let (total, dispatch) = use_reducer_with(
        |total: &i64, delta: i64| total + delta,
        seed,
        ReducerOptions::default()
            .init(|seed: i64| seed * 100)
            .deps(deps![seed]),
    )?;
    TOTAL.with(|slot| slot.set(total));
    DISPATCH.with(|slot| *slot.borrow_mut() = Some(dispatch));
    Ok(Output::empty())
}

#[test]
fn reducer_resets_when_deps_change() {
    let scheduler = scheduler();
    let root = Root::new(&scheduler, Seeded.el().prop("seed", 1));
    root.mount().unwrap();
    assert_eq!(TOTAL.with(Cell::get), 100);

    dispatch().dispatch(5);
    scheduler.drain().unwrap();
    assert_eq!(TOTAL.with(Cell::get), 105);

    root.set_props(Props::new().with("seed", 1));
    scheduler.drain().unwrap();
    assert_eq!(TOTAL.with(Cell::get), 105);

    root.set_props(Props::new().with("seed", 2));
    scheduler.drain().unwrap();
    assert_eq!(TOTAL.with(Cell::get), 200);
}

thread_local! {
    static FACTORY_CALLS: Cell<usize> = const { Cell::new(0) };
    static ONCE_CALLS: Cell<usize> = const { Cell::new(0) };
    static CALLBACKS: RefCell<Vec<Callback<i64>>> = const { RefCell::new(Vec::new()) };
    static REFS: RefCell<Vec<Owned<Vec<i64>>>> = const { RefCell::new(Vec::new()) };
}

#[component]
fn Memoizer(props: &Props) -> Result<Output, RenderError> {
    let input = props.get_int("input").unwrap_or(0);
    let doubled = use_memo(deps![input], || {
        FACTORY_CALLS.with(|calls| calls.set(calls.get() + 1));
        input * 2
    })?;
    use_memo(None, || ONCE_CALLS.with(|calls| calls.set(calls.get() + 1)))?;
    let callback = use_callback(deps![input], |_value: i64| {})?;
    let log = use_ref(Vec::new)?;
    log.update(|entries| entries.push(doubled));
    CALLBACKS.with(|all| all.borrow_mut().push(callback));
    REFS.with(|all| all.borrow_mut().push(log));
    Ok(Output::empty())
}

#[test]
fn memo_and_callback_follow_deps() {
    let scheduler = scheduler();
    let root = Root::new(&scheduler, Memoizer.el().prop("input", 1));
    root.mount().unwrap();

    root.set_props(Props::new().with("input", 1));
    scheduler.drain().unwrap();
    assert_eq!(FACTORY_CALLS.with(Cell::get), 1);

    root.set_props(Props::new().with("input", 2));
    scheduler.drain().unwrap();
    assert_eq!(FACTORY_CALLS.with(Cell::get), 2);
    assert_eq!(ONCE_CALLS.with(Cell::get), 1);

    CALLBACKS.with(|all| {
        let all = all.borrow();
        assert_eq!(all.len(), 3);
        assert!(all[0].ptr_eq(&all[1]));
        assert!(!all[1].ptr_eq(&all[2]));
    });
}

#[test]
fn refs_persist_without_scheduling() {
    let scheduler = scheduler();
    let root = Root::new(&scheduler, Memoizer.el().prop("input", 3));
    root.mount().unwrap();
    root.node().schedule_render();
    scheduler.drain().unwrap();

    REFS.with(|all| {
        let all = all.borrow();
        assert!(all[0].ptr_eq(&all[1]));
        assert_eq!(all[1].get(), vec![6, 6]);
        all[1].update(|entries| entries.clear());
    });
    assert_eq!(scheduler.queue_len(), 0);
}

#[component]
fn ServiceUser() -> Result<Output, RenderError> {
    let hits = use_service("hits", || Cell::new(0u32))?;
    hits.set(hits.get() + 1);
    Ok(Output::empty())
}

#[test]
fn services_are_scoped_to_their_root() {
    let scheduler = scheduler();
    let first = Root::new(&scheduler, ServiceUser.el());
    let second = Root::new(&scheduler, ServiceUser.el());
    first.mount().unwrap();
    first.node().schedule_render();
    scheduler.drain().unwrap();
    second.mount().unwrap();

    let hits = |root: &Root| {
        root.services()
            .get::<Cell<u32>>("hits")
            .unwrap()
            .map(|cell| cell.get())
    };
    assert_eq!(hits(&first), Some(2));
    assert_eq!(hits(&second), Some(1));

    assert!(matches!(
        first.services().get::<String>("hits"),
        Err(ServiceError::TypeMismatch { .. })
    ));

    first.shutdown();
    assert!(first.services().is_empty());
    assert!(second.services().contains("hits"));
}

#[test]
fn service_factories_may_resolve_other_services() {
    let registry = ServiceRegistry::new();
    let outer = registry
        .get_or_init("outer", || {
            let inner = registry.get_or_init("inner", || 7u8).unwrap();
            *inner as u32 + 1
        })
        .unwrap();
    assert_eq!(*outer, 8);
    assert_eq!(registry.len(), 2);
    let again = registry.get_or_init("outer", || 0u32).unwrap();
    assert!(Rc::ptr_eq(&outer, &again));
}
