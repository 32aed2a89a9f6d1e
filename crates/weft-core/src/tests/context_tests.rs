use super::*;
use crate as weft_core;
use std::cell::RefCell;
use std::sync::Arc;
use weft_macros::component;

thread_local! {
    static THEME: ContextCell<String> = ContextCell::named("theme", "default".to_string());
    static LOG: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
    static MODE: RefCell<Option<SetState<String>>> = const { RefCell::new(None) };
    static TICK: RefCell<Option<SetState<u32>>> = const { RefCell::new(None) };
}

fn theme() -> ContextCell<String> {
    THEME.with(ContextCell::clone)
}

fn scheduler() -> Scheduler {
    Scheduler::new(Arc::new(ManualScheduler))
}

fn log(entry: String) {
    LOG.with(|log| log.borrow_mut().push(entry));
}

fn take_log() -> Vec<String> {
    LOG.with(|log| std::mem::take(&mut *log.borrow_mut()))
}

#[component]
fn Reader(props: &Props) -> Result<Output, RenderError> {
    let label = props.get_str("label").unwrap_or("reader").to_string();
    let value = use_context(&theme())?;
    log(format!("{label}={value}"));
    Ok(Output::empty())
}

fn reader(label: &str) -> Descriptor {
    Reader.el().prop("label", label).build()
}

#[component]
fn Nested() -> Result<Output, RenderError> {
    let theme = theme();
    Ok(vec![
        theme.provider(
            "outer".to_string(),
            vec![
                reader("outer"),
                theme.provider(
                    "middle".to_string(),
                    vec![
                        reader("middle"),
                        theme.provider("inner".to_string(), reader("inner")),
                    ],
                ),
            ],
        ),
        reader("after"),
    ]
    .into())
}

#[component]
fn Switchable() -> Result<Output, RenderError> {
    let (mode, set) = use_state("light".to_string())?;
    MODE.with(|slot| *slot.borrow_mut() = Some(set));
    Ok(theme().provider(mode, reader("reader")).into())
}

#[component]
fn Ticker() -> Result<Output, RenderError> {
    let (tick, set) = use_state(0u32)?;
    let value = use_context(&theme())?;
    TICK.with(|slot| *slot.borrow_mut() = Some(set));
    log(format!("tick {tick}={value}"));
    Ok(Output::empty())
}

#[component]
fn TickerHost() -> Result<Output, RenderError> {
    Ok(theme().provider("outer".to_string(), Ticker.el()).into())
}

#[test]
fn tokens_unwind_in_reverse_order() {
    let cell = ContextCell::new("root");
    let a = cell.write("A");
    let b = cell.write("B");
    assert_eq!(cell.get(), "B");
    assert_eq!(*b.previous(), "A");

    cell.restore(b);
    assert_eq!(cell.get(), "A");
    cell.restore(a);
    assert_eq!(cell.get(), "root");
}

#[test]
fn nested_providers_scope_like_a_stack() {
    let scheduler = scheduler();
    let root = Root::new(&scheduler, Nested.el());
    let report = root.mount().unwrap();

    assert_eq!(
        take_log(),
        vec![
            "outer=outer",
            "middle=middle",
            "inner=inner",
            "after=default",
        ]
    );
    assert_eq!(report.scope_pushes, 3);
    assert_eq!(report.scope_pops, 3);
    assert_eq!(scheduler.scope_depth(), 0);
    assert_eq!(theme().get(), "default");
}

#[test]
fn provider_changes_reach_consumers() {
    let scheduler = scheduler();
    let root = Root::new(&scheduler, Switchable.el());
    root.mount().unwrap();
    assert_eq!(take_log(), vec!["reader=light"]);

    MODE.with(|slot| slot.borrow().clone())
        .unwrap()
        .set("dark".to_string());
    let report = scheduler.drain().unwrap();

    // The provider's own pass renders the reader, then the queued notification renders it again.
    assert_eq!(take_log(), vec!["reader=dark", "reader=dark"]);
    assert_eq!(report.renders, 2);
    assert_eq!(report.scope_pushes, 2);
    assert_eq!(report.scope_pops, 2);
    assert_eq!(scheduler.queue_len(), 0);
    assert_eq!(theme().get(), "default");
}

#[test]
fn standalone_rerender_sees_the_enclosing_provider() {
    let scheduler = scheduler();
    let root = Root::new(&scheduler, TickerHost.el());
    root.mount().unwrap();
    assert_eq!(take_log(), vec!["tick 0=outer"]);

    TICK.with(|slot| slot.borrow().clone()).unwrap().set(1);
    let report = scheduler.drain().unwrap();

    assert_eq!(report.renders, 1);
    assert_eq!(take_log(), vec!["tick 1=outer"]);
    assert_eq!(report.scope_pushes, 1);
    assert_eq!(report.scope_pops, 1);
    assert_eq!(theme().get(), "default");
}

#[test]
fn direct_render_of_a_nested_node_keeps_its_provider() {
    let scheduler = scheduler();
    let root = Root::new(&scheduler, TickerHost.el());
    root.mount().unwrap();
    take_log();

    let provider = root.node().children().remove(0);
    let ticker = provider.children().remove(0);
    assert_eq!(ticker.name(), "Ticker");
    ticker.render().unwrap();
    assert_eq!(take_log(), vec!["tick 0=outer"]);
    assert_eq!(scheduler.queue_len(), 0);
    assert_eq!(scheduler.scope_depth(), 0);
    assert_eq!(theme().get(), "default");

    TICK.with(|slot| slot.borrow().clone()).unwrap().set(1);
    scheduler.drain().unwrap();
    assert_eq!(take_log(), vec!["tick 1=outer"]);
}

#[test]
fn writes_outside_providers_notify_subscribers() {
    let scheduler = scheduler();
    let root = Root::new(&scheduler, Reader.el());
    root.mount().unwrap();
    take_log();
    assert_eq!(theme().subscriber_count(), 1);

    let token = theme().write("global".to_string());
    assert_eq!(scheduler.queue_len(), 1);
    scheduler.drain().unwrap();
    // The render that observes the change queues one follow-up that sees the same value.
    assert_eq!(take_log(), vec!["reader=global", "reader=global"]);
    assert_eq!(scheduler.queue_len(), 0);

    theme().restore(token);
    assert_eq!(scheduler.queue_len(), 0);
    assert_eq!(theme().get(), "default");
}

#[test]
fn unmount_releases_subscriptions() {
    let scheduler = scheduler();
    let root = Root::new(&scheduler, Nested.el());
    root.mount().unwrap();
    assert_eq!(theme().subscriber_count(), 4);

    root.unmount();
    assert_eq!(theme().subscriber_count(), 0);
    let token = theme().write("ignored".to_string());
    assert_eq!(scheduler.queue_len(), 0);
    theme().restore(token);
}

#[test]
fn provider_without_value_fails_to_render() {
    let scheduler = scheduler();
    let root = Root::new(&scheduler, PROVIDER.el());
    let err = root.mount().unwrap_err();
    assert_eq!(
        err,
        RenderError::Component {
            component: "Provider",
            message: "missing required prop `context`".to_string(),
        }
    );
    assert_eq!(scheduler.scope_depth(), 0);
}
