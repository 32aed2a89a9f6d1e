use std::cell::RefCell;

use weft_core::{
    deps, use_effect, use_reducer, use_state, Cleanup, Dispatch, Output, PropValue, Props,
    RenderError, SetState,
};
use weft_html::{tags::li, tags::ul, text};
use weft_macros::component;
use weft_testing::{use_event_log, TestRoot};

thread_local! {
    static COUNTER: RefCell<Option<SetState<i64>>> = const { RefCell::new(None) };
    static TALLY: RefCell<Option<Dispatch<i64>>> = const { RefCell::new(None) };
    static CLICKS: RefCell<Option<SetState<i64>>> = const { RefCell::new(None) };
}

fn counter_setter() -> SetState<i64> {
    COUNTER
        .with(|slot| slot.borrow().clone())
        .expect("counter rendered")
}

#[component]
fn Counter() -> Result<Output, RenderError> {
    let (count, set) = use_state(0i64)?;
    COUNTER.with(|slot| *slot.borrow_mut() = Some(set));
    use_event_log()?.push(format!("render {count}"));
    Ok(text(format!("count={count}")).into())
}

#[test]
fn three_increments_before_a_drain_render_once() {
    let test = TestRoot::mount(Counter.el()).expect("mounts");
    assert_eq!(test.events().take(), vec!["render 0"]);

    let setter = counter_setter();
    let increments = test
        .scheduler()
        .port(move |()| setter.update(|count| count + 1));
    let producer = std::thread::spawn(move || {
        for _ in 0..3 {
            increments.send(());
        }
    });
    producer.join().expect("producer thread");

    let report = test.pump_until_idle().expect("drains");
    assert_eq!(report.messages, 3);
    assert_eq!(report.renders, 1);
    assert_eq!(test.events().take(), vec!["render 3"]);
    assert_eq!(test.text(), "count=3");
}

#[test]
fn equal_writes_do_not_schedule_renders() {
    let test = TestRoot::mount(Counter.el()).expect("mounts");
    let setter = counter_setter();
    let requests = test.drain_requests();

    setter.set(0);
    setter.update(|count| *count);
    assert!(!test.scheduler().has_pending());
    assert_eq!(test.drain_requests(), requests);

    setter.set(4);
    assert_eq!(test.scheduler().queue_len(), 1);
    assert_eq!(test.drain_requests(), requests + 1);
}

#[component]
fn Tally() -> Result<Output, RenderError> {
    let (total, dispatch) = use_reducer(|total: &i64, delta: i64| total + delta, 0)?;
    TALLY.with(|slot| *slot.borrow_mut() = Some(dispatch));
    Ok(text(total).into())
}

#[test]
fn reducer_actions_that_keep_the_state_are_ignored() {
    let test = TestRoot::mount(Tally.el()).expect("mounts");
    let dispatch = TALLY.with(|slot| slot.borrow().clone()).expect("tally rendered");

    dispatch.dispatch(0);
    assert!(!test.scheduler().has_pending());
    dispatch.dispatch(5);
    dispatch.dispatch(-2);
    let report = test.pump_until_idle().expect("drains");
    assert_eq!(report.renders, 1);
    assert_eq!(test.text(), "3");
}

#[component]
fn Row(props: &Props) -> Result<Output, RenderError> {
    let label = props.get_str("label").unwrap_or("?").to_string();
    let events = use_event_log()?;
    let (clicks, set_clicks) = use_state(0i64)?;
    CLICKS.with(|slot| *slot.borrow_mut() = Some(set_clicks));
    use_effect(deps![], {
        let events = events.clone();
        let label = label.clone();
        move || {
            events.push(format!("mount {label}"));
            Cleanup::new(move || events.push(format!("unmount {label}")))
        }
    })?;
    Ok(li().child(text(format!("{label}:{clicks}"))).into())
}

#[component]
fn Rows(props: &Props) -> Result<Output, RenderError> {
    let order = props
        .get("order")
        .and_then(PropValue::as_list)
        .unwrap_or_default();
    let keyed = props.get_bool("keyed").unwrap_or(true);
    let rows = order.iter().filter_map(PropValue::as_str).map(|label| {
        let row = Row.el().prop("label", label);
        if keyed {
            row.key(label).build()
        } else {
            row.build()
        }
    });
    Ok(ul().children(rows).into())
}

fn order(labels: &[&str]) -> PropValue {
    labels.iter().map(|label| PropValue::from(*label)).collect::<Vec<_>>().into()
}

#[test]
fn reordering_keyed_rows_reuses_their_nodes() {
    let test = TestRoot::mount(Rows.el().prop("order", order(&["a", "b"]))).expect("mounts");
    assert_eq!(test.events().take(), vec!["mount a", "mount b"]);
    let a = test.find_by_key("a").expect("row a");
    let b = test.find_by_key("b").expect("row b");
    let hooks = a.hook_count();

    test.set_props(Props::new().with("order", order(&["b", "a"])))
        .expect("reorders");

    assert!(test.events().is_empty());
    assert!(test.find_by_key("a").expect("row a").ptr_eq(&a));
    assert!(test.find_by_key("b").expect("row b").ptr_eq(&b));
    assert_eq!(a.hook_count(), hooks);
    assert_eq!(test.html(), "<ul><li>b:0</li><li>a:0</li></ul>");
}

#[test]
fn unkeyed_replacement_never_matches_a_keyed_node() {
    let test = TestRoot::mount(Rows.el().prop("order", order(&["x"]))).expect("mounts");
    let x = test.find_by_key("x").expect("row x");
    test.events().clear();

    test.set_props(
        Props::new()
            .with("order", order(&["x"]))
            .with("keyed", false),
    )
    .expect("replaces");

    assert_eq!(test.events().take(), vec!["unmount x", "mount x"]);
    assert!(!x.is_mounted());
    assert!(test.find_by_key("x").is_none());
    let rows = test.find_all(&Row);
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].ptr_eq(&x));
}

#[test]
fn remounting_a_key_starts_with_fresh_state() {
    let test = TestRoot::mount(Rows.el().prop("order", order(&["a"]))).expect("mounts");
    let a = test.find_by_key("a").expect("row a");
    CLICKS
        .with(|slot| slot.borrow().clone())
        .expect("row rendered")
        .set(5);
    test.pump_until_idle().expect("clicks");
    assert_eq!(test.html(), "<ul><li>a:5</li></ul>");

    test.set_props(Props::new().with("order", order(&[])))
        .expect("removes");
    assert!(!a.is_mounted());
    test.set_props(Props::new().with("order", order(&["a"])))
        .expect("restores");

    let fresh = test.find_by_key("a").expect("row a");
    assert!(!fresh.ptr_eq(&a));
    assert_eq!(test.html(), "<ul><li>a:0</li></ul>");
    assert_eq!(
        test.events().take(),
        vec!["mount a", "unmount a", "mount a"]
    );
}
