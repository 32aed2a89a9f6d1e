use super::*;
use crate::event_log::use_event_log;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use weft_core::{deps, use_effect, use_state, Output};
use weft_html::{tags::p, text};
use weft_macros::component;

#[component]
fn Settling() -> Result<Output, RenderError> {
    let (value, set) = use_state(0i64)?;
    use_effect(deps![], move || set.set(1))?;
    Ok(p().child(text(value)).into())
}

#[component]
fn Item(props: &Props) -> Result<Output, RenderError> {
    let label = props.get_str("label").unwrap_or_default().to_string();
    use_event_log()?.push(format!("item {label}"));
    Ok(text(label).into())
}

#[component]
fn Listing(props: &Props) -> Result<Output, RenderError> {
    Ok(props.children().into())
}

/// Wakes itself on every poll and never finishes.
struct Restless;

impl Future for Restless {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}

#[test]
fn mount_settles_follow_up_renders() {
    let test = TestRoot::mount(Settling.el()).expect("mounts");
    assert_eq!(test.html(), "<p>1</p>");
    assert_eq!(test.text(), "1\n");
    assert!(!test.scheduler().has_pending());
    assert!(test.drain_requests() >= 1);
}

#[test]
fn new_does_not_render() {
    let test = TestRoot::new(Listing.el().child(Item.el().prop("label", "x")));
    assert_eq!(test.node().render_count(), 0);
    assert_eq!(test.try_pump().unwrap(), None);
    assert!(test.events().is_empty());

    test.root().mount().unwrap();
    assert_eq!(test.node().render_count(), 1);
    assert_eq!(test.events().take(), vec!["item x"]);
}

#[test]
fn queries_walk_the_committed_tree() {
    let test = TestRoot::mount(
        Listing
            .el()
            .child(Item.el().key("first").prop("label", "one"))
            .child(Listing.el().child(Item.el().key("second").prop("label", "two"))),
    )
    .expect("mounts");

    let items = test.find_all(&Item);
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].props().get_str("label"), Some("one"));
    assert_eq!(test.find_all(&Listing).len(), 2);

    let second = test.find_by_key("second").expect("keyed item");
    assert!(second.ptr_eq(&items[1]));
    assert!(test.find_by_key("third").is_none());
    assert_eq!(test.events().take(), vec!["item one", "item two"]);
}

#[test]
fn diagnostics_are_collected_not_logged() {
    let test = TestRoot::mount(
        Listing
            .el()
            .child(Item.el().prop("label", "a"))
            .child(Item.el().prop("label", "b")),
    )
    .expect("mounts");

    let diagnostics = test.take_diagnostics();
    assert!(diagnostics.contains(&Diagnostic::DuplicateUnkeyedSibling {
        parent: "Listing",
        component: "Item",
    }));
    assert!(test.diagnostics().is_empty());
}

#[test]
fn roots_do_not_share_event_logs() {
    let first = TestRoot::mount(Item.el().prop("label", "left")).expect("mounts");
    let second = TestRoot::mount(Item.el().prop("label", "right")).expect("mounts");
    assert_eq!(first.events().entries(), vec!["item left"]);
    assert_eq!(second.events().entries(), vec!["item right"]);

    first.shutdown();
    assert!(!first.root().is_mounted());
    assert!(first.events().is_empty());
    assert_eq!(second.events().len(), 1);
}

#[test]
fn set_props_rerenders_the_app() {
    let test = TestRoot::mount(Item.el().prop("label", "old")).expect("mounts");
    let report = test
        .set_props(Props::new().with("label", "new"))
        .expect("renders");
    assert_eq!(report.renders, 1);
    assert_eq!(test.text(), "new");
    assert!(test.dump_tree().starts_with("<Item> label=\"new\""));
}

#[test]
#[should_panic(expected = "pump_until_idle looped too many times")]
fn pump_until_idle_gives_up_on_endless_work() {
    let test = TestRoot::with_config(
        Listing.el(),
        SchedulerConfig {
            max_task_rounds: 2,
            ..SchedulerConfig::default()
        },
    );
    test.root().mount().unwrap();
    let _task = test.scheduler().spawn_local(Restless);
    let _ = test.pump_until_idle();
}
