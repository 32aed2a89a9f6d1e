use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use weft_core::{
    Component, Descriptor, Diagnostic, DrainReport, InstanceNode, Props, RenderError, Root,
    RuntimeScheduler, Scheduler, SchedulerConfig, ServiceRegistry,
};

use crate::event_log::{EventLog, EVENT_LOG_SERVICE};

const MAX_PUMP_LOOPS: usize = 100;

/// Platform scheduler that only counts drain requests; tests drain by hand.
#[derive(Debug, Default)]
pub struct TestScheduler {
    requests: AtomicUsize,
}

impl TestScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl RuntimeScheduler for TestScheduler {
    fn schedule_drain(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Headless harness for exercising component trees in tests.
///
/// `TestRoot` owns its own scheduler and service registry, so every test
/// gets an isolated tree. Diagnostics are collected instead of logged.
pub struct TestRoot {
    platform: Arc<TestScheduler>,
    scheduler: Scheduler,
    root: Root,
    diagnostics: Rc<RefCell<Vec<Diagnostic>>>,
}

impl TestRoot {
    /// Creates the harness without rendering anything.
    pub fn new(app: impl Into<Descriptor>) -> Self {
        Self::with_config(app, SchedulerConfig::default())
    }

    pub fn with_config(app: impl Into<Descriptor>, config: SchedulerConfig) -> Self {
        let platform = Arc::new(TestScheduler::new());
        let scheduler = Scheduler::with_config(platform.clone(), config);
        let diagnostics = Rc::new(RefCell::new(Vec::new()));
        scheduler.set_diagnostic_handler({
            let diagnostics = Rc::clone(&diagnostics);
            move |diagnostic| {
                log::debug!("test diagnostic: {diagnostic}");
                diagnostics.borrow_mut().push(diagnostic.clone());
            }
        });
        let root = Root::with_services(&scheduler, app, ServiceRegistry::new());
        Self {
            platform,
            scheduler,
            root,
            diagnostics,
        }
    }

    /// Creates the harness, renders the app and settles all follow-up work.
    pub fn mount(app: impl Into<Descriptor>) -> Result<Self, RenderError> {
        let test_root = Self::new(app);
        test_root.root.mount()?;
        test_root.pump_until_idle()?;
        Ok(test_root)
    }

    /// Drains until no renders, messages or tasks remain.
    ///
    /// Panics if the tree keeps producing work, which usually means an
    /// effect writes state unconditionally.
    pub fn pump_until_idle(&self) -> Result<DrainReport, RenderError> {
        let mut total = DrainReport::default();
        let mut loops = 0;
        while self.scheduler.has_pending() {
            loops += 1;
            if loops > MAX_PUMP_LOOPS {
                panic!("pump_until_idle looped too many times!");
            }
            total += self.scheduler.drain()?;
        }
        Ok(total)
    }

    /// Runs a single drain if anything is pending.
    pub fn try_pump(&self) -> Result<Option<DrainReport>, RenderError> {
        if !self.scheduler.has_pending() {
            return Ok(None);
        }
        self.scheduler.drain().map(Some)
    }

    pub fn root(&self) -> &Root {
        &self.root
    }

    pub fn node(&self) -> &InstanceNode {
        self.root.node()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn services(&self) -> &Rc<ServiceRegistry> {
        self.root.services()
    }

    /// The log components reach through `use_event_log`.
    pub fn events(&self) -> Rc<EventLog> {
        match self.services().get_or_init(EVENT_LOG_SERVICE, EventLog::default) {
            Ok(log) => log,
            Err(err) => panic!("event log service was replaced: {err}"),
        }
    }

    /// Replaces the app's props and settles the resulting renders.
    pub fn set_props(&self, props: Props) -> Result<DrainReport, RenderError> {
        self.root.set_props(props);
        self.pump_until_idle()
    }

    pub fn dump_tree(&self) -> String {
        weft_core::dump_tree(self.node())
    }

    pub fn html(&self) -> String {
        weft_html::render_to_html(self.node())
    }

    pub fn text(&self) -> String {
        weft_html::render_to_text(self.node())
    }

    /// Every mounted node rendered by `component`, in pre-order.
    pub fn find_all(&self, component: &'static Component) -> Vec<InstanceNode> {
        let mut found = Vec::new();
        collect(self.node(), &mut |node| {
            if Component::same(node.component(), component) {
                found.push(node.clone());
            }
        });
        found
    }

    /// First node in pre-order carrying the explicit key `key`.
    pub fn find_by_key(&self, key: &str) -> Option<InstanceNode> {
        let mut found = None;
        collect(self.node(), &mut |node| {
            if found.is_none() && node.key().is_some_and(|own| &**own == key) {
                found = Some(node.clone());
            }
        });
        found
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.diagnostics.borrow_mut())
    }

    /// How many times the scheduler asked the host for a drain.
    pub fn drain_requests(&self) -> usize {
        self.platform.requests()
    }

    pub fn unmount(&self) {
        self.root.unmount();
    }

    pub fn shutdown(&self) {
        self.root.shutdown();
    }
}

fn collect(node: &InstanceNode, visit: &mut dyn FnMut(&InstanceNode)) {
    visit(node);
    for child in node.children() {
        collect(&child, visit);
    }
}

#[cfg(test)]
#[path = "tests/test_root_tests.rs"]
mod tests;
