use crate::collections::map::HashMap;
use crate::collections::map::HashSet;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::future::Future;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Condvar, Mutex, PoisonError};
use std::task::{Context, Poll, Waker};
use std::thread::ThreadId;
use std::time::Duration;

use crate::context::ScopeStack;
use crate::debug::{RenderTrace, TraceGuard, Tracer};
use crate::diagnostics::{panic_message, Diagnostic};
use crate::effect::LocalFuture;
use crate::error::RenderError;
use crate::node::{InstanceNode, NodeId, WeakNode};
use crate::platform::RuntimeScheduler;

/// Tunables for a [`Scheduler`].
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Upper bound on task polling rounds within one drain.
    pub max_task_rounds: usize,
    /// Number of render traces kept once tracing is enabled.
    pub trace_capacity: usize,
    /// Report unkeyed same-component siblings and positional reuse.
    pub warn_unkeyed_siblings: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_task_rounds: 64,
            trace_capacity: 50,
            warn_unkeyed_siblings: true,
        }
    }
}

/// Counters describing one [`Scheduler::drain`] pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub renders: usize,
    /// Queue entries dropped because their node had unmounted.
    pub skipped: usize,
    pub effects: usize,
    pub messages: usize,
    pub tasks_completed: usize,
    pub scope_pushes: u64,
    pub scope_pops: u64,
}

impl DrainReport {
    pub fn is_empty(&self) -> bool {
        *self == DrainReport::default()
    }
}

impl std::ops::AddAssign for DrainReport {
    fn add_assign(&mut self, other: Self) {
        self.renders += other.renders;
        self.skipped += other.skipped;
        self.effects += other.effects;
        self.messages += other.messages;
        self.tasks_completed += other.tasks_completed;
        self.scope_pushes += other.scope_pushes;
        self.scope_pops += other.scope_pops;
    }
}

enum RemoteMessage {
    Task(Box<dyn FnOnce() + Send + 'static>),
    Invoke { port: u64, value: Box<dyn Any + Send> },
}

type PortHandler = Rc<RefCell<dyn FnMut(Box<dyn Any>)>>;
type DiagnosticHandler = Rc<dyn Fn(&Diagnostic)>;

/// Settles to idle when the queue is empty and no drain is running.
///
/// Cloneable and `Send`, so other threads can block until a posted change
/// has been fully reflected.
#[derive(Clone)]
pub struct IdleSignal {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl IdleSignal {
    fn new() -> Self {
        Self {
            state: Arc::new((Mutex::new(true), Condvar::new())),
        }
    }

    pub fn is_idle(&self) -> bool {
        *self.state.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, idle: bool) {
        let (lock, condvar) = &*self.state;
        let mut current = lock.lock().unwrap_or_else(PoisonError::into_inner);
        *current = idle;
        if idle {
            condvar.notify_all();
        }
    }

    /// Evaluates `idle` under the lock so a concurrent post cannot be overwritten.
    fn set_with(&self, idle: impl FnOnce() -> bool) {
        let (lock, condvar) = &*self.state;
        let mut current = lock.lock().unwrap_or_else(PoisonError::into_inner);
        *current = idle();
        if *current {
            condvar.notify_all();
        }
    }

    pub fn wait(&self) {
        let (lock, condvar) = &*self.state;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let _idle = condvar
            .wait_while(guard, |idle| !*idle)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Returns `false` if the timeout elapsed before the scheduler settled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (lock, condvar) = &*self.state;
        let guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        let (idle, _) = condvar
            .wait_timeout_while(guard, timeout, |idle| !*idle)
            .unwrap_or_else(PoisonError::into_inner);
        *idle
    }
}

struct DispatcherInner {
    platform: Arc<dyn RuntimeScheduler>,
    tx: mpsc::Sender<RemoteMessage>,
    pending: AtomicUsize,
    idle: IdleSignal,
}

impl DispatcherInner {
    fn post(&self, message: RemoteMessage) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.idle.set(false);
        if self.tx.send(message).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            log::debug!("scheduler dropped; discarding posted message");
            return;
        }
        self.platform.schedule_drain();
    }

    fn has_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }
}

struct PendingGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> PendingGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        Self { counter }
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let previous = self.counter.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "dispatcher pending count underflowed");
    }
}

/// Thread-safe entry point for work produced off the scheduler thread.
///
/// Posted closures run on the scheduler thread at the start of the next drain.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

impl Dispatcher {
    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        self.inner.post(RemoteMessage::Task(Box::new(task)));
    }

    pub fn has_pending(&self) -> bool {
        self.inner.has_pending()
    }

    pub fn idle_signal(&self) -> IdleSignal {
        self.inner.idle.clone()
    }
}

/// Sending half of a handler registered with [`Scheduler::port`].
///
/// Values cross threads; the handler runs on the scheduler thread, where it
/// may call setters or dispatchers directly.
pub struct Port<T> {
    id: u64,
    dispatcher: Dispatcher,
    _marker: PhantomData<fn(T)>,
}

impl<T> Clone for Port<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            dispatcher: self.dispatcher.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: Send + 'static> Port<T> {
    pub fn send(&self, value: T) {
        self.dispatcher.inner.post(RemoteMessage::Invoke {
            port: self.id,
            value: Box::new(value),
        });
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

struct TaskEntry {
    id: u64,
    future: LocalFuture,
}

struct SchedulerInner {
    config: SchedulerConfig,
    platform: Arc<dyn RuntimeScheduler>,
    queue: RefCell<VecDeque<(NodeId, WeakNode)>>,
    queued: RefCell<HashSet<NodeId>>,
    draining: Cell<bool>,
    render_active: Cell<bool>,
    idle: IdleSignal,
    dispatcher: Arc<DispatcherInner>,
    rx: RefCell<mpsc::Receiver<RemoteMessage>>,
    ports: RefCell<HashMap<u64, PortHandler>>,
    next_port_id: Cell<u64>,
    tasks: RefCell<Vec<TaskEntry>>,
    next_task_id: Cell<u64>,
    polling: Cell<bool>,
    cancelled: RefCell<HashSet<u64>>,
    woken: Arc<AtomicBool>,
    task_waker: Waker,
    scopes: ScopeStack,
    diagnostics: RefCell<Option<DiagnosticHandler>>,
    tracer: RefCell<Tracer>,
    thread_id: ThreadId,
}

/// Owner of the render queue, the local task set and the provider scope stack.
///
/// Single-threaded: every method except those on [`Dispatcher`], [`Port`] and
/// [`IdleSignal`] must be called on the thread that created the scheduler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(platform: Arc<dyn RuntimeScheduler>) -> Self {
        Self::with_config(platform, SchedulerConfig::default())
    }

    pub fn with_config(platform: Arc<dyn RuntimeScheduler>, config: SchedulerConfig) -> Self {
        let (tx, rx) = mpsc::channel();
        let idle = IdleSignal::new();
        let woken = Arc::new(AtomicBool::new(false));
        let task_waker = TaskWaker {
            platform: Arc::clone(&platform),
            woken: Arc::clone(&woken),
        }
        .into_waker();
        let tracer = Tracer::new(config.trace_capacity);
        Self {
            inner: Rc::new(SchedulerInner {
                platform: Arc::clone(&platform),
                queue: RefCell::new(VecDeque::new()),
                queued: RefCell::new(HashSet::default()),
                draining: Cell::new(false),
                render_active: Cell::new(false),
                dispatcher: Arc::new(DispatcherInner {
                    platform,
                    tx,
                    pending: AtomicUsize::new(0),
                    idle: idle.clone(),
                }),
                idle,
                rx: RefCell::new(rx),
                ports: RefCell::new(HashMap::default()),
                next_port_id: Cell::new(1),
                tasks: RefCell::new(Vec::new()),
                next_task_id: Cell::new(1),
                polling: Cell::new(false),
                cancelled: RefCell::new(HashSet::default()),
                woken,
                task_waker,
                scopes: ScopeStack::default(),
                diagnostics: RefCell::new(None),
                tracer: RefCell::new(tracer),
                thread_id: std::thread::current().id(),
                config,
            }),
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            inner: Rc::downgrade(&self.inner),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher {
            inner: Arc::clone(&self.inner.dispatcher),
        }
    }

    pub fn idle_signal(&self) -> IdleSignal {
        self.inner.idle.clone()
    }

    pub fn is_idle(&self) -> bool {
        self.inner.idle.is_idle()
    }

    pub fn is_draining(&self) -> bool {
        self.inner.draining.get()
    }

    /// `true` while a queued node is being rendered.
    pub fn is_rendering(&self) -> bool {
        self.inner.render_active.get()
    }

    pub fn queue_len(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    pub fn is_queued(&self, node: &InstanceNode) -> bool {
        self.inner.queued.borrow().contains(&node.id())
    }

    /// Whether a drain would find anything to do.
    pub fn has_pending(&self) -> bool {
        !self.inner.queue.borrow().is_empty()
            || self.inner.dispatcher.has_pending()
            || self.inner.woken.load(Ordering::SeqCst)
    }

    /// Adds `node` to the render queue unless it is already queued.
    pub fn enqueue(&self, node: &InstanceNode) -> bool {
        if !self.inner.queued.borrow_mut().insert(node.id()) {
            return false;
        }
        self.inner
            .queue
            .borrow_mut()
            .push_back((node.id(), node.downgrade()));
        self.inner.idle.set(false);
        log::trace!("enqueued {node:?}");
        if !self.inner.draining.get() {
            self.inner.platform.schedule_drain();
        }
        true
    }

    fn pop(&self) -> Option<WeakNode> {
        let (id, node) = self.inner.queue.borrow_mut().pop_front()?;
        self.inner.queued.borrow_mut().remove(&id);
        Some(node)
    }

    /// Runs queued renders, their effects, remote messages and local tasks
    /// until nothing is left to do.
    ///
    /// A render error aborts the pass and leaves the remaining queue intact;
    /// callers typically log it and call [`Scheduler::discard_pending`].
    /// Calling `drain` from inside a drain returns an empty report.
    pub fn drain(&self) -> Result<DrainReport, RenderError> {
        let inner = &self.inner;
        debug_assert_eq!(
            std::thread::current().id(),
            inner.thread_id,
            "drain called off the scheduler thread"
        );
        if inner.draining.replace(true) {
            log::trace!("drain re-entered; deferring to the active pass");
            return Ok(DrainReport::default());
        }
        let _guard = DrainGuard { scheduler: self };
        inner.idle.set(false);
        let (pushes, pops) = inner.scopes.counters();
        let mut report = DrainReport::default();
        let mut rounds = 0;

        loop {
            report.messages += self.run_remote_messages();
            while let Some(node) = self.pop() {
                let Some(node) = node.upgrade().filter(InstanceNode::is_mounted) else {
                    report.skipped += 1;
                    continue;
                };
                inner.render_active.set(true);
                let rendered = node.render_standalone(self);
                inner.render_active.set(false);
                rendered?;
                report.renders += 1;
                report.effects += node.run_effects();
                report.messages += self.run_remote_messages();
            }

            let completed = self.poll_tasks();
            report.tasks_completed += completed;
            let woken = inner.woken.swap(false, Ordering::SeqCst);
            if inner.queue.borrow().is_empty()
                && !inner.dispatcher.has_pending()
                && completed == 0
                && !woken
            {
                break;
            }
            rounds += 1;
            if rounds >= inner.config.max_task_rounds {
                self.report(Diagnostic::TaskRoundsExceeded { rounds });
                if woken {
                    // The next host drain resumes the woken tasks.
                    inner.woken.store(true, Ordering::SeqCst);
                    inner.platform.schedule_drain();
                }
                break;
            }
        }

        let (pushes_after, pops_after) = inner.scopes.counters();
        report.scope_pushes = pushes_after - pushes;
        report.scope_pops = pops_after - pops;
        debug_assert_eq!(inner.scopes.depth(), 0, "provider scope stack unbalanced");
        if !report.is_empty() {
            log::debug!("drain: {report:?}");
        }
        Ok(report)
    }

    /// Forgets every queued render. Returns how many entries were dropped.
    pub fn discard_pending(&self) -> usize {
        let dropped = self.inner.queue.borrow_mut().drain(..).count();
        self.inner.queued.borrow_mut().clear();
        if dropped > 0 {
            log::debug!("discarded {dropped} queued renders");
        }
        self.settle();
        dropped
    }

    fn settle(&self) {
        self.inner.idle.set_with(|| {
            !self.inner.draining.get()
                && self.inner.queue.borrow().is_empty()
                && !self.inner.dispatcher.has_pending()
        });
    }

    fn run_remote_messages(&self) -> usize {
        let mut count = 0;
        loop {
            let message = match self.inner.rx.borrow().try_recv() {
                Ok(message) => message,
                Err(_) => break,
            };
            let _pending = PendingGuard::new(&self.inner.dispatcher.pending);
            count += 1;
            let outcome = match message {
                RemoteMessage::Task(task) => catch_unwind(AssertUnwindSafe(task)),
                RemoteMessage::Invoke { port, value } => {
                    catch_unwind(AssertUnwindSafe(|| self.invoke_port(port, value)))
                }
            };
            if let Err(payload) = outcome {
                self.report(Diagnostic::TaskPanicked {
                    message: panic_message(payload.as_ref()),
                });
            }
        }
        count
    }

    /// Registers `handler` to receive values sent through the returned port.
    pub fn port<T: Send + 'static>(&self, mut handler: impl FnMut(T) + 'static) -> Port<T> {
        let id = self.inner.next_port_id.get();
        self.inner.next_port_id.set(id + 1);
        let erased: PortHandler = Rc::new(RefCell::new(move |value: Box<dyn Any>| {
            match value.downcast::<T>() {
                Ok(value) => handler(*value),
                Err(_) => log::warn!("port {id} received a value of the wrong type"),
            }
        }));
        self.inner.ports.borrow_mut().insert(id, erased);
        Port {
            id,
            dispatcher: self.dispatcher(),
            _marker: PhantomData,
        }
    }

    pub fn close_port(&self, id: u64) {
        self.inner.ports.borrow_mut().remove(&id);
    }

    fn invoke_port(&self, id: u64, value: Box<dyn Any + Send>) {
        let handler = self.inner.ports.borrow().get(&id).cloned();
        match handler {
            Some(handler) => {
                let value: Box<dyn Any> = value;
                (&mut *handler.borrow_mut())(value);
            }
            None => log::trace!("dropping value for closed port {id}"),
        }
    }

    pub fn spawn_local(&self, future: impl Future<Output = ()> + 'static) -> TaskHandle {
        self.spawn_boxed(Box::pin(future))
    }

    fn spawn_boxed(&self, future: LocalFuture) -> TaskHandle {
        let id = self.inner.next_task_id.get();
        self.inner.next_task_id.set(id + 1);
        self.inner.tasks.borrow_mut().push(TaskEntry { id, future });
        self.inner.woken.store(true, Ordering::SeqCst);
        if !self.inner.draining.get() {
            self.inner.platform.schedule_drain();
        }
        TaskHandle {
            id,
            scheduler: self.handle(),
        }
    }

    fn cancel_task(&self, id: u64) {
        let mut tasks = self.inner.tasks.borrow_mut();
        let before = tasks.len();
        tasks.retain(|entry| entry.id != id);
        if tasks.len() == before && self.inner.polling.get() {
            // The task is being polled right now; drop it when it is put back.
            self.inner.cancelled.borrow_mut().insert(id);
        }
    }

    pub fn task_count(&self) -> usize {
        self.inner.tasks.borrow().len()
    }

    fn poll_tasks(&self) -> usize {
        let tasks = std::mem::take(&mut *self.inner.tasks.borrow_mut());
        if tasks.is_empty() {
            return 0;
        }
        let mut cx = Context::from_waker(&self.inner.task_waker);
        let mut pending = Vec::with_capacity(tasks.len());
        let mut completed = 0;
        self.inner.polling.set(true);
        for mut entry in tasks {
            if self.inner.cancelled.borrow_mut().remove(&entry.id) {
                continue;
            }
            match catch_unwind(AssertUnwindSafe(|| entry.future.as_mut().poll(&mut cx))) {
                Ok(Poll::Ready(())) => completed += 1,
                Ok(Poll::Pending) => pending.push(entry),
                Err(payload) => {
                    completed += 1;
                    self.report(Diagnostic::TaskPanicked {
                        message: panic_message(payload.as_ref()),
                    });
                }
            }
        }
        self.inner.polling.set(false);
        {
            let mut cancelled = self.inner.cancelled.borrow_mut();
            pending.retain(|entry| !cancelled.remove(&entry.id));
            cancelled.clear();
        }
        self.inner.tasks.borrow_mut().extend(pending);
        completed
    }

    /// Routes diagnostics to `handler` instead of the log.
    pub fn set_diagnostic_handler(&self, handler: impl Fn(&Diagnostic) + 'static) {
        *self.inner.diagnostics.borrow_mut() = Some(Rc::new(handler));
    }

    pub fn clear_diagnostic_handler(&self) {
        self.inner.diagnostics.borrow_mut().take();
    }

    pub fn report(&self, diagnostic: Diagnostic) {
        let handler = self.inner.diagnostics.borrow().clone();
        match handler {
            Some(handler) => handler(&diagnostic),
            None => diagnostic.log(),
        }
    }

    /// Starts recording which nodes each render pass touches.
    pub fn enable_tracing(&self) {
        self.inner.tracer.borrow_mut().set_enabled(true);
    }

    pub fn disable_tracing(&self) {
        self.inner.tracer.borrow_mut().set_enabled(false);
    }

    /// Recorded passes, oldest first.
    pub fn traces(&self) -> Vec<RenderTrace> {
        self.inner.tracer.borrow().traces()
    }

    pub fn last_trace(&self) -> Option<RenderTrace> {
        self.inner.tracer.borrow().last()
    }

    pub fn clear_traces(&self) {
        self.inner.tracer.borrow_mut().clear();
    }

    pub(crate) fn trace_enter(&self, node: &InstanceNode) -> TraceGuard<'_> {
        self.inner.tracer.borrow_mut().enter(node);
        TraceGuard::new(&self.inner.tracer)
    }

    pub(crate) fn scopes(&self) -> &ScopeStack {
        &self.inner.scopes
    }

    /// Number of provider frames currently pushed.
    pub fn scope_depth(&self) -> usize {
        self.inner.scopes.depth()
    }
}

struct DrainGuard<'a> {
    scheduler: &'a Scheduler,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        let inner = &self.scheduler.inner;
        inner.draining.set(false);
        inner.render_active.set(false);
        self.scheduler.settle();
    }
}

/// Weak handle held by nodes; every operation is a no-op once the scheduler drops.
#[derive(Clone)]
pub struct SchedulerHandle {
    inner: Weak<SchedulerInner>,
}

impl SchedulerHandle {
    pub fn upgrade(&self) -> Option<Scheduler> {
        self.inner.upgrade().map(|inner| Scheduler { inner })
    }

    pub fn enqueue(&self, node: &InstanceNode) -> bool {
        self.upgrade()
            .is_some_and(|scheduler| scheduler.enqueue(node))
    }

    pub fn spawn_local(&self, future: LocalFuture) -> Option<TaskHandle> {
        self.upgrade().map(|scheduler| scheduler.spawn_boxed(future))
    }

    pub fn report(&self, diagnostic: Diagnostic) {
        match self.upgrade() {
            Some(scheduler) => scheduler.report(diagnostic),
            None => diagnostic.log(),
        }
    }
}

/// Handle to a task spawned with [`Scheduler::spawn_local`].
#[derive(Clone)]
pub struct TaskHandle {
    id: u64,
    scheduler: SchedulerHandle,
}

impl TaskHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Drops the task's future without polling it again.
    pub fn cancel(self) {
        if let Some(scheduler) = self.scheduler.upgrade() {
            scheduler.cancel_task(self.id);
        }
    }
}

struct TaskWaker {
    platform: Arc<dyn RuntimeScheduler>,
    woken: Arc<AtomicBool>,
}

impl TaskWaker {
    fn into_waker(self) -> Waker {
        futures_task::waker(Arc::new(self))
    }
}

impl futures_task::ArcWake for TaskWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.woken.store(true, Ordering::SeqCst);
        arc_self.platform.schedule_drain();
    }
}

/// Scheduler that never requests drains; the host drives [`Scheduler::drain`].
#[derive(Default)]
pub struct ManualScheduler;

impl RuntimeScheduler for ManualScheduler {
    fn schedule_drain(&self) {}
}
