use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;
use weft_core::{Descriptor, Dispatcher, IdleSignal, Port, Root, Scheduler};

use crate::StdRuntime;

/// Settings for [`AppRunner::start`].
#[derive(Clone, Debug)]
pub struct RunnerConfig {
    pub thread_name: String,
    /// Upper bound for blocking calls such as [`AppRunner::invoke`] with
    /// `wait` and [`AppRunner::query`].
    pub idle_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            thread_name: "weft-render".to_string(),
            idle_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn the render thread")]
    Spawn(#[from] std::io::Error),
    #[error("render thread exited before the app was mounted")]
    Startup,
}

type RootTask = Box<dyn FnOnce(&Root) + Send + 'static>;

/// Wakes the render thread when the scheduler asks for a drain or the runner stops.
#[derive(Default)]
struct Parker {
    notified: Mutex<bool>,
    condvar: Condvar,
}

impl Parker {
    fn unpark(&self) {
        let mut notified = self.notified.lock().unwrap_or_else(PoisonError::into_inner);
        *notified = true;
        self.condvar.notify_one();
    }

    fn park(&self) {
        let guard = self.notified.lock().unwrap_or_else(PoisonError::into_inner);
        let mut notified = self
            .condvar
            .wait_while(guard, |notified| !*notified)
            .unwrap_or_else(PoisonError::into_inner);
        *notified = false;
    }
}

struct Handshake {
    dispatcher: Dispatcher,
    idle: IdleSignal,
    root_port: Port<RootTask>,
}

/// Owns an application on a background render thread.
///
/// The thread builds the root descriptor, mounts it and then sleeps until the
/// scheduler requests a drain. Work reaches it through [`AppRunner::post`]
/// (plain closures) or [`AppRunner::with_root`] (closures that see the
/// [`Root`]). Render errors are logged and the failed batch is discarded.
pub struct AppRunner {
    config: RunnerConfig,
    dispatcher: Dispatcher,
    idle: IdleSignal,
    root_port: Port<RootTask>,
    parker: Arc<Parker>,
    stopping: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl AppRunner {
    /// Spawns the render thread and blocks until the app is mounted.
    ///
    /// `app` runs on the render thread, so the descriptor it returns never
    /// crosses threads. It may configure the scheduler, e.g. install a
    /// diagnostics handler or enable tracing.
    pub fn start<F>(config: RunnerConfig, app: F) -> Result<Self, RunnerError>
    where
        F: FnOnce(&Scheduler) -> Descriptor + Send + 'static,
    {
        let parker = Arc::new(Parker::default());
        let stopping = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn({
                let parker = Arc::clone(&parker);
                let stopping = Arc::clone(&stopping);
                move || render_thread(app, parker, stopping, ready_tx)
            })?;

        let handshake = match ready_rx.recv() {
            Ok(handshake) => handshake,
            Err(_) => {
                let _ = thread.join();
                return Err(RunnerError::Startup);
            }
        };
        log::debug!("render thread `{}` started", config.thread_name);
        Ok(Self {
            config,
            dispatcher: handshake.dispatcher,
            idle: handshake.idle,
            root_port: handshake.root_port,
            parker,
            stopping,
            thread: Some(thread),
        })
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        !self.stopping.load(Ordering::SeqCst)
    }

    pub fn dispatcher(&self) -> Dispatcher {
        self.dispatcher.clone()
    }

    pub fn idle_signal(&self) -> IdleSignal {
        self.idle.clone()
    }

    /// Runs `task` on the render thread during the next drain.
    pub fn post(&self, task: impl FnOnce() + Send + 'static) {
        if !self.is_running() {
            return;
        }
        self.dispatcher.post(task);
    }

    /// Runs `task` against the root on the render thread.
    pub fn with_root(&self, task: impl FnOnce(&Root) + Send + 'static) {
        if !self.is_running() {
            return;
        }
        self.root_port.send(Box::new(task));
    }

    /// Like [`AppRunner::with_root`], optionally blocking until the scheduler
    /// settles. Returns `false` if waiting timed out.
    pub fn invoke(&self, task: impl FnOnce(&Root) + Send + 'static, wait: bool) -> bool {
        self.with_root(task);
        !wait || self.wait_idle()
    }

    /// Blocks until the scheduler has no queued work, up to the idle timeout.
    pub fn wait_idle(&self) -> bool {
        self.idle.wait_timeout(self.config.idle_timeout)
    }

    /// Runs `f` on the render thread and returns its result.
    ///
    /// `None` if the runner stopped or the answer did not arrive in time.
    pub fn query<R: Send + 'static>(&self, f: impl FnOnce(&Root) -> R + Send + 'static) -> Option<R> {
        if !self.is_running() {
            return None;
        }
        let (tx, rx) = mpsc::channel();
        self.with_root(move |root| {
            let _ = tx.send(f(root));
        });
        rx.recv_timeout(self.config.idle_timeout).ok()
    }

    /// Indented outline of the mounted tree.
    pub fn dump_tree(&self) -> Option<String> {
        self.query(|root| weft_core::dump_tree(root.node()))
    }

    /// The most recent render trace, if tracing was enabled.
    pub fn last_trace(&self) -> Option<String> {
        self.query(|root| root.scheduler().last_trace().map(|trace| trace.to_string()))
            .flatten()
    }

    /// Stops the render thread, unmounting the app. Idempotent.
    pub fn shutdown(&mut self) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        self.parker.unpark();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("render thread `{}` panicked", self.config.thread_name);
            }
        }
        log::debug!("render thread `{}` stopped", self.config.thread_name);
    }
}

impl Drop for AppRunner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn render_thread<F>(
    app: F,
    parker: Arc<Parker>,
    stopping: Arc<AtomicBool>,
    ready: mpsc::Sender<Handshake>,
) where
    F: FnOnce(&Scheduler) -> Descriptor,
{
    let runtime = StdRuntime::new();
    let scheduler = runtime.scheduler();
    runtime.set_drain_waker({
        let parker = Arc::clone(&parker);
        move || parker.unpark()
    });

    let descriptor = app(&scheduler);
    let root = Rc::new(Root::new(&scheduler, descriptor));
    let root_port = scheduler.port({
        let root = Rc::clone(&root);
        move |task: RootTask| task(root.as_ref())
    });
    let port_id = root_port.id();

    if let Err(err) = root.mount() {
        log::error!("initial render failed: {err}");
        scheduler.discard_pending();
    }
    let handshake = Handshake {
        dispatcher: scheduler.dispatcher(),
        idle: scheduler.idle_signal(),
        root_port,
    };
    if ready.send(handshake).is_err() {
        scheduler.close_port(port_id);
        root.shutdown();
        return;
    }

    while !stopping.load(Ordering::SeqCst) {
        if runtime.take_drain_request() || scheduler.has_pending() {
            if let Err(err) = scheduler.drain() {
                log::error!("render batch failed: {err}");
                scheduler.discard_pending();
            }
            continue;
        }
        parker.park();
    }

    runtime.clear_drain_waker();
    scheduler.close_port(port_id);
    root.shutdown();
}

#[cfg(test)]
#[path = "tests/runner_tests.rs"]
mod tests;
