//! Single-threaded UI execution context.
//!
//! Every window access runs as a job on the UI thread. Other threads post
//! jobs through a `UiDispatcher` and, with `invoke`, block (bounded) until
//! the job has produced its result.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use tracing::{debug, error};

use super::widget::{WidgetHandle, Window};
use crate::harness::{HarnessError, HarnessResult};

type Job = Box<dyn FnOnce(&mut UiContext) + Send>;

pub(crate) enum Message {
    Run(Job),
    Shutdown,
}

/// Handle for marshalling work onto the UI thread
#[derive(Clone)]
pub struct UiDispatcher {
    tx: Sender<Message>,
    ui_thread: ThreadId,
}

impl UiDispatcher {
    pub(crate) fn new(tx: Sender<Message>, ui_thread: ThreadId) -> Self {
        Self { tx, ui_thread }
    }

    /// Whether the calling thread is the UI thread
    pub fn is_ui_thread(&self) -> bool {
        thread::current().id() == self.ui_thread
    }

    /// Queue a job without waiting for it
    pub fn post<F>(&self, job: F) -> HarnessResult<()>
    where
        F: FnOnce(&mut UiContext) + Send + 'static,
    {
        self.tx
            .send(Message::Run(Box::new(job)))
            .map_err(|_| HarnessError::UiThreadGone)
    }

    /// Run `job` on the UI thread and wait up to `timeout` for its result
    pub fn invoke<F, R>(&self, timeout: Duration, job: F) -> HarnessResult<R>
    where
        F: FnOnce(&mut UiContext) -> R + Send + 'static,
        R: Send + 'static,
    {
        self.invoke_named("UI dispatch", timeout, job)
    }

    pub(crate) fn invoke_named<F, R>(
        &self,
        operation: &'static str,
        timeout: Duration,
        job: F,
    ) -> HarnessResult<R>
    where
        F: FnOnce(&mut UiContext) -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_ui_thread() {
            return Err(HarnessError::Failed(format!(
                "{} invoked from the UI thread",
                operation
            )));
        }

        let (tx, rx) = bounded(1);
        self.post(move |ctx| {
            let result = panic::catch_unwind(AssertUnwindSafe(|| job(ctx)));
            let _ = tx.send(result.map_err(panic_message));
        })?;

        match rx.recv_timeout(timeout) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(HarnessError::UiJobPanicked(message)),
            Err(RecvTimeoutError::Timeout) => Err(HarnessError::Timeout {
                operation,
                after: timeout,
            }),
            // The queue was dropped with the job still in it
            Err(RecvTimeoutError::Disconnected) => Err(HarnessError::UiThreadGone),
        }
    }

    /// Block until the UI queue is drained, including work queued by the
    /// jobs that ran while waiting.
    pub fn wait_for_idle(&self, timeout: Duration) -> HarnessResult<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(HarnessError::Timeout {
                    operation: "UI idle",
                    after: timeout,
                });
            }
            let idle = self
                .invoke_named("UI idle", remaining, |ctx| ctx.is_idle())
                .map_err(|err| match err {
                    HarnessError::Timeout { operation, .. } => HarnessError::Timeout {
                        operation,
                        after: timeout,
                    },
                    other => other,
                })?;
            if idle {
                return Ok(());
            }
        }
    }

    pub(crate) fn shutdown(&self) -> HarnessResult<()> {
        self.tx
            .send(Message::Shutdown)
            .map_err(|_| HarnessError::UiThreadGone)
    }
}

impl std::fmt::Debug for UiDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiDispatcher")
            .field("ui_thread", &self.ui_thread)
            .field("queued", &self.tx.len())
            .finish()
    }
}

/// State owned by the UI thread and handed to every job
pub struct UiContext {
    window: Window,
    dispatcher: UiDispatcher,
    backlog: usize,
}

impl UiContext {
    pub(crate) fn new(window: Window, dispatcher: UiDispatcher) -> Self {
        Self {
            window,
            dispatcher,
            backlog: 0,
        }
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }

    pub fn dispatcher(&self) -> &UiDispatcher {
        &self.dispatcher
    }

    /// Queue follow-up work behind everything already queued
    pub fn post<F>(&self, job: F) -> HarnessResult<()>
    where
        F: FnOnce(&mut UiContext) + Send + 'static,
    {
        self.dispatcher.post(job)
    }

    /// True when no other job was waiting as this one started
    pub fn is_idle(&self) -> bool {
        self.backlog == 0
    }

    /// Raise a button's activation notification the way a click would.
    /// Returns the number of handlers that ran.
    pub fn raise_activated(&mut self, button: &WidgetHandle) -> HarnessResult<usize> {
        let handlers = self.window.take_activation(button)?;
        debug!(button = button.name(), handlers = handlers.len(), "raising activation");
        for handler in &handlers {
            handler(self);
        }
        Ok(handlers.len())
    }

    pub(crate) fn close_window(&mut self) -> bool {
        self.window.close()
    }
}

/// Run jobs until a shutdown message arrives or every sender is gone
pub(crate) fn run_loop(rx: &Receiver<Message>, ctx: &mut UiContext) {
    while let Ok(message) = rx.recv() {
        match message {
            Message::Run(job) => {
                ctx.backlog = rx.len();
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| job(ctx))) {
                    error!("UI job panicked: {}", panic_message(payload));
                }
            }
            Message::Shutdown => break,
        }
    }
    debug!("UI loop stopped");
}

pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::widget::WidgetKind;
    use crossbeam_channel::unbounded;

    /// Spin up a bare UI thread around `window`
    fn spawn(window: impl FnOnce() -> Window + Send + 'static) -> (UiDispatcher, thread::JoinHandle<()>) {
        let (tx, rx) = unbounded();
        let loop_tx = tx.clone();
        let handle = thread::spawn(move || {
            let dispatcher = UiDispatcher::new(loop_tx, thread::current().id());
            let mut ctx = UiContext::new(window(), dispatcher);
            run_loop(&rx, &mut ctx);
        });
        let dispatcher = UiDispatcher::new(tx, handle.thread().id());
        (dispatcher, handle)
    }

    #[test]
    fn test_invoke_runs_on_ui_thread() {
        let (dispatcher, handle) = spawn(|| Window::new("t"));
        let ui_thread = handle.thread().id();
        let (ran_on, on_ui) = dispatcher
            .invoke(Duration::from_secs(2), |ctx| {
                (thread::current().id(), ctx.dispatcher().is_ui_thread())
            })
            .unwrap();
        assert_eq!(ran_on, ui_thread);
        assert!(on_ui);
        assert!(!dispatcher.is_ui_thread());

        dispatcher.shutdown().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_invoke_times_out() {
        let (dispatcher, handle) = spawn(|| Window::new("t"));
        let err = dispatcher
            .invoke(Duration::from_millis(50), |_| thread::sleep(Duration::from_millis(400)))
            .unwrap_err();
        assert!(matches!(err, HarnessError::Timeout { .. }), "got {:?}", err);

        dispatcher.shutdown().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_panicking_job_keeps_loop_alive() {
        let (dispatcher, handle) = spawn(|| Window::new("t"));
        let err = dispatcher
            .invoke(Duration::from_secs(2), |_| -> () { panic!("boom") })
            .unwrap_err();
        assert!(matches!(err, HarnessError::UiJobPanicked(ref m) if m == "boom"));

        let title = dispatcher
            .invoke(Duration::from_secs(2), |ctx| ctx.window().title().to_string())
            .unwrap();
        assert_eq!(title, "t");

        dispatcher.shutdown().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_wait_for_idle_covers_chained_posts() {
        let (dispatcher, handle) =
            spawn(|| Window::new("t").with_text_block("Out", "0"));

        dispatcher
            .post(|ctx| {
                let _ = ctx.post(|ctx| {
                    let _ = ctx.post(|ctx| {
                        if let Ok(out) = ctx.window().find("Out", WidgetKind::TextBlock) {
                            let _ = ctx.window_mut().set_text(&out, "3");
                        }
                    });
                });
            })
            .unwrap();

        dispatcher.wait_for_idle(Duration::from_secs(2)).unwrap();
        let text = dispatcher
            .invoke(Duration::from_secs(2), |ctx| {
                let out = ctx.window().find("Out", WidgetKind::TextBlock)?;
                ctx.window().text(&out)
            })
            .unwrap()
            .unwrap();
        assert_eq!(text, "3");

        dispatcher.shutdown().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_post_after_shutdown_fails() {
        let (dispatcher, handle) = spawn(|| Window::new("t"));
        dispatcher.shutdown().unwrap();
        handle.join().unwrap();
        assert!(matches!(dispatcher.post(|_| {}), Err(HarnessError::UiThreadGone)));
    }
}
