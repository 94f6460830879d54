//! Application lifetime: one UI thread and one root window per launch.

use crossbeam_channel::{Receiver, RecvTimeoutError, bounded, unbounded};
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::dispatcher::{UiContext, UiDispatcher, panic_message, run_loop};
use super::widget::Window;
use crate::harness::{HarnessError, HarnessResult};

/// An application the harness can launch
pub trait Application: Send + 'static {
    /// Build the root window with a fresh view-model. Runs on the UI thread.
    fn build_window(self, dispatcher: &UiDispatcher) -> HarnessResult<Window>;
}

/// A launched application. Closing (or dropping) it closes the window and
/// stops the UI thread.
pub struct AppLifetime {
    dispatcher: UiDispatcher,
    thread: Option<JoinHandle<()>>,
    exited: Receiver<()>,
    title: String,
    closed: bool,
}

impl AppLifetime {
    /// Start the UI thread, build the window, and wait until the UI queue is
    /// idle, all within `timeout`.
    pub fn launch<A: Application>(app: A, timeout: Duration) -> HarnessResult<Self> {
        let started = Instant::now();
        let (tx, rx) = unbounded();
        let (ready_tx, ready_rx) = bounded::<Result<String, String>>(1);
        let (exit_tx, exit_rx) = bounded::<()>(1);

        let loop_tx = tx.clone();
        let handle = thread::Builder::new()
            .name("ui".to_string())
            .spawn(move || {
                let dispatcher = UiDispatcher::new(loop_tx, thread::current().id());
                let built = panic::catch_unwind(AssertUnwindSafe(|| app.build_window(&dispatcher)));
                match built {
                    Ok(Ok(window)) => {
                        let _ = ready_tx.send(Ok(window.title().to_string()));
                        let mut ctx = UiContext::new(window, dispatcher);
                        run_loop(&rx, &mut ctx);
                        ctx.close_window();
                    }
                    Ok(Err(err)) => {
                        let _ = ready_tx.send(Err(err.to_string()));
                    }
                    Err(payload) => {
                        let _ = ready_tx.send(Err(panic_message(payload)));
                    }
                }
                drop(exit_tx);
            })
            .map_err(|e| HarnessError::Launch(format!("failed to spawn UI thread: {}", e)))?;

        let mut lifetime = Self {
            dispatcher: UiDispatcher::new(tx, handle.thread().id()),
            thread: Some(handle),
            exited: exit_rx,
            title: String::new(),
            closed: false,
        };

        lifetime.title = match ready_rx.recv_timeout(timeout) {
            Ok(Ok(title)) => title,
            Ok(Err(message)) => return Err(HarnessError::Launch(message)),
            Err(RecvTimeoutError::Timeout) => {
                return Err(HarnessError::Timeout {
                    operation: "application launch",
                    after: timeout,
                });
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(HarnessError::Launch(
                    "UI thread exited during startup".to_string(),
                ));
            }
        };

        let remaining = timeout.saturating_sub(started.elapsed());
        lifetime.dispatcher.wait_for_idle(remaining)?;

        info!(title = %lifetime.title, "application ready after {:?}", started.elapsed());
        Ok(lifetime)
    }

    pub fn dispatcher(&self) -> &UiDispatcher {
        &self.dispatcher
    }

    /// Title of the root window
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the window and stop the UI thread. Only the first call does
    /// anything; later calls return `Ok`.
    pub fn close(&mut self, timeout: Duration) -> HarnessResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let started = Instant::now();
        let closed = self
            .dispatcher
            .invoke_named("window close", timeout, |ctx| ctx.close_window());
        let _ = self.dispatcher.shutdown();

        let remaining = timeout.saturating_sub(started.elapsed());
        match self.exited.recv_timeout(remaining) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.thread.take() {
                    if handle.join().is_err() {
                        warn!("UI thread panicked during shutdown");
                    }
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                return Err(HarnessError::Timeout {
                    operation: "UI thread exit",
                    after: timeout,
                });
            }
        }

        match closed {
            Ok(_) => {
                debug!(title = %self.title, "application closed");
                Ok(())
            }
            // The loop may already be gone if the window was built but the
            // thread stopped on its own; the window is closed either way.
            Err(HarnessError::UiThreadGone) => Ok(()),
            Err(err) => Err(err),
        }
    }
}

impl Drop for AppLifetime {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(err) = self.close(Duration::from_secs(1)) {
                warn!("failed to close application on drop: {}", err);
            }
        }
    }
}

impl std::fmt::Debug for AppLifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppLifetime")
            .field("title", &self.title)
            .field("closed", &self.closed)
            .finish()
    }
}
