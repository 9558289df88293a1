//! Application-under-test lifecycle: created -> initialized -> started ->
//! stopped (terminal).
//!
//! `create` runs the application factory on the calling thread; every
//! other transition executes on the UI thread and is asynchronous: the
//! caller gets a [`TransitionHandle`] immediately and observes completion
//! (success or the carried failure) through [`TransitionHandle::wait`].
//! Out-of-order transitions are usage errors reported through the handle,
//! never silent no-ops and never thrown synchronously into the caller.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;

use crate::dispatch::UiDispatcher;
use crate::errors::DriverError;
use crate::toolkit::UiToolkit;

/// Boxed error an application callback may fail with.
pub type AppError = Box<dyn std::error::Error + Send + Sync>;

/// The application under test.
///
/// `init` runs on the UI thread before any window exists; `start` builds
/// the UI; `stop` tears it down.  Default `init`/`stop` are no-ops.
pub trait Application: Send + 'static {
    fn init(&mut self) -> Result<(), AppError> {
        Ok(())
    }

    fn start(&mut self, toolkit: &mut dyn UiToolkit) -> Result<(), AppError>;

    fn stop(&mut self, _toolkit: &mut dyn UiToolkit) -> Result<(), AppError> {
        Ok(())
    }
}

/// Lifecycle states.  `Stopped` is terminal; no further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Initialized,
    Started,
    Stopped,
}

/// Usage/cancellation failures carried as the source of a
/// [`DriverError::Lifecycle`].
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransitionError(pub String);

/// Eventual completion of one lifecycle transition.
///
/// `wait` consumes the single completion message; waiting twice on the
/// same handle reports a dispatch error.
pub struct TransitionHandle {
    phase: &'static str,
    rx: mpsc::Receiver<Result<(), DriverError>>,
    cancelled: Arc<AtomicBool>,
}

impl TransitionHandle {
    /// Request cancellation.  Effective only if the transition has not
    /// started executing; a cancelled transition reports a lifecycle
    /// error instead of running.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Block until the transition completes, up to `timeout`.
    pub fn wait(&self, timeout: Duration) -> Result<(), DriverError> {
        match self.rx.recv_timeout(timeout) {
            Ok(outcome) => outcome,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(DriverError::Timeout(timeout)),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(DriverError::Dispatch(format!(
                "{} transition outcome is gone (already waited, or UI thread exited)",
                self.phase
            ))),
        }
    }
}

/// Asynchronous lifecycle controller for one application under test.
pub struct ApplicationService {
    dispatcher: Arc<UiDispatcher>,
    app: Arc<Mutex<Box<dyn Application>>>,
    state: Arc<Mutex<LifecycleState>>,
}

impl ApplicationService {
    /// Construct the application on the calling thread.  The service
    /// starts in [`LifecycleState::Created`].
    pub fn create<A, F>(dispatcher: Arc<UiDispatcher>, factory: F) -> Self
    where
        A: Application,
        F: FnOnce() -> A,
    {
        Self {
            dispatcher,
            app: Arc::new(Mutex::new(Box::new(factory()))),
            state: Arc::new(Mutex::new(LifecycleState::Created)),
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    pub fn init(&self) -> TransitionHandle {
        self.transition(
            "init",
            LifecycleState::Created,
            LifecycleState::Initialized,
            |app, _tk| app.init(),
        )
    }

    pub fn start(&self) -> TransitionHandle {
        self.transition(
            "start",
            LifecycleState::Initialized,
            LifecycleState::Started,
            |app, tk| app.start(tk),
        )
    }

    pub fn stop(&self) -> TransitionHandle {
        self.transition(
            "stop",
            LifecycleState::Started,
            LifecycleState::Stopped,
            |app, tk| app.stop(tk),
        )
    }

    fn transition<F>(
        &self,
        phase: &'static str,
        from: LifecycleState,
        to: LifecycleState,
        f: F,
    ) -> TransitionHandle
    where
        F: FnOnce(&mut dyn Application, &mut dyn UiToolkit) -> Result<(), AppError>
            + Send
            + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let app = self.app.clone();
        let state = self.state.clone();

        let submitted = self.dispatcher.submit(move |tk| {
            if flag.load(Ordering::SeqCst) {
                let _ = tx.send(Err(DriverError::Lifecycle {
                    phase,
                    source: Box::new(TransitionError("cancelled before execution".into())),
                }));
                return;
            }

            let mut state = state.lock();
            if *state != from {
                let _ = tx.send(Err(DriverError::Lifecycle {
                    phase,
                    source: Box::new(TransitionError(format!(
                        "{phase} requires state {from:?}, current state is {:?}",
                        *state
                    ))),
                }));
                return;
            }

            let mut app = app.lock();
            let outcome = catch_unwind(AssertUnwindSafe(|| f(app.as_mut(), tk)));
            let _ = tx.send(match outcome {
                Ok(Ok(())) => {
                    *state = to;
                    log::debug!("lifecycle: {from:?} -> {to:?}");
                    Ok(())
                }
                Ok(Err(source)) => Err(DriverError::Lifecycle { phase, source }),
                Err(panic) => Err(DriverError::Lifecycle {
                    phase,
                    source: Box::new(TransitionError(panic_message(panic))),
                }),
            });
        });

        if let Err(err) = submitted {
            // The UI thread is gone; deliver the failure through the
            // handle like any other transition outcome.
            let (dead_tx, dead_rx) = mpsc::channel();
            let _ = dead_tx.send(Err(err));
            return TransitionHandle {
                phase,
                rx: dead_rx,
                cancelled,
            };
        }

        TransitionHandle {
            phase,
            rx,
            cancelled,
        }
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("application panicked: {s}")
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("application panicked: {s}")
    } else {
        "application panicked".into()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
