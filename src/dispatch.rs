//! UI-thread marshaling.
//!
//! Two execution contexts exist: the single UI thread that exclusively
//! owns the [`UiToolkit`], and automation-caller threads.  Everything
//! that reads or mutates UI state crosses this boundary as a job on the
//! dispatcher's FIFO queue:
//!
//! - [`UiDispatcher::run`] -- blocking round trip bounded by the
//!   dispatcher's timeout.  Exceeding the budget is fatal to that call;
//!   there is no retry of a frozen round trip.
//! - [`UiDispatcher::post_event`] -- fire-and-forget injection path for
//!   platform input events; does not round-trip.
//! - [`UiDispatcher::await_events`] -- explicit barrier: a no-op round
//!   trip queued after every pending event.  The UI loop drains toolkit
//!   follow-on events after each job, so when the barrier returns, every
//!   previously injected event (and its follow-ons) has been processed.
//! - [`UiDispatcher::submit`] -- non-blocking task submission used by the
//!   lifecycle service; completion is observed through the returned
//!   receiver.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::errors::DriverError;
use crate::toolkit::{InputEvent, UiToolkit};

/// Default round-trip budget.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Cap on follow-on drain rounds per job, so a self-sustaining event
/// chain cannot wedge the UI loop forever.
const MAX_FOLLOW_ON_ROUNDS: usize = 64;

enum Job {
    Invoke(Box<dyn FnOnce(&mut dyn UiToolkit) + Send>),
    Event(InputEvent),
    Shutdown,
}

/// Owns the UI thread and the toolkit living on it.
///
/// Dropping the dispatcher shuts the UI thread down and joins it.
pub struct UiDispatcher {
    tx: Mutex<mpsc::Sender<Job>>,
    timeout: Duration,
    ui_thread: Mutex<Option<JoinHandle<()>>>,
}

impl UiDispatcher {
    /// Spawn the UI thread with the default round-trip budget.
    pub fn spawn(toolkit: Box<dyn UiToolkit>) -> Result<Arc<Self>, DriverError> {
        Self::spawn_with_timeout(toolkit, DEFAULT_TIMEOUT)
    }

    /// Spawn the UI thread with an explicit round-trip budget.
    pub fn spawn_with_timeout(
        toolkit: Box<dyn UiToolkit>,
        timeout: Duration,
    ) -> Result<Arc<Self>, DriverError> {
        let (tx, rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("uidriver-ui".into())
            .spawn(move || ui_loop(rx, toolkit))
            .map_err(|e| DriverError::Dispatch(format!("failed to spawn UI thread: {e}")))?;

        Ok(Arc::new(Self {
            tx: Mutex::new(tx),
            timeout,
            ui_thread: Mutex::new(Some(handle)),
        }))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn send(&self, job: Job) -> Result<(), DriverError> {
        self.tx
            .lock()
            .send(job)
            .map_err(|_| DriverError::Dispatch("UI thread is no longer running".into()))
    }

    /// Submit a task without waiting.  Completion (the closure's return
    /// value) arrives on the returned receiver once the UI thread gets to
    /// it.
    pub fn submit<T, F>(&self, f: F) -> Result<mpsc::Receiver<T>, DriverError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn UiToolkit) -> T + Send + 'static,
    {
        let (result_tx, result_rx) = mpsc::channel();
        self.send(Job::Invoke(Box::new(move |tk| {
            // The caller may have stopped waiting; a dead receiver is fine.
            let _ = result_tx.send(f(tk));
        })))?;
        Ok(result_rx)
    }

    /// Blocking round trip onto the UI thread.
    ///
    /// Fails with [`DriverError::Timeout`] when the round trip exceeds
    /// the dispatcher's budget.  The timeout is fatal for this call and
    /// is not retried.
    pub fn run<T, F>(&self, f: F) -> Result<T, DriverError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn UiToolkit) -> T + Send + 'static,
    {
        let rx = self.submit(f)?;
        match rx.recv_timeout(self.timeout) {
            Ok(value) => Ok(value),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(DriverError::Timeout(self.timeout)),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(DriverError::Dispatch(
                "UI thread exited during a round trip".into(),
            )),
        }
    }

    /// Queue one platform-injected input event for UI-thread processing.
    /// Returns as soon as the event is enqueued; processing is
    /// asynchronous relative to injection.
    pub fn post_event(&self, event: InputEvent) -> Result<(), DriverError> {
        self.send(Job::Event(event))
    }

    /// Barrier: returns once every event injected before this call,
    /// including internally queued follow-ons, has been processed.  With
    /// nothing pending this is a single no-op round trip.
    ///
    /// Follow-on draining is capped at `MAX_FOLLOW_ON_ROUNDS` rounds per
    /// job.  A chain still emitting past the cap is logged and left in the
    /// toolkit's queue, so this barrier can return before such a chain has
    /// settled; the residue is drained by the next job, and a subsequent
    /// barrier covers it.
    pub fn await_events(&self) -> Result<(), DriverError> {
        self.run(|_| ())
    }
}

impl Drop for UiDispatcher {
    fn drop(&mut self) {
        let _ = self.send(Job::Shutdown);
        if let Some(handle) = self.ui_thread.lock().take() {
            let _ = handle.join();
        }
    }
}

fn ui_loop(rx: mpsc::Receiver<Job>, mut toolkit: Box<dyn UiToolkit>) {
    log::debug!("UI thread up");
    while let Ok(job) = rx.recv() {
        match job {
            Job::Event(event) => {
                toolkit.process_event(event);
                drain_follow_ons(toolkit.as_mut());
            }
            Job::Invoke(f) => {
                f(toolkit.as_mut());
                drain_follow_ons(toolkit.as_mut());
            }
            Job::Shutdown => break,
        }
    }
    log::debug!("UI thread down");
}

fn drain_follow_ons(tk: &mut dyn UiToolkit) {
    for _ in 0..MAX_FOLLOW_ON_ROUNDS {
        let queued = tk.take_queued();
        if queued.is_empty() {
            return;
        }
        for event in queued {
            tk.process_event(event);
        }
    }
    // The residue stays in the toolkit's queue and is picked up by the
    // next job's drain.
    log::warn!("follow-on event chain still active after {MAX_FOLLOW_ON_ROUNDS} rounds; yielding");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
