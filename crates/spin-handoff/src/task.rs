//! Cooperatively scheduled tasks driven by whoever wakes them.
//!
//! There is no executor thread and no run queue. [`launch`] polls the body on
//! the calling thread until it first suspends, and every later wake polls it
//! again, synchronously, on the waking thread. A [`Handoff`](crate::Handoff)
//! resume therefore runs the parked task to its next suspension point before
//! returning to the poll loop.
//!
//! A task is also an error boundary: an `Err` returned by the body or a panic
//! escaping it is logged and recorded in the handle, and never reaches the
//! thread that launched or woke it.

use std::any::Any;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

use crate::error::TaskResult;
use crate::sync::{AtomicU32, Mutex, Ordering};

type Body = Pin<Box<dyn Future<Output = TaskResult> + Send + 'static>>;

/// How a task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskExit {
    /// The body returned `Ok(())`.
    Completed,
    /// The body returned an error, rendered with `Display`.
    Faulted(String),
    /// The body panicked.
    Panicked(String),
    /// The body was dropped through [`TaskHandle::abort`].
    Aborted,
}

impl TaskExit {
    pub fn is_fault(&self) -> bool {
        matches!(self, TaskExit::Faulted(_) | TaskExit::Panicked(_))
    }
}

/// Nobody is polling the body.
const IDLE: u32 = 0;
/// One thread owns the body and is polling it.
const RUNNING: u32 = 1;
/// As `RUNNING`, and a wake arrived since the poll started.
const NOTIFIED: u32 = 2;
/// The body is gone.
const DONE: u32 = 3;

struct TaskCell {
    name: &'static str,
    /// Only locked by the thread that moved `state` to `RUNNING`.
    body: Mutex<Option<Body>>,
    state: AtomicU32,
    exit: Mutex<Option<TaskExit>>,
}

impl TaskCell {
    /// Take ownership of the body, or leave a notification for its owner.
    fn claim(&self) -> bool {
        let mut state = self.state.load(Ordering::Acquire);
        loop {
            let next = match state {
                IDLE => RUNNING,
                RUNNING => NOTIFIED,
                _ => return false,
            };
            match self
                .state
                .compare_exchange(state, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return next == RUNNING,
                Err(actual) => state = actual,
            }
        }
    }

    fn run(self: &Arc<Self>) {
        if !self.claim() {
            return;
        }

        let waker = Waker::from(Arc::clone(self));
        let mut cx = Context::from_waker(&waker);
        loop {
            let mut slot = self.body.lock();
            let Some(body) = slot.as_mut() else {
                return;
            };
            let exit = match catch_unwind(AssertUnwindSafe(|| body.as_mut().poll(&mut cx))) {
                Ok(Poll::Pending) => None,
                Ok(Poll::Ready(Ok(()))) => Some(TaskExit::Completed),
                Ok(Poll::Ready(Err(error))) => Some(TaskExit::Faulted(error.to_string())),
                Err(payload) => Some(TaskExit::Panicked(panic_message(payload.as_ref()))),
            };
            if let Some(exit) = exit {
                *slot = None;
                drop(slot);
                self.finish(exit);
                return;
            }
            drop(slot);

            if self
                .state
                .compare_exchange(RUNNING, IDLE, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return;
            }
            // Woken while polling; only the owner leaves `NOTIFIED`.
            self.state.store(RUNNING, Ordering::Release);
        }
    }

    fn finish(&self, exit: TaskExit) {
        match &exit {
            TaskExit::Completed => tracing::debug!(task = self.name, "task completed"),
            TaskExit::Aborted => tracing::debug!(task = self.name, "task aborted"),
            TaskExit::Faulted(error) => {
                tracing::error!(task = self.name, %error, "task exited with an unhandled fault")
            }
            TaskExit::Panicked(message) => {
                tracing::error!(task = self.name, %message, "task panicked")
            }
        }
        *self.exit.lock() = Some(exit);
        self.state.store(DONE, Ordering::Release);
    }
}

impl Wake for TaskCell {
    fn wake(self: Arc<Self>) {
        self.run();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.run();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Start `body` and drive it to its first suspension point or to completion.
pub fn launch<F>(name: &'static str, body: F) -> TaskHandle
where
    F: Future<Output = TaskResult> + Send + 'static,
{
    let cell = Arc::new(TaskCell {
        name,
        body: Mutex::new(Some(Box::pin(body))),
        state: AtomicU32::new(IDLE),
        exit: Mutex::new(None),
    });
    tracing::trace!(task = name, "launching task");
    cell.run();
    TaskHandle { cell }
}

/// Observer for a launched task.
#[derive(Clone)]
pub struct TaskHandle {
    cell: Arc<TaskCell>,
}

impl TaskHandle {
    pub fn name(&self) -> &'static str {
        self.cell.name
    }

    /// True until the body returns, faults or panics.
    pub fn is_running(&self) -> bool {
        self.cell.state.load(Ordering::Acquire) != DONE
    }

    /// How the task ended, or `None` while it is still running.
    pub fn exit(&self) -> Option<TaskExit> {
        self.cell.exit.lock().clone()
    }

    /// Drop the body without polling it again.
    ///
    /// A parked body holds its own waker through the continuation it parked,
    /// so a task that is never resumed again has to be aborted to be freed.
    /// Returns `false` if the task already exited or is being polled.
    pub fn abort(&self) -> bool {
        if self
            .cell
            .state
            .compare_exchange(IDLE, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let body = self.cell.body.lock().take();
        drop(body);
        self.cell.finish(TaskExit::Aborted);
        true
    }
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("name", &self.cell.name)
            .field("running", &self.is_running())
            .finish()
    }
}
