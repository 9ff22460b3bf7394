use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use spin_primitives::{SharedSlot, StopCondition, spin_until_change_or};

use super::{EventLoop, LoopStats};
use crate::error::{HandoffError, TaskResult};
use crate::handoff::Handoff;
use crate::task::{TaskHandle, launch};

/// The consumer's side of a [`SuspendDriven`] loop.
///
/// The loop publishes the value it observed, then resumes the parked consumer
/// with no payload. The consumer picks the value up from here.
#[derive(Clone, Debug, Default)]
pub struct Wakeup {
    handoff: Arc<Handoff<()>>,
    observed: Arc<AtomicU64>,
}

impl Wakeup {
    /// Park until the loop sees the next change, then return that value.
    pub async fn next(&self) -> Result<u64, HandoffError> {
        self.handoff.park_and_wait().await?;
        Ok(self.observed.load(Ordering::Acquire))
    }

    /// Whether a consumer is currently parked on this wakeup.
    pub fn is_armed(&self) -> bool {
        self.handoff.is_armed()
    }

    fn publish(&self, value: u64) -> bool {
        self.observed.store(value, Ordering::Release);
        self.handoff.resume(())
    }
}

/// Default consumer: copy every published value to `write`.
pub async fn forward_on_wakeup<W: SharedSlot>(wakeup: Wakeup, write: W) -> TaskResult {
    loop {
        let value = wakeup.next().await?;
        write.store(value);
        tracing::trace!(value, "forwarded after wakeup");
    }
}

/// Spin, publish the new value, then wake the consumer task without a payload.
pub struct SuspendDriven<R> {
    read: R,
    wakeup: Wakeup,
    consumer: TaskHandle,
    last_value: u64,
}

impl<R: SharedSlot> SuspendDriven<R> {
    /// Loop with a [`forward_on_wakeup`] consumer writing to `write`.
    pub fn new<W>(read: R, write: W) -> Self
    where
        W: SharedSlot + Send + 'static,
    {
        Self::with_consumer(read, move |wakeup| forward_on_wakeup(wakeup, write))
    }

    /// Loop with a caller-built consumer. It is launched, and runs to its first
    /// park, before this returns.
    pub fn with_consumer<F, Fut>(read: R, consumer: F) -> Self
    where
        F: FnOnce(Wakeup) -> Fut,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        let wakeup = Wakeup::default();
        let consumer = launch("suspend-consumer", consumer(wakeup.clone()));
        Self {
            read,
            wakeup,
            consumer,
            last_value: 0,
        }
    }

    /// Install a fresh consumer on the same wakeup, returning the old handle.
    ///
    /// Meant for replacing a consumer that has exited. If the old one is
    /// still parked, the new one's first park is a protocol violation and
    /// both fail.
    pub fn relaunch<F, Fut>(&mut self, consumer: F) -> TaskHandle
    where
        F: FnOnce(Wakeup) -> Fut,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        if self.consumer.is_running() {
            tracing::warn!("relaunching while the previous consumer is still running");
        }
        let fresh = launch("suspend-consumer", consumer(self.wakeup.clone()));
        std::mem::replace(&mut self.consumer, fresh)
    }

    pub fn consumer(&self) -> &TaskHandle {
        &self.consumer
    }

    pub fn wakeup(&self) -> &Wakeup {
        &self.wakeup
    }
}

impl<R> Drop for SuspendDriven<R> {
    fn drop(&mut self) {
        self.consumer.abort();
    }
}

impl<R: SharedSlot> EventLoop for SuspendDriven<R> {
    fn run_until<C: StopCondition + ?Sized>(&mut self, stop: &C) -> LoopStats {
        let mut stats = LoopStats::default();
        while let Some(value) = spin_until_change_or(&self.read, self.last_value, stop) {
            self.last_value = value;
            stats.changes += 1;
            if self.wakeup.publish(value) {
                stats.dispatched += 1;
            } else {
                tracing::trace!(value, "no consumer parked, change dropped");
                stats.lost += 1;
            }
        }
        stats
    }

    fn last_value(&self) -> u64 {
        self.last_value
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use parking_lot::Mutex;
    use spin_primitives::{HeapSlot, ScriptedSlot};

    async fn record(wakeup: Wakeup, seen: Arc<Mutex<Vec<u64>>>) -> TaskResult {
        loop {
            let value = wakeup.next().await?;
            seen.lock().push(value);
        }
    }

    #[test]
    fn default_consumer_forwards_published_value() {
        let read = HeapSlot::new(0);
        let write = HeapSlot::new(0);
        let mut ev = SuspendDriven::new(read.clone(), write.clone());
        assert!(ev.consumer().is_running());
        assert!(ev.wakeup().is_armed());

        read.store(7);
        let stats = ev.run_until(&|| true);

        assert_eq!(stats.dispatched, 1);
        assert_eq!(write.load(), 7);
        assert!(ev.wakeup().is_armed());
    }

    #[test]
    fn consumer_sees_each_observed_change() {
        let read = ScriptedSlot::new([4, 4, 6, 1]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut ev = SuspendDriven::with_consumer(&read, move |wakeup| record(wakeup, sink));

        ev.run_until(&|| read.is_exhausted());
        assert_eq!(*seen.lock(), [4, 6, 1]);
    }

    #[test]
    fn changes_after_consumer_exit_are_lost() {
        let read = HeapSlot::new(0);
        let mut ev = SuspendDriven::with_consumer(read.clone(), |wakeup| async move {
            wakeup.next().await?;
            Ok::<(), TaskError>(())
        });

        read.store(1);
        assert_eq!(ev.run_until(&|| true).dispatched, 1);
        assert!(!ev.consumer().is_running());

        read.store(2);
        let stats = ev.run_until(&|| true);
        assert_eq!(stats.lost, 1);
        assert_eq!(ev.last_value(), 2);
    }
}
