use std::future::Future;
use std::sync::Arc;

use spin_primitives::{SharedSlot, StopCondition, spin_until_change_or};

use super::{EventLoop, LoopStats};
use crate::error::TaskResult;
use crate::handoff::Handoff;
use crate::task::{TaskHandle, launch};

/// Default consumer: park, write the resumed value to `write`, park again.
pub async fn forward_resumed<W: SharedSlot>(handoff: Arc<Handoff<u64>>, write: W) -> TaskResult {
    loop {
        let value = handoff.park_and_wait().await?;
        write.store(value);
        tracing::trace!(value, "forwarded resumed value");
    }
}

/// Spin, then resume the consumer task with the new value.
pub struct ResumeDriven<R> {
    read: R,
    handoff: Arc<Handoff<u64>>,
    consumer: TaskHandle,
    last_value: u64,
}

impl<R: SharedSlot> ResumeDriven<R> {
    /// Loop with a [`forward_resumed`] consumer writing to `write`.
    pub fn new<W>(read: R, write: W) -> Self
    where
        W: SharedSlot + Send + 'static,
    {
        Self::with_consumer(read, move |handoff| forward_resumed(handoff, write))
    }

    /// Loop with a caller-built consumer, launched before this returns.
    pub fn with_consumer<F, Fut>(read: R, consumer: F) -> Self
    where
        F: FnOnce(Arc<Handoff<u64>>) -> Fut,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        let handoff = Arc::new(Handoff::new());
        let consumer = launch("resume-consumer", consumer(handoff.clone()));
        Self {
            read,
            handoff,
            consumer,
            last_value: 0,
        }
    }

    /// Install a fresh consumer on the same handoff, returning the old handle.
    ///
    /// If the old consumer is still parked, the new one's first park is a
    /// protocol violation and both fail.
    pub fn relaunch<F, Fut>(&mut self, consumer: F) -> TaskHandle
    where
        F: FnOnce(Arc<Handoff<u64>>) -> Fut,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        if self.consumer.is_running() {
            tracing::warn!("relaunching while the previous consumer is still running");
        }
        let fresh = launch("resume-consumer", consumer(self.handoff.clone()));
        std::mem::replace(&mut self.consumer, fresh)
    }

    pub fn consumer(&self) -> &TaskHandle {
        &self.consumer
    }

    pub fn handoff(&self) -> &Arc<Handoff<u64>> {
        &self.handoff
    }
}

impl<R> Drop for ResumeDriven<R> {
    fn drop(&mut self) {
        self.consumer.abort();
    }
}

impl<R: SharedSlot> EventLoop for ResumeDriven<R> {
    fn run_until<C: StopCondition + ?Sized>(&mut self, stop: &C) -> LoopStats {
        let mut stats = LoopStats::default();
        while let Some(value) = spin_until_change_or(&self.read, self.last_value, stop) {
            self.last_value = value;
            stats.changes += 1;
            if self.handoff.resume(value) {
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
    use crate::task::TaskExit;
    use spin_primitives::HeapSlot;

    #[test]
    fn resumed_value_reaches_output_and_consumer_reparks() {
        let read = HeapSlot::new(0);
        let write = HeapSlot::new(0);
        let mut ev = ResumeDriven::new(read.clone(), write.clone());
        assert!(ev.handoff().is_armed());

        read.store(42);
        let stats = ev.run_until(&|| true);

        assert_eq!(stats.dispatched, 1);
        assert_eq!(write.load(), 42);
        assert!(ev.handoff().is_armed());
        assert!(ev.consumer().is_running());
    }

    #[test]
    fn dropping_the_loop_aborts_its_consumer() {
        let ev = ResumeDriven::new(HeapSlot::new(0), HeapSlot::new(0));
        let consumer = ev.consumer().clone();
        let handoff = ev.handoff().clone();

        drop(ev);

        assert_eq!(consumer.exit(), Some(TaskExit::Aborted));
        assert!(!handoff.is_armed());
        assert_eq!(Arc::strong_count(&handoff), 1);
    }

    #[test]
    fn nothing_is_dispatched_without_a_change() {
        let read = HeapSlot::new(0);
        let write = HeapSlot::new(0);
        let mut ev = ResumeDriven::new(read, write.clone());
        assert_eq!(ev.run_until(&|| true), LoopStats::default());
        assert_eq!(write.load(), 0);
    }
}
