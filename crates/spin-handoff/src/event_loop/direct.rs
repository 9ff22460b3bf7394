use spin_primitives::{SharedSlot, StopCondition, spin_until_change_or};

use super::{EventLoop, LoopStats};

/// Spin, then write the new value straight to the output slot.
pub struct DirectForward<R, W> {
    read: R,
    write: W,
    last_value: u64,
}

impl<R: SharedSlot, W: SharedSlot> DirectForward<R, W> {
    pub fn new(read: R, write: W) -> Self {
        Self {
            read,
            write,
            last_value: 0,
        }
    }
}

impl<R: SharedSlot, W: SharedSlot> EventLoop for DirectForward<R, W> {
    fn run_until<C: StopCondition + ?Sized>(&mut self, stop: &C) -> LoopStats {
        let mut stats = LoopStats::default();
        while let Some(value) = spin_until_change_or(&self.read, self.last_value, stop) {
            self.last_value = value;
            self.write.store(value);
            stats.changes += 1;
            stats.dispatched += 1;
        }
        stats
    }

    fn last_value(&self) -> u64 {
        self.last_value
    }
}
