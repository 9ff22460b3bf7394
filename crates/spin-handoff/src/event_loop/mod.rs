//! Four wirings of the same poll loop.
//!
//! Every variant watches a read slot and produces a write for each observed
//! change. They differ only in where control sits between the poll and the
//! write:
//!
//! | Variant              | Dispatch                       | Writes the output      |
//! |----------------------|--------------------------------|------------------------|
//! | [`DirectForward`]    | inline                         | the poll thread        |
//! | [`CallbackDispatch`] | [`ValueHandler`] call          | the handler            |
//! | [`SuspendDriven`]    | `resume(())`, consumer reads   | the resumed task       |
//! | [`ResumeDriven`]     | `resume(value)`                | the resumed task       |
//!
//! Each loop cycles `Polling -> Dispatching -> Polling` with no terminal
//! state. [`EventLoop::run`] never returns; [`EventLoop::run_until`] checks a
//! [`StopCondition`] whenever a poll comes up empty.

mod callback;
mod direct;
mod resume;
mod suspend;

pub use callback::*;
pub use direct::*;
pub use resume::*;
pub use suspend::*;

use spin_primitives::{Forever, StopCondition};

/// Counters for one bounded run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Changes observed on the read slot.
    pub changes: u64,
    /// Changes that reached a handler or a parked consumer.
    pub dispatched: u64,
    /// Changes with nobody to deliver them to (no handler registered, or no
    /// consumer parked). Latest value wins, so these are simply dropped.
    pub lost: u64,
}

pub trait EventLoop {
    /// Poll and dispatch until `stop` fires on an unchanged poll.
    fn run_until<C: StopCondition + ?Sized>(&mut self, stop: &C) -> LoopStats;

    /// The production loop. Only process termination ends it.
    fn run(&mut self) -> ! {
        loop {
            self.run_until(&Forever);
        }
    }

    /// The last value observed on the read slot.
    fn last_value(&self) -> u64;
}
