#![doc = include_str!("../README.md")]
#![forbid(unsafe_op_in_unsafe_fn)]

mod error;
mod event_loop;
mod handoff;
mod sync;
mod task;

#[cfg(all(test, feature = "loom"))]
mod loom_tests;

pub use error::*;
pub use event_loop::*;
pub use handoff::*;
pub use task::*;

// Stop conditions bound every loop in this crate.
pub use spin_primitives::{CancelToken, Deadline, Forever, Or, StopCondition};
