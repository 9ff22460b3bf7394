//! Shared-memory plumbing for the spin servers.
//!
//! - [`MappedSlots`]: a named POSIX shared-memory segment holding the client
//!   and server slots, implementing [`SlotPair`](spin_primitives::SlotPair).
//! - [`pin_current_thread`]: bind the calling thread to one CPU;
//!   [`try_pin_current_thread`] runs unpinned where that is unsupported.

#![forbid(unsafe_op_in_unsafe_fn)]

mod affinity;
mod error;
mod mapping;

pub use affinity::*;
pub use error::*;
pub use mapping::*;
