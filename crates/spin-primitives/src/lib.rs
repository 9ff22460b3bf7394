//! Shared 8-byte slots and busy-poll change detection.
//!
//! This crate provides the `no_std`-compatible leaves of the handoff stack:
//! a word-sized slot shared with another thread or process, and the spin loop
//! that watches it.
//!
//! # Primitives
//!
//! - [`SharedSlot`]: one `u64` that one side writes and the other side polls.
//!   [`SlotRef`] wraps a borrowed (or mmapped) word, [`HeapSlot`] owns one.
//! - [`SlotPair`]: the read/write slot pair a memory provider hands to a loop.
//! - [`spin_until_change`] / [`spin_until_change_or`]: busy-poll a slot until
//!   its value differs from the last one seen.
//! - [`StopCondition`]: the seam that bounds a spin so tests terminate.
//!
//! # Latest value wins
//!
//! A slot is not a queue. A writer that stores faster than the reader polls
//! overwrites values the reader never sees; only the value present at poll
//! time is observed. Every consumer in this workspace inherits that contract.
//!
//! # Loom Testing
//!
//! Enable the `loom` feature for concurrency verification.
//!
//! ```text
//! cargo test -p spin-primitives --features loom
//! ```

#![no_std]

#[cfg(any(test, feature = "alloc"))]
extern crate alloc;
#[cfg(any(test, feature = "std"))]
extern crate std;

#[cfg(any(test, feature = "alloc"))]
pub mod script;
pub mod slot;
pub mod spin;
pub mod stop;
pub mod sync;

#[cfg(any(test, feature = "alloc"))]
pub use script::ScriptedSlot;
#[cfg(any(test, feature = "alloc"))]
pub use slot::{HeapSlot, HeapSlots};
pub use slot::{SharedSlot, SlotPair, SlotRef};
pub use spin::{round_trip, spin_until_change, spin_until_change_or, spin_until_equal};
#[cfg(any(test, feature = "alloc"))]
pub use stop::CancelToken;
#[cfg(any(test, feature = "std"))]
pub use stop::Deadline;
pub use stop::{Forever, Or, StopCondition};
