//! A slot that replays a fixed sequence of reads.
//!
//! Spin loops are unbounded, so tests drive them through a slot whose every
//! `load` returns the next scripted value. Once the script runs out, the last
//! value repeats forever and [`ScriptedSlot::is_exhausted`] turns true, which
//! is what a test hands to the loop as its stop condition.

use alloc::vec::Vec;
use core::cell::{Cell, RefCell};

use crate::slot::SharedSlot;

pub struct ScriptedSlot {
    script: Vec<u64>,
    cursor: Cell<usize>,
    stores: RefCell<Vec<u64>>,
}

impl ScriptedSlot {
    pub fn new(script: impl IntoIterator<Item = u64>) -> Self {
        Self {
            script: script.into_iter().collect(),
            cursor: Cell::new(0),
            stores: RefCell::new(Vec::new()),
        }
    }

    /// True once every scripted value has been read at least once.
    pub fn is_exhausted(&self) -> bool {
        self.cursor.get() >= self.script.len()
    }

    /// Number of loads performed so far.
    pub fn reads(&self) -> usize {
        self.cursor.get()
    }

    /// Values written through [`SharedSlot::store`], oldest first.
    pub fn stores(&self) -> Vec<u64> {
        self.stores.borrow().clone()
    }
}

impl SharedSlot for ScriptedSlot {
    fn load(&self) -> u64 {
        let cursor = self.cursor.get();
        self.cursor.set(cursor.saturating_add(1));
        match self.script.get(cursor) {
            Some(value) => *value,
            None => self.script.last().copied().unwrap_or(0),
        }
    }

    fn store(&self, value: u64) {
        self.stores.borrow_mut().push(value);
    }
}

impl core::fmt::Debug for ScriptedSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScriptedSlot")
            .field("script", &self.script)
            .field("cursor", &self.cursor.get())
            .finish()
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    #[test]
    fn replays_then_holds_last_value() {
        let slot = ScriptedSlot::new([1, 2]);
        assert_eq!(slot.load(), 1);
        assert!(!slot.is_exhausted());
        assert_eq!(slot.load(), 2);
        assert!(slot.is_exhausted());
        assert_eq!(slot.load(), 2);
        assert_eq!(slot.reads(), 3);
    }

    #[test]
    fn empty_script_reads_zero() {
        let slot = ScriptedSlot::new([]);
        assert!(slot.is_exhausted());
        assert_eq!(slot.load(), 0);
    }

    #[test]
    fn records_stores() {
        let slot = ScriptedSlot::new([0]);
        slot.store(4);
        slot.store(6);
        assert_eq!(slot.stores(), [4, 6]);
    }
}
