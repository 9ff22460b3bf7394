//! Word-sized slots shared between a writer and a poller.
//!
//! A slot is an 8-byte little-endian integer at a fixed address. Exactly one
//! side writes it and exactly one side polls it, so there are no write-write
//! races by construction. Loads and stores are `Relaxed`: the only guarantee
//! is the platform's natural visibility of an aligned word.

use crate::sync::{AtomicU64, Ordering};

/// One shared `u64` cell.
///
/// This is the seam the spin loops poll through. Tests substitute scripted
/// implementations; production code uses [`SlotRef`] over mapped memory.
pub trait SharedSlot {
    /// Read the current value.
    fn load(&self) -> u64;

    /// Overwrite the value in place.
    fn store(&self, value: u64);
}

impl<S: SharedSlot + ?Sized> SharedSlot for &S {
    #[inline(always)]
    fn load(&self) -> u64 {
        (**self).load()
    }

    #[inline(always)]
    fn store(&self, value: u64) {
        (**self).store(value)
    }
}

/// Provider of the two slots an event loop works on.
///
/// The loop never allocates, maps or frees slot memory itself; whoever
/// implements this owns it.
pub trait SlotPair {
    type Slot: SharedSlot;

    /// Slot written by the external client and polled by the loop.
    fn read_slot(&self) -> Self::Slot;

    /// Slot written by the loop (or its consumer) and polled by the client.
    fn write_slot(&self) -> Self::Slot;
}

/// A slot over a borrowed atomic word.
#[derive(Clone, Copy)]
pub struct SlotRef<'a> {
    word: &'a AtomicU64,
}

impl<'a> SlotRef<'a> {
    pub fn new(word: &'a AtomicU64) -> Self {
        Self { word }
    }

    /// View a raw word (typically inside an mmapped region) as a slot.
    ///
    /// # Safety
    ///
    /// `ptr` must be non-null, 8-byte aligned and valid for reads and writes
    /// for `'a`. All accesses to the word for that lifetime must be atomic.
    #[cfg(not(feature = "loom"))]
    pub unsafe fn from_raw(ptr: *mut u64) -> Self {
        Self {
            word: unsafe { AtomicU64::from_ptr(ptr) },
        }
    }
}

impl SharedSlot for SlotRef<'_> {
    #[inline(always)]
    fn load(&self) -> u64 {
        self.word.load(Ordering::Relaxed)
    }

    #[inline(always)]
    fn store(&self, value: u64) {
        self.word.store(value, Ordering::Relaxed)
    }
}

impl core::fmt::Debug for SlotRef<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SlotRef")
            .field("value", &self.load())
            .finish()
    }
}

/// A heap-owned slot. Clones share the same word.
#[cfg(any(test, feature = "alloc"))]
#[derive(Clone)]
pub struct HeapSlot {
    word: crate::sync::Arc<AtomicU64>,
}

#[cfg(any(test, feature = "alloc"))]
impl HeapSlot {
    pub fn new(initial: u64) -> Self {
        Self {
            word: crate::sync::Arc::new(AtomicU64::new(initial)),
        }
    }
}

#[cfg(any(test, feature = "alloc"))]
impl Default for HeapSlot {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(any(test, feature = "alloc"))]
impl SharedSlot for HeapSlot {
    #[inline(always)]
    fn load(&self) -> u64 {
        self.word.load(Ordering::Relaxed)
    }

    #[inline(always)]
    fn store(&self, value: u64) {
        self.word.store(value, Ordering::Relaxed)
    }
}

#[cfg(any(test, feature = "alloc"))]
impl core::fmt::Debug for HeapSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HeapSlot")
            .field("value", &self.load())
            .finish()
    }
}

/// In-process slot pair, both slots starting at zero.
#[cfg(any(test, feature = "alloc"))]
#[derive(Clone, Debug, Default)]
pub struct HeapSlots {
    pub read: HeapSlot,
    pub write: HeapSlot,
}

#[cfg(any(test, feature = "alloc"))]
impl HeapSlots {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(any(test, feature = "alloc"))]
impl SlotPair for HeapSlots {
    type Slot = HeapSlot;

    fn read_slot(&self) -> HeapSlot {
        self.read.clone()
    }

    fn write_slot(&self) -> HeapSlot {
        self.write.clone()
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    #[test]
    fn slot_ref_reads_and_writes_the_word() {
        let word = AtomicU64::new(3);
        let slot = SlotRef::new(&word);
        assert_eq!(slot.load(), 3);
        slot.store(11);
        assert_eq!(word.load(Ordering::Relaxed), 11);
    }

    #[test]
    fn slot_ref_from_raw_aliases_memory() {
        let mut backing: u64 = 0;
        let slot = unsafe { SlotRef::from_raw(&mut backing as *mut u64) };
        slot.store(0xdead_beef);
        assert_eq!(slot.load(), 0xdead_beef);
    }

    #[test]
    fn heap_slot_clones_share_storage() {
        let a = HeapSlot::new(1);
        let b = a.clone();
        b.store(2);
        assert_eq!(a.load(), 2);
    }

    #[test]
    fn heap_slots_hand_out_independent_words() {
        let pair = HeapSlots::new();
        pair.read_slot().store(7);
        assert_eq!(pair.read.load(), 7);
        assert_eq!(pair.write_slot().load(), 0);
    }
}
