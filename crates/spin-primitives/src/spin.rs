//! Busy-poll change detection.
//!
//! These loops trade a whole core for observation latency: no syscalls, no
//! parking, just repeated loads with a processor spin hint in between.

use crate::slot::SharedSlot;
use crate::stop::StopCondition;
use crate::sync::spin_loop;

/// Spin until `slot` holds something other than `last_value`.
///
/// Returns at once if the slot already differs. Never gives up. Values written
/// and overwritten between two loads are never seen; the result is whatever
/// the slot held when the change was noticed.
#[inline(always)]
pub fn spin_until_change<S: SharedSlot + ?Sized>(slot: &S, last_value: u64) -> u64 {
    let mut value = slot.load();
    while value == last_value {
        spin_loop();
        value = slot.load();
    }
    value
}

/// Like [`spin_until_change`], but consults `stop` after every unchanged read.
///
/// Returns `None` only if `stop` fired before a change was observed. A change
/// that is already visible wins over a stop request.
#[inline]
pub fn spin_until_change_or<S, C>(slot: &S, last_value: u64, stop: &C) -> Option<u64>
where
    S: SharedSlot + ?Sized,
    C: StopCondition + ?Sized,
{
    loop {
        let value = slot.load();
        if value != last_value {
            return Some(value);
        }
        if stop.should_stop() {
            return None;
        }
        spin_loop();
    }
}

/// Spin until `slot` holds exactly `expected`. Returns `false` if stopped first.
#[inline]
pub fn spin_until_equal<S, C>(slot: &S, expected: u64, stop: &C) -> bool
where
    S: SharedSlot + ?Sized,
    C: StopCondition + ?Sized,
{
    loop {
        if slot.load() == expected {
            return true;
        }
        if stop.should_stop() {
            return false;
        }
        spin_loop();
    }
}

/// Client side of one ping: publish `value` on `out`, then spin until the
/// server echoes it back on `back`.
///
/// `value` must differ from the previous value written to `out`, otherwise the
/// server never sees a change.
#[inline(always)]
pub fn round_trip<A, B>(out: &A, back: &B, value: u64)
where
    A: SharedSlot + ?Sized,
    B: SharedSlot + ?Sized,
{
    out.store(value);
    let mut echoed = back.load();
    while echoed != value {
        spin_loop();
        echoed = back.load();
    }
}
