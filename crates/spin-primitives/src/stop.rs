//! Stop conditions consulted between poll attempts.
//!
//! Production loops spin forever ([`Forever`]). Anything that has to end, tests
//! first among them, passes a condition that is checked once per iteration,
//! after the slot has been read.

#[cfg(any(test, feature = "alloc"))]
use crate::sync::{Arc, AtomicBool, Ordering};

/// Decides whether a spin should give up.
pub trait StopCondition {
    fn should_stop(&self) -> bool;

    /// Stop when either `self` or `other` says so.
    fn or<B: StopCondition>(self, other: B) -> Or<Self, B>
    where
        Self: Sized,
    {
        Or(self, other)
    }
}

/// Never stops. Compiles down to the bare spin.
#[derive(Debug, Clone, Copy, Default)]
pub struct Forever;

impl StopCondition for Forever {
    #[inline(always)]
    fn should_stop(&self) -> bool {
        false
    }
}

impl<F: Fn() -> bool> StopCondition for F {
    #[inline]
    fn should_stop(&self) -> bool {
        self()
    }
}

/// Two conditions, either of which stops the spin.
#[derive(Debug, Clone, Copy)]
pub struct Or<A, B>(pub A, pub B);

impl<A: StopCondition, B: StopCondition> StopCondition for Or<A, B> {
    #[inline]
    fn should_stop(&self) -> bool {
        self.0.should_stop() || self.1.should_stop()
    }
}

/// Cooperative cancellation shared between the spinning thread and its owner.
#[cfg(any(test, feature = "alloc"))]
#[derive(Clone)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

#[cfg(any(test, feature = "alloc"))]
impl CancelToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[cfg(any(test, feature = "alloc"))]
impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "alloc"))]
impl StopCondition for CancelToken {
    #[inline]
    fn should_stop(&self) -> bool {
        self.is_cancelled()
    }
}

#[cfg(any(test, feature = "alloc"))]
impl core::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Wall-clock bound on a spin.
#[cfg(any(test, feature = "std"))]
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: std::time::Instant,
}

#[cfg(any(test, feature = "std"))]
impl Deadline {
    pub fn at(at: std::time::Instant) -> Self {
        Self { at }
    }

    pub fn after(timeout: core::time::Duration) -> Self {
        Self::at(std::time::Instant::now() + timeout)
    }

    pub fn has_passed(&self) -> bool {
        std::time::Instant::now() >= self.at
    }
}

#[cfg(any(test, feature = "std"))]
impl StopCondition for Deadline {
    #[inline]
    fn should_stop(&self) -> bool {
        self.has_passed()
    }
}
