//! Single-slot, single-waiter synchronous rendezvous.
//!
//! A [`Handoff`] moves one value from a driving thread into a suspended task.
//! The task calls [`Handoff::park_and_wait`] and suspends; the driver calls
//! [`Handoff::resume`] and the task continues with exactly that value.
//!
//! # State
//!
//! ```text
//!            park_and_wait()                    resume(v)
//!   EMPTY ───────────────────▶ ARMED ──────────────────────▶ EMPTY
//!     │                          │                         (task sees v)
//!     │ resume(v)                │ park_and_wait()
//!     ▼                          ▼
//!   EMPTY (v dropped)         EMPTY, both continuations fail
//!                             with ProtocolViolation
//! ```
//!
//! The parked continuation is a heap-allocated token behind an `AtomicPtr`.
//! Parking is a compare-exchange from null, resuming is a swap to null, so at
//! most one continuation is ever parked even if callers break the one-owner
//! convention.
//!
//! There is no queue. A resume that finds nothing parked is discarded; the
//! next parked continuation only sees the next resume.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::ptr;
use std::task::{Context, Poll, Waker};

use crate::error::HandoffError;
use crate::sync::{Arc, AtomicPtr, Mutex, Ordering};

/// Single-use resumption token for one parked continuation.
struct Continuation<T> {
    waiting: Mutex<Waiting<T>>,
}

struct Waiting<T> {
    outcome: Option<Result<T, HandoffError>>,
    /// Waker from the most recent poll.
    waker: Waker,
}

impl<T> Continuation<T> {
    fn new(waker: &Waker) -> Self {
        Self {
            waiting: Mutex::new(Waiting {
                outcome: None,
                waker: waker.clone(),
            }),
        }
    }

    fn complete(&self, outcome: Result<T, HandoffError>) {
        let waker = {
            let mut waiting = self.waiting.lock();
            waiting.outcome = Some(outcome);
            waiting.waker.clone()
        };
        // A task waker polls synchronously, and that poll takes the lock.
        waker.wake();
    }

    fn poll_outcome(&self, waker: &Waker) -> Poll<Result<T, HandoffError>> {
        let mut waiting = self.waiting.lock();
        if let Some(outcome) = waiting.outcome.take() {
            return Poll::Ready(outcome);
        }
        if !waiting.waker.will_wake(waker) {
            waiting.waker = waker.clone();
        }
        Poll::Pending
    }

    /// The address `Arc::into_raw` returns for this continuation.
    fn token(&self) -> *mut Continuation<T> {
        ptr::from_ref(self).cast_mut()
    }
}

pub struct Handoff<T> {
    /// Null when empty. Otherwise a pointer from `Arc::into_raw`, owning one
    /// strong count of the parked continuation.
    parked: AtomicPtr<Continuation<T>>,
    _marker: PhantomData<Arc<Continuation<T>>>,
}

impl<T> Handoff<T> {
    pub fn new() -> Self {
        Self {
            parked: AtomicPtr::new(ptr::null_mut()),
            _marker: PhantomData,
        }
    }

    /// Suspend the calling task until the next [`resume`](Self::resume).
    ///
    /// Fails with [`HandoffError::ProtocolViolation`] if another continuation
    /// is already parked; that continuation is failed as well. The waker from
    /// the most recent poll is the one that gets woken.
    pub fn park_and_wait(&self) -> Park<'_, T> {
        Park {
            handoff: self,
            state: ParkState::Idle,
        }
    }

    /// Hand `value` to the parked continuation and wake it.
    ///
    /// Returns `false`, dropping `value`, if nothing was parked. When the
    /// continuation belongs to a [`Task`](crate::task) that is not currently
    /// being polled, it runs to its next suspension point before this returns.
    pub fn resume(&self, value: T) -> bool {
        self.complete(Ok(value))
    }

    /// Like [`resume`](Self::resume), but the continuation fails with `error`.
    pub fn resume_with_fault(&self, error: HandoffError) -> bool {
        self.complete(Err(error))
    }

    /// Whether a continuation is currently parked. Diagnostic only.
    pub fn is_armed(&self) -> bool {
        !self.parked.load(Ordering::Acquire).is_null()
    }

    fn take(&self) -> Option<Arc<Continuation<T>>> {
        let ptr = self.parked.swap(ptr::null_mut(), Ordering::AcqRel);
        if ptr.is_null() {
            return None;
        }
        // SAFETY: non-null values in `parked` come from `Arc::into_raw`, and the
        // swap transferred that strong count to us.
        Some(unsafe { Arc::from_raw(ptr) })
    }

    fn complete(&self, outcome: Result<T, HandoffError>) -> bool {
        match self.take() {
            Some(continuation) => {
                continuation.complete(outcome);
                true
            }
            None => false,
        }
    }
}

impl<T> Default for Handoff<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Handoff<T> {
    fn drop(&mut self) {
        drop(self.take());
    }
}

impl<T> std::fmt::Debug for Handoff<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handoff")
            .field("armed", &self.is_armed())
            .finish()
    }
}

enum ParkState<T> {
    Idle,
    Parked(Arc<Continuation<T>>),
    Done,
}

/// Future returned by [`Handoff::park_and_wait`].
///
/// Dropping it while parked disarms the handoff.
#[must_use = "futures do nothing unless polled"]
pub struct Park<'a, T> {
    handoff: &'a Handoff<T>,
    state: ParkState<T>,
}

impl<T> Future for Park<'_, T> {
    type Output = Result<T, HandoffError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &this.state {
            ParkState::Idle => {
                let continuation = Arc::new(Continuation::new(cx.waker()));
                let token = Arc::into_raw(Arc::clone(&continuation)) as *mut Continuation<T>;
                match this.handoff.parked.compare_exchange(
                    ptr::null_mut(),
                    token,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => {
                        this.state = ParkState::Parked(continuation);
                        Poll::Pending
                    }
                    Err(_) => {
                        // SAFETY: the exchange failed, so `token` was never
                        // published and we still own its strong count.
                        drop(unsafe { Arc::from_raw(token) });
                        this.state = ParkState::Done;
                        tracing::error!("park on an armed handoff, failing both continuations");
                        this.handoff
                            .resume_with_fault(HandoffError::ProtocolViolation);
                        Poll::Ready(Err(HandoffError::ProtocolViolation))
                    }
                }
            }
            ParkState::Parked(continuation) => {
                let outcome = continuation.poll_outcome(cx.waker());
                if outcome.is_ready() {
                    this.state = ParkState::Done;
                }
                outcome
            }
            ParkState::Done => panic!("`Park` polled after completion"),
        }
    }
}

impl<T> Drop for Park<'_, T> {
    fn drop(&mut self) {
        if let ParkState::Parked(continuation) = &self.state {
            let token = continuation.token();
            // Our own Arc keeps the allocation alive, so the address cannot have
            // been reused by another continuation.
            if self
                .handoff
                .parked
                .compare_exchange(token, ptr::null_mut(), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                // SAFETY: we just unpublished the pointer and own its count.
                drop(unsafe { Arc::from_raw(token) });
            }
        }
    }
}
