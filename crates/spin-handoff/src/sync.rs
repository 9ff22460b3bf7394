#[cfg(not(feature = "loom"))]
pub(crate) use std::sync::Arc;
#[cfg(feature = "loom")]
pub(crate) use loom::sync::Arc;

#[cfg(not(feature = "loom"))]
pub(crate) use std::sync::atomic::{AtomicPtr, AtomicU32, Ordering};
#[cfg(feature = "loom")]
pub(crate) use loom::sync::atomic::{AtomicPtr, AtomicU32, Ordering};

#[cfg(not(feature = "loom"))]
pub(crate) use parking_lot::Mutex;
#[cfg(feature = "loom")]
pub(crate) use self::loom_mutex::Mutex;

#[cfg(all(test, feature = "loom"))]
pub(crate) use loom::thread;

#[cfg(feature = "loom")]
mod loom_mutex {
    use std::sync::PoisonError;

    /// `loom::sync::Mutex` with the `parking_lot` locking signature.
    #[derive(Debug)]
    pub(crate) struct Mutex<T>(loom::sync::Mutex<T>);

    impl<T> Mutex<T> {
        pub(crate) fn new(value: T) -> Self {
            Self(loom::sync::Mutex::new(value))
        }

        pub(crate) fn lock(&self) -> loom::sync::MutexGuard<'_, T> {
            self.0.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }
}
