use spin_primitives::{SharedSlot, StopCondition, spin_until_change_or};

use super::{EventLoop, LoopStats};

/// Late-bound reaction to a changed value.
pub trait ValueHandler {
    fn on_change(&mut self, value: u64);
}

impl<F: FnMut(u64)> ValueHandler for F {
    #[inline]
    fn on_change(&mut self, value: u64) {
        self(value)
    }
}

/// Handler that copies every value to an output slot and remembers the last.
#[derive(Debug)]
pub struct ForwardingHandler<W> {
    write: W,
    last_forwarded: u64,
}

impl<W: SharedSlot> ForwardingHandler<W> {
    pub fn new(write: W) -> Self {
        Self {
            write,
            last_forwarded: 0,
        }
    }

    pub fn last_forwarded(&self) -> u64 {
        self.last_forwarded
    }
}

impl<W: SharedSlot> ValueHandler for ForwardingHandler<W> {
    #[inline]
    fn on_change(&mut self, value: u64) {
        self.write.store(value);
        self.last_forwarded = value;
    }
}

/// Whether a handler is installed.
pub enum Registration {
    Vacant,
    Handler(Box<dyn ValueHandler + Send>),
}

impl Registration {
    pub fn is_vacant(&self) -> bool {
        matches!(self, Registration::Vacant)
    }
}

impl std::fmt::Debug for Registration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Registration::Vacant => f.write_str("Vacant"),
            Registration::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

/// Spin, then call the registered handler with the new value.
pub struct CallbackDispatch<R> {
    read: R,
    registration: Registration,
    last_value: u64,
}

impl<R: SharedSlot> CallbackDispatch<R> {
    /// A loop with no handler yet. Changes are tracked but go nowhere.
    pub fn new(read: R) -> Self {
        Self {
            read,
            registration: Registration::Vacant,
            last_value: 0,
        }
    }

    pub fn with_handler(read: R, handler: impl ValueHandler + Send + 'static) -> Self {
        let mut ev = Self::new(read);
        ev.set_handler(handler);
        ev
    }

    pub fn set_handler(&mut self, handler: impl ValueHandler + Send + 'static) {
        self.registration = Registration::Handler(Box::new(handler));
    }

    /// Remove the handler, returning whatever was registered.
    pub fn clear_handler(&mut self) -> Registration {
        std::mem::replace(&mut self.registration, Registration::Vacant)
    }

    pub fn registration(&self) -> &Registration {
        &self.registration
    }
}

impl<R: SharedSlot> EventLoop for CallbackDispatch<R> {
    fn run_until<C: StopCondition + ?Sized>(&mut self, stop: &C) -> LoopStats {
        let mut stats = LoopStats::default();
        while let Some(value) = spin_until_change_or(&self.read, self.last_value, stop) {
            self.last_value = value;
            stats.changes += 1;
            match &mut self.registration {
                Registration::Handler(handler) => {
                    handler.on_change(value);
                    stats.dispatched += 1;
                }
                Registration::Vacant => {
                    tracing::trace!(value, "change with no handler registered");
                    stats.lost += 1;
                }
            }
        }
        stats
    }

    fn last_value(&self) -> u64 {
        self.last_value
    }
}
