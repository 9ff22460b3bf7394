//! Wiring shared by the `spin-server` and `spin-client` binaries.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash, Hasher};

use clap::ValueEnum;
use spin_handoff::{
    CallbackDispatch, DirectForward, EventLoop, ForwardingHandler, LoopStats, ResumeDriven,
    StopCondition, SuspendDriven,
};
use spin_primitives::{SharedSlot, SlotPair};
use tracing_subscriber::EnvFilter;

/// Log to stderr, filtered by `RUST_LOG` (default `info`).
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

/// Which event loop answers the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Write the echo from the poll loop.
    #[default]
    Direct,
    /// Call a registered handler that writes the echo.
    Callback,
    /// Wake a parked task that reads the value and writes the echo.
    Suspend,
    /// Resume a parked task with the value; it writes the echo.
    Resume,
}

/// One of the four loops, chosen at startup.
pub enum Server<S> {
    Direct(DirectForward<S, S>),
    Callback(CallbackDispatch<S>),
    Suspend(SuspendDriven<S>),
    Resume(ResumeDriven<S>),
}

impl<S: SharedSlot + Send + 'static> Server<S> {
    pub fn new(mode: Mode, read: S, write: S) -> Self {
        match mode {
            Mode::Direct => Server::Direct(DirectForward::new(read, write)),
            Mode::Callback => Server::Callback(CallbackDispatch::with_handler(
                read,
                ForwardingHandler::new(write),
            )),
            Mode::Suspend => Server::Suspend(SuspendDriven::new(read, write)),
            Mode::Resume => Server::Resume(ResumeDriven::new(read, write)),
        }
    }

    /// Build the loop for `mode` over the slots `pair` provides.
    pub fn for_pair<P: SlotPair<Slot = S>>(mode: Mode, pair: &P) -> Self {
        Self::new(mode, pair.read_slot(), pair.write_slot())
    }

    pub fn mode(&self) -> Mode {
        match self {
            Server::Direct(_) => Mode::Direct,
            Server::Callback(_) => Mode::Callback,
            Server::Suspend(_) => Mode::Suspend,
            Server::Resume(_) => Mode::Resume,
        }
    }
}

impl<S: SharedSlot> EventLoop for Server<S> {
    fn run_until<C: StopCondition + ?Sized>(&mut self, stop: &C) -> LoopStats {
        match self {
            Server::Direct(ev) => ev.run_until(stop),
            Server::Callback(ev) => ev.run_until(stop),
            Server::Suspend(ev) => ev.run_until(stop),
            Server::Resume(ev) => ev.run_until(stop),
        }
    }

    fn last_value(&self) -> u64 {
        match self {
            Server::Direct(ev) => ev.last_value(),
            Server::Callback(ev) => ev.last_value(),
            Server::Suspend(ev) => ev.last_value(),
            Server::Resume(ev) => ev.last_value(),
        }
    }
}

/// Serve `pair` in `mode` until `stop` fires on an idle poll.
pub fn serve_until<P, C>(pair: &P, mode: Mode, stop: &C) -> LoopStats
where
    P: SlotPair,
    P::Slot: Send + 'static,
    C: StopCondition + ?Sized,
{
    let mut server = Server::for_pair(mode, pair);
    let stats = server.run_until(stop);
    tracing::debug!(
        mode = ?mode,
        changes = stats.changes,
        dispatched = stats.dispatched,
        lost = stats.lost,
        "server stopped"
    );
    stats
}

/// Serve `pair` in `mode` for the life of the process.
pub fn serve_forever<P>(pair: &P, mode: Mode) -> !
where
    P: SlotPair,
    P::Slot: Send + 'static,
{
    Server::for_pair(mode, pair).run()
}

/// Endless stream of ping payloads.
///
/// Never yields 0 (the value a freshly created segment holds) and never
/// repeats the previous value, so every ping is a visible change.
#[derive(Debug, Clone)]
pub struct PingValues {
    random_state: RandomState,
    counter: u64,
    last: u64,
}

impl PingValues {
    pub fn new() -> Self {
        Self {
            random_state: RandomState::new(),
            counter: 0,
            last: 0,
        }
    }
}

impl Default for PingValues {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for PingValues {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        loop {
            self.counter = self.counter.wrapping_add(1);
            let mut hasher = self.random_state.build_hasher();
            self.counter.hash(&mut hasher);
            let value = hasher.finish();
            if value != 0 && value != self.last {
                self.last = value;
                return Some(value);
            }
        }
    }
}
