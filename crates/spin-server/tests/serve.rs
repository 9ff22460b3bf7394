//! Ping/echo across threads, over heap slots and over a real shm segment.

use std::thread;
use std::time::Duration;

use spin_handoff::{CancelToken, Deadline, LoopStats, StopCondition};
use spin_primitives::{HeapSlots, SharedSlot, SlotPair, round_trip};
use spin_server::{Mode, PingValues, serve_until};
use spin_shm::MappedSlots;

const PINGS: usize = 500;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Run a server on a background thread while `client` pings it.
fn ping_pong<P, F>(pair: P, mode: Mode, client: F) -> LoopStats
where
    P: SlotPair + Send + 'static,
    P::Slot: Send + 'static,
    F: FnOnce(),
{
    let done = CancelToken::new();
    let server = {
        let done = done.clone();
        thread::spawn(move || {
            let stop = done.or(Deadline::after(Duration::from_secs(30)));
            serve_until(&pair, mode, &stop)
        })
    };
    client();
    done.cancel();
    server.join().expect("server thread panicked")
}

#[test]
fn every_mode_echoes_over_heap_slots() {
    init_tracing();
    for mode in [Mode::Direct, Mode::Callback, Mode::Suspend, Mode::Resume] {
        let slots = HeapSlots::new();
        let (out, back) = (slots.read.clone(), slots.write.clone());

        let stats = ping_pong(slots, mode, || {
            for value in PingValues::new().take(PINGS) {
                round_trip(&out, &back, value);
                assert_eq!(back.load(), value);
            }
        });

        assert_eq!(stats.changes, PINGS as u64, "{mode:?}");
        assert_eq!(stats.dispatched, PINGS as u64, "{mode:?}");
        assert_eq!(stats.lost, 0, "{mode:?}");
    }
}

#[test]
fn resume_mode_echoes_over_shared_memory() {
    init_tracing();
    let name = format!("/spin-server-test-{}", std::process::id());
    let client = MappedSlots::create(&name).expect("create segment");
    let server = MappedSlots::open(&name).expect("open segment");

    let (out, back) = (client.client_slot(), client.server_slot());
    let stats = ping_pong(server, Mode::Resume, || {
        for value in PingValues::new().take(PINGS) {
            round_trip(&out, &back, value);
        }
    });

    assert_eq!(stats.dispatched, PINGS as u64);
    assert_eq!(back.load(), out.load());
    client.unlink().expect("unlink segment");
}
