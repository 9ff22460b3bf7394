//! End-to-end behavior of the four event loop wirings.

#![cfg(not(feature = "loom"))]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use spin_handoff::{
    CallbackDispatch, CancelToken, Deadline, DirectForward, EventLoop, Handoff, LoopStats,
    ResumeDriven, StopCondition, SuspendDriven, TaskError, TaskExit, TaskResult,
    forward_resumed,
};
use spin_primitives::{HeapSlot, HeapSlots, ScriptedSlot, SharedSlot, round_trip};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Consumer that forwards values but faults on `poison`.
async fn forward_unless(handoff: Arc<Handoff<u64>>, write: HeapSlot, poison: u64) -> TaskResult {
    loop {
        let value = handoff.park_and_wait().await?;
        if value == poison {
            return Err(format!("refusing to forward {value}").into());
        }
        write.store(value);
    }
}

#[test]
fn direct_forward_reports_only_changes() {
    init_tracing();
    let read = ScriptedSlot::new([0, 0, 5, 5, 5, 9]);
    let write = ScriptedSlot::new([]);
    let mut ev = DirectForward::new(&read, &write);

    let stats = ev.run_until(&|| read.is_exhausted());

    assert_eq!(write.stores(), [5, 9]);
    assert_eq!(stats.changes, 2);
    assert_eq!(ev.last_value(), 9);
}

#[test]
fn callback_dispatch_skips_repeats() {
    init_tracing();
    let read = ScriptedSlot::new([1, 2, 2, 3]);
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recorder = calls.clone();
    let mut ev =
        CallbackDispatch::with_handler(&read, move |value: u64| recorder.lock().push(value));

    ev.run_until(&|| read.is_exhausted());

    assert_eq!(*calls.lock(), [1, 2, 3]);
}

#[test]
fn resume_driven_forwards_and_rearms() {
    init_tracing();
    let slots = HeapSlots::new();
    let mut ev = ResumeDriven::new(slots.read.clone(), slots.write.clone());

    slots.read.store(42);
    let stats = ev.run_until(&|| true);

    assert_eq!(slots.write.load(), 42);
    assert_eq!(
        stats,
        LoopStats {
            changes: 1,
            dispatched: 1,
            lost: 0
        }
    );
    assert!(ev.handoff().is_armed());
}

#[test]
fn suspend_driven_forwards_published_value() {
    init_tracing();
    let slots = HeapSlots::new();
    let mut ev = SuspendDriven::new(slots.read.clone(), slots.write.clone());

    for value in [3, 8, 2] {
        slots.read.store(value);
        ev.run_until(&|| true);
        assert_eq!(slots.write.load(), value);
    }
    assert!(ev.wakeup().is_armed());
}

#[test]
fn faulting_consumer_does_not_stop_the_loop() {
    init_tracing();
    let slots = HeapSlots::new();
    let write = slots.write.clone();
    let mut ev = ResumeDriven::with_consumer(slots.read.clone(), move |handoff| {
        forward_unless(handoff, write, 13)
    });

    slots.read.store(12);
    ev.run_until(&|| true);
    assert_eq!(slots.write.load(), 12);

    slots.read.store(13);
    let stats = ev.run_until(&|| true);
    assert_eq!(stats.dispatched, 1);
    assert!(!ev.consumer().is_running());
    assert_eq!(
        ev.consumer().exit(),
        Some(TaskExit::Faulted("refusing to forward 13".to_string()))
    );
    assert!(!ev.handoff().is_armed());

    // The loop keeps polling with nobody parked.
    slots.read.store(14);
    let stats = ev.run_until(&|| true);
    assert_eq!(stats.lost, 1);
    assert_eq!(ev.last_value(), 14);

    let write = slots.write.clone();
    let previous = ev.relaunch(move |handoff| forward_resumed(handoff, write));
    assert!(previous.exit().is_some_and(|exit| exit.is_fault()));
    assert!(ev.handoff().is_armed());

    slots.read.store(15);
    ev.run_until(&|| true);
    assert_eq!(slots.write.load(), 15);
}

#[test]
fn panicking_consumer_is_contained() {
    init_tracing();
    let slots = HeapSlots::new();
    let mut ev = ResumeDriven::with_consumer(slots.read.clone(), |handoff| async move {
        let value = handoff.park_and_wait().await?;
        assert_ne!(value, 7, "seven is not allowed");
        Ok::<(), TaskError>(())
    });

    slots.read.store(7);
    let stats = ev.run_until(&|| true);
    assert_eq!(stats.dispatched, 1);
    assert!(matches!(ev.consumer().exit(), Some(TaskExit::Panicked(_))));
    assert_eq!(ev.last_value(), 7);
    assert!(!ev.handoff().is_armed());

    // The loop keeps polling with nobody parked.
    slots.read.store(8);
    let stats = ev.run_until(&|| true);
    assert_eq!(stats.changes, 1);
    assert_eq!(stats.lost, 1);
    assert_eq!(ev.last_value(), 8);

    let write = slots.write.clone();
    let previous = ev.relaunch(move |handoff| forward_resumed(handoff, write));
    assert!(previous.exit().is_some_and(|exit| exit.is_fault()));
    assert!(ev.handoff().is_armed());

    slots.read.store(9);
    let stats = ev.run_until(&|| true);
    assert_eq!(stats.dispatched, 1);
    assert_eq!(slots.write.load(), 9);
    assert!(ev.consumer().is_running());
}

#[test]
fn every_variant_answers_a_client_on_another_thread() {
    init_tracing();

    fn serve(ev: &mut impl EventLoop, slots: HeapSlots) {
        let cancel = CancelToken::new();
        let client = {
            let cancel = cancel.clone();
            thread::spawn(move || {
                for value in 1..=200 {
                    round_trip(&slots.read, &slots.write, value);
                }
                cancel.cancel();
            })
        };
        let stop = cancel.clone().or(Deadline::after(Duration::from_secs(30)));
        ev.run_until(&stop);
        client.join().expect("client thread panicked");
        assert!(cancel.is_cancelled(), "server gave up before the client finished");
    }

    let slots = HeapSlots::new();
    serve(
        &mut DirectForward::new(slots.read.clone(), slots.write.clone()),
        slots,
    );

    let slots = HeapSlots::new();
    let write = slots.write.clone();
    serve(
        &mut CallbackDispatch::with_handler(slots.read.clone(), move |value: u64| {
            write.store(value)
        }),
        slots,
    );

    let slots = HeapSlots::new();
    serve(
        &mut SuspendDriven::new(slots.read.clone(), slots.write.clone()),
        slots,
    );

    let slots = HeapSlots::new();
    serve(
        &mut ResumeDriven::new(slots.read.clone(), slots.write.clone()),
        slots,
    );
}
