#![cfg(all(test, feature = "loom"))]

use std::future::Future;
use std::task::{Context, Waker};

use loom::future::block_on;

use crate::error::{HandoffError, TaskResult};
use crate::handoff::Handoff;
use crate::sync::{Arc, Mutex, thread};
use crate::task::{TaskExit, launch};

async fn collect(handoff: Arc<Handoff<u64>>, seen: Arc<Mutex<Vec<u64>>>) -> TaskResult {
    loop {
        let value = handoff.park_and_wait().await?;
        seen.lock().push(value);
    }
}

#[test]
fn concurrent_parks_fail_together() {
    loom::model(|| {
        let handoff = Arc::new(Handoff::<u64>::new());

        let parkers: Vec<_> = (0..2)
            .map(|_| {
                let handoff = handoff.clone();
                thread::spawn(move || block_on(handoff.park_and_wait()))
            })
            .collect();

        for parker in parkers {
            assert_eq!(
                parker.join().unwrap(),
                Err(HandoffError::ProtocolViolation)
            );
        }
        assert!(!handoff.is_armed());
    });
}

#[test]
fn resume_racing_park_drop() {
    loom::model(|| {
        let handoff = Arc::new(Handoff::<u64>::new());
        let mut park = Box::pin(handoff.park_and_wait());
        let mut cx = Context::from_waker(Waker::noop());
        assert!(park.as_mut().poll(&mut cx).is_pending());

        let resumer = {
            let handoff = handoff.clone();
            thread::spawn(move || handoff.resume(1))
        };
        drop(park);

        resumer.join().unwrap();
        assert!(!handoff.is_armed());
        assert!(!handoff.resume(2));
    });
}

#[test]
fn wake_during_a_poll_is_not_lost() {
    loom::model(|| {
        let handoff = Arc::new(Handoff::<u64>::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let task = launch("collector", collect(handoff.clone(), seen.clone()));

        let resumers: Vec<_> = [1u64, 2]
            .into_iter()
            .map(|value| {
                let handoff = handoff.clone();
                thread::spawn(move || handoff.resume(value).then_some(value))
            })
            .collect();

        let mut delivered: Vec<u64> = resumers
            .into_iter()
            .filter_map(|resumer| resumer.join().unwrap())
            .collect();
        let mut observed = seen.lock().clone();
        delivered.sort_unstable();
        observed.sort_unstable();

        assert!(!delivered.is_empty());
        assert_eq!(observed, delivered);
        assert!(handoff.is_armed());

        assert!(task.abort());
        assert_eq!(task.exit(), Some(TaskExit::Aborted));
        assert!(!handoff.is_armed());
    });
}
