//! Integration test: blocking receive across threads.
//!
//! A subscriber parked in `receive()` must be woken by a publish, an
//! interrupt, or a close from another thread, and must not wake for
//! anything else.

use std::sync::Arc;

use rivulet_channel::BroadcastRing;
use rivulet_core::ChannelError;
use rivulet_test_utils::{init_tracing, Probe};

#[test]
fn publish_wakes_blocked_receiver() {
    init_tracing();
    let ring = Arc::new(BroadcastRing::new(2));
    let mut sub = ring.subscribe();
    let probe = Probe::spawn(move || sub.receive());
    probe.assert_blocked();
    ring.publish(5u32);
    assert_eq!(probe.join().unwrap(), 5);
}

#[test]
fn every_blocked_receiver_is_woken() {
    init_tracing();
    let ring = Arc::new(BroadcastRing::new(1));
    let probes: Vec<_> = (0..4)
        .map(|_| {
            let mut sub = ring.subscribe();
            Probe::spawn(move || sub.receive())
        })
        .collect();
    for p in &probes {
        p.assert_blocked();
    }
    ring.publish("hello".to_string());
    for p in &probes {
        assert_eq!(p.join().unwrap(), "hello");
    }
    assert_eq!(ring.waiter_count(), 0);
}

#[test]
fn interrupt_fails_only_the_interrupted_receiver() {
    init_tracing();
    let ring = Arc::new(BroadcastRing::new(2));
    let mut a = ring.subscribe();
    let mut b = ring.subscribe();
    let pa = Probe::spawn(move || a.receive());
    let pb = Probe::spawn(move || b.receive());
    pa.assert_blocked();
    pb.assert_blocked();

    pa.task().interrupt();
    assert!(matches!(pa.join(), Err(ChannelError::Interrupted)));
    pb.assert_blocked();

    ring.publish(9u8);
    assert_eq!(pb.join().unwrap(), 9);
}

#[test]
fn close_wakes_blocked_receiver_with_cause() {
    init_tracing();
    let ring = Arc::new(BroadcastRing::<u32>::new(2));
    let mut sub = ring.subscribe();
    let probe = Probe::spawn(move || sub.receive());
    probe.assert_blocked();
    let cause: rivulet_core::CloseCause = Arc::new(std::fmt::Error);
    ring.close(Arc::clone(&cause));
    match probe.join() {
        Err(ChannelError::Closed(c)) => assert!(Arc::ptr_eq(&c, &cause)),
        other => panic!("expected Closed, got {other:?}"),
    }
}

#[test]
fn publisher_never_blocks_on_slow_reader() {
    init_tracing();
    let ring = Arc::new(BroadcastRing::new(3));
    let mut slow = ring.subscribe();
    for i in 0..10_000u32 {
        ring.publish(i);
    }
    assert_eq!(ring.displaced_count(), 10_000 - 3);
    assert_eq!(slow.receive().unwrap(), 9_997);
}
