//! Integration test: producer failure, producer teardown, and read
//! interruption.
//!
//! A failing producer must fail its variable for every reader, past and
//! future. Dropping the last handle to a variable must stop its producer
//! and deregister it from everything it read. Interrupting a blocked read
//! must fail only that read.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rivulet_core::{ProducerError, SchedulerConfig, VarError};
use rivulet_task::ThreadScheduler;
use rivulet_test_utils::fixtures::{fail_after, panic_after, Counter};
use rivulet_test_utils::{init_tracing, wait_until, Probe, EVENTUALLY};
use rivulet_var::{ProducerExit, Var};

// ── failure ──────────────────────────────────────────────────────

#[test]
fn failure_reaches_readers_before_and_after() {
    init_tracing();
    let trigger: Var<bool> = Var::new();
    let t = trigger.clone();
    let p: Var<u32> = Var::producing(move || {
        if t.get()? == Some(true) {
            Err(ProducerError::failed("tripped"))
        } else {
            Ok(1u32)
        }
    })
    .unwrap();
    trigger.set(false);

    // Reader that already observed a value.
    assert_eq!(p.get().unwrap(), Some(1));

    // Reader blocked in get_next when the failure lands.
    let blocked = p.clone();
    let probe = Probe::spawn(move || {
        blocked.get().unwrap();
        blocked.get_next()
    });
    probe.assert_blocked();

    trigger.set(true);
    let expected = ProducerError::failed("tripped");
    assert_eq!(
        p.producer().unwrap().wait_exit(EVENTUALLY),
        Some(ProducerExit::Failed(expected.clone()))
    );

    assert_eq!(probe.join(), Err(VarError::ProducerFailed(expected.clone())));
    assert_eq!(p.get(), Err(VarError::ProducerFailed(expected.clone())));
    assert_eq!(p.get_next(), Err(VarError::ProducerFailed(expected.clone())));

    // A reader that never read before the failure.
    let late = p.clone();
    let late_probe = Probe::spawn(move || late.get());
    assert_eq!(late_probe.join(), Err(VarError::ProducerFailed(expected)));
}

#[test]
fn failure_is_permanent() {
    init_tracing();
    let p: Var<u64> = Var::producing(fail_after(0, "never worked")).unwrap();
    p.producer().unwrap().wait_exit(EVENTUALLY).unwrap();
    p.set(5);
    for _ in 0..3 {
        assert!(matches!(p.get(), Err(VarError::ProducerFailed(_))));
    }
    assert_eq!(p.failure(), Some(ProducerError::failed("never worked")));
}

#[test]
fn panicking_producer_fails_the_variable() {
    init_tracing();
    let input: Var<u8> = Var::new();
    let i = input.clone();
    let p: Var<u8> = Var::producing(move || {
        let n = i.get()?.unwrap_or(0);
        if n > 0 {
            panic!("producer blew up on {n}");
        }
        Ok(n)
    })
    .unwrap();
    input.set(0);
    assert_eq!(p.get().unwrap(), Some(0));
    input.set(1);
    assert_eq!(
        p.producer().unwrap().wait_exit(EVENTUALLY),
        Some(ProducerExit::Failed(ProducerError::Panicked {
            message: "producer blew up on 1".into()
        }))
    );
    assert!(matches!(
        p.get(),
        Err(VarError::ProducerFailed(ProducerError::Panicked { .. }))
    ));
}

#[test]
fn panic_fixture_fails_on_first_call() {
    init_tracing();
    let p: Var<u64> = Var::producing(panic_after(0, "immediate")).unwrap();
    let late = p.clone();
    let probe = Probe::spawn(move || late.get());
    assert!(matches!(
        probe.join(),
        Err(VarError::ProducerFailed(ProducerError::Panicked { .. }))
    ));
}

// ── teardown ─────────────────────────────────────────────────────

#[test]
fn dropping_last_handle_terminates_producer() {
    init_tracing();
    let input: Var<u32> = Var::new();
    input.set(1);
    let i = input.clone();
    let ran = Arc::new(AtomicBool::new(false));
    let ran2 = Arc::clone(&ran);
    let p: Var<u32> = Var::producing(move || {
        ran2.store(true, Ordering::SeqCst);
        Ok(i.get()?.unwrap_or(0))
    })
    .unwrap();
    assert_eq!(p.get().unwrap(), Some(1));
    assert!(ran.load(Ordering::SeqCst));

    let handle = p.producer().unwrap();
    assert!(!handle.is_terminated());
    assert_eq!(input.dependent_count(), 1);

    drop(p);
    assert_eq!(handle.wait_exit(EVENTUALLY), Some(ProducerExit::VarDropped));
    assert!(handle.is_terminated());
    assert!(wait_until(EVENTUALLY, || handle.task().is_terminated()));

    // Teardown removed the producer from its upstream.
    assert_eq!(input.dependent_count(), 0);
    input.set(2);
}

#[test]
fn producer_does_not_pin_its_variable() {
    init_tracing();
    let p: Var<u8> = Var::producing(|| Ok(3u8)).unwrap();
    assert_eq!(p.get().unwrap(), Some(3));
    let handle = p.producer().unwrap();
    let var_id = handle.var_id();
    assert_eq!(var_id, p.id());
    drop(p);
    assert_eq!(handle.wait_exit(EVENTUALLY), Some(ProducerExit::VarDropped));
}

#[test]
fn failed_producer_deregisters_from_upstream() {
    init_tracing();
    let input: Var<i32> = Var::new();
    let i = input.clone();
    let p: Var<i32> = Var::producing(move || match i.get()? {
        Some(n) if n < 0 => Err(ProducerError::failed("negative")),
        other => Ok(other.unwrap_or(0)),
    })
    .unwrap();
    input.set(1);
    assert_eq!(p.get().unwrap(), Some(1));
    assert_eq!(input.dependent_count(), 1);

    input.set(-1);
    p.producer().unwrap().wait_exit(EVENTUALLY).unwrap();
    assert_eq!(input.dependent_count(), 0);
}

#[test]
fn teardown_wakes_remaining_dependents_once() {
    init_tracing();
    let input: Var<u32> = Var::new();
    input.set(1);
    let i1 = input.clone();
    let leaving: Var<u32> = Var::producing(move || Ok(i1.get()?.unwrap_or(0))).unwrap();
    let runs = Counter::new();
    let (i2, r) = (input.clone(), runs.clone());
    let staying: Var<u32> = Var::producing(move || {
        r.bump();
        Ok(i2.get()?.unwrap_or(0) * 2)
    })
    .unwrap();
    assert_eq!(leaving.get().unwrap(), Some(1));
    assert_eq!(staying.get().unwrap(), Some(2));
    assert_eq!(input.dependent_count(), 2);

    let wakes_before = input.metrics().dependent_wakes;
    let runs_before = runs.get();
    let handle = leaving.producer().unwrap();
    drop(leaving);
    assert_eq!(handle.wait_exit(EVENTUALLY), Some(ProducerExit::VarDropped));

    // One wake, delivered to the one producer still registered.
    assert_eq!(input.dependent_count(), 1);
    assert_eq!(input.metrics().dependent_wakes, wakes_before + 1);
    assert!(wait_until(EVENTUALLY, || runs.get() > runs_before));
    assert_eq!(staying.get().unwrap(), Some(2));
}

#[test]
fn custom_scheduler_runs_producer() {
    init_tracing();
    let sched = Arc::new(
        ThreadScheduler::new(SchedulerConfig {
            thread_name_prefix: "custom".into(),
            stack_size: Some(256 * 1024),
        })
        .unwrap(),
    );
    let p: Var<String> = Var::builder()
        .name("named")
        .scheduler(sched)
        .producer(|| {
            Ok(std::thread::current()
                .name()
                .unwrap_or_default()
                .to_string())
        })
        .build()
        .unwrap();
    assert_eq!(p.get().unwrap().as_deref(), Some("custom-named"));
}

// ── interruption ─────────────────────────────────────────────────

#[test]
fn interrupt_fails_only_the_blocked_read() {
    init_tracing();
    let v: Var<u32> = Var::new();
    let (r1, r2) = (v.clone(), v.clone());
    let interrupted = Probe::spawn(move || {
        let first = r1.get();
        // The same task can read again afterwards.
        let second = r1.get();
        (first, second)
    });
    let bystander = Probe::spawn(move || r2.get());
    interrupted.assert_blocked();
    bystander.assert_blocked();

    interrupted.task().interrupt();
    std::thread::sleep(Duration::from_millis(20));
    bystander.assert_blocked();

    v.set(8);
    let (first, second) = interrupted.join();
    assert_eq!(first, Err(VarError::Interrupted));
    assert_eq!(second, Ok(Some(8)));
    assert_eq!(bystander.join(), Ok(Some(8)));
}

#[test]
fn get_next_blocks_until_a_new_value() {
    init_tracing();
    let v: Var<u32> = Var::new();
    v.set(1);
    let r = v.clone();
    let probe = Probe::spawn(move || {
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(r.get_next());
        }
        seen
    });
    // First get_next consumes the retained value; the second blocks.
    probe.assert_blocked();
    probe.task().interrupt();
    // The interrupted call fails; the third blocks again until a set.
    probe.assert_blocked();
    v.set(2);
    let seen = probe.join();
    assert_eq!(seen, vec![Ok(Some(1)), Err(VarError::Interrupted), Ok(Some(2))]);
}
