//! Integration test: the facade prelude covers a complete round trip.

use std::sync::Arc;

use rivulet::prelude::*;
use rivulet_test_utils::{init_tracing, EVENTUALLY};

#[test]
fn prelude_builds_a_pipeline() {
    init_tracing();
    let scheduler: Arc<dyn Scheduler> =
        Arc::new(ThreadScheduler::new(SchedulerConfig::default()).unwrap());
    let words: Var<String> = Var::builder()
        .config(VarConfig::with_history(2))
        .name("words")
        .build()
        .unwrap();
    let w = words.clone();
    let lengths: Var<usize> = Var::builder()
        .name("lengths")
        .scheduler(scheduler)
        .producer(move || Ok(w.get()?.map(|s| s.len())))
        .build()
        .unwrap();

    words.set("river".to_string());
    assert_eq!(lengths.get().unwrap(), Some(5));

    let handle: ProducerHandle = lengths.producer().unwrap();
    assert_eq!(handle.read_count(), 1);
    let metrics: VarMetrics = words.metrics();
    assert_eq!(metrics.published, 1);
    assert_eq!(metrics.dependents, 1);

    drop(lengths);
    assert_eq!(handle.wait_exit(EVENTUALLY), Some(ProducerExit::VarDropped));
}

#[test]
fn failed_producer_surfaces_through_prelude_errors() {
    init_tracing();
    let v: Var<u8> = Var::producing(|| Err::<u8, _>(ProducerError::failed("offline"))).unwrap();
    let err = v.get().unwrap_err();
    assert_eq!(err.producer_error(), Some(&ProducerError::failed("offline")));
    assert_eq!(v.failure(), Some(ProducerError::failed("offline")));
}
