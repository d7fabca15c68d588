//! Contract Test: Shutdown Determinism
//!
//! This test verifies that shutdown is deterministic and complete.
//!
//! Constraints verified:
//! - Engine terminates on shutdown signal
//! - An in-flight tick finishes (and is persisted) before the engine stops
//! - Ticks never overlap
//! - Start and stop are reported on the event channel
//!
//! If this test fails, someone has added:
//! - Detached background tasks
//! - Tasks that ignore cancellation
//! - Concurrent tick processing

mod common;

use common::*;
use failover_core::{EngineEvent, FailoverEngine, Target};
use std::time::Duration;

#[tokio::test]
async fn shutdown_signal_terminates_engine() {
    let (ticks, _tick_tx) = ControlledTickSource::new();
    let (engine, _event_rx) = FailoverEngine::new(
        Box::new(ScriptedProbe::default()),
        Box::new(MockDnsProvider::pointing_at(primary())),
        Box::new(FailingStateStore::new()),
        &minimal_config(),
    )
    .expect("engine construction succeeds");
    let engine = engine.with_tick_source(Box::new(ticks));

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(shutdown_tx.send(()).is_ok(), "shutdown signal send succeeds");

    let result = tokio::time::timeout(Duration::from_secs(5), engine_handle).await;
    assert!(result.is_ok(), "Engine should terminate within 5 seconds");

    let engine_result = result.unwrap().unwrap();
    assert!(
        engine_result.is_ok(),
        "Engine should shut down successfully: {:?}",
        engine_result.err()
    );
}

#[tokio::test]
async fn shutdown_waits_for_in_flight_tick() {
    let probe = ScriptedProbe::new([Step::Stall(Duration::from_millis(300))]);
    let store = FailingStateStore::new();
    let (ticks, tick_tx) = ControlledTickSource::new();
    let (engine, _event_rx) = FailoverEngine::new(
        Box::new(probe.clone()),
        Box::new(MockDnsProvider::pointing_at(primary())),
        Box::new(store.clone()),
        &minimal_config(),
    )
    .unwrap();
    let engine = engine.with_tick_source(Box::new(ticks));

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    tick_tx.send(()).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(probe.call_count(), 1, "tick should be in flight");

    // Shutdown arrives mid-tick
    shutdown_tx.send(()).unwrap();

    let state = tokio::time::timeout(Duration::from_secs(5), engine_handle)
        .await
        .expect("engine terminates")
        .unwrap()
        .unwrap();

    assert_eq!(state.samples_processed(), 1);
    let saved = store.saved().await.expect("in-flight tick was persisted");
    assert_eq!(saved.samples_processed(), 1);
}

#[tokio::test]
async fn ticks_are_processed_one_at_a_time() {
    let probe = ScriptedProbe::new([
        Step::Stall(Duration::from_millis(100)),
        Step::Stall(Duration::from_millis(100)),
        Step::Stall(Duration::from_millis(100)),
    ]);
    let (engine, _event_rx) = FailoverEngine::new(
        Box::new(probe.clone()),
        Box::new(MockDnsProvider::pointing_at(primary())),
        Box::new(FailingStateStore::new()),
        &minimal_config(),
    )
    .unwrap();
    let engine = engine.with_tick_source(Box::new(ControlledTickSource::finite(3)));

    let engine_handle = tokio::spawn(async move { engine.run_with_shutdown(None).await });

    // All three ticks are queued up front; only one may be in flight
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(probe.call_count(), 1);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(probe.call_count(), 2);

    let state = tokio::time::timeout(Duration::from_secs(5), engine_handle)
        .await
        .expect("engine stops when ticks run out")
        .unwrap()
        .unwrap();
    assert_eq!(state.samples_processed(), 3);
}

#[tokio::test]
async fn lifecycle_events_are_emitted() {
    let (engine, mut event_rx) = FailoverEngine::new(
        Box::new(ScriptedProbe::default()),
        Box::new(MockDnsProvider::pointing_at(primary())),
        Box::new(FailingStateStore::new()),
        &minimal_config(),
    )
    .unwrap();
    let engine = engine.with_tick_source(Box::new(ControlledTickSource::finite(1)));

    engine.run_with_shutdown(None).await.unwrap();

    let mut events = Vec::new();
    while let Ok(event) = event_rx.try_recv() {
        events.push(event);
    }

    assert_eq!(events.len(), 3, "events: {:?}", events);
    assert_eq!(
        events[0],
        EngineEvent::Started {
            record_name: RECORD.to_string(),
            current_target: Target::Primary,
        }
    );
    assert!(matches!(
        events[1],
        EngineEvent::SampleRecorded { success: true, .. }
    ));
    assert!(matches!(events[2], EngineEvent::Stopped { .. }));
}
