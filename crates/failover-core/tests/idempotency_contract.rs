//! Contract Test: Idempotent Actions
//!
//! Applying an action whose effect is already in place must succeed without
//! writing to the provider, whether the action comes from the loop or from
//! an operator command.
//!
//! Constraints verified:
//! - Failover against a record already on backup is a no-op write
//! - Repeated manual commands write at most once
//! - A manual switch is recorded once in the event log
//! - A failed DNS write leaves the target unchanged and retries next tick

mod common;

use common::*;
use failover_core::{
    Action, ApplyOutcome, Direction, FailoverEngine, FailoverState, Target, TickOutcome, Trigger,
};

fn engine(
    probe: &ScriptedProbe,
    provider: &MockDnsProvider,
    store: &FailingStateStore,
) -> FailoverEngine {
    let (engine, _event_rx) = FailoverEngine::new(
        Box::new(probe.clone()),
        Box::new(provider.clone()),
        Box::new(store.clone()),
        &minimal_config(),
    )
    .expect("engine construction succeeds");
    engine
}

#[tokio::test]
async fn failover_onto_record_already_at_backup_does_not_write() {
    // A previous run switched the record but crashed before persisting
    let probe = ScriptedProbe::new([Step::Unhealthy, Step::Unhealthy]);
    let provider = MockDnsProvider::pointing_at(backup());
    let store = FailingStateStore::new();
    let engine = engine(&probe, &provider, &store);
    let mut state = FailoverState::fresh(Target::Primary);

    engine.tick(&mut state).await;
    let report = engine.tick(&mut state).await;

    assert_eq!(report.action, Action::Failover);
    assert_eq!(
        report.outcome,
        TickOutcome::Applied(ApplyOutcome::Unchanged { address: backup() })
    );
    assert_eq!(state.current_target(), Target::Backup);
    assert_eq!(provider.update_call_count(), 0);
}

#[tokio::test]
async fn repeated_manual_failover_writes_once() {
    let probe = ScriptedProbe::default();
    let provider = MockDnsProvider::pointing_at(primary());
    let store = FailingStateStore::new();
    let engine = engine(&probe, &provider, &store);
    let mut state = FailoverState::fresh(Target::Primary);

    let first = engine.force(&mut state, Direction::Failover).await.unwrap();
    let second = engine.force(&mut state, Direction::Failover).await.unwrap();

    assert!(matches!(first, ApplyOutcome::Updated { .. }));
    assert_eq!(second, ApplyOutcome::Unchanged { address: backup() });
    assert_eq!(provider.update_call_count(), 1);

    assert_eq!(state.current_target(), Target::Backup);
    assert_eq!(state.failover_events().len(), 1);
    let event = state.failover_events().latest().unwrap();
    assert_eq!(event.trigger, Trigger::Manual);
    assert_eq!(event.reason, "manual failover");

    let saved = store.saved().await.unwrap();
    assert_eq!(saved, state);
}

#[tokio::test]
async fn manual_restore_clears_streaks() {
    let probe = ScriptedProbe::new([Step::Unhealthy, Step::Unhealthy, Step::Unhealthy]);
    let provider = MockDnsProvider::pointing_at(primary());
    let store = FailingStateStore::new();
    let engine = engine(&probe, &provider, &store);
    let mut state = FailoverState::fresh(Target::Primary);

    for _ in 0..3 {
        engine.tick(&mut state).await;
    }
    assert_eq!(state.current_target(), Target::Backup);
    assert_eq!(state.consecutive_failures(), 3);

    engine.force(&mut state, Direction::Restore).await.unwrap();

    assert_eq!(state.current_target(), Target::Primary);
    assert_eq!(state.consecutive_failures(), 0);
    assert_eq!(state.consecutive_high_latency(), 0);
    assert_eq!(provider.address(), primary());
}

#[tokio::test]
async fn manual_restore_on_primary_is_noop() {
    let probe = ScriptedProbe::default();
    let provider = MockDnsProvider::pointing_at(primary());
    let store = FailingStateStore::new();
    let engine = engine(&probe, &provider, &store);
    let mut state = FailoverState::fresh(Target::Primary);

    let outcome = engine.force(&mut state, Direction::Restore).await.unwrap();

    assert_eq!(outcome, ApplyOutcome::Unchanged { address: primary() });
    assert_eq!(provider.update_call_count(), 0);
    assert!(state.failover_events().is_empty());
}

#[tokio::test]
async fn failed_manual_switch_leaves_state_untouched() {
    let probe = ScriptedProbe::default();
    let provider = MockDnsProvider::pointing_at(primary());
    provider.set_fail_updates(true);
    let store = FailingStateStore::new();
    let engine = engine(&probe, &provider, &store);
    let mut state = FailoverState::fresh(Target::Primary);

    let result = engine.force(&mut state, Direction::Failover).await;

    assert!(result.is_err());
    assert_eq!(state, FailoverState::fresh(Target::Primary));
    assert_eq!(store.save_call_count(), 0);
}

#[tokio::test]
async fn failed_dns_write_keeps_target_and_retries_next_tick() {
    let probe = ScriptedProbe::new([Step::Unhealthy, Step::Unhealthy, Step::Unhealthy]);
    let provider = MockDnsProvider::pointing_at(primary());
    let store = FailingStateStore::new();
    let engine = engine(&probe, &provider, &store);
    let mut state = FailoverState::fresh(Target::Primary);

    engine.tick(&mut state).await;

    provider.set_fail_updates(true);
    let failed = engine.tick(&mut state).await;
    assert_eq!(failed.action, Action::Failover);
    assert!(matches!(failed.outcome, TickOutcome::ActionFailed(_)));

    // Observed health is kept, the switch is not
    assert_eq!(state.current_target(), Target::Primary);
    assert_eq!(state.consecutive_failures(), 2);
    assert!(state.failover_events().is_empty());
    let saved = store.saved().await.unwrap();
    assert_eq!(saved.current_target(), Target::Primary);
    assert_eq!(saved.consecutive_failures(), 2);

    provider.set_fail_updates(false);
    let retried = engine.tick(&mut state).await;
    assert_eq!(retried.action, Action::Failover);
    assert!(matches!(retried.outcome, TickOutcome::Applied(_)));
    assert_eq!(state.current_target(), Target::Backup);
    assert_eq!(provider.address(), backup());
    assert_eq!(provider.update_call_count(), 1);
}

#[tokio::test]
async fn failed_provider_read_is_an_action_failure() {
    let probe = ScriptedProbe::new([Step::Unhealthy, Step::Unhealthy]);
    let provider = MockDnsProvider::pointing_at(primary());
    provider.set_fail_reads(true);
    let store = FailingStateStore::new();
    let engine = engine(&probe, &provider, &store);
    let mut state = FailoverState::fresh(Target::Primary);

    engine.tick(&mut state).await;
    let report = engine.tick(&mut state).await;

    assert!(matches!(report.outcome, TickOutcome::ActionFailed(_)));
    assert_eq!(state.current_target(), Target::Primary);
    assert_eq!(provider.update_call_count(), 0);
}
