// # Failover State
//
// The durable aggregate for one monitored record. It is created once (from
// the configured initial target), loaded on every process start, mutated
// once per tick by the decision engine and persisted after every mutation.
//
// ## Invariants
//
// - `consecutive_failures` and `consecutive_high_latency` are 0 whenever the
//   most recent sample was fully healthy
// - `current_target` changes only through `apply_transition`
// - `consecutive_healthy_since_backup` is 0 whenever the target is Primary
// - history holds at most HISTORY_CAPACITY samples, the event log at most
//   EVENT_LOG_CAPACITY events
//
// Fields are crate-private so callers outside the engine can read the state
// but never move the target themselves.

use super::bounded_log::BoundedLog;
use super::sample::HealthSample;
use super::status::StatusSnapshot;
use super::target::{Target, Targets};
use crate::decision::DecisionPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of samples retained in the history ring
pub const HISTORY_CAPACITY: usize = 100;

/// Number of failover/restore events retained
pub const EVENT_LOG_CAPACITY: usize = 500;

/// Recent health samples, oldest first
pub type SampleHistory = BoundedLog<HealthSample, HISTORY_CAPACITY>;

/// Recent target switches, oldest first
pub type EventLog = BoundedLog<FailoverEvent, EVENT_LOG_CAPACITY>;

/// Direction of a target switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Primary → Backup
    Failover,
    /// Backup → Primary
    Restore,
}

impl Direction {
    /// The target the record points at after the switch
    pub fn destination(&self) -> Target {
        match self {
            Direction::Failover => Target::Backup,
            Direction::Restore => Target::Primary,
        }
    }

    /// The target the switch starts from
    pub fn origin(&self) -> Target {
        match self {
            Direction::Failover => Target::Primary,
            Direction::Restore => Target::Backup,
        }
    }

    /// The switch that ends on `target`
    pub fn towards(target: Target) -> Self {
        match target {
            Target::Primary => Direction::Restore,
            Target::Backup => Direction::Failover,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Failover => f.write_str("failover"),
            Direction::Restore => f.write_str("restore"),
        }
    }
}

/// What caused a target switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// Decided by the engine from health samples
    Automatic,
    /// Requested by an operator command
    Manual,
    /// Adopted from the provider's record when the loop starts
    Startup,
}

/// One entry in the failover event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailoverEvent {
    pub timestamp: DateTime<Utc>,
    pub direction: Direction,
    pub trigger: Trigger,
    pub reason: String,
}

/// Durable failover state for one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailoverState {
    pub(crate) current_target: Target,
    pub(crate) consecutive_failures: u32,
    pub(crate) consecutive_high_latency: u32,
    pub(crate) consecutive_healthy_since_backup: u32,
    #[serde(default)]
    pub(crate) history: SampleHistory,
    #[serde(default)]
    pub(crate) failover_events: EventLog,
    #[serde(default)]
    pub(crate) samples_processed: u64,
}

impl FailoverState {
    /// Fresh state: given target, all counters 0, empty logs
    pub fn fresh(initial_target: Target) -> Self {
        Self {
            current_target: initial_target,
            consecutive_failures: 0,
            consecutive_high_latency: 0,
            consecutive_healthy_since_backup: 0,
            history: SampleHistory::new(),
            failover_events: EventLog::new(),
            samples_processed: 0,
        }
    }

    pub fn current_target(&self) -> Target {
        self.current_target
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn consecutive_high_latency(&self) -> u32 {
        self.consecutive_high_latency
    }

    pub fn consecutive_healthy_since_backup(&self) -> u32 {
        self.consecutive_healthy_since_backup
    }

    pub fn history(&self) -> &SampleHistory {
        &self.history
    }

    pub fn failover_events(&self) -> &EventLog {
        &self.failover_events
    }

    pub fn samples_processed(&self) -> u64 {
        self.samples_processed
    }

    pub fn last_sample(&self) -> Option<&HealthSample> {
        self.history.latest()
    }

    /// Timestamp of the most recent switch in the given direction
    pub fn last_switch(&self, direction: Direction) -> Option<DateTime<Utc>> {
        self.failover_events
            .iter()
            .rev()
            .find(|event| event.direction == direction)
            .map(|event| event.timestamp)
    }

    /// Move the target and record the switch
    ///
    /// Failover clears the restoration streak; restore clears every streak.
    pub(crate) fn apply_transition(
        &mut self,
        direction: Direction,
        trigger: Trigger,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) {
        match direction {
            Direction::Failover => {
                self.current_target = Target::Backup;
                self.consecutive_healthy_since_backup = 0;
            }
            Direction::Restore => {
                self.current_target = Target::Primary;
                self.consecutive_failures = 0;
                self.consecutive_high_latency = 0;
                self.consecutive_healthy_since_backup = 0;
            }
        }

        self.failover_events.push(FailoverEvent {
            timestamp: at,
            direction,
            trigger,
            reason: reason.into(),
        });
    }

    /// Repair invariants that a hand-edited or older state file may violate
    pub(crate) fn normalized(mut self) -> Self {
        if self.current_target == Target::Primary {
            self.consecutive_healthy_since_backup = 0;
        }
        self
    }

    /// Read-only status view
    pub fn status(
        &self,
        record: &str,
        targets: &Targets,
        policy: &DecisionPolicy,
    ) -> StatusSnapshot {
        StatusSnapshot {
            record: record.to_string(),
            current_target: self.current_target,
            target_address: targets.address(self.current_target),
            primary: targets.primary,
            backup: targets.backup,
            consecutive_failures: self.consecutive_failures,
            consecutive_high_latency: self.consecutive_high_latency,
            consecutive_healthy_since_backup: self.consecutive_healthy_since_backup,
            min_successes_for_restore: policy.min_successes_for_restore,
            last_sample: self.last_sample().cloned(),
            samples_processed: self.samples_processed,
            history_len: self.history.len(),
            last_failover: self.last_switch(Direction::Failover),
            last_restore: self.last_switch(Direction::Restore),
            provider_address: None,
        }
    }
}

impl Default for FailoverState {
    fn default() -> Self {
        Self::fresh(Target::Primary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_has_no_history() {
        let state = FailoverState::fresh(Target::Primary);
        assert_eq!(state.current_target(), Target::Primary);
        assert_eq!(state.consecutive_failures(), 0);
        assert_eq!(state.consecutive_high_latency(), 0);
        assert_eq!(state.consecutive_healthy_since_backup(), 0);
        assert!(state.history().is_empty());
        assert!(state.last_sample().is_none());
    }

    #[test]
    fn restore_clears_every_streak() {
        let mut state = FailoverState::fresh(Target::Backup);
        state.consecutive_failures = 4;
        state.consecutive_high_latency = 1;
        state.consecutive_healthy_since_backup = 20;

        state.apply_transition(Direction::Restore, Trigger::Automatic, "healthy", Utc::now());

        assert_eq!(state.current_target(), Target::Primary);
        assert_eq!(state.consecutive_failures(), 0);
        assert_eq!(state.consecutive_high_latency(), 0);
        assert_eq!(state.consecutive_healthy_since_backup(), 0);
        assert_eq!(state.failover_events().len(), 1);
    }

    #[test]
    fn event_log_is_bounded() {
        let mut state = FailoverState::default();
        for i in 0..(EVENT_LOG_CAPACITY + 7) {
            let direction = if i % 2 == 0 {
                Direction::Failover
            } else {
                Direction::Restore
            };
            state.apply_transition(direction, Trigger::Manual, format!("switch {}", i), Utc::now());
        }

        assert_eq!(state.failover_events().len(), EVENT_LOG_CAPACITY);
        let first = state.failover_events().iter().next().unwrap();
        assert_eq!(first.reason, "switch 7");
    }

    #[test]
    fn normalizing_clears_stale_restore_streak_on_primary() {
        let mut state = FailoverState::fresh(Target::Primary);
        state.consecutive_healthy_since_backup = 5;
        assert_eq!(state.normalized().consecutive_healthy_since_backup(), 0);
    }

    #[test]
    fn last_switch_finds_most_recent_event_per_direction() {
        let mut state = FailoverState::default();
        let t1 = Utc::now();
        let t2 = t1 + chrono::Duration::seconds(30);
        let t3 = t2 + chrono::Duration::seconds(30);
        state.apply_transition(Direction::Failover, Trigger::Automatic, "a", t1);
        state.apply_transition(Direction::Restore, Trigger::Automatic, "b", t2);
        state.apply_transition(Direction::Failover, Trigger::Manual, "c", t3);

        assert_eq!(state.last_switch(Direction::Failover), Some(t3));
        assert_eq!(state.last_switch(Direction::Restore), Some(t2));
    }
}
