//! Decision engine
//!
//! [`evaluate`] is a pure, total state-transition function: given the current
//! [`FailoverState`], one new [`HealthSample`] and the [`DecisionPolicy`], it
//! returns the next state and the [`Action`] to apply. It performs no I/O and
//! cannot fail.
//!
//! ## State Machine
//!
//! ```text
//!            failures >= failure_streak
//!         or high_latency >= latency_streak
//!   ┌─────────┐ ───────────────────────────▶ ┌────────┐
//!   │ Primary │                              │ Backup │
//!   └─────────┘ ◀─────────────────────────── └────────┘
//!        healthy_since_backup >= min_successes_for_restore
//! ```
//!
//! Failover is only evaluated while on Primary and restore only while on
//! Backup, so the two can never fire in the same step.

use crate::error::{Error, Result};
use crate::model::{Direction, FailoverState, HealthSample, Target, Trigger};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Thresholds driving the decision engine
///
/// Resolved once at startup. `min_successes_for_restore` is stored as an
/// explicit count so that changing the tick interval later does not silently
/// change restore behaviour of a running engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionPolicy {
    /// Samples slower than this are "high latency"
    pub latency_threshold_ms: f64,
    /// Consecutive failed samples that trigger failover
    pub failure_streak_to_failover: u32,
    /// Consecutive high-latency samples that trigger failover
    pub latency_streak_to_failover: u32,
    /// How long the primary must stay healthy before restore
    pub stability_duration: Duration,
    /// Consecutive healthy samples on backup that trigger restore
    pub min_successes_for_restore: u32,
}

impl DecisionPolicy {
    /// Create a validated policy
    pub fn new(
        latency_threshold_ms: f64,
        failure_streak_to_failover: u32,
        latency_streak_to_failover: u32,
        stability_duration: Duration,
        min_successes_for_restore: u32,
    ) -> Result<Self> {
        if !latency_threshold_ms.is_finite() || latency_threshold_ms <= 0.0 {
            return Err(Error::config(format!(
                "Latency threshold must be a positive number of milliseconds. Got: {}",
                latency_threshold_ms
            )));
        }
        if failure_streak_to_failover == 0 {
            return Err(Error::config("Failure streak to failover must be >= 1"));
        }
        if latency_streak_to_failover == 0 {
            return Err(Error::config("Latency streak to failover must be >= 1"));
        }
        if min_successes_for_restore == 0 {
            return Err(Error::config("Minimum successes for restore must be >= 1"));
        }

        Ok(Self {
            latency_threshold_ms,
            failure_streak_to_failover,
            latency_streak_to_failover,
            stability_duration,
            min_successes_for_restore,
        })
    }

    /// Number of consecutive healthy ticks that cover the stability period
    ///
    /// The duration is authoritative; the count rounds up so the primary is
    /// never restored before the full period has elapsed. At least one
    /// healthy sample is always required.
    pub fn derive_min_successes(stability: Duration, tick_interval: Duration) -> Result<u32> {
        if tick_interval.is_zero() {
            return Err(Error::config("Tick interval must be > 0"));
        }

        let stability_ms = stability.as_millis();
        let tick_ms = tick_interval.as_millis().max(1);
        let count = stability_ms.div_ceil(tick_ms).max(1);

        u32::try_from(count).map_err(|_| {
            Error::config(format!(
                "Stability period {:?} is too long for tick interval {:?}",
                stability, tick_interval
            ))
        })
    }
}

/// Action emitted by one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    None,
    Failover,
    Restore,
}

impl Action {
    /// The switch this action performs, if any
    pub fn direction(&self) -> Option<Direction> {
        match self {
            Action::None => None,
            Action::Failover => Some(Direction::Failover),
            Action::Restore => Some(Direction::Restore),
        }
    }
}

impl From<Direction> for Action {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Failover => Action::Failover,
            Direction::Restore => Action::Restore,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::None => f.write_str("none"),
            Action::Failover => f.write_str("failover"),
            Action::Restore => f.write_str("restore"),
        }
    }
}

/// Result of one evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Next state, with the transition applied when `action` is not `None`
    pub state: FailoverState,
    pub action: Action,
    /// Human-readable trigger for the action
    pub reason: Option<String>,
    /// Next state without the transition (counters and history only)
    observed: Option<FailoverState>,
}

impl Evaluation {
    /// State reflecting the sample but not the target switch
    ///
    /// This is what gets persisted when the DNS write for the action fails:
    /// the observed health is kept, the target is not moved, and the
    /// still-satisfied streak retriggers the action on the next tick.
    pub fn observed(&self) -> &FailoverState {
        self.observed.as_ref().unwrap_or(&self.state)
    }

    /// Consume the evaluation, keeping only the observed state
    pub fn into_observed(self) -> FailoverState {
        self.observed.unwrap_or(self.state)
    }
}

/// Evaluate one sample against the current state
pub fn evaluate(
    mut state: FailoverState,
    sample: HealthSample,
    policy: &DecisionPolicy,
) -> Evaluation {
    let at = sample.timestamp();
    let threshold = policy.latency_threshold_ms;
    let failed = !sample.success();
    let high_latency = sample.is_high_latency(threshold);
    let healthy = sample.is_healthy(threshold);

    state.history.push(sample);
    state.samples_processed = state.samples_processed.saturating_add(1);

    state.consecutive_failures = if failed {
        state.consecutive_failures.saturating_add(1)
    } else {
        0
    };
    state.consecutive_high_latency = if high_latency {
        state.consecutive_high_latency.saturating_add(1)
    } else {
        0
    };

    let switch = match state.current_target {
        Target::Primary => {
            state.consecutive_healthy_since_backup = 0;
            failover_reason(&state, policy).map(|reason| (Direction::Failover, reason))
        }
        Target::Backup => {
            state.consecutive_healthy_since_backup = if healthy {
                state.consecutive_healthy_since_backup.saturating_add(1)
            } else {
                0
            };

            (state.consecutive_healthy_since_backup >= policy.min_successes_for_restore).then(|| {
                (
                    Direction::Restore,
                    format!(
                        "primary healthy for {} consecutive probes",
                        state.consecutive_healthy_since_backup
                    ),
                )
            })
        }
    };

    match switch {
        None => Evaluation {
            state,
            action: Action::None,
            reason: None,
            observed: None,
        },
        Some((direction, reason)) => {
            let observed = state.clone();
            state.apply_transition(direction, Trigger::Automatic, reason.clone(), at);
            Evaluation {
                state,
                action: direction.into(),
                reason: Some(reason),
                observed: Some(observed),
            }
        }
    }
}

fn failover_reason(state: &FailoverState, policy: &DecisionPolicy) -> Option<String> {
    if state.consecutive_failures >= policy.failure_streak_to_failover {
        Some(format!(
            "{} consecutive failed probes",
            state.consecutive_failures
        ))
    } else if state.consecutive_high_latency >= policy.latency_streak_to_failover {
        Some(format!(
            "{} consecutive probes above {}ms",
            state.consecutive_high_latency, policy.latency_threshold_ms
        ))
    } else {
        None
    }
}
