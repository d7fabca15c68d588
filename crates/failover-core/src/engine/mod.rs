//! Core failover engine
//!
//! The FailoverEngine is responsible for:
//! - Probing the primary address once per tick
//! - Feeding each sample through the decision engine
//! - Persisting the resulting state
//! - Applying failover/restore actions via the action executor
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐
//! │ TickSource  │─── Tick ───┐
//! └─────────────┘            │
//!                            ▼
//!                   ┌────────────────┐      ┌───────────┐
//!                   │ FailoverEngine │─────▶│   Probe   │
//!                   └────────────────┘      └───────────┘
//!                            │
//!         ┌──────────────────┼──────────────────────┐
//!         │                  │                      │
//!         ▼                  ▼                      ▼
//! ┌─────────────┐   ┌────────────────┐      ┌─────────────┐
//! │ StateStore  │   │ ActionExecutor │      │   Events    │
//! │ (persist)   │   │ (DnsProvider)  │      │  (notify)   │
//! └─────────────┘   └────────────────┘      └─────────────┘
//! ```
//!
//! ## Tick Protocol
//!
//! 1. Probe the primary, bounded by the probe deadline (overrun = failed sample)
//! 2. Evaluate the sample
//! 3. Persist the observed state (counters, history); on failure skip acting
//! 4. Apply the action, if any
//! 5. On success persist the committed state (new target, event log entry);
//!    on provider error keep the observed state, so the still-satisfied
//!    condition retriggers the action on the next tick
//!
//! Before the first tick, [`FailoverEngine::reconcile`] aligns the loaded
//! state with the provider's record.
//!
//! Ticks are processed strictly one after another; the next tick is pulled
//! from the source only once the previous one has finished.

use crate::config::FailoverConfig;
use crate::decision::{self, Action, DecisionPolicy};
use crate::error::{Error, Result};
use crate::executor::{ActionExecutor, ApplyOutcome};
use crate::model::{Direction, FailoverState, HealthSample, StatusSnapshot, Target, Targets, Trigger};
use crate::scheduler::IntervalTickSource;
use crate::traits::{DnsProvider, Probe, StateStore, TickSource};
use chrono::Utc;
use serde::Serialize;
use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::StreamExt;
use tracing::{debug, error, info, trace, warn};

/// Events emitted by the FailoverEngine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        record_name: String,
        current_target: Target,
    },

    /// A health sample was evaluated
    SampleRecorded {
        success: bool,
        latency_ms: Option<f64>,
        action: Action,
    },

    /// A failover or restore reached the provider
    ActionApplied {
        action: Action,
        trigger: Trigger,
        outcome: ApplyOutcome,
    },

    /// A failover or restore could not be applied; the target is unchanged
    ActionFailed { action: Action, error: String },

    /// The state could not be persisted
    PersistFailed { error: String },

    /// Startup found the provider record disagreeing with the loaded state
    Reconciled {
        provider_address: IpAddr,
        current_target: Target,
    },

    /// Engine stopped
    Stopped { reason: String },
}

/// How a tick ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", content = "detail", rename_all = "snake_case")]
pub enum TickOutcome {
    /// No action was due
    Steady,
    /// The action reached the provider and the new target is in effect
    Applied(ApplyOutcome),
    /// The provider call failed; the target is unchanged
    ActionFailed(String),
    /// The observed state could not be saved; no action was attempted
    PersistFailed(String),
}

/// Summary of one processed tick
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub sample: HealthSample,
    /// Action decided by the evaluation (whether or not it was applied)
    pub action: Action,
    pub reason: Option<String>,
    pub outcome: TickOutcome,
}

/// Core failover engine
///
/// The engine owns the capabilities but not the [`FailoverState`]: the state
/// is an explicit value owned by the caller and threaded through every
/// operation as `&mut FailoverState`, which makes the caller the single
/// writer.
///
/// ## Lifecycle
///
/// 1. Create with [`FailoverEngine::new()`]
/// 2. Start with [`FailoverEngine::run()`]
/// 3. Engine runs until a shutdown signal is received
///
/// One-shot operations ([`tick`](Self::tick), [`force`](Self::force),
/// [`status`](Self::status)) serve the manual CLI commands.
pub struct FailoverEngine {
    /// Health probe for the primary address
    probe: Box<dyn Probe>,

    /// Applies actions through the DNS provider
    executor: ActionExecutor,

    /// Durable state
    state_store: Box<dyn StateStore>,

    /// Drives the monitoring loop
    tick_source: Box<dyn TickSource>,

    policy: DecisionPolicy,
    record_name: String,
    targets: Targets,
    initial_target: Target,

    /// Timeout handed to the probe
    probe_timeout: Duration,

    /// Hard bound on the probe phase of a tick
    probe_deadline: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl FailoverEngine {
    /// Create a new failover engine
    ///
    /// # Parameters
    ///
    /// - `probe`: Probe implementation
    /// - `provider`: DNS provider implementation
    /// - `state_store`: State store implementation
    /// - `config`: Failover configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        probe: Box<dyn Probe>,
        provider: Box<dyn DnsProvider>,
        state_store: Box<dyn StateStore>,
        config: &FailoverConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let policy = config.decision_policy()?;
        let tick_source = IntervalTickSource::new(config.engine.tick_interval())?;
        let executor = ActionExecutor::new(
            provider,
            config.record.name.clone(),
            config.targets,
            config.engine.dns_timeout(),
        );

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        info!(
            record = %config.record.name,
            primary = %config.targets.primary,
            backup = %config.targets.backup,
            store = %state_store.describe(),
            "Engine configured: threshold {}ms, failover after {} failures or {} slow probes, \
            restore after {} healthy probes",
            policy.latency_threshold_ms,
            policy.failure_streak_to_failover,
            policy.latency_streak_to_failover,
            policy.min_successes_for_restore
        );

        let engine = Self {
            probe,
            executor,
            state_store,
            tick_source: Box::new(tick_source),
            policy,
            record_name: config.record.name.clone(),
            targets: config.targets,
            initial_target: config.engine.initial_target,
            probe_timeout: config.engine.probe_timeout(),
            probe_deadline: config.engine.probe_deadline(),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Replace the tick source driving [`run`](Self::run)
    pub fn with_tick_source(mut self, tick_source: Box<dyn TickSource>) -> Self {
        self.tick_source = tick_source;
        self
    }

    pub fn policy(&self) -> &DecisionPolicy {
        &self.policy
    }

    pub fn targets(&self) -> &Targets {
        &self.targets
    }

    pub fn record_name(&self) -> &str {
        &self.record_name
    }

    /// Load the persisted state
    ///
    /// Never fails: missing, corrupt or unreachable state degrades to a fresh
    /// state on the configured initial target.
    pub async fn load_state(&self) -> FailoverState {
        match self.state_store.load().await {
            Ok(Some(state)) => {
                info!(
                    record = %self.record_name,
                    target = %state.current_target(),
                    failures = state.consecutive_failures(),
                    healthy_since_backup = state.consecutive_healthy_since_backup(),
                    "Loaded persisted state from {}",
                    self.state_store.describe()
                );
                state
            }
            Ok(None) => {
                warn!(
                    record = %self.record_name,
                    "No persisted state in {}, starting fresh on {}",
                    self.state_store.describe(),
                    self.initial_target
                );
                FailoverState::fresh(self.initial_target)
            }
            Err(e) => {
                warn!(
                    record = %self.record_name,
                    "Failed to load state from {}: {}. Starting fresh on {}",
                    self.state_store.describe(),
                    e,
                    self.initial_target
                );
                FailoverState::fresh(self.initial_target)
            }
        }
    }

    /// Process one tick: probe, decide, persist, act
    pub async fn tick(&self, state: &mut FailoverState) -> TickReport {
        let sample = self.sample().await;
        let evaluation = decision::evaluate(state.clone(), sample.clone(), &self.policy);
        let action = evaluation.action;
        let reason = evaluation.reason.clone();

        debug!(
            record = %self.record_name,
            success = sample.success(),
            latency_ms = ?sample.latency_ms(),
            failures = evaluation.state.consecutive_failures(),
            high_latency = evaluation.state.consecutive_high_latency(),
            healthy_since_backup = evaluation.observed().consecutive_healthy_since_backup(),
            %action,
            "Sample evaluated"
        );
        self.emit_event(EngineEvent::SampleRecorded {
            success: sample.success(),
            latency_ms: sample.latency_ms(),
            action,
        });

        let observed = evaluation.observed().clone();
        if let Err(e) = self.state_store.save(&observed).await {
            error!(
                record = %self.record_name,
                "Failed to persist state, skipping {}: {}",
                action,
                e
            );
            *state = observed;
            self.emit_event(EngineEvent::PersistFailed {
                error: e.to_string(),
            });
            return TickReport {
                sample,
                action,
                reason,
                outcome: TickOutcome::PersistFailed(e.to_string()),
            };
        }

        if action == Action::None {
            *state = evaluation.state;
            return TickReport {
                sample,
                action,
                reason,
                outcome: TickOutcome::Steady,
            };
        }

        match self.executor.apply(action).await {
            Ok(outcome) => {
                info!(
                    record = %self.record_name,
                    reason = reason.as_deref().unwrap_or_default(),
                    "{} complete: record now points at {} ({})",
                    action,
                    evaluation.state.current_target(),
                    self.targets.address(evaluation.state.current_target())
                );
                *state = evaluation.state;
                self.persist(state).await;
                self.emit_event(EngineEvent::ActionApplied {
                    action,
                    trigger: Trigger::Automatic,
                    outcome,
                });
                TickReport {
                    sample,
                    action,
                    reason,
                    outcome: TickOutcome::Applied(outcome),
                }
            }
            Err(e) => {
                error!(
                    record = %self.record_name,
                    "{} failed, target stays {}: {}",
                    action,
                    observed.current_target(),
                    e
                );
                *state = observed;
                self.emit_event(EngineEvent::ActionFailed {
                    action,
                    error: e.to_string(),
                });
                TickReport {
                    sample,
                    action,
                    reason,
                    outcome: TickOutcome::ActionFailed(e.to_string()),
                }
            }
        }
    }

    /// Switch the record on operator request
    ///
    /// The provider call is idempotent, so forcing the direction the record
    /// already points at succeeds without a write. The state only records a
    /// switch when its target actually changes.
    ///
    /// # Errors
    ///
    /// Provider errors (state untouched) and persistence errors (the switch
    /// happened, the state could not be saved).
    pub async fn force(
        &self,
        state: &mut FailoverState,
        direction: Direction,
    ) -> Result<ApplyOutcome> {
        let action = Action::from(direction);
        let outcome = self.executor.apply(action).await.inspect_err(|e| {
            self.emit_event(EngineEvent::ActionFailed {
                action,
                error: e.to_string(),
            });
        })?;

        if state.current_target() != direction.destination() {
            state.apply_transition(direction, Trigger::Manual, format!("manual {}", direction), Utc::now());
            info!(
                record = %self.record_name,
                "Manual {}: record now points at {} ({})",
                direction,
                direction.destination(),
                self.targets.address(direction.destination())
            );
        } else {
            info!(
                record = %self.record_name,
                "Manual {}: already on {}",
                direction,
                direction.destination()
            );
        }

        self.emit_event(EngineEvent::ActionApplied {
            action,
            trigger: Trigger::Manual,
            outcome,
        });

        self.state_store.save(state).await.map_err(|e| {
            Error::state_store(format!(
                "{} applied but state could not be saved: {}",
                direction, e
            ))
        })?;

        Ok(outcome)
    }

    /// Read-only status view
    pub fn status(&self, state: &FailoverState) -> StatusSnapshot {
        state.status(&self.record_name, &self.targets, &self.policy)
    }

    /// Status view including the address the provider currently publishes
    ///
    /// A failed provider read is logged and leaves `provider_address` unset.
    pub async fn status_with_provider(&self, state: &FailoverState) -> StatusSnapshot {
        let snapshot = self.status(state);
        match self.executor.current_address().await {
            Ok(address) => {
                let snapshot = snapshot.with_provider_address(address);
                if snapshot.has_drift() {
                    warn!(
                        record = %self.record_name,
                        expected = %snapshot.target_address,
                        actual = %address,
                        "Provider record differs from engine state"
                    );
                }
                snapshot
            }
            Err(e) => {
                warn!(record = %self.record_name, "Failed to read provider record: {}", e);
                snapshot
            }
        }
    }

    /// Align the loaded state with the record the provider publishes
    ///
    /// - Record on the other target: the state adopts it as a
    ///   [`Trigger::Startup`] switch and is saved. Health decides from there.
    /// - Record on an address that is neither target: the record is rewritten
    ///   to the state's target.
    /// - Provider unreachable: nothing changes; the loop starts on the loaded
    ///   target.
    ///
    /// Returns the adopted switch, if any.
    pub async fn reconcile(&self, state: &mut FailoverState) -> Option<Direction> {
        let address = match self.executor.current_address().await {
            Ok(address) => address,
            Err(e) => {
                warn!(
                    record = %self.record_name,
                    "Could not read provider record at startup, keeping {}: {}",
                    state.current_target(),
                    e
                );
                return None;
            }
        };

        match self.targets.classify(address) {
            Some(target) if target == state.current_target() => {
                debug!(record = %self.record_name, %address, "Provider record matches state");
                None
            }
            Some(target) => {
                let direction = Direction::towards(target);
                warn!(
                    record = %self.record_name,
                    %address,
                    "Provider record points at {} but state says {}, adopting {}",
                    target,
                    state.current_target(),
                    target
                );
                state.apply_transition(
                    direction,
                    Trigger::Startup,
                    format!("provider record points at {} ({})", target, address),
                    Utc::now(),
                );
                self.persist(state).await;
                self.emit_event(EngineEvent::Reconciled {
                    provider_address: address,
                    current_target: target,
                });
                Some(direction)
            }
            None => {
                let target = state.current_target();
                warn!(
                    record = %self.record_name,
                    %address,
                    "Provider record points at neither target, rewriting to {}",
                    target
                );
                let action = Action::from(Direction::towards(target));
                match self.executor.apply(action).await {
                    Ok(outcome) => self.emit_event(EngineEvent::ActionApplied {
                        action,
                        trigger: Trigger::Startup,
                        outcome,
                    }),
                    Err(e) => {
                        error!(record = %self.record_name, "Failed to rewrite record: {}", e);
                        self.emit_event(EngineEvent::ActionFailed {
                            action,
                            error: e.to_string(),
                        });
                    }
                }
                self.emit_event(EngineEvent::Reconciled {
                    provider_address: address,
                    current_target: target,
                });
                None
            }
        }
    }

    /// Run the engine
    ///
    /// Loads the persisted state, reconciles it with the provider, then
    /// processes ticks until SIGINT/SIGTERM.
    ///
    /// # Returns
    ///
    /// - `Ok(state)`: Clean shutdown, with the final state
    /// - `Err(Error)`: Fatal error
    pub async fn run(&self) -> Result<FailoverState> {
        self.run_internal(None).await
    }

    /// Internal run implementation that accepts an optional shutdown signal
    async fn run_internal(&self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<FailoverState> {
        let mut state = self.load_state().await;
        self.reconcile(&mut state).await;

        self.emit_event(EngineEvent::Started {
            record_name: self.record_name.clone(),
            current_target: state.current_target(),
        });
        info!(
            record = %self.record_name,
            probe = self.probe.probe_name(),
            provider = self.executor.provider_name(),
            "Monitoring started on {}",
            state.current_target()
        );

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                    "Shutdown signal"
                }
                None => shutdown_signal().await,
            }
        };
        tokio::pin!(shutdown);

        let mut ticks = self.tick_source.ticks();

        // The tick is awaited inside the select arm, so a shutdown that
        // arrives mid-tick is only observed once the tick has finished.
        let reason = loop {
            tokio::select! {
                biased;

                reason = &mut shutdown => {
                    info!("{} received", reason);
                    break reason.to_string();
                }

                tick = ticks.next() => match tick {
                    Some(tick) => {
                        debug!(sequence = tick.sequence, "Tick");
                        let report = self.tick(&mut state).await;
                        if report.action != Action::None {
                            debug!(sequence = tick.sequence, outcome = ?report.outcome, "Tick finished");
                        }
                    }
                    None => {
                        info!("Tick source exhausted");
                        break "Tick source exhausted".to_string();
                    }
                }
            }
        };

        self.emit_event(EngineEvent::Stopped { reason });
        info!(record = %self.record_name, "Engine stopped on {}", state.current_target());

        Ok(state)
    }

    /// Probe the primary under the tick deadline
    async fn sample(&self) -> HealthSample {
        let address = self.targets.primary;
        let probe = self.probe.probe(address, self.probe_timeout);

        match tokio::time::timeout(self.probe_deadline, probe).await {
            Ok(Ok(outcome)) => HealthSample::from_outcome(Utc::now(), outcome),
            Ok(Err(e)) => {
                debug!(%address, "Probe error: {}", e);
                HealthSample::failed(Utc::now(), e.to_string())
            }
            Err(_) => {
                warn!(%address, deadline = ?self.probe_deadline, "Probe deadline exceeded");
                HealthSample::failed(Utc::now(), "probe deadline exceeded")
            }
        }
    }

    /// Persist a committed state; failures are logged, the next tick retries
    async fn persist(&self, state: &FailoverState) {
        if let Err(e) = self.state_store.save(state).await {
            error!(record = %self.record_name, "Failed to persist committed state: {}", e);
            self.emit_event(EngineEvent::PersistFailed {
                error: e.to_string(),
            });
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Never block the loop on a slow consumer
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                trace!("No event consumer, dropping event");
            }
        }
    }

    /// Run the engine with a controlled shutdown signal
    ///
    /// **TESTING ONLY**: contract tests require controlled shutdown.
    /// Production daemon code should use `run()` instead, which manages shutdown
    /// via OS signals (SIGTERM/SIGINT) rather than programmatic channels.
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<FailoverState> {
        self.run_internal(shutdown_rx).await
    }
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => tokio::select! {
                _ = tokio::signal::ctrl_c() => "SIGINT",
                _ = term.recv() => "SIGTERM",
            },
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                "SIGINT"
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        "Ctrl-C"
    }
}
