//! Test doubles and common utilities for contract tests
//!
//! The doubles share their internals through `Arc`s, so a test keeps a
//! clone as a handle and inspects what the engine did after handing the
//! other clone to it.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use failover_core::error::{Error, Result};
use failover_core::traits::{
    DnsProvider, Probe, ProbeOutcome, RecordMetadata, StateStore, Tick, TickSource, UpdateResult,
};
use failover_core::{FailoverConfig, FailoverState, MemoryStateStore, ProviderConfig};
use std::collections::VecDeque;
use std::net::IpAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt};

pub const RECORD: &str = "app.example.com";

pub fn primary() -> IpAddr {
    "203.0.113.10".parse().unwrap()
}

pub fn backup() -> IpAddr {
    "198.51.100.20".parse().unwrap()
}

/// A tick source driven by the test
pub struct ControlledTickSource {
    engine_rx: Mutex<Option<mpsc::UnboundedReceiver<()>>>,
}

impl ControlledTickSource {
    /// Create a tick source and the sender that fires it
    ///
    /// Dropping the sender ends the tick stream.
    pub fn new() -> (Self, mpsc::UnboundedSender<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                engine_rx: Mutex::new(Some(rx)),
            },
            tx,
        )
    }

    /// A source that yields `count` ticks and then ends
    pub fn finite(count: usize) -> Self {
        let (source, tx) = Self::new();
        for _ in 0..count {
            tx.send(()).unwrap();
        }
        source
    }
}

impl TickSource for ControlledTickSource {
    fn ticks(&self) -> Pin<Box<dyn Stream<Item = Tick> + Send + 'static>> {
        let rx = self
            .engine_rx
            .lock()
            .unwrap()
            .take()
            .expect("ticks() can only be called once");

        let mut sequence = 0;
        Box::pin(
            tokio_stream::wrappers::UnboundedReceiverStream::new(rx).map(move |_| {
                sequence += 1;
                Tick {
                    sequence,
                    fired_at: Utc::now(),
                }
            }),
        )
    }
}

/// One scripted probe result
#[derive(Debug, Clone, Copy)]
pub enum Step {
    /// Healthy answer with the given latency in milliseconds
    Healthy(u64),
    /// The address answered unacceptably
    Unhealthy,
    /// The probe itself errored
    Error,
    /// The probe takes this long before answering healthy
    Stall(Duration),
}

/// A probe that replays a script, then answers healthy at 20ms
#[derive(Clone, Default)]
pub struct ScriptedProbe {
    script: Arc<Mutex<VecDeque<Step>>>,
    calls: Arc<AtomicUsize>,
    probed: Arc<Mutex<Vec<IpAddr>>>,
}

impl ScriptedProbe {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: Arc::new(Mutex::new(steps.into_iter().collect())),
            ..Self::default()
        }
    }

    /// Append more steps
    pub fn push(&self, steps: impl IntoIterator<Item = Step>) {
        self.script.lock().unwrap().extend(steps);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn probed_addresses(&self) -> Vec<IpAddr> {
        self.probed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&self, address: IpAddr, _timeout: Duration) -> Result<ProbeOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.probed.lock().unwrap().push(address);

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Step::Healthy(20));

        match step {
            Step::Healthy(ms) => Ok(ProbeOutcome::healthy(Duration::from_millis(ms))),
            Step::Unhealthy => Ok(ProbeOutcome::unhealthy("HTTP 503", None)),
            Step::Error => Err(Error::probe("connection refused")),
            Step::Stall(duration) => {
                tokio::time::sleep(duration).await;
                Ok(ProbeOutcome::healthy(Duration::from_millis(20)))
            }
        }
    }

    fn probe_name(&self) -> &'static str {
        "scripted"
    }
}

/// A DNS provider holding one record in memory
#[derive(Clone)]
pub struct MockDnsProvider {
    address: Arc<Mutex<IpAddr>>,
    update_calls: Arc<AtomicUsize>,
    read_calls: Arc<AtomicUsize>,
    fail_updates: Arc<AtomicBool>,
    fail_reads: Arc<AtomicBool>,
}

impl MockDnsProvider {
    /// Provider whose record currently points at `address`
    pub fn pointing_at(address: IpAddr) -> Self {
        Self {
            address: Arc::new(Mutex::new(address)),
            update_calls: Arc::new(AtomicUsize::new(0)),
            read_calls: Arc::new(AtomicUsize::new(0)),
            fail_updates: Arc::new(AtomicBool::new(false)),
            fail_reads: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn address(&self) -> IpAddr {
        *self.address.lock().unwrap()
    }

    /// Number of writes that reached the record
    pub fn update_call_count(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn read_call_count(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DnsProvider for MockDnsProvider {
    async fn update_record(&self, _record_name: &str, new_ip: IpAddr) -> Result<UpdateResult> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(Error::http("503 Service Unavailable"));
        }
        self.update_calls.fetch_add(1, Ordering::SeqCst);

        let previous = std::mem::replace(&mut *self.address.lock().unwrap(), new_ip);
        if previous == new_ip {
            return Ok(UpdateResult::Unchanged { current_ip: new_ip });
        }
        Ok(UpdateResult::Updated {
            previous_ip: Some(previous),
            new_ip,
        })
    }

    async fn get_record(&self, record_name: &str) -> Result<RecordMetadata> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::http("connection reset"));
        }
        Ok(RecordMetadata {
            id: "rec-1".to_string(),
            name: record_name.to_string(),
            ip: self.address(),
            ttl: Some(60),
            extra: serde_json::json!({}),
        })
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// A memory store whose saves can be made to fail
#[derive(Clone, Default)]
pub struct FailingStateStore {
    inner: MemoryStateStore,
    fail_saves: Arc<AtomicBool>,
    save_calls: Arc<AtomicUsize>,
}

impl FailingStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn save_call_count(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    /// Last successfully saved state
    pub async fn saved(&self) -> Option<FailoverState> {
        self.inner.snapshot().await
    }
}

#[async_trait]
impl StateStore for FailingStateStore {
    async fn load(&self) -> Result<Option<FailoverState>> {
        self.inner.load().await
    }

    async fn save(&self, state: &FailoverState) -> Result<()> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::state_store("disk full"));
        }
        self.inner.save(state).await
    }

    fn describe(&self) -> String {
        "failing-memory".to_string()
    }
}

/// Helper to create a minimal FailoverConfig for testing
///
/// Restore needs 3 healthy probes so tests stay short.
pub fn minimal_config() -> FailoverConfig {
    let mut config = FailoverConfig::new(
        RECORD,
        primary(),
        backup(),
        ProviderConfig::Cloudflare {
            api_token: "test-token".to_string(),
            zone_id: "test-zone".to_string(),
            account_id: None,
            ttl: None,
            dry_run: false,
        },
    );
    config.policy.min_successes_for_restore = Some(3);
    config.engine.probe_timeout_secs = 1;
    config.engine.probe_deadline_secs = 1;
    config.engine.dns_timeout_secs = 1;
    config.engine.event_channel_capacity = 100;
    config
}
