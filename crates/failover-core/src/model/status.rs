//! Status snapshot exposed to CLI/API callers

use super::sample::HealthSample;
use super::target::Target;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Read-only view of the failover state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub record: String,
    pub current_target: Target,
    /// Address the engine believes the record points at
    pub target_address: IpAddr,
    pub primary: IpAddr,
    pub backup: IpAddr,
    pub consecutive_failures: u32,
    pub consecutive_high_latency: u32,
    pub consecutive_healthy_since_backup: u32,
    pub min_successes_for_restore: u32,
    pub last_sample: Option<HealthSample>,
    pub samples_processed: u64,
    pub history_len: usize,
    pub last_failover: Option<DateTime<Utc>>,
    pub last_restore: Option<DateTime<Utc>>,
    /// Address currently published by the DNS provider, when it was queried
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_address: Option<IpAddr>,
}

impl StatusSnapshot {
    /// Attach the address read from the provider
    pub fn with_provider_address(mut self, address: IpAddr) -> Self {
        self.provider_address = Some(address);
        self
    }

    /// Whether the provider disagrees with the engine's belief
    pub fn has_drift(&self) -> bool {
        self.provider_address
            .is_some_and(|address| address != self.target_address)
    }
}
