//! Health samples
//!
//! A [`HealthSample`] is the result of one probe against the primary
//! address. It is immutable once created: the fields are private and only
//! exposed through accessors.

use crate::traits::ProbeOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One probe result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSample {
    timestamp: DateTime<Utc>,
    success: bool,
    /// Round-trip latency; meaningless when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    latency_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl HealthSample {
    /// A successful probe with a measured latency
    pub fn succeeded(timestamp: DateTime<Utc>, latency_ms: f64) -> Self {
        Self {
            timestamp,
            success: true,
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    /// A failed probe
    pub fn failed(timestamp: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            timestamp,
            success: false,
            latency_ms: None,
            error: Some(error.into()),
        }
    }

    /// Build a sample from a probe outcome
    pub fn from_outcome(timestamp: DateTime<Utc>, outcome: ProbeOutcome) -> Self {
        Self {
            timestamp,
            success: outcome.success,
            latency_ms: outcome.latency_ms,
            error: outcome.error,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn latency_ms(&self) -> Option<f64> {
        self.latency_ms
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Successful, but slower than the threshold
    ///
    /// A successful sample without a latency measurement is never high-latency.
    pub fn is_high_latency(&self, threshold_ms: f64) -> bool {
        self.success && self.latency_ms.is_some_and(|latency| latency > threshold_ms)
    }

    /// Successful and within the latency threshold
    pub fn is_healthy(&self, threshold_ms: f64) -> bool {
        self.success && !self.is_high_latency(threshold_ms)
    }
}
