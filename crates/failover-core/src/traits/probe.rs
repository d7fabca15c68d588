// # Probe Trait
//
// Defines the interface for measuring the health of an address.
//
// ## Implementations
//
// - HTTP / TCP connect: `failover-probe-http` crate
// - Tests: scripted probes returning canned outcomes
//
// ## Usage
//
// ```rust,ignore
// use failover_core::Probe;
// use std::time::Duration;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let probe = /* Probe implementation */;
//
//     let outcome = probe
//         .probe("203.0.113.10".parse()?, Duration::from_secs(5))
//         .await?;
//     println!("success={} latency={:?}", outcome.success, outcome.latency_ms);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;

/// Result of a single probe
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    /// Whether the address answered acceptably
    pub success: bool,
    /// Measured round-trip time, if the probe got far enough to measure one
    pub latency_ms: Option<f64>,
    /// Failure reason
    pub error: Option<String>,
}

impl ProbeOutcome {
    /// The address answered in `latency`
    pub fn healthy(latency: Duration) -> Self {
        Self {
            success: true,
            latency_ms: Some(latency.as_secs_f64() * 1000.0),
            error: None,
        }
    }

    /// The address answered, but unacceptably
    pub fn unhealthy(reason: impl Into<String>, latency: Option<Duration>) -> Self {
        Self {
            success: false,
            latency_ms: latency.map(|l| l.as_secs_f64() * 1000.0),
            error: Some(reason.into()),
        }
    }
}

/// Trait for health probe implementations
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ Open network connections to the probed address
/// - ✅ Measure wall-clock latency
///
/// ## Forbidden Capabilities
/// - ❌ Retry internally (one probe per tick, the engine owns scheduling)
/// - ❌ Decide whether to fail over (owned by the decision engine)
/// - ❌ Spawn background tasks
///
/// A probe must respect `timeout`. The engine additionally wraps every probe
/// in its own deadline and treats an overrun as a failed sample, so a
/// misbehaving probe cannot stall the loop.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Probe an address once
    ///
    /// # Returns
    ///
    /// - `Ok(ProbeOutcome)`: The address was reached (healthy or not)
    /// - `Err(Error)`: The probe could not be performed; the engine records
    ///   this as a failed sample
    async fn probe(&self, address: IpAddr, timeout: Duration)
    -> Result<ProbeOutcome, crate::Error>;

    /// Get the probe name (for logging/debugging)
    fn probe_name(&self) -> &'static str;
}

/// Helper trait for constructing probes from configuration
pub trait ProbeFactory: Send + Sync {
    /// Create a Probe instance from configuration
    fn create(&self, config: &crate::config::ProbeConfig) -> Result<Box<dyn Probe>, crate::Error>;
}
