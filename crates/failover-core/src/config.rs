//! Configuration types for the failover system
//!
//! This module defines all configuration structures used throughout the crate.

use crate::decision::DecisionPolicy;
use crate::model::{Target, Targets};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Main failover configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverConfig {
    /// The DNS record being managed
    pub record: RecordConfig,

    /// The two addresses the record switches between
    pub targets: Targets,

    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Health probe configuration
    #[serde(default)]
    pub probe: ProbeConfig,

    /// State store configuration
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// Decision thresholds
    #[serde(default)]
    pub policy: PolicyConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl FailoverConfig {
    /// Create a configuration with default policy, probe and engine settings
    pub fn new(
        record: impl Into<String>,
        primary: IpAddr,
        backup: IpAddr,
        provider: ProviderConfig,
    ) -> Self {
        Self {
            record: RecordConfig::new(record),
            targets: Targets { primary, backup },
            provider,
            probe: ProbeConfig::default(),
            state_store: StateStoreConfig::default(),
            policy: PolicyConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.record.validate()?;
        self.targets.validate()?;
        self.provider.validate()?;
        self.probe.validate()?;
        self.state_store.validate()?;
        self.engine.validate()?;
        self.decision_policy()?;

        Ok(())
    }

    /// Resolve the decision policy
    ///
    /// Without an explicit override, the restore count is derived from the
    /// stability duration and the tick interval, rounding up.
    pub fn decision_policy(&self) -> Result<DecisionPolicy, crate::Error> {
        let stability = Duration::from_secs(self.policy.stability_duration_secs);
        let min_successes = match self.policy.min_successes_for_restore {
            Some(count) => count,
            None => DecisionPolicy::derive_min_successes(stability, self.engine.tick_interval())?,
        };

        DecisionPolicy::new(
            self.policy.latency_threshold_ms,
            self.policy.failure_streak,
            self.policy.latency_streak,
            stability,
            min_successes,
        )
    }
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    Cloudflare {
        /// Cloudflare API token
        api_token: String,
        /// Zone ID containing the record
        zone_id: String,
        /// Account ID (optional)
        #[serde(default)]
        account_id: Option<String>,
        /// TTL written with the record; the record's current TTL is kept when unset
        #[serde(default)]
        ttl: Option<u32>,
        /// Log writes instead of performing them
        #[serde(default)]
        dry_run: bool,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare {
                api_token,
                zone_id,
                ttl,
                ..
            } => {
                if api_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                if zone_id.is_empty() {
                    return Err(crate::Error::config("Cloudflare zone ID cannot be empty"));
                }
                if *ttl == Some(0) {
                    return Err(crate::Error::config("Cloudflare record TTL must be > 0"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Health probe configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProbeConfig {
    /// HTTP GET against the address, falling back to HTTPS
    Http {
        /// Port for plain HTTP
        #[serde(default = "default_http_port")]
        port: u16,
        /// Port for the HTTPS fallback
        #[serde(default = "default_https_port")]
        https_port: u16,
        /// Request path
        #[serde(default = "default_http_path")]
        path: String,
        /// Host header to send (usually the record name)
        #[serde(default)]
        host_header: Option<String>,
    },

    /// TCP connect to the address
    Tcp {
        /// Port to connect to
        port: u16,
    },

    /// Custom probe
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProbeConfig {
    /// Validate the probe configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProbeConfig::Http {
                port,
                https_port,
                path,
                ..
            } => {
                if *port == 0 || *https_port == 0 {
                    return Err(crate::Error::config("HTTP probe ports must be > 0"));
                }
                if !path.starts_with('/') {
                    return Err(crate::Error::config(format!(
                        "HTTP probe path must start with '/'. Got: {}",
                        path
                    )));
                }
                Ok(())
            }
            ProbeConfig::Tcp { port } => {
                if *port == 0 {
                    return Err(crate::Error::config("TCP probe port must be > 0"));
                }
                Ok(())
            }
            ProbeConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom probe factory cannot be empty"));
                }
                Ok(())
            }
        }
    }

    /// Get the probe type name
    pub fn type_name(&self) -> &str {
        match self {
            ProbeConfig::Http { .. } => "http",
            ProbeConfig::Tcp { .. } => "tcp",
            ProbeConfig::Custom { factory, .. } => factory,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        ProbeConfig::Http {
            port: default_http_port(),
            https_port: default_https_port(),
            path: default_http_path(),
            host_header: None,
        }
    }
}

fn default_http_port() -> u16 {
    80
}

fn default_https_port() -> u16 {
    443
}

fn default_http_path() -> String {
    "/".to_string()
}

/// State store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based state store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory state store (not persistent)
    #[default]
    Memory,

    /// Custom state store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StateStoreConfig {
    /// Validate the state store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StateStoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("State file path cannot be empty"))
            }
            StateStoreConfig::Custom { factory, .. } if factory.is_empty() => Err(
                crate::Error::config("Custom state store factory cannot be empty"),
            ),
            _ => Ok(()),
        }
    }

    /// Get the state store type name
    pub fn type_name(&self) -> &str {
        match self {
            StateStoreConfig::File { .. } => "file",
            StateStoreConfig::Memory => "memory",
            StateStoreConfig::Custom { factory, .. } => factory,
        }
    }

    /// Path of the state file, for stores backed by one
    pub fn file_path(&self) -> Option<&str> {
        match self {
            StateStoreConfig::File { path } => Some(path),
            _ => None,
        }
    }
}

/// DNS record configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordConfig {
    /// DNS record name (e.g., "app.example.com")
    pub name: String,
}

impl RecordConfig {
    /// Create a new record configuration
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Validate the record configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.name.trim().is_empty() {
            return Err(crate::Error::config("Record name cannot be empty"));
        }
        if !self.name.contains('.') || self.name.len() > 253 {
            return Err(crate::Error::config(format!(
                "Record name must be a fully qualified domain name. Got: {}",
                self.name
            )));
        }
        Ok(())
    }
}

/// Decision thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Samples slower than this count as high latency
    #[serde(default = "default_latency_threshold_ms")]
    pub latency_threshold_ms: f64,

    /// Consecutive failed probes before failover
    #[serde(default = "default_streak")]
    pub failure_streak: u32,

    /// Consecutive high-latency probes before failover
    #[serde(default = "default_streak")]
    pub latency_streak: u32,

    /// How long the primary must stay healthy before restore
    #[serde(default = "default_stability_duration_secs")]
    pub stability_duration_secs: u64,

    /// Explicit restore count; derived from the stability duration when unset
    #[serde(default)]
    pub min_successes_for_restore: Option<u32>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            latency_threshold_ms: default_latency_threshold_ms(),
            failure_streak: default_streak(),
            latency_streak: default_streak(),
            stability_duration_secs: default_stability_duration_secs(),
            min_successes_for_restore: None,
        }
    }
}

fn default_latency_threshold_ms() -> f64 {
    100.0
}

fn default_streak() -> u32 {
    2
}

fn default_stability_duration_secs() -> u64 {
    600
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between health checks (in seconds)
    #[serde(default = "default_tick_interval_secs")]
    pub tick_interval_secs: u64,

    /// Timeout handed to the probe (in seconds)
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Hard deadline for the whole probe phase of a tick (in seconds)
    ///
    /// Exceeding it records a failed sample.
    #[serde(default = "default_probe_deadline_secs")]
    pub probe_deadline_secs: u64,

    /// Timeout for each DNS provider call (in seconds)
    #[serde(default = "default_dns_timeout_secs")]
    pub dns_timeout_secs: u64,

    /// Target assumed when no state has been persisted yet
    #[serde(default)]
    pub initial_target: Target,

    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn probe_deadline(&self) -> Duration {
        Duration::from_secs(self.probe_deadline_secs)
    }

    pub fn dns_timeout(&self) -> Duration {
        Duration::from_secs(self.dns_timeout_secs)
    }

    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.tick_interval_secs == 0 {
            return Err(crate::Error::config("Tick interval must be > 0"));
        }
        if self.probe_timeout_secs == 0 {
            return Err(crate::Error::config("Probe timeout must be > 0"));
        }
        if self.probe_deadline_secs < self.probe_timeout_secs {
            return Err(crate::Error::config(format!(
                "Probe deadline ({}s) must be >= probe timeout ({}s)",
                self.probe_deadline_secs, self.probe_timeout_secs
            )));
        }
        if self.dns_timeout_secs == 0 {
            return Err(crate::Error::config("DNS timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_interval_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            probe_deadline_secs: default_probe_deadline_secs(),
            dns_timeout_secs: default_dns_timeout_secs(),
            initial_target: Target::Primary,
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_tick_interval_secs() -> u64 {
    30
}

fn default_probe_timeout_secs() -> u64 {
    5
}

fn default_probe_deadline_secs() -> u64 {
    15
}

fn default_dns_timeout_secs() -> u64 {
    10
}

fn default_event_channel_capacity() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cloudflare(api_token: &str) -> ProviderConfig {
        ProviderConfig::Cloudflare {
            api_token: api_token.to_string(),
            zone_id: "zone".to_string(),
            account_id: None,
            ttl: None,
            dry_run: false,
        }
    }

    fn config() -> FailoverConfig {
        FailoverConfig::new(
            "app.example.com",
            "203.0.113.10".parse().unwrap(),
            "198.51.100.20".parse().unwrap(),
            cloudflare("token"),
        )
    }

    #[test]
    fn test_defaults_validate() {
        let config = config();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.tick_interval(), Duration::from_secs(30));
        assert_eq!(config.engine.initial_target, Target::Primary);
    }

    #[test]
    fn test_default_policy_derives_twenty_restores() {
        let policy = config().decision_policy().unwrap();
        assert_eq!(policy.latency_threshold_ms, 100.0);
        assert_eq!(policy.failure_streak_to_failover, 2);
        assert_eq!(policy.latency_streak_to_failover, 2);
        assert_eq!(policy.min_successes_for_restore, 20);
    }

    #[test]
    fn test_explicit_restore_count_wins() {
        let mut config = config();
        config.policy.min_successes_for_restore = Some(3);
        assert_eq!(config.decision_policy().unwrap().min_successes_for_restore, 3);
    }

    #[test]
    fn test_derivation_rounds_up() {
        let mut config = config();
        config.engine.tick_interval_secs = 45;
        // 600 / 45 = 13.33
        assert_eq!(config.decision_policy().unwrap().min_successes_for_restore, 14);
    }

    #[test]
    fn test_rejects_equal_targets() {
        let mut config = config();
        config.targets.backup = config.targets.primary;
        assert!(config.validate().unwrap_err().is_config());
    }

    #[test]
    fn test_rejects_zero_tick_interval() {
        let mut config = config();
        config.engine.tick_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_token() {
        let mut config = config();
        config.provider = cloudflare("");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bare_record_name() {
        let mut config = config();
        config.record = RecordConfig::new("localhost");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_deadline_shorter_than_timeout() {
        let mut config = config();
        config.engine.probe_timeout_secs = 10;
        config.engine.probe_deadline_secs = 5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_minimal_json() {
        let json = r#"{
            "record": {"name": "app.example.com"},
            "targets": {"primary": "203.0.113.10", "backup": "198.51.100.20"},
            "provider": {"type": "cloudflare", "api_token": "t", "zone_id": "z"},
            "state_store": {"type": "file", "path": "/tmp/state.json"},
            "probe": {"type": "tcp", "port": 443}
        }"#;

        let config: FailoverConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.probe, ProbeConfig::Tcp { port: 443 });
        assert_eq!(config.state_store.file_path(), Some("/tmp/state.json"));
        assert_eq!(config.policy, PolicyConfig::default());
        assert!(matches!(
            config.provider,
            ProviderConfig::Cloudflare {
                ttl: None,
                dry_run: false,
                ..
            }
        ));
    }
}
