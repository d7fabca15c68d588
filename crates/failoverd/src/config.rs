// Environment configuration for failoverd
//
// Every setting comes from a `FAILOVER_*` environment variable. Values are
// parsed strictly: a variable that is set but malformed is an error, never
// a silent fallback to the default.

use anyhow::{Context, Result, anyhow, bail};
use failover_core::{
    EngineConfig, FailoverConfig, PolicyConfig, ProbeConfig, ProviderConfig, RecordConfig,
    StateStoreConfig, Target, Targets,
};
use std::net::IpAddr;
use std::str::FromStr;
use tracing::Level;

/// Default location of the state file
pub const DEFAULT_STATE_FILE: &str = "/var/lib/failover/state.json";

/// Daemon settings: the engine configuration plus process-level knobs
#[derive(Debug, Clone)]
pub struct Settings {
    pub failover: FailoverConfig,
    pub log_level: Level,
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let vars = Vars { lookup: &lookup };

        let record = vars.required("FAILOVER_RECORD")?;
        let targets = Targets {
            primary: vars.required_parsed("FAILOVER_PRIMARY_IP")?,
            backup: vars.required_parsed("FAILOVER_BACKUP_IP")?,
        };

        let dry_run = match vars.get("FAILOVER_MODE").as_deref() {
            None | Some("live") => false,
            Some("dry-run") => true,
            Some(other) => bail!(
                "FAILOVER_MODE '{}' is not valid. Valid modes: live, dry-run",
                other
            ),
        };

        let provider = ProviderConfig::Cloudflare {
            api_token: vars.secret("FAILOVER_CF_API_TOKEN")?,
            zone_id: vars.secret("FAILOVER_CF_ZONE_ID")?,
            account_id: vars.get("FAILOVER_CF_ACCOUNT_ID"),
            ttl: vars.parsed("FAILOVER_TTL")?,
            dry_run,
        };

        let probe = match vars.get("FAILOVER_PROBE_TYPE").as_deref() {
            None | Some("http") => ProbeConfig::Http {
                port: vars.parsed("FAILOVER_PROBE_PORT")?.unwrap_or(80),
                https_port: vars.parsed("FAILOVER_PROBE_HTTPS_PORT")?.unwrap_or(443),
                path: vars.get("FAILOVER_PROBE_PATH").unwrap_or_else(|| "/".to_string()),
                host_header: vars.get("FAILOVER_PROBE_HOST"),
            },
            Some("tcp") => ProbeConfig::Tcp {
                port: vars
                    .parsed("FAILOVER_PROBE_PORT")?
                    .ok_or_else(|| anyhow!("FAILOVER_PROBE_PORT is required when FAILOVER_PROBE_TYPE=tcp"))?,
            },
            Some(other) => bail!(
                "FAILOVER_PROBE_TYPE '{}' is not supported. Supported types: http, tcp",
                other
            ),
        };

        let state_store = match vars.get("FAILOVER_STATE_STORE_TYPE").as_deref() {
            None | Some("file") => StateStoreConfig::File {
                path: vars
                    .get("FAILOVER_STATE_FILE")
                    .unwrap_or_else(|| DEFAULT_STATE_FILE.to_string()),
            },
            Some("memory") => StateStoreConfig::Memory,
            Some(other) => bail!(
                "FAILOVER_STATE_STORE_TYPE '{}' is not supported. Supported types: file, memory",
                other
            ),
        };

        let defaults = PolicyConfig::default();
        let policy = PolicyConfig {
            latency_threshold_ms: vars
                .parsed("FAILOVER_LATENCY_THRESHOLD_MS")?
                .unwrap_or(defaults.latency_threshold_ms),
            failure_streak: vars
                .parsed("FAILOVER_FAILURE_STREAK")?
                .unwrap_or(defaults.failure_streak),
            latency_streak: vars
                .parsed("FAILOVER_LATENCY_STREAK")?
                .unwrap_or(defaults.latency_streak),
            stability_duration_secs: vars
                .parsed("FAILOVER_STABILITY_SECS")?
                .unwrap_or(defaults.stability_duration_secs),
            min_successes_for_restore: vars.parsed("FAILOVER_MIN_SUCCESSES")?,
        };

        let defaults = EngineConfig::default();
        let engine = EngineConfig {
            tick_interval_secs: vars
                .parsed("FAILOVER_TICK_INTERVAL_SECS")?
                .unwrap_or(defaults.tick_interval_secs),
            probe_timeout_secs: vars
                .parsed("FAILOVER_PROBE_TIMEOUT_SECS")?
                .unwrap_or(defaults.probe_timeout_secs),
            probe_deadline_secs: vars
                .parsed("FAILOVER_PROBE_DEADLINE_SECS")?
                .unwrap_or(defaults.probe_deadline_secs),
            dns_timeout_secs: vars
                .parsed("FAILOVER_DNS_TIMEOUT_SECS")?
                .unwrap_or(defaults.dns_timeout_secs),
            initial_target: vars
                .parsed::<Target>("FAILOVER_INITIAL_TARGET")?
                .unwrap_or_default(),
            event_channel_capacity: defaults.event_channel_capacity,
        };

        let failover = FailoverConfig {
            record: RecordConfig::new(record),
            targets,
            provider,
            probe,
            state_store,
            policy,
            engine,
        };

        let log_level = parse_log_level(
            &vars
                .get("FAILOVER_LOG_LEVEL")
                .unwrap_or_else(|| "info".to_string()),
        )?;

        Ok(Self {
            failover,
            log_level,
        })
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        self.failover
            .validate()
            .context("Invalid failover configuration")?;

        if let Some(path) = self.failover.state_store.file_path()
            && let Some(parent) = std::path::Path::new(path).parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            bail!(
                "FAILOVER_STATE_FILE parent directory does not exist: {}. \
                Create it first: sudo mkdir -p {}",
                parent.display(),
                parent.display()
            );
        }

        Ok(())
    }
}

struct Vars<'a> {
    lookup: &'a dyn Fn(&str) -> Option<String>,
}

impl Vars<'_> {
    /// A set, non-blank variable
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .ok_or_else(|| anyhow!("{} is required. Set it via: export {}=...", key, key))
    }

    /// A required credential that must not be a template placeholder
    fn secret(&self, key: &str) -> Result<String> {
        let value = self.required(key)?;
        let lower = value.to_lowercase();
        if lower.starts_with("your_") || lower.contains("replace_me") {
            bail!("{} appears to be a placeholder. Use the real value.", key);
        }
        Ok(value)
    }

    fn parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|value| {
                value
                    .parse()
                    .map_err(|e| anyhow!("{} has an invalid value '{}': {}", key, value, e))
            })
            .transpose()
    }

    fn required_parsed<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.parsed(key)?
            .ok_or_else(|| anyhow!("{} is required. Set it via: export {}=...", key, key))
    }
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => bail!(
            "FAILOVER_LOG_LEVEL '{}' is not valid. Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

/// Name the target an address belongs to
pub fn describe_address(targets: &Targets, address: IpAddr) -> &'static str {
    if address == targets.primary {
        "primary"
    } else if address == targets.backup {
        "backup"
    } else {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let mut env: HashMap<String, String> = [
            ("FAILOVER_RECORD", "app.example.com"),
            ("FAILOVER_PRIMARY_IP", "203.0.113.10"),
            ("FAILOVER_BACKUP_IP", "198.51.100.20"),
            ("FAILOVER_CF_API_TOKEN", "cf-token-0123456789"),
            ("FAILOVER_CF_ZONE_ID", "zone-123"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (key, value) in vars {
            env.insert(key.to_string(), value.to_string());
        }

        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_minimal_environment() {
        let settings = settings(&[]).unwrap();
        let config = &settings.failover;

        assert_eq!(config.record.name, "app.example.com");
        assert_eq!(config.targets.primary, "203.0.113.10".parse::<IpAddr>().unwrap());
        assert_eq!(config.probe, ProbeConfig::default());
        assert_eq!(config.state_store.file_path(), Some(DEFAULT_STATE_FILE));
        assert_eq!(config.engine.initial_target, Target::Primary);
        assert_eq!(settings.log_level, Level::INFO);
        assert!(config.validate().is_ok());
        assert!(matches!(
            config.provider,
            ProviderConfig::Cloudflare { dry_run: false, ttl: None, .. }
        ));
    }

    #[test]
    fn test_overrides() {
        let settings = settings(&[
            ("FAILOVER_MODE", "dry-run"),
            ("FAILOVER_TTL", "60"),
            ("FAILOVER_PROBE_TYPE", "tcp"),
            ("FAILOVER_PROBE_PORT", "443"),
            ("FAILOVER_STATE_STORE_TYPE", "memory"),
            ("FAILOVER_TICK_INTERVAL_SECS", "10"),
            ("FAILOVER_MIN_SUCCESSES", "5"),
            ("FAILOVER_INITIAL_TARGET", "backup"),
            ("FAILOVER_LOG_LEVEL", "DEBUG"),
        ])
        .unwrap();
        let config = &settings.failover;

        assert!(matches!(
            config.provider,
            ProviderConfig::Cloudflare { dry_run: true, ttl: Some(60), .. }
        ));
        assert_eq!(config.probe, ProbeConfig::Tcp { port: 443 });
        assert!(matches!(config.state_store, StateStoreConfig::Memory));
        assert_eq!(config.engine.tick_interval_secs, 10);
        assert_eq!(config.decision_policy().unwrap().min_successes_for_restore, 5);
        assert_eq!(config.engine.initial_target, Target::Backup);
        assert_eq!(settings.log_level, Level::DEBUG);
    }

    #[test]
    fn test_missing_token() {
        let err = settings(&[("FAILOVER_CF_API_TOKEN", "  ")]).unwrap_err();
        assert!(err.to_string().contains("FAILOVER_CF_API_TOKEN is required"));
    }

    #[test]
    fn test_placeholder_token() {
        let err = settings(&[("FAILOVER_CF_API_TOKEN", "your_cloudflare_api_token_here")])
            .unwrap_err();
        assert!(err.to_string().contains("placeholder"));
    }

    #[test]
    fn test_malformed_number_is_an_error() {
        let err = settings(&[("FAILOVER_TICK_INTERVAL_SECS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("FAILOVER_TICK_INTERVAL_SECS"));
    }

    #[test]
    fn test_invalid_address() {
        assert!(settings(&[("FAILOVER_PRIMARY_IP", "primary.example.com")]).is_err());
    }

    #[test]
    fn test_tcp_probe_needs_port() {
        assert!(settings(&[("FAILOVER_PROBE_TYPE", "tcp")]).is_err());
    }

    #[test]
    fn test_unknown_mode_and_level() {
        assert!(settings(&[("FAILOVER_MODE", "yolo")]).is_err());
        assert!(settings(&[("FAILOVER_LOG_LEVEL", "verbose")]).is_err());
    }

    #[test]
    fn test_validate_rejects_equal_targets() {
        let settings = settings(&[
            ("FAILOVER_BACKUP_IP", "203.0.113.10"),
            ("FAILOVER_STATE_STORE_TYPE", "memory"),
        ])
        .unwrap();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_missing_state_dir() {
        let settings = settings(&[("FAILOVER_STATE_FILE", "/nonexistent/failover/state.json")])
            .unwrap();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("parent directory does not exist"));
    }

    #[test]
    fn test_describe_address() {
        let targets = Targets {
            primary: "203.0.113.10".parse().unwrap(),
            backup: "198.51.100.20".parse().unwrap(),
        };
        assert_eq!(describe_address(&targets, targets.backup), "backup");
        assert_eq!(describe_address(&targets, "192.0.2.1".parse().unwrap()), "unknown");
    }
}
