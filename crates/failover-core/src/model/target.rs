//! DNS targets
//!
//! The engine only ever switches a record between two configured
//! addresses. [`Target`] names which one, [`Targets`] maps names to addresses.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

/// Which address the DNS record points at
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    #[default]
    Primary,
    Backup,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Primary => "primary",
            Target::Backup => "backup",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "primary" => Ok(Target::Primary),
            "backup" => Ok(Target::Backup),
            other => Err(Error::invalid_input(format!(
                "Unknown target '{}'. Valid targets: primary, backup",
                other
            ))),
        }
    }
}

/// The two addresses a record can point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Targets {
    /// Preferred address
    pub primary: IpAddr,
    /// Address used while the primary is unhealthy
    pub backup: IpAddr,
}

impl Targets {
    /// Create a validated target pair
    pub fn new(primary: IpAddr, backup: IpAddr) -> Result<Self> {
        let targets = Self { primary, backup };
        targets.validate()?;
        Ok(targets)
    }

    /// Validate the address pair
    pub fn validate(&self) -> Result<()> {
        if self.primary == self.backup {
            return Err(Error::config(format!(
                "Primary and backup addresses must differ (both are {})",
                self.primary
            )));
        }

        for (name, addr) in [("primary", self.primary), ("backup", self.backup)] {
            if addr.is_unspecified() || addr.is_multicast() {
                return Err(Error::config(format!(
                    "Invalid {} address: {}",
                    name, addr
                )));
            }
        }

        if self.primary.is_ipv4() != self.backup.is_ipv4() {
            return Err(Error::config(
                "Primary and backup addresses must be the same IP version",
            ));
        }

        Ok(())
    }

    /// Address for the given target
    pub fn address(&self, target: Target) -> IpAddr {
        match target {
            Target::Primary => self.primary,
            Target::Backup => self.backup,
        }
    }

    /// Which target an address corresponds to, if either
    pub fn classify(&self, address: IpAddr) -> Option<Target> {
        if address == self.primary {
            Some(Target::Primary)
        } else if address == self.backup {
            Some(Target::Backup)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets() -> Targets {
        Targets::new("203.0.113.10".parse().unwrap(), "198.51.100.20".parse().unwrap()).unwrap()
    }

    #[test]
    fn classifies_known_addresses() {
        let targets = targets();
        assert_eq!(targets.classify(targets.primary), Some(Target::Primary));
        assert_eq!(targets.classify(targets.backup), Some(Target::Backup));
        assert_eq!(targets.classify("192.0.2.1".parse().unwrap()), None);
    }

    #[test]
    fn rejects_identical_addresses() {
        let addr: IpAddr = "203.0.113.10".parse().unwrap();
        assert!(Targets::new(addr, addr).is_err());
    }

    #[test]
    fn rejects_mixed_ip_versions() {
        let result = Targets::new("203.0.113.10".parse().unwrap(), "2001:db8::1".parse().unwrap());
        assert!(result.is_err());
    }

    #[test]
    fn parses_target_names() {
        assert_eq!("Backup".parse::<Target>().unwrap(), Target::Backup);
        assert!("secondary".parse::<Target>().is_err());
    }
}
