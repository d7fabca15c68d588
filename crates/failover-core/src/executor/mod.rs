//! Action executor
//!
//! Turns a decided [`Action`] into provider calls. Every apply is
//! read-then-write: the record is read first and only written when it does
//! not already hold the desired address, so re-applying an action (after a
//! crash, or a manual command racing an earlier one) is a successful no-op.

use crate::decision::Action;
use crate::error::{Error, Result};
use crate::model::Targets;
use crate::traits::{DnsProvider, UpdateResult};
use serde::Serialize;
use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, info};

/// What applying an action did to the record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ApplyOutcome {
    /// The action was `None`; nothing was called
    NoAction,
    /// The record already held the desired address
    Unchanged { address: IpAddr },
    /// The record was rewritten
    Updated { previous: IpAddr, current: IpAddr },
}

/// Applies failover/restore actions through a [`DnsProvider`]
pub struct ActionExecutor {
    provider: Box<dyn DnsProvider>,
    record_name: String,
    targets: Targets,
    timeout: Duration,
}

impl ActionExecutor {
    /// # Parameters
    ///
    /// - `timeout`: bound for each individual provider call
    pub fn new(
        provider: Box<dyn DnsProvider>,
        record_name: impl Into<String>,
        targets: Targets,
        timeout: Duration,
    ) -> Self {
        Self {
            provider,
            record_name: record_name.into(),
            targets,
            timeout,
        }
    }

    pub fn record_name(&self) -> &str {
        &self.record_name
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.provider_name()
    }

    /// Apply an action
    ///
    /// # Errors
    ///
    /// Any provider error or timeout. The caller must then leave the
    /// persisted target unchanged.
    pub async fn apply(&self, action: Action) -> Result<ApplyOutcome> {
        let Some(direction) = action.direction() else {
            return Ok(ApplyOutcome::NoAction);
        };

        let desired = self.targets.address(direction.destination());
        let current = self.current_address().await?;

        if current == desired {
            debug!(
                record = %self.record_name,
                address = %desired,
                "Record already points at {}, skipping {}",
                direction.destination(),
                action
            );
            return Ok(ApplyOutcome::Unchanged { address: desired });
        }

        let result = self
            .bounded(
                "update record",
                self.provider.update_record(&self.record_name, desired),
            )
            .await?;

        let outcome = match result {
            UpdateResult::Updated { previous_ip, new_ip } => ApplyOutcome::Updated {
                previous: previous_ip.unwrap_or(current),
                current: new_ip,
            },
            UpdateResult::Unchanged { current_ip } => ApplyOutcome::Unchanged {
                address: current_ip,
            },
        };

        if let ApplyOutcome::Updated { previous, current } = outcome {
            info!(
                record = %self.record_name,
                provider = self.provider.provider_name(),
                "Updated {} -> {} (previous: {})",
                self.record_name,
                current,
                previous
            );
        }

        Ok(outcome)
    }

    /// Address the provider currently publishes for the record
    pub async fn current_address(&self) -> Result<IpAddr> {
        let record = self
            .bounded("read record", self.provider.get_record(&self.record_name))
            .await?;
        Ok(record.ip)
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::timeout(format!(
                "{} {} via {} exceeded {:?}",
                operation,
                self.record_name,
                self.provider.provider_name(),
                self.timeout
            ))),
        }
    }
}
