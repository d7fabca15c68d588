// # State Store Trait
//
// Defines the interface for durable storage of the failover state.
//
// ## Purpose
//
// The state store keeps the engine's streak counters, sample history and
// event log across restarts so a restart neither forgets an in-progress
// failure streak nor resets the restoration stability period.
//
// ## Implementations
//
// - File-based: versioned JSON with atomic write-then-rename
// - Memory: tests and ephemeral deployments
//
// ## Usage
//
// ```rust,ignore
// use failover_core::{FailoverState, StateStore, Target};
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* StateStore implementation */;
//
//     let state = store.load().await?.unwrap_or_else(|| FailoverState::fresh(Target::Primary));
//     store.save(&state).await?;
//
//     Ok(())
// }
// ```

use crate::model::FailoverState;
use async_trait::async_trait;

/// Trait for state store implementations
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O for persistent storage (files, databases, etc.)
/// - ✅ Recover from corrupt data by falling back to backups
///
/// ## Forbidden Capabilities
/// - ❌ Implement decision logic (owned by the decision engine)
/// - ❌ Perform DNS updates (owned by `DnsProvider`)
/// - ❌ Spawn background tasks
///
/// ## Implementation Guidelines
///
/// - **Atomic saves**: a crash during `save` must leave either the old or
///   the new state readable, never a torn mix
/// - **Corruption is not fatal**: unreadable data yields `Ok(None)` with a
///   warning, never a panic
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the persisted state
    ///
    /// # Returns
    ///
    /// - `Ok(Some(state))`: A previously saved state
    /// - `Ok(None)`: Nothing usable was persisted (absent or corrupt)
    /// - `Err(Error)`: Storage could not be reached at all
    async fn load(&self) -> Result<Option<FailoverState>, crate::Error>;

    /// Persist the state atomically
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The state is durable
    /// - `Err(Error)`: Nothing was changed
    async fn save(&self, state: &FailoverState) -> Result<(), crate::Error>;

    /// Short description for logs (e.g. the file path)
    fn describe(&self) -> String;
}

/// Helper trait for constructing state stores from configuration
#[async_trait]
pub trait StateStoreFactory: Send + Sync {
    /// Create a StateStore instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: State store configuration
    /// - `record_name`: The record whose state the store holds
    async fn create(
        &self,
        config: &crate::config::StateStoreConfig,
        record_name: &str,
    ) -> Result<Box<dyn StateStore>, crate::Error>;
}
