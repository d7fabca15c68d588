// # DNS Provider Trait
//
// Defines the interface for reading and writing the managed DNS record.
//
// ## Implementations
//
// - Cloudflare: `failover-provider-cloudflare` crate
// - Tests: in-memory mock providers
//
// ## Usage
//
// ```rust,ignore
// use failover_core::DnsProvider;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let provider = /* DnsProvider implementation */;
//
//     let record = provider.get_record("app.example.com").await?;
//     println!("currently pointing at {}", record.ip);
//
//     provider
//         .update_record("app.example.com", "198.51.100.20".parse()?)
//         .await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;

/// Result of a DNS update operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateResult {
    /// Record was successfully updated
    Updated {
        /// The previous IP address
        previous_ip: Option<IpAddr>,
        /// The new IP address
        new_ip: IpAddr,
    },
    /// Record already had the correct IP (no-op)
    Unchanged {
        /// The current IP address
        current_ip: IpAddr,
    },
}

/// Metadata about a DNS record
#[derive(Debug, Clone)]
pub struct RecordMetadata {
    /// The record ID (provider-specific)
    pub id: String,
    /// The record name
    pub name: String,
    /// The current IP address
    pub ip: IpAddr,
    /// Time-to-live for the record
    pub ttl: Option<u32>,
    /// Any additional provider-specific metadata
    pub extra: serde_json::Value,
}

/// Trait for DNS provider implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses
/// - ✅ Return success or failure (the engine decides what happens next)
///
/// ## Forbidden Capabilities
/// - ❌ Spawn tasks or threads
/// - ❌ Implement retry logic or backoff (a failed action is retried on the
///   next tick by the engine)
/// - ❌ Access the state store
/// - ❌ Decide which address the record should hold
///
/// Every call is wrapped in the engine's DNS timeout; implementations should
/// still configure their own client timeout.
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Point a DNS record at a new IP address
    ///
    /// # Idempotency
    ///
    /// Calling this with the address the record already holds must succeed
    /// and return `UpdateResult::Unchanged`.
    ///
    /// # Returns
    ///
    /// - `Ok(UpdateResult)`: The result of the update operation
    /// - `Err(Error)`: Network, authentication or missing-record failure
    async fn update_record(
        &self,
        record_name: &str,
        new_ip: IpAddr,
    ) -> Result<UpdateResult, crate::Error>;

    /// Get current metadata for a DNS record
    ///
    /// # Returns
    ///
    /// - `Ok(RecordMetadata)`: The record's current metadata
    /// - `Err(Error)`: If the record doesn't exist or the request failed
    async fn get_record(&self, record_name: &str) -> Result<RecordMetadata, crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
