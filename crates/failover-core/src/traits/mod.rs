//! Capability traits for the failover system
//!
//! The decision engine is pure; everything that touches the outside world is
//! reached through one of these interfaces.
//!
//! - [`Probe`]: Measure availability and latency of an address
//! - [`DnsProvider`]: Read and write the managed DNS record
//! - [`StateStore`]: Durable storage for the failover state
//! - [`TickSource`]: Periodic ticks driving the monitoring loop

pub mod probe;
pub mod dns_provider;
pub mod state_store;
pub mod tick_source;

pub use probe::{Probe, ProbeOutcome, ProbeFactory};
pub use dns_provider::{DnsProvider, UpdateResult, RecordMetadata, DnsProviderFactory};
pub use state_store::{StateStore, StateStoreFactory};
pub use tick_source::{Tick, TickSource};
