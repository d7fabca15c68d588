// # failover-core
//
// Core library for the primary/backup DNS failover system.
//
// ## Architecture Overview
//
// This library turns a stream of periodic health samples into a binary DNS
// target (primary or backup), with hysteresis against flapping and durable
// state across restarts:
// - **Probe**: Trait for measuring the health of an address
// - **DnsProvider**: Trait for reading and writing the managed record
// - **StateStore**: Trait for durable failover state
// - **TickSource**: Trait for the periodic schedule
// - **decision::evaluate**: Pure state-transition function
// - **ActionExecutor**: Idempotent application of failover/restore
// - **FailoverEngine**: Loop driver (tick → probe → decide → persist → act)
// - **ProviderRegistry**: Plugin-based registry for providers, probes and stores
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Decision logic is pure and I/O-free
// 2. **Sequential**: One tick at a time, never overlapping
// 3. **Plugin-Based**: Capabilities are registered dynamically
// 4. **Library-First**: All core functionality can be used as a library
// 5. **Idempotency**: Re-applying an action is a successful no-op

pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod executor;
pub mod model;
pub mod registry;
pub mod scheduler;
pub mod state;
pub mod traits;

// Re-export core types for convenience
pub use config::{
    EngineConfig, FailoverConfig, PolicyConfig, ProbeConfig, ProviderConfig, RecordConfig,
    StateStoreConfig,
};
pub use decision::{Action, DecisionPolicy, Evaluation, evaluate};
pub use engine::{EngineEvent, FailoverEngine, TickOutcome, TickReport};
pub use error::{Error, Result};
pub use executor::{ActionExecutor, ApplyOutcome};
pub use model::{
    Direction, FailoverEvent, FailoverState, HealthSample, StatusSnapshot, Target, Targets,
    Trigger,
};
pub use registry::ProviderRegistry;
pub use scheduler::IntervalTickSource;
pub use state::{FileStateStore, MemoryStateStore, StateLock};
pub use traits::{
    DnsProvider, Probe, ProbeOutcome, RecordMetadata, StateStore, Tick, TickSource, UpdateResult,
};
