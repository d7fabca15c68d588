//! Domain model for the failover engine
//!
//! - [`HealthSample`]: one immutable probe result
//! - [`BoundedLog`]: fixed-capacity FIFO log used for history and events
//! - [`FailoverState`]: the durable aggregate persisted by a `StateStore`
//! - [`StatusSnapshot`]: read-only view handed to CLI/API callers

pub mod bounded_log;
pub mod sample;
pub mod state;
pub mod status;
pub mod target;

pub use bounded_log::BoundedLog;
pub use sample::HealthSample;
pub use state::{
    Direction, EVENT_LOG_CAPACITY, EventLog, FailoverEvent, FailoverState, HISTORY_CAPACITY,
    SampleHistory, Trigger,
};
pub use status::StatusSnapshot;
pub use target::{Target, Targets};
