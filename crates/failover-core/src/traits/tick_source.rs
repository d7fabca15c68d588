//! Tick source trait
//!
//! A tick source yields one [`Tick`] per scheduled health check. The engine
//! pulls the next tick only after the previous one has been fully processed,
//! so ticks never overlap regardless of the source.

use chrono::{DateTime, Utc};
use std::pin::Pin;
use tokio_stream::Stream;

/// One scheduled health-check cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// 1-based sequence number within this run
    pub sequence: u64,
    /// When the tick fired
    pub fired_at: DateTime<Utc>,
}

/// Periodic tick source driving the monitoring loop
pub trait TickSource: Send + Sync {
    /// Stream of ticks; ends when the source has no more ticks to give
    fn ticks(&self) -> Pin<Box<dyn Stream<Item = Tick> + Send + 'static>>;
}
