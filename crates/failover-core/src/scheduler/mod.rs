//! Tick scheduling
//!
//! [`IntervalTickSource`] is the production [`TickSource`]: one tick per
//! interval, first tick immediately. Missed ticks are delayed rather than
//! burst, so a slow tick (long probe, slow provider) pushes the schedule
//! back instead of causing back-to-back catch-up ticks.

use crate::traits::{Tick, TickSource};
use chrono::Utc;
use std::pin::Pin;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::IntervalStream;
use tokio_stream::{Stream, StreamExt};

/// Fixed-interval tick source
#[derive(Debug, Clone, Copy)]
pub struct IntervalTickSource {
    period: Duration,
}

impl IntervalTickSource {
    /// # Errors
    ///
    /// Rejects a zero period.
    pub fn new(period: Duration) -> crate::Result<Self> {
        if period.is_zero() {
            return Err(crate::Error::config("Tick interval must be > 0"));
        }
        Ok(Self { period })
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl TickSource for IntervalTickSource {
    fn ticks(&self) -> Pin<Box<dyn Stream<Item = Tick> + Send + 'static>> {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut sequence = 0u64;
        Box::pin(IntervalStream::new(interval).map(move |_| {
            sequence += 1;
            Tick {
                sequence,
                fired_at: Utc::now(),
            }
        }))
    }
}
