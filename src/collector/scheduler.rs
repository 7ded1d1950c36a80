//! Fixed-interval driver for collection rounds.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use crate::collector::traits::MIN_INTERVAL;
use crate::collector::{Collector, RoundSummary};

/// Runs [`Collector::run_round`] forever at a fixed period.
///
/// Rounds never overlap: the next one is only started after the previous
/// round's commit. When a round overruns the period the following tick is
/// delayed rather than bunched up.
#[derive(Debug)]
pub struct Scheduler {
    collector: Arc<Collector>,
    interval: Duration,
}

impl Scheduler {
    /// Create a scheduler.
    ///
    /// Interval is clamped to a minimum of [`MIN_INTERVAL`].
    pub fn new(collector: Arc<Collector>, interval: Duration) -> Self {
        let interval = if interval < MIN_INTERVAL {
            tracing::warn!(min_interval = ?MIN_INTERVAL,
                "Refresh interval is less than minimum allowed. Using minimum interval."
            );
            MIN_INTERVAL
        } else {
            interval
        };

        Self {
            collector,
            interval,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one round in the caller's task, then keep going in the background.
    ///
    /// When this returns, the first round's samples are already visible to
    /// readers. The returned task never finishes on its own.
    pub async fn start(self) -> (RoundSummary, JoinHandle<()>) {
        let first = self.collector.run_round().await;
        tracing::info!(
            interval = ?self.interval,
            succeeded = first.succeeded,
            failed = first.failed,
            "Initial probe round complete, scheduler running"
        );

        let handle = tokio::spawn(self.run());
        (first, handle)
    }

    async fn run(self) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.collector.run_round().await;
        }
    }
}
