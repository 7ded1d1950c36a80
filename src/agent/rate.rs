//! Byte-counter to throughput conversion.

use std::time::{Duration, Instant};

use crate::storage::NetThroughput;

/// Observations closer than this to the baseline do not produce a new rate.
pub const MIN_RATE_WINDOW: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy)]
struct Baseline {
    tx_total: u64,
    rx_total: u64,
    at: Instant,
}

/// Turns monotonically increasing tx/rx byte totals into bytes/sec.
///
/// The first observation only sets the baseline and reports zero. After that,
/// every observation at least [`MIN_RATE_WINDOW`] past the baseline yields the
/// rate over that real elapsed window and becomes the new baseline; earlier
/// ones return the previous rate and leave the baseline alone. A counter that
/// went backwards (interface reset) counts as zero bytes.
#[derive(Debug, Clone, Default)]
pub struct NetRateEstimator {
    baseline: Option<Baseline>,
    last: NetThroughput,
}

impl NetRateEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently computed rate.
    pub fn last(&self) -> NetThroughput {
        self.last
    }

    /// Feed one pair of cumulative byte counters read at `at`.
    pub fn observe(&mut self, tx_total: u64, rx_total: u64, at: Instant) -> NetThroughput {
        let Some(base) = self.baseline else {
            self.baseline = Some(Baseline {
                tx_total,
                rx_total,
                at,
            });
            return self.last;
        };

        let elapsed = at.saturating_duration_since(base.at);
        if elapsed < MIN_RATE_WINDOW {
            return self.last;
        }

        let secs = elapsed.as_secs_f64();
        self.last = NetThroughput {
            tx_bytes_per_sec: tx_total.saturating_sub(base.tx_total) as f64 / secs,
            rx_bytes_per_sec: rx_total.saturating_sub(base.rx_total) as f64 / secs,
        };
        self.baseline = Some(Baseline {
            tx_total,
            rx_total,
            at,
        });

        self.last
    }
}
