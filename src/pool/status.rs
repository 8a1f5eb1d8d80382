use std::time::Duration;

/// Point-in-time view of the pool's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Connections parked in the idle set.
    pub idle: usize,
    /// Connections checked out, plus slots reserved for connections being opened.
    pub in_use: usize,
    /// Callers suspended in `acquire`.
    pub waiting: usize,
    pub max_size: usize,
    pub closed: bool,
}

impl PoolStatus {
    #[must_use]
    pub fn total(&self) -> usize {
        self.idle + self.in_use
    }

    /// Share of the maximum currently checked out, in percent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn utilization(&self) -> f64 {
        if self.max_size == 0 {
            return 0.0;
        }
        (self.in_use as f64 / self.max_size as f64) * 100.0
    }

    #[must_use]
    pub fn is_at_capacity(&self) -> bool {
        self.total() >= self.max_size
    }
}

#[derive(Debug, Default)]
pub(super) struct MetricsInner {
    pub(super) connections_created: u64,
    pub(super) connections_closed: u64,
    pub(super) checkouts_successful: u64,
    pub(super) checkouts_failed: u64,
    pub(super) broken_discarded: u64,
}

/// Counters accumulated since the pool was created.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    pub connections_created: u64,
    pub connections_closed: u64,
    pub checkouts_successful: u64,
    /// Timeouts, closed-pool refusals and connect failures.
    pub checkouts_failed: u64,
    /// Connections discarded because they were marked broken.
    pub broken_discarded: u64,
    pub uptime: Duration,
}

impl PoolMetrics {
    /// Calculate checkout success rate (0.0 to 1.0).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn checkout_success_rate(&self) -> f64 {
        let total = self.checkouts_successful + self.checkouts_failed;
        if total == 0 {
            return 1.0;
        }
        self.checkouts_successful as f64 / total as f64
    }
}
