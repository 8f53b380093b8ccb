//! # Sync Metrics
//!
//! Running totals across sync passes.

use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct SyncMetrics {
    pub total_passes: u64,
    /// Passes skipped because the monitor reported offline
    pub skipped_offline: u64,
    pub records_delivered: u64,
    pub delivery_failures: u64,
    /// Duration of the most recently finished pass
    pub last_pass_duration: Option<Duration>,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pass_start(&mut self) {
        self.total_passes += 1;
    }

    /// Close one pass; `elapsed` is measured by the caller so overlapping
    /// passes each report their own duration
    pub fn record_pass_end(&mut self, delivered: usize, failed: usize, elapsed: Duration) {
        self.last_pass_duration = Some(elapsed);
        self.records_delivered += delivered as u64;
        self.delivery_failures += failed as u64;
    }

    pub fn record_skipped(&mut self) {
        self.skipped_offline += 1;
    }

    /// Share of delivery attempts that succeeded
    pub fn success_rate(&self) -> f64 {
        let attempts = self.records_delivered + self.delivery_failures;
        if attempts == 0 {
            0.0
        } else {
            self.records_delivered as f64 / attempts as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let mut metrics = SyncMetrics::new();
        assert_eq!(metrics.success_rate(), 0.0);

        metrics.record_pass_start();
        metrics.record_pass_end(3, 1, Duration::from_millis(40));
        assert_eq!(metrics.total_passes, 1);
        assert_eq!(metrics.success_rate(), 0.75);
        assert_eq!(metrics.last_pass_duration, Some(Duration::from_millis(40)));
    }
}
