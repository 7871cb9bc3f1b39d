//! Connection pool usage statistics

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Number of response-time samples the rolling average is computed over
const MAX_SAMPLES: usize = 100;

/// Snapshot of the pool's usage counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConnectionPoolStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub active_connections: u64,
    pub reconnections: u64,
    pub total_bytes_sent: u64,
    pub total_bytes_received: u64,
    /// Rolling average over the most recent response-time samples
    #[serde(with = "humantime_serde")]
    pub average_response_time: Duration,
    pub last_health_check: Option<DateTime<Utc>>,
}

/// Mutable counter state, guarded by the pool's stats mutex
#[derive(Debug, Default)]
pub(crate) struct StatsInner {
    pub(crate) total_requests: u64,
    pub(crate) successful_requests: u64,
    pub(crate) failed_requests: u64,
    pub(crate) active_connections: u64,
    pub(crate) reconnections: u64,
    pub(crate) total_bytes_sent: u64,
    pub(crate) total_bytes_received: u64,
    pub(crate) response_times: VecDeque<Duration>,
    pub(crate) last_health_check: Option<DateTime<Utc>>,
}

impl StatsInner {
    pub(crate) fn record_success(&mut self, elapsed: Duration, sent: u64, received: u64) {
        self.successful_requests += 1;
        self.total_bytes_sent += sent;
        self.total_bytes_received += received;
        if self.response_times.len() == MAX_SAMPLES {
            self.response_times.pop_front();
        }
        self.response_times.push_back(elapsed);
    }

    pub(crate) fn record_failure(&mut self) {
        self.failed_requests += 1;
    }

    pub(crate) fn snapshot(&self) -> ConnectionPoolStats {
        let average_response_time = if self.response_times.is_empty() {
            Duration::ZERO
        } else {
            let total: Duration = self.response_times.iter().sum();
            total / self.response_times.len() as u32
        };

        ConnectionPoolStats {
            total_requests: self.total_requests,
            successful_requests: self.successful_requests,
            failed_requests: self.failed_requests,
            active_connections: self.active_connections,
            reconnections: self.reconnections,
            total_bytes_sent: self.total_bytes_sent,
            total_bytes_received: self.total_bytes_received,
            average_response_time,
            last_health_check: self.last_health_check,
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_average_caps_samples() {
        let mut inner = StatsInner::default();

        for _ in 0..150 {
            inner.record_success(Duration::from_millis(10), 0, 0);
        }
        assert_eq!(inner.response_times.len(), MAX_SAMPLES);

        // Flood the window with slower samples; the old fast ones age out
        for _ in 0..MAX_SAMPLES {
            inner.record_success(Duration::from_millis(30), 0, 0);
        }
        assert_eq!(inner.snapshot().average_response_time, Duration::from_millis(30));
    }

    #[test]
    fn test_snapshot_with_no_samples() {
        let inner = StatsInner::default();
        assert_eq!(inner.snapshot().average_response_time, Duration::ZERO);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let mut inner = StatsInner::default();
        inner.total_requests = 7;
        inner.record_success(Duration::from_millis(5), 100, 200);
        inner.record_failure();
        inner.reconnections = 2;

        inner.reset();

        let snapshot = inner.snapshot();
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.successful_requests, 0);
        assert_eq!(snapshot.failed_requests, 0);
        assert_eq!(snapshot.reconnections, 0);
        assert_eq!(snapshot.total_bytes_sent, 0);
        assert_eq!(snapshot.total_bytes_received, 0);
        assert_eq!(snapshot.average_response_time, Duration::ZERO);
    }
}
