use std::time::Duration;

use serde::Serialize;
use serde::ser::SerializeStruct;

/// Snapshot of the counters kept by a [`crate::ratelimit::Throttler`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThrottleStats {
    /// Number of fetches started
    pub total_requests: u64,
    /// Number of fetches that returned an error
    pub failed_requests: u64,
    /// Number of fetches that had to wait for the rate window
    pub rate_delayed: u64,
    /// Number of fetches currently in flight
    pub in_flight: usize,
    /// Highest number of fetches ever in flight at the same time
    pub peak_in_flight: usize,
    /// Time spent inside fetch functions, summed over all fetches
    pub total_fetch_time: Duration,
}

impl ThrottleStats {
    /// Get average fetch time
    #[must_use]
    pub fn average_fetch_time(&self) -> Option<Duration> {
        if self.total_requests == 0 {
            return None;
        }
        let nanos = self.total_fetch_time.as_nanos() / u128::from(self.total_requests);
        Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }

    /// Get the current success rate (0.0 to 1.0)
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_requests == 0 {
            1.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            let success_rate = (self.total_requests - self.failed_requests) as f64
                / self.total_requests as f64;
            success_rate
        }
    }
}

impl Serialize for ThrottleStats {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut s = serializer.serialize_struct("ThrottleStats", 7)?;
        s.serialize_field("total_requests", &self.total_requests)?;
        s.serialize_field("failed_requests", &self.failed_requests)?;
        s.serialize_field("rate_delayed", &self.rate_delayed)?;
        s.serialize_field("in_flight", &self.in_flight)?;
        s.serialize_field("peak_in_flight", &self.peak_in_flight)?;
        s.serialize_field("success_rate", &self.success_rate())?;
        s.serialize_field(
            "average_fetch_time_ms",
            &self.average_fetch_time().map(|d| d.as_millis()),
        )?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats() {
        let stats = ThrottleStats::default();
        assert_eq!(stats.average_fetch_time(), None);
        assert!((stats.success_rate() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rates() {
        let stats = ThrottleStats {
            total_requests: 4,
            failed_requests: 1,
            total_fetch_time: Duration::from_millis(400),
            ..ThrottleStats::default()
        };
        assert_eq!(stats.average_fetch_time(), Some(Duration::from_millis(100)));
        assert!((stats.success_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_average_beyond_u32_requests() {
        let stats = ThrottleStats {
            total_requests: 1 << 32,
            total_fetch_time: Duration::from_secs(1 << 32),
            ..ThrottleStats::default()
        };
        assert_eq!(stats.average_fetch_time(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_serialization() {
        let stats = ThrottleStats {
            total_requests: 2,
            total_fetch_time: Duration::from_millis(50),
            ..ThrottleStats::default()
        };
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["total_requests"], 2);
        assert_eq!(json["average_fetch_time_ms"], 25);
        assert_eq!(json["success_rate"], 1.0);
    }
}
