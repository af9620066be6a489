//! Expiry policy: how long a cached range stays valid.

use chrono::{DateTime, Duration, Utc};
use stream_common::Timestep;

/// Age-based validity with separate lifetimes for past and forecast data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// Lifetime of data whose valid time has already elapsed.
    pub past_max_age: Duration,
    /// Lifetime of forecast data, which a newer run may replace.
    pub future_max_age: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            past_max_age: Duration::days(28),
            future_max_age: Duration::hours(24),
        }
    }
}

impl CachePolicy {
    pub fn new(past_max_age: Duration, future_max_age: Duration) -> Self {
        Self {
            past_max_age,
            future_max_age,
        }
    }

    pub fn max_age(&self, is_past: bool) -> Duration {
        if is_past {
            self.past_max_age
        } else {
            self.future_max_age
        }
    }

    /// `maxAge(isPast) - (now - cachedAt)`. Negative once expired.
    pub fn remaining_lifetime(
        &self,
        now: DateTime<Utc>,
        cached_at: DateTime<Utc>,
        is_past: bool,
    ) -> Duration {
        self.max_age(is_past) - (now - cached_at)
    }

    /// Pure function of `(now, cached_at, is_past)`.
    pub fn is_entry_valid(&self, now: DateTime<Utc>, cached_at: DateTime<Utc>, is_past: bool) -> bool {
        now - cached_at < self.max_age(is_past)
    }

    /// Whether the valid time embedded in `path` has already elapsed.
    ///
    /// Paths without a recognizable valid time are treated as forecast data
    /// and get the short lifetime.
    pub fn is_past_path(path: &str, now: DateTime<Utc>) -> bool {
        Timestep::from_path(path)
            .map(|ts| ts.datetime() < now)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_ttl_law() {
        let policy = CachePolicy::default();
        for is_past in [true, false] {
            let max_age = policy.max_age(is_past);
            let fresh = now() - (max_age - Duration::seconds(1));
            let stale = now() - max_age;
            assert!(policy.is_entry_valid(now(), fresh, is_past));
            assert!(!policy.is_entry_valid(now(), stale, is_past));
        }
    }

    #[test]
    fn test_past_lifetime_order_of_magnitude_longer() {
        let policy = CachePolicy::default();
        assert!(policy.past_max_age >= policy.future_max_age * 10);
    }

    #[test]
    fn test_remaining_lifetime() {
        let policy = CachePolicy::default();
        let cached_at = now() - Duration::hours(6);
        assert_eq!(
            policy.remaining_lifetime(now(), cached_at, false),
            Duration::hours(18)
        );
        assert_eq!(
            policy.remaining_lifetime(now(), cached_at, true),
            Duration::days(28) - Duration::hours(6)
        );
    }

    #[test]
    fn test_is_past_path() {
        let path = "/data_spatial/ecmwf_ifs/2025/06/01/0000Z/2025-06-01T0600.om";
        assert!(CachePolicy::is_past_path(path, now()));

        let future = "/data_spatial/ecmwf_ifs/2025/06/01/0000Z/2025-06-02T0600.om";
        assert!(!CachePolicy::is_past_path(future, now()));

        assert!(!CachePolicy::is_past_path("/data_spatial/ecmwf_ifs/latest.json", now()));
    }
}
