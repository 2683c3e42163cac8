//! Streaming progress ramp.
//!
//! Every assigned playlist contributes streams linearly at a fixed daily rate.
//! The estimate is always recomputed from elapsed time; a stored progress value
//! is never consulted.

use chrono::{DateTime, Utc};

/// Streams one playlist placement yields per 24 hours.
pub const DEFAULT_STREAMS_PER_PLAYLIST_PER_DAY: i64 = 500;

const MILLIS_PER_DAY: i128 = 24 * 60 * 60 * 1000;

/// Linear stream-count estimator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressRamp {
    streams_per_playlist_per_day: i64,
}

impl Default for ProgressRamp {
    fn default() -> Self {
        Self::new(DEFAULT_STREAMS_PER_PLAYLIST_PER_DAY)
    }
}

impl ProgressRamp {
    pub fn new(streams_per_playlist_per_day: i64) -> Self {
        Self {
            streams_per_playlist_per_day: streams_per_playlist_per_day.max(0),
        }
    }

    pub fn streams_per_playlist_per_day(&self) -> i64 {
        self.streams_per_playlist_per_day
    }

    /// `floor(hours_elapsed * slot_count * rate / 24)`, clamped to `[0, target_streams]`.
    ///
    /// Returns 0 when nothing has been assigned yet (`assigned_at` is `None`)
    /// or no slot holds a playlist.
    pub fn estimate(
        &self,
        assigned_at: Option<DateTime<Utc>>,
        slot_count: u32,
        target_streams: i64,
        now: DateTime<Utc>,
    ) -> i64 {
        let Some(assigned_at) = assigned_at else {
            return 0;
        };
        if slot_count == 0 || target_streams <= 0 {
            return 0;
        }

        let elapsed_ms = (now - assigned_at).num_milliseconds();
        if elapsed_ms <= 0 {
            return 0;
        }

        // Integer arithmetic keeps whole-hour boundaries exact.
        let streams = elapsed_ms as i128
            * slot_count as i128
            * self.streams_per_playlist_per_day as i128
            / MILLIS_PER_DAY;

        streams.min(target_streams as i128) as i64
    }
}

/// Estimate using the default 500 streams/playlist/day rate.
pub fn estimate_streams(
    assigned_at: Option<DateTime<Utc>>,
    slot_count: u32,
    target_streams: i64,
    now: DateTime<Utc>,
) -> i64 {
    ProgressRamp::default().estimate(assigned_at, slot_count, target_streams, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_zero_without_assignment_time() {
        assert_eq!(estimate_streams(None, 4, 3000, t0()), 0);
        assert_eq!(estimate_streams(None, 0, 3000, t0()), 0);
    }

    #[test]
    fn test_zero_without_slots() {
        let assigned = t0() - Duration::hours(100);
        assert_eq!(estimate_streams(Some(assigned), 0, 3000, t0()), 0);
    }

    #[test]
    fn test_four_playlists_after_one_day() {
        let assigned = t0();
        let now = assigned + Duration::hours(24);
        assert_eq!(estimate_streams(Some(assigned), 4, 3000, now), 2000);
    }

    #[test]
    fn test_clamped_at_target() {
        let assigned = t0();
        let now = assigned + Duration::hours(36);
        assert_eq!(estimate_streams(Some(assigned), 4, 3000, now), 3000);
        let later = assigned + Duration::days(30);
        assert_eq!(estimate_streams(Some(assigned), 4, 3000, later), 3000);
    }

    #[test]
    fn test_floor_of_partial_hours() {
        // One playlist: 500/24 = 20.83 streams per hour.
        let assigned = t0();
        let now = assigned + Duration::hours(1);
        assert_eq!(estimate_streams(Some(assigned), 1, 10_000, now), 20);
        let now = assigned + Duration::minutes(90);
        assert_eq!(estimate_streams(Some(assigned), 1, 10_000, now), 31);
    }

    #[test]
    fn test_future_assignment_is_zero() {
        let assigned = t0() + Duration::hours(2);
        assert_eq!(estimate_streams(Some(assigned), 3, 3000, t0()), 0);
    }

    #[test]
    fn test_monotonic_and_bounded() {
        let assigned = t0();
        let ramp = ProgressRamp::default();
        let mut previous = 0;
        for minutes in (0..=4 * 24 * 60).step_by(17) {
            let now = assigned + Duration::minutes(minutes);
            let value = ramp.estimate(Some(assigned), 3, 2500, now);
            assert!(value >= previous, "estimate decreased at {} minutes", minutes);
            assert!(value <= 2500);
            previous = value;
        }
        assert_eq!(previous, 2500);
    }

    #[test]
    fn test_custom_rate() {
        let ramp = ProgressRamp::new(1200);
        let assigned = t0();
        let now = assigned + Duration::hours(12);
        assert_eq!(ramp.estimate(Some(assigned), 2, 100_000, now), 1200);
    }
}
