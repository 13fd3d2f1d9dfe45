//! Verification thresholds and timing defaults.

use std::time::Duration;

// Distance decision
pub const MAX_DISTANCE_METERS: f64 = 50.0;

// Secondary check
pub const SECONDARY_CHECK_SUCCESS_PROBABILITY: f64 = 0.8;
pub const SECONDARY_CHECK_LATENCY_MS: u64 = 1_500;

// Location acquisition
pub const ACQUISITION_TIMEOUT_MS: u64 = 15_000;
pub const MAX_CACHE_AGE_MS: u64 = 0;

// Polling (staleness window == poll interval)
pub const ORGANIZER_POLL_INTERVAL_MS: u64 = 3_000;
pub const PARTICIPANT_POLL_INTERVAL_MS: u64 = 5_000;

// Participant ids generated as SID-NNNN
pub const PARTICIPANT_ID_PREFIX: &str = "SID-";
pub const PARTICIPANT_ID_MIN: u32 = 1_000;
pub const PARTICIPANT_ID_MAX: u32 = 9_999;

#[inline]
pub const fn secondary_check_latency() -> Duration {
    Duration::from_millis(SECONDARY_CHECK_LATENCY_MS)
}

#[inline]
pub const fn acquisition_timeout() -> Duration {
    Duration::from_millis(ACQUISITION_TIMEOUT_MS)
}

#[inline]
pub const fn organizer_poll_interval() -> Duration {
    Duration::from_millis(ORGANIZER_POLL_INTERVAL_MS)
}

#[inline]
pub const fn participant_poll_interval() -> Duration {
    Duration::from_millis(PARTICIPANT_POLL_INTERVAL_MS)
}
