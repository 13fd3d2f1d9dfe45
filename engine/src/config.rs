use rollcall_primitives::{
    organizer_poll_interval, participant_poll_interval, AcquisitionOptions, AttendanceError,
    AttendanceResult, MAX_DISTANCE_METERS,
};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    /// Attempts strictly farther than this fail with `TooFar`.
    pub max_distance_meters: f64,
    pub acquisition: AcquisitionOptions,
    /// Roster refresh while a session is active. Bounds organizer staleness.
    pub organizer_poll_interval: Duration,
    /// Session activity refresh. Bounds how long a participant may still see
    /// an ended session as active.
    pub participant_poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_distance_meters: MAX_DISTANCE_METERS,
            acquisition: AcquisitionOptions::default(),
            organizer_poll_interval: organizer_poll_interval(),
            participant_poll_interval: participant_poll_interval(),
        }
    }
}

impl EngineConfig {
    /// Rejects NaN, infinite and negative thresholds.
    pub fn with_max_distance(mut self, meters: f64) -> AttendanceResult<Self> {
        if !meters.is_finite() || meters < 0.0 {
            return Err(AttendanceError::InvalidSetting {
                name: "max_distance_meters",
                value: meters,
            });
        }
        self.max_distance_meters = meters;
        Ok(self)
    }

    pub fn with_acquisition_timeout(mut self, timeout: Duration) -> Self {
        self.acquisition.timeout = timeout;
        self
    }
}
