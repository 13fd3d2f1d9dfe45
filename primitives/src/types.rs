//! Core domain types for proximity-verified attendance.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::constants::{PARTICIPANT_ID_MAX, PARTICIPANT_ID_MIN, PARTICIPANT_ID_PREFIX};
use crate::errors::{AttendanceError, AttendanceResult};

// =============================================================================
// Coordinates
// =============================================================================

/// A captured position in degrees. Immutable once produced by a provider.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "accuracy")]
    pub accuracy_meters: f64,
}

impl Coordinate {
    /// Latitude and longitude are not range-checked; the haversine formula is
    /// defined for any finite input.
    pub fn new(latitude: f64, longitude: f64, accuracy_meters: f64) -> AttendanceResult<Self> {
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(AttendanceError::InvalidCoordinate(
                "latitude and longitude must be finite",
            ));
        }
        if !accuracy_meters.is_finite() || accuracy_meters < 0.0 {
            return Err(AttendanceError::InvalidCoordinate(
                "accuracy must be a non-negative number of meters",
            ));
        }
        Ok(Self {
            latitude,
            longitude,
            accuracy_meters,
        })
    }

    /// Same point with zero reported accuracy radius.
    pub const fn exact(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy_meters: 0.0,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Lat: {:.5}, Lon: {:.5} (Accuracy: {:.1}m)",
            self.latitude, self.longitude, self.accuracy_meters
        )
    }
}

// =============================================================================
// Participants
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> AttendanceResult<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(AttendanceError::InvalidParticipantId);
        }
        Ok(Self(id))
    }

    /// `SID-NNNN` with four digits drawn uniformly.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let n = rng.gen_range(PARTICIPANT_ID_MIN..=PARTICIPANT_ID_MAX);
        Self(format!("{PARTICIPANT_ID_PREFIX}{n}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ParticipantId {
    type Err = AttendanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// =============================================================================
// Records
// =============================================================================

/// One verified participant. Created once per id, immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    #[serde(rename = "id")]
    pub participant_id: ParticipantId,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "timestamp")]
    pub verified_at: u64,
}

impl AttendanceRecord {
    pub const fn new(participant_id: ParticipantId, verified_at: u64) -> Self {
        Self {
            participant_id,
            verified_at,
        }
    }

    pub fn now(participant_id: ParticipantId) -> Self {
        Self::new(participant_id, now_millis())
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// =============================================================================
// Session State
// =============================================================================

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub reference: Option<Coordinate>,
    pub active: bool,
    pub attendees: Vec<AttendanceRecord>,
}

impl SessionState {
    pub fn started(reference: Coordinate) -> Self {
        Self {
            reference: Some(reference),
            active: true,
            attendees: Vec::new(),
        }
    }

    pub fn has_attendee(&self, id: &ParticipantId) -> bool {
        self.attendees.iter().any(|r| &r.participant_id == id)
    }

    /// Appends unless the id is already present. Returns whether it appended.
    pub fn push_attendee(&mut self, record: AttendanceRecord) -> bool {
        if self.has_attendee(&record.participant_id) {
            return false;
        }
        self.attendees.push(record);
        true
    }
}

/// Outcome of a conditional roster append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    AlreadyPresent,
    /// The session the caller verified against was ended or replaced.
    SessionChanged,
}

impl AppendOutcome {
    #[inline]
    pub const fn is_appended(self) -> bool {
        matches!(self, Self::Appended)
    }
}

/// State plus a counter bumped by every effective mutation.
///
/// `session` is the version at which the current session was started, 0 when
/// none is active. Appends name the session they were verified against.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub version: u64,
    #[serde(default)]
    pub session: u64,
    pub state: SessionState,
}

impl SessionSnapshot {
    pub fn start(&mut self, reference: Coordinate) {
        self.state = SessionState::started(reference);
        self.bump();
        self.session = self.version;
    }

    pub fn end(&mut self) {
        self.state = SessionState::default();
        self.session = 0;
        self.bump();
    }

    /// Appends only while `session` is still the active session.
    pub fn record(&mut self, session: u64, record: AttendanceRecord) -> AppendOutcome {
        if !self.state.active || self.session != session {
            return AppendOutcome::SessionChanged;
        }
        if !self.state.push_attendee(record) {
            return AppendOutcome::AlreadyPresent;
        }
        self.bump();
        AppendOutcome::Appended
    }

    fn bump(&mut self) {
        self.version = self.version.saturating_add(1);
    }
}

// =============================================================================
// Acquisition Options
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcquisitionOptions {
    pub high_accuracy: bool,
    pub timeout: std::time::Duration,
    pub max_cache_age: std::time::Duration,
}

impl Default for AcquisitionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: crate::constants::acquisition_timeout(),
            max_cache_age: std::time::Duration::from_millis(crate::constants::MAX_CACHE_AGE_MS),
        }
    }
}
