//! Error taxonomy for location, proximity, shared state and attendance attempts.

use std::path::PathBuf;
use thiserror::Error;

pub type AttendanceResult<T> = Result<T, AttendanceError>;
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure kinds of the platform location capability.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("user denied the request for geolocation")]
    PermissionDenied,
    #[error("location information is unavailable")]
    Unavailable,
    #[error("the request to get the location timed out")]
    Timeout,
    #[error("an unknown error occurred while acquiring the location")]
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProximityError {
    #[error("proximity check unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O failed at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("store document at {path:?} is malformed: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("timed out waiting for store lock {path:?}")]
    LockTimeout { path: PathBuf },
}

#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error(transparent)]
    Location(#[from] LocationError),
    #[error("organizer reference coordinate not available")]
    ReferenceUnavailable,
    #[error("too far from the organizer ({distance_meters:.1}m), must be within {max_distance_meters}m")]
    TooFar {
        distance_meters: f64,
        max_distance_meters: f64,
    },
    #[error("secondary proximity check failed")]
    SecondaryCheckFailed,
    #[error("no active attendance session")]
    SessionNotActive,
    #[error("attendance session ended or was restarted during verification")]
    SessionChanged,
    #[error(transparent)]
    Proximity(#[from] ProximityError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid coordinate: {0}")]
    InvalidCoordinate(&'static str),
    #[error("invalid {name}: {value}")]
    InvalidSetting { name: &'static str, value: f64 },
    #[error("participant id must not be empty")]
    InvalidParticipantId,
}

impl AttendanceError {
    /// Failures a human may reasonably retry by re-invoking the operation.
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Location(_) | Self::TooFar { .. } | Self::SecondaryCheckFailed
        )
    }

    /// Measured distance, when the failure carries one.
    pub fn distance_meters(&self) -> Option<f64> {
        match self {
            Self::TooFar {
                distance_meters, ..
            } => Some(*distance_meters),
            _ => None,
        }
    }

    pub const fn location_kind(&self) -> Option<LocationError> {
        match self {
            Self::Location(kind) => Some(*kind),
            _ => None,
        }
    }
}
