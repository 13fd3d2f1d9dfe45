//! Core primitives for rollcall proximity-verified attendance.

#![deny(unsafe_code)]

pub mod constants;
pub mod errors;
pub mod geo;
pub mod traits;
pub mod types;

pub use constants::*;
pub use errors::{
    AttendanceError, AttendanceResult, LocationError, ProximityError, StoreError, StoreResult,
};
pub use geo::{distance, within, EARTH_RADIUS_METERS};
pub use types::*;

pub use traits::{LocationProvider, ProximityCheck, SessionStore};
