//! Proximity verification engine.
//!
//! An [`Organizer`] publishes its coordinate as the session reference; each
//! [`Participant`] polls the shared store, and on an attendance attempt
//! compares its own coordinate against the reference, runs the secondary
//! [`ProximityCheck`](rollcall_primitives::ProximityCheck), and records itself
//! in the roster on success.

pub mod config;
pub mod location;
pub mod organizer;
pub mod participant;
pub mod poll;
pub mod proximity;

#[cfg(test)]
mod tests;

pub use config::EngineConfig;
pub use location::{acquire_within, FixedLocation, MockLocation, MockLocationConfig};
pub use organizer::{Organizer, OrganizerState};
pub use participant::{Participant, ParticipantState, VerificationAttempt};
pub use poll::{spawn_snapshot_poller, SnapshotPoller};
pub use proximity::{
    FixedProximityCheck, ProximityConfig, ProximityMode, RandomizedProximityCheck,
};
