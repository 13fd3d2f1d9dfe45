use rollcall_primitives::{
    distance, AppendOutcome, AttendanceError, AttendanceRecord, AttendanceResult, Coordinate, LocationProvider,
    ParticipantId, ProximityCheck, SessionStore,
};

use std::cmp::Ordering;

use crate::config::EngineConfig;
use crate::location::acquire_within;

/// State: NotChecked -> SessionKnownActive | SessionKnownInactive
///        -> Verifying -> Verified
///
/// A failed attempt returns to `SessionKnownActive`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParticipantState {
    #[default]
    NotChecked,
    SessionKnownActive,
    SessionKnownInactive,
    Verifying,
    Verified,
}

/// Details of a successful verification.
#[derive(Clone, Debug, PartialEq)]
pub struct VerificationAttempt {
    pub participant_id: ParticipantId,
    pub participant_coordinate: Coordinate,
    pub reference_coordinate: Coordinate,
    pub distance_meters: f64,
    pub secondary_check_passed: bool,
    pub record: AttendanceRecord,
    /// `false` when the roster already held this id (e.g. another device).
    pub newly_recorded: bool,
}

/// Participant role: one logical actor verifying itself against the
/// organizer's reference coordinate.
pub struct Participant<L, P, S> {
    id: ParticipantId,
    location: L,
    proximity: P,
    store: S,
    config: EngineConfig,
    state: ParticipantState,
    verified: Option<VerificationAttempt>,
}

impl<L, P, S> Participant<L, P, S>
where
    L: LocationProvider,
    P: ProximityCheck,
    S: SessionStore,
{
    pub fn new(id: ParticipantId, location: L, proximity: P, store: S, config: EngineConfig) -> Self {
        Self {
            id,
            location,
            proximity,
            store,
            config,
            state: ParticipantState::NotChecked,
            verified: None,
        }
    }

    pub fn id(&self) -> &ParticipantId {
        &self.id
    }

    pub fn state(&self) -> ParticipantState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn verification(&self) -> Option<&VerificationAttempt> {
        self.verified.as_ref()
    }

    /// Whether the attendance action should be enabled.
    pub fn can_attempt(&self) -> bool {
        self.state == ParticipantState::SessionKnownActive
    }

    /// Poll the store for session activity.
    ///
    /// A verified participant stays verified while its record remains in the
    /// roster. An ended session, or a new one without this participant, resets
    /// the verification.
    pub async fn refresh(&mut self) -> AttendanceResult<ParticipantState> {
        let snapshot = self.store.snapshot().await?;
        let session = &snapshot.state;

        self.state = if !session.active {
            if self.state != ParticipantState::SessionKnownInactive {
                log::info!("Participant {}: no active session", self.id);
            }
            self.verified = None;
            ParticipantState::SessionKnownInactive
        } else if self.state == ParticipantState::Verified && session.has_attendee(&self.id) {
            ParticipantState::Verified
        } else {
            if self.state != ParticipantState::SessionKnownActive {
                log::info!("Participant {}: active session detected", self.id);
            }
            self.verified = None;
            ParticipantState::SessionKnownActive
        };

        Ok(self.state)
    }

    /// Run one verification attempt.
    ///
    /// Once verified, repeated calls return the earlier result without
    /// re-running anything. Every failure is terminal for the attempt and
    /// leaves the participant in `SessionKnownActive`.
    pub async fn attempt_attendance(&mut self) -> AttendanceResult<VerificationAttempt> {
        if self.state == ParticipantState::Verified {
            if let Some(done) = &self.verified {
                return Ok(done.clone());
            }
        }
        if self.state != ParticipantState::SessionKnownActive {
            return Err(AttendanceError::SessionNotActive);
        }

        log::info!("Participant {}: attempting to mark attendance...", self.id);
        self.state = ParticipantState::Verifying;

        match self.verify().await {
            Ok(attempt) => {
                log::info!(
                    "Participant {}: attendance marked, {:.1}m away",
                    self.id,
                    attempt.distance_meters
                );
                self.state = ParticipantState::Verified;
                self.verified = Some(attempt.clone());
                Ok(attempt)
            }
            Err(e) => {
                log::warn!("Participant {}: attendance FAILED - {}", self.id, e);
                self.state = ParticipantState::SessionKnownActive;
                Err(e)
            }
        }
    }

    async fn verify(&self) -> AttendanceResult<VerificationAttempt> {
        let snapshot = self.store.snapshot().await?;
        let session = snapshot.session;
        let reference = snapshot
            .state
            .reference
            .filter(|_| snapshot.state.active)
            .ok_or(AttendanceError::ReferenceUnavailable)?;

        let own = acquire_within(&self.location, &self.config.acquisition).await?;

        let distance_meters = distance(&reference, &own);
        log::info!(
            "Participant {}: distance to organizer {:.1} meters",
            self.id,
            distance_meters
        );

        // Anything unordered (NaN) fails closed.
        if !matches!(
            distance_meters.partial_cmp(&self.config.max_distance_meters),
            Some(Ordering::Less | Ordering::Equal)
        ) {
            return Err(AttendanceError::TooFar {
                distance_meters,
                max_distance_meters: self.config.max_distance_meters,
            });
        }

        if !self.proximity.check().await? {
            return Err(AttendanceError::SecondaryCheckFailed);
        }

        let record = AttendanceRecord::now(self.id.clone());
        let newly_recorded = match self.store.record_attendee(session, record.clone()).await? {
            AppendOutcome::Appended => true,
            AppendOutcome::AlreadyPresent => false,
            AppendOutcome::SessionChanged => return Err(AttendanceError::SessionChanged),
        };

        Ok(VerificationAttempt {
            participant_id: self.id.clone(),
            participant_coordinate: own,
            reference_coordinate: reference,
            distance_meters,
            secondary_check_passed: true,
            record,
            newly_recorded,
        })
    }
}
