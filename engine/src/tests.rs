use crate::{
    EngineConfig, FixedLocation, FixedProximityCheck, Organizer, OrganizerState, Participant,
    ParticipantState,
};
use async_trait::async_trait;
use rollcall_primitives::{
    AcquisitionOptions, AttendanceError, Coordinate, LocationError, LocationProvider,
    ParticipantId, SessionStore,
};
use rollcall_store::MemoryStore;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

const ORGANIZER: Coordinate = Coordinate::exact(40.0, -75.0);
const NEARBY: Coordinate = Coordinate::exact(40.0, -75.0003);
const FAR: Coordinate = Coordinate::exact(40.001, -75.0);

fn sid(id: &str) -> ParticipantId {
    ParticipantId::new(id).unwrap()
}

/// Point `meters` due north of `origin`.
fn north_of(origin: Coordinate, meters: f64) -> Coordinate {
    let d_lat = (meters / rollcall_primitives::EARTH_RADIUS_METERS).to_degrees();
    Coordinate::exact(origin.latitude + d_lat, origin.longitude)
}

/// Never resolves; only the engine's timeout ends the acquisition.
struct StalledLocation;

#[async_trait]
impl LocationProvider for StalledLocation {
    async fn acquire(&self, _options: &AcquisitionOptions) -> Result<Coordinate, LocationError> {
        std::future::pending().await
    }
}

/// Counts acquisitions so tests can assert none happened.
struct CountingLocation {
    inner: FixedLocation,
    calls: AtomicU32,
}

#[async_trait]
impl LocationProvider for CountingLocation {
    async fn acquire(&self, options: &AcquisitionOptions) -> Result<Coordinate, LocationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.acquire(options).await
    }
}

async fn started_store() -> MemoryStore {
    let store = MemoryStore::new();
    let mut organizer = Organizer::new(
        FixedLocation::new(ORGANIZER),
        store.clone(),
        EngineConfig::default(),
    );
    organizer.start_session().await.unwrap();
    store
}

async fn participant_at(
    store: &MemoryStore,
    id: &str,
    at: Coordinate,
    check: Arc<FixedProximityCheck>,
) -> Participant<FixedLocation, Arc<FixedProximityCheck>, MemoryStore> {
    let mut p = Participant::new(
        sid(id),
        FixedLocation::new(at),
        check,
        store.clone(),
        EngineConfig::default(),
    );
    p.refresh().await.unwrap();
    p
}

// =============================================================================
// Organizer
// =============================================================================

#[tokio::test]
async fn organizer_start_publishes_reference() {
    let store = MemoryStore::new();
    let mut organizer = Organizer::new(
        FixedLocation::new(ORGANIZER),
        store.clone(),
        EngineConfig::default(),
    );
    assert_eq!(organizer.state(), OrganizerState::Idle);

    let reference = organizer.start_session().await.unwrap();
    assert_eq!(reference, ORGANIZER);
    assert_eq!(
        organizer.state(),
        OrganizerState::SessionActive {
            reference: ORGANIZER
        }
    );
    assert!(store.is_active().await.unwrap());
    assert_eq!(store.reference_coordinate().await.unwrap(), Some(ORGANIZER));
    assert!(organizer.roster().await.unwrap().is_empty());
}

#[tokio::test]
async fn organizer_failure_returns_to_idle() {
    let store = MemoryStore::new();
    let mut organizer = Organizer::new(
        FixedLocation::failing(LocationError::PermissionDenied),
        store.clone(),
        EngineConfig::default(),
    );

    let err = organizer.start_session().await.unwrap_err();
    assert_eq!(err.location_kind(), Some(LocationError::PermissionDenied));
    assert_eq!(organizer.state(), OrganizerState::Idle);
    assert!(!store.is_active().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn organizer_acquisition_times_out() {
    let store = MemoryStore::new();
    let config = EngineConfig::default().with_acquisition_timeout(Duration::from_secs(15));
    let mut organizer = Organizer::new(StalledLocation, store.clone(), config);

    let started = tokio::time::Instant::now();
    let err = organizer.start_session().await.unwrap_err();
    assert_eq!(err.location_kind(), Some(LocationError::Timeout));
    assert!(started.elapsed() >= Duration::from_secs(15));
    assert_eq!(organizer.state(), OrganizerState::Idle);
}

#[tokio::test]
async fn organizer_end_clears_store() {
    let store = MemoryStore::new();
    let mut organizer = Organizer::new(
        FixedLocation::new(ORGANIZER),
        store.clone(),
        EngineConfig::default(),
    );
    organizer.start_session().await.unwrap();
    organizer.end_session().await.unwrap();

    assert_eq!(organizer.state(), OrganizerState::Idle);
    assert!(!store.is_active().await.unwrap());
    assert!(store.reference_coordinate().await.unwrap().is_none());
}

// =============================================================================
// Participant
// =============================================================================

#[tokio::test]
async fn participant_sees_inactive_before_start() {
    let store = MemoryStore::new();
    let check = Arc::new(FixedProximityCheck::new(true));
    let mut p = participant_at(&store, "SID-1000", NEARBY, check.clone()).await;

    assert_eq!(p.state(), ParticipantState::SessionKnownInactive);
    assert!(!p.can_attempt());
    assert!(matches!(
        p.attempt_attendance().await,
        Err(AttendanceError::SessionNotActive)
    ));
    assert_eq!(check.calls(), 0);
}

#[tokio::test]
async fn fifty_one_meters_is_too_far_without_secondary_check() {
    let store = started_store().await;
    let check = Arc::new(FixedProximityCheck::new(true));
    let mut p = participant_at(&store, "SID-1001", north_of(ORGANIZER, 51.0), check.clone()).await;

    let err = p.attempt_attendance().await.unwrap_err();
    let d = err.distance_meters().unwrap();
    assert!(matches!(err, AttendanceError::TooFar { .. }));
    assert!(d > 50.0 && d < 52.0, "got {d}");
    assert_eq!(check.calls(), 0);
    assert_eq!(p.state(), ParticipantState::SessionKnownActive);
    assert!(store.list_attendees().await.unwrap().is_empty());
}

#[tokio::test]
async fn ten_meters_with_passing_check_verifies_once() {
    let store = started_store().await;
    let check = Arc::new(FixedProximityCheck::new(true));
    let mut p = participant_at(&store, "SID-1002", north_of(ORGANIZER, 10.0), check.clone()).await;

    let attempt = p.attempt_attendance().await.unwrap();
    assert!(attempt.secondary_check_passed);
    assert!(attempt.newly_recorded);
    assert!((attempt.distance_meters - 10.0).abs() < 0.01);
    assert_eq!(p.state(), ParticipantState::Verified);

    let roster = store.list_attendees().await.unwrap();
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].participant_id, sid("SID-1002"));

    // Re-invocation is a no-op: no second check, no second record.
    let again = p.attempt_attendance().await.unwrap();
    assert_eq!(again, attempt);
    assert_eq!(check.calls(), 1);
    assert_eq!(store.list_attendees().await.unwrap().len(), 1);
}

#[tokio::test]
async fn scenario_nearby_forced_true_verifies() {
    let store = started_store().await;
    let check = Arc::new(FixedProximityCheck::new(true));
    let mut p = participant_at(&store, "SID-2000", NEARBY, check).await;

    let attempt = p.attempt_attendance().await.unwrap();
    assert!(attempt.distance_meters > 25.0 && attempt.distance_meters < 26.0);
    assert_eq!(attempt.reference_coordinate, ORGANIZER);
    assert_eq!(attempt.participant_coordinate, NEARBY);
}

#[tokio::test]
async fn scenario_nearby_forced_false_fails_secondary() {
    let store = started_store().await;
    let check = Arc::new(FixedProximityCheck::new(false));
    let mut p = participant_at(&store, "SID-2001", NEARBY, check.clone()).await;

    assert!(matches!(
        p.attempt_attendance().await,
        Err(AttendanceError::SecondaryCheckFailed)
    ));
    assert_eq!(check.calls(), 1);
    assert_eq!(p.state(), ParticipantState::SessionKnownActive);
    assert!(store.list_attendees().await.unwrap().is_empty());
}

#[tokio::test]
async fn scenario_far_is_too_far_regardless_of_check() {
    for outcome in [true, false] {
        let store = started_store().await;
        let check = Arc::new(FixedProximityCheck::new(outcome));
        let mut p = participant_at(&store, "SID-2002", FAR, check.clone()).await;

        let err = p.attempt_attendance().await.unwrap_err();
        let d = err.distance_meters().unwrap();
        assert!(d > 111.0 && d < 112.0, "got {d}");
        assert_eq!(check.calls(), 0);
    }
}

#[tokio::test]
async fn missing_reference_fails_before_acquisition() {
    let store = MemoryStore::new();
    // Active flag without a reference is only reachable through a store
    // written by something else; model it directly on the handle.
    store.handle().write().await.state.active = true;

    let location = Arc::new(CountingLocation {
        inner: FixedLocation::new(NEARBY),
        calls: AtomicU32::new(0),
    });
    let mut p = Participant::new(
        sid("SID-3000"),
        location.clone(),
        FixedProximityCheck::new(true),
        store.clone(),
        EngineConfig::default(),
    );
    p.refresh().await.unwrap();

    assert!(matches!(
        p.attempt_attendance().await,
        Err(AttendanceError::ReferenceUnavailable)
    ));
    assert_eq!(location.calls.load(Ordering::SeqCst), 0);
    assert_eq!(p.state(), ParticipantState::SessionKnownActive);
}

#[tokio::test]
async fn location_failure_propagates_unchanged() {
    let store = started_store().await;
    for kind in [
        LocationError::PermissionDenied,
        LocationError::Unavailable,
        LocationError::Timeout,
        LocationError::Unknown,
    ] {
        let check = FixedProximityCheck::new(true);
        let mut p = Participant::new(
            sid("SID-3001"),
            FixedLocation::failing(kind),
            check,
            store.clone(),
            EngineConfig::default(),
        );
        p.refresh().await.unwrap();

        let err = p.attempt_attendance().await.unwrap_err();
        assert_eq!(err.location_kind(), Some(kind));
        assert_eq!(p.state(), ParticipantState::SessionKnownActive);
    }
}

#[tokio::test(start_paused = true)]
async fn participant_acquisition_times_out() {
    let store = started_store().await;
    let mut p = Participant::new(
        sid("SID-3002"),
        StalledLocation,
        FixedProximityCheck::new(true),
        store.clone(),
        EngineConfig::default(),
    );
    p.refresh().await.unwrap();

    let err = p.attempt_attendance().await.unwrap_err();
    assert_eq!(err.location_kind(), Some(LocationError::Timeout));
}

#[tokio::test]
async fn custom_threshold_applies() {
    let store = started_store().await;
    let mut p = Participant::new(
        sid("SID-3003"),
        FixedLocation::new(FAR),
        FixedProximityCheck::new(true),
        store.clone(),
        EngineConfig::default().with_max_distance(150.0).unwrap(),
    );
    p.refresh().await.unwrap();
    assert!(p.attempt_attendance().await.is_ok());
}

#[tokio::test]
async fn session_end_resets_verified_participant() {
    let store = MemoryStore::new();
    let mut organizer = Organizer::new(
        FixedLocation::new(ORGANIZER),
        store.clone(),
        EngineConfig::default(),
    );
    organizer.start_session().await.unwrap();

    let check = Arc::new(FixedProximityCheck::new(true));
    let mut p = participant_at(&store, "SID-4000", NEARBY, check.clone()).await;
    p.attempt_attendance().await.unwrap();

    // Still verified while the roster holds the record.
    assert_eq!(p.refresh().await.unwrap(), ParticipantState::Verified);

    organizer.end_session().await.unwrap();
    assert_eq!(
        p.refresh().await.unwrap(),
        ParticipantState::SessionKnownInactive
    );
    assert!(p.verification().is_none());

    // A new session without this participant re-enables the action.
    organizer.start_session().await.unwrap();
    assert_eq!(
        p.refresh().await.unwrap(),
        ParticipantState::SessionKnownActive
    );
    p.attempt_attendance().await.unwrap();
    assert_eq!(check.calls(), 2);
}

#[tokio::test]
async fn stale_active_view_fails_at_reference_read() {
    let store = started_store().await;
    let check = Arc::new(FixedProximityCheck::new(true));
    let mut p = participant_at(&store, "SID-4001", NEARBY, check.clone()).await;
    assert!(p.can_attempt());

    // Organizer ends between two participant polls.
    store.end_session().await.unwrap();
    assert!(matches!(
        p.attempt_attendance().await,
        Err(AttendanceError::ReferenceUnavailable)
    ));
    assert_eq!(check.calls(), 0);
}

#[tokio::test]
async fn many_participants_each_recorded_once() {
    let store = started_store().await;
    let check = Arc::new(FixedProximityCheck::new(true));

    for i in 0..10 {
        let id = format!("SID-{}", 5000 + i);
        let mut p = participant_at(&store, &id, NEARBY, check.clone()).await;
        p.attempt_attendance().await.unwrap();
        p.attempt_attendance().await.unwrap();
    }

    let roster = store.list_attendees().await.unwrap();
    assert_eq!(roster.len(), 10);
    assert_eq!(check.calls(), 10);
}

// =============================================================================
// Session changes during verification
// =============================================================================

#[tokio::test(start_paused = true)]
async fn session_ended_during_secondary_check_is_not_recorded() {
    let store = started_store().await;
    let check = Arc::new(FixedProximityCheck::new(true).with_latency(Duration::from_millis(1500)));
    let mut p = participant_at(&store, "SID-9001", NEARBY, check.clone()).await;

    let organizer = async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        store.end_session().await.unwrap();
    };
    let (result, ()) = tokio::join!(p.attempt_attendance(), organizer);

    assert!(matches!(result, Err(AttendanceError::SessionChanged)));
    assert_eq!(check.calls(), 1);
    let snapshot = store.snapshot().await.unwrap();
    assert!(!snapshot.state.active);
    assert!(snapshot.state.reference.is_none());
    assert!(snapshot.state.attendees.is_empty());
    assert_eq!(p.state(), ParticipantState::SessionKnownActive);
}

#[tokio::test(start_paused = true)]
async fn session_restarted_during_secondary_check_is_not_recorded() {
    let store = started_store().await;
    let check = Arc::new(FixedProximityCheck::new(true).with_latency(Duration::from_millis(1500)));
    let mut p = participant_at(&store, "SID-9001", NEARBY, check).await;

    let moved = Coordinate::exact(10.0, 10.0);
    let organizer = async {
        tokio::time::sleep(Duration::from_millis(500)).await;
        store.start_session(moved).await.unwrap();
    };
    let (result, ()) = tokio::join!(p.attempt_attendance(), organizer);

    assert!(matches!(result, Err(AttendanceError::SessionChanged)));
    assert_eq!(store.reference_coordinate().await.unwrap(), Some(moved));
    assert!(store.list_attendees().await.unwrap().is_empty());

    // The next poll sees the new session; the far participant is then
    // judged against the new reference.
    p.refresh().await.unwrap();
    let err = p.attempt_attendance().await.unwrap_err();
    assert!(err.distance_meters().unwrap() > 1_000_000.0);
}

#[tokio::test]
async fn unordered_distance_fails_closed() {
    let store = started_store().await;
    let check = Arc::new(FixedProximityCheck::new(true));
    let mut config = EngineConfig::default();
    config.max_distance_meters = f64::NAN;
    let mut p = Participant::new(
        sid("SID-9002"),
        FixedLocation::new(Coordinate::exact(10.0, 10.0)),
        check.clone(),
        store.clone(),
        config,
    );
    p.refresh().await.unwrap();

    assert!(matches!(
        p.attempt_attendance().await,
        Err(AttendanceError::TooFar { .. })
    ));
    assert_eq!(check.calls(), 0);
    assert!(store.list_attendees().await.unwrap().is_empty());
}
