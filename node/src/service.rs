use anyhow::{bail, Context};
use chrono::{DateTime, Local};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rollcall_engine::{
    spawn_snapshot_poller, EngineConfig, FixedLocation, MockLocation, MockLocationConfig,
    Organizer, Participant, ParticipantState, ProximityConfig,
};
use rollcall_primitives::{
    AttendanceRecord, Coordinate, LocationProvider, ParticipantId, ProximityCheck, SessionSnapshot,
    SessionStore, PARTICIPANT_ID_MAX, PARTICIPANT_ID_MIN,
};
use std::collections::BTreeSet;
use rollcall_store::MemoryStore;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::PositionArgs;

pub fn location_from(args: &PositionArgs) -> anyhow::Result<Box<dyn LocationProvider>> {
    let anchor = Coordinate::new(args.lat, args.lon, args.accuracy)?;

    if args.jitter_meters <= 0.0 && args.gps_latency_ms == 0 {
        return Ok(Box::new(FixedLocation::new(anchor)));
    }

    Ok(Box::new(MockLocation::new(MockLocationConfig {
        anchor,
        jitter_meters: args.jitter_meters.max(0.0),
        accuracy_range: (args.accuracy, args.accuracy),
        latency: Duration::from_millis(args.gps_latency_ms),
        seed: args.seed,
    })))
}

pub fn format_roster(records: &[AttendanceRecord]) -> Vec<String> {
    if records.is_empty() {
        return vec!["No participants have checked in yet.".to_string()];
    }
    records
        .iter()
        .map(|r| {
            let at = DateTime::from_timestamp_millis(r.verified_at as i64)
                .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
                .unwrap_or_else(|| r.verified_at.to_string());
            format!("Participant ID: {} (at {})", r.participant_id, at)
        })
        .collect()
}

pub fn log_snapshot(snapshot: &SessionSnapshot) {
    let state = &snapshot.state;
    if !state.active {
        log::info!("No active attendance session (version {})", snapshot.version);
        return;
    }
    match &state.reference {
        Some(reference) => log::info!(
            "Attendance session ACTIVE at {} (version {})",
            reference,
            snapshot.version
        ),
        None => log::info!("Attendance session ACTIVE without reference coordinate"),
    }
    for line in format_roster(&state.attendees) {
        log::info!("  {}", line);
    }
}

/// Resolves when `limit` elapses, never when it is `None`.
async fn deadline(limit: Option<Duration>) {
    match limit {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending().await,
    }
}

/// Start a session, follow the roster until `shutdown` or `limit`, then end
/// the session.
pub async fn run_organizer<L, S, F>(
    location: L,
    store: S,
    engine: EngineConfig,
    limit: Option<Duration>,
    shutdown: F,
) -> anyhow::Result<Vec<AttendanceRecord>>
where
    L: LocationProvider,
    S: SessionStore + Clone + 'static,
    F: Future<Output = ()>,
{
    let mut organizer = Organizer::new(location, store.clone(), engine);
    let reference = organizer
        .start_session()
        .await
        .context("failed to start attendance session")?;
    log::info!("Session active at {}. Waiting for participants.", reference);

    let mut poller = spawn_snapshot_poller(store, engine.organizer_poll_interval);
    let stop = deadline(limit);
    tokio::pin!(stop);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = &mut shutdown => {
                log::info!("Interrupted");
                break;
            }
            changed = poller.changed() => {
                let Some(snapshot) = changed else { break };
                for line in format_roster(&snapshot.state.attendees) {
                    log::info!("  {}", line);
                }
            }
        }
    }
    drop(poller);

    let roster = organizer.roster().await?;
    organizer.end_session().await?;
    log::info!("Session ended with {} participant(s)", roster.len());
    Ok(roster)
}

/// Poll until a session is active, then attempt attendance up to
/// `max_attempts` times, one attempt per poll.
pub async fn run_participant<L, P, S, F>(
    participant: &mut Participant<L, P, S>,
    max_attempts: u32,
    shutdown: F,
) -> anyhow::Result<()>
where
    L: LocationProvider,
    P: ProximityCheck,
    S: SessionStore,
    F: Future<Output = ()>,
{
    let mut ticker = tokio::time::interval(participant.config().participant_poll_interval);
    let mut attempts = 0;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => bail!("interrupted before attendance was verified"),
            _ = ticker.tick() => {}
        }

        if let Err(e) = participant.refresh().await {
            log::warn!("Session poll failed: {}", e);
            continue;
        }
        if participant.state() == ParticipantState::Verified {
            return Ok(());
        }
        if !participant.can_attempt() {
            continue;
        }
        if attempts >= max_attempts {
            bail!(
                "attendance not verified after {} attempt(s) for {}",
                attempts,
                participant.id()
            );
        }

        attempts += 1;
        match participant.attempt_attendance().await {
            Ok(attempt) => {
                log::info!(
                    "Attendance marked for {}: {:.1}m from organizer, proximity OK",
                    attempt.participant_id,
                    attempt.distance_meters
                );
                return Ok(());
            }
            Err(e) if e.is_retryable() => {
                log::warn!("Attempt {}/{} failed: {}", attempts, max_attempts, e);
            }
            Err(e) => log::warn!("Attempt {}/{} rejected: {}", attempts, max_attempts, e),
        }
    }
}

/// Organizer plus `count` participants scattered around it, all sharing one
/// in-memory store.
pub async fn run_demo(
    anchor: Coordinate,
    count: u32,
    spread_meters: f64,
    seed: u64,
    engine: EngineConfig,
    proximity: ProximityConfig,
) -> anyhow::Result<Vec<AttendanceRecord>> {
    let id_space = PARTICIPANT_ID_MAX - PARTICIPANT_ID_MIN + 1;
    if count > id_space {
        bail!("demo supports at most {} participants", id_space);
    }

    let check: Arc<dyn ProximityCheck> = Arc::from(proximity.build()?);

    let store = MemoryStore::new();
    let mut organizer = Organizer::new(FixedLocation::new(anchor), store.clone(), engine);
    organizer.start_session().await?;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut ids = BTreeSet::new();
    while ids.len() < count as usize {
        ids.insert(ParticipantId::random(&mut rng));
    }

    let participants = ids.into_iter().zip(0..count).map(|(id, i)| {
        let location = MockLocation::new(MockLocationConfig {
            anchor,
            jitter_meters: spread_meters,
            seed: seed.wrapping_add(u64::from(i) + 1),
            ..MockLocationConfig::default()
        });
        let mut participant =
            Participant::new(id, location, check.clone(), store.clone(), engine);
        async move {
            participant.refresh().await?;
            participant.attempt_attendance().await
        }
    });

    let outcomes = futures::future::join_all(participants).await;
    let mut recorded = 0;
    for outcome in outcomes {
        match outcome {
            Ok(attempt) if attempt.newly_recorded => recorded += 1,
            Ok(attempt) => log::info!(
                "Demo participant {} already on the roster",
                attempt.participant_id
            ),
            Err(e) => log::info!("Demo participant not verified: {}", e),
        }
    }

    let roster = organizer.roster().await?;
    log::info!("{} of {} participant(s) recorded", recorded, count);
    for line in format_roster(&roster) {
        log::info!("  {}", line);
    }
    organizer.end_session().await?;
    Ok(roster)
}
