use rollcall_primitives::{
    AttendanceRecord, AttendanceResult, Coordinate, LocationProvider, SessionStore,
};

use crate::config::EngineConfig;
use crate::location::acquire_within;

/// State: Idle -> AcquiringLocation -> SessionActive
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum OrganizerState {
    #[default]
    Idle,
    AcquiringLocation,
    SessionActive { reference: Coordinate },
}

impl OrganizerState {
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::SessionActive { .. })
    }
}

/// Organizer role: captures the reference coordinate and owns the session
/// lifecycle in the shared store.
pub struct Organizer<L, S> {
    location: L,
    store: S,
    config: EngineConfig,
    state: OrganizerState,
}

impl<L, S> Organizer<L, S>
where
    L: LocationProvider,
    S: SessionStore,
{
    pub fn new(location: L, store: S, config: EngineConfig) -> Self {
        Self {
            location,
            store,
            config,
            state: OrganizerState::Idle,
        }
    }

    pub fn state(&self) -> OrganizerState {
        self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Capture the organizer's coordinate and publish a fresh session.
    ///
    /// Any session already in the store is overwritten. On failure the
    /// organizer falls back to its previous state and the error is returned
    /// verbatim.
    pub async fn start_session(&mut self) -> AttendanceResult<Coordinate> {
        log::info!("Organizer: starting attendance session...");
        let previous = self.state;
        self.state = OrganizerState::AcquiringLocation;

        let reference = match acquire_within(&self.location, &self.config.acquisition).await {
            Ok(reference) => reference,
            Err(e) => {
                self.state = previous;
                log::warn!("Organizer: error starting session - {}", e);
                return Err(e.into());
            }
        };

        if let Err(e) = self.store.start_session(reference).await {
            self.state = previous;
            log::warn!("Organizer: failed to publish session - {}", e);
            return Err(e.into());
        }

        self.state = OrganizerState::SessionActive { reference };
        log::info!("Organizer: session started, location stored ({})", reference);
        Ok(reference)
    }

    /// Read-only roster poll. Never changes the organizer state.
    pub async fn roster(&self) -> AttendanceResult<Vec<AttendanceRecord>> {
        Ok(self.store.list_attendees().await?)
    }

    /// Logout: clears the shared session regardless of local state.
    pub async fn end_session(&mut self) -> AttendanceResult<()> {
        self.store.end_session().await?;
        self.state = OrganizerState::Idle;
        log::info!("Organizer: logged out, session data cleared");
        Ok(())
    }
}
