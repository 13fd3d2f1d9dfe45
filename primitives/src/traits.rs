//! Capability traits consumed by the attendance engine.

use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::{LocationError, ProximityError, StoreResult};
use crate::types::{
    AcquisitionOptions, AppendOutcome, AttendanceRecord, Coordinate, SessionSnapshot,
};

/// Platform location capability.
///
/// May suspend up to `options.timeout`. Implementations report one of the four
/// [`LocationError`] kinds; callers do not retry.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn acquire(&self, options: &AcquisitionOptions) -> Result<Coordinate, LocationError>;
}

/// Secondary short-range presence signal.
#[async_trait]
pub trait ProximityCheck: Send + Sync {
    async fn check(&self) -> Result<bool, ProximityError>;
}

/// Shared session state visible to the organizer and every participant.
///
/// Mutations are serialized by the implementation: two concurrent
/// `record_attendee` calls never lose either record and never duplicate an id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Overwrites any prior session.
    async fn start_session(&self, reference: Coordinate) -> StoreResult<()>;

    async fn end_session(&self) -> StoreResult<()>;

    async fn snapshot(&self) -> StoreResult<SessionSnapshot>;

    /// Compare-and-append: the record lands only while `session` (the
    /// [`SessionSnapshot::session`] the caller read its reference from) is
    /// still active.
    async fn record_attendee(
        &self,
        session: u64,
        record: AttendanceRecord,
    ) -> StoreResult<AppendOutcome>;

    async fn is_active(&self) -> StoreResult<bool> {
        Ok(self.snapshot().await?.state.active)
    }

    async fn reference_coordinate(&self) -> StoreResult<Option<Coordinate>> {
        Ok(self.snapshot().await?.state.reference)
    }

    async fn list_attendees(&self) -> StoreResult<Vec<AttendanceRecord>> {
        Ok(self.snapshot().await?.state.attendees)
    }
}

#[async_trait]
impl<T: LocationProvider + ?Sized> LocationProvider for Arc<T> {
    async fn acquire(&self, options: &AcquisitionOptions) -> Result<Coordinate, LocationError> {
        (**self).acquire(options).await
    }
}

#[async_trait]
impl<T: ProximityCheck + ?Sized> ProximityCheck for Arc<T> {
    async fn check(&self) -> Result<bool, ProximityError> {
        (**self).check().await
    }
}

#[async_trait]
impl<T: LocationProvider + ?Sized> LocationProvider for Box<T> {
    async fn acquire(&self, options: &AcquisitionOptions) -> Result<Coordinate, LocationError> {
        (**self).acquire(options).await
    }
}

#[async_trait]
impl<T: ProximityCheck + ?Sized> ProximityCheck for Box<T> {
    async fn check(&self) -> Result<bool, ProximityError> {
        (**self).check().await
    }
}

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn start_session(&self, reference: Coordinate) -> StoreResult<()> {
        (**self).start_session(reference).await
    }

    async fn end_session(&self) -> StoreResult<()> {
        (**self).end_session().await
    }

    async fn snapshot(&self) -> StoreResult<SessionSnapshot> {
        (**self).snapshot().await
    }

    async fn record_attendee(
        &self,
        session: u64,
        record: AttendanceRecord,
    ) -> StoreResult<AppendOutcome> {
        (**self).record_attendee(session, record).await
    }

    async fn is_active(&self) -> StoreResult<bool> {
        (**self).is_active().await
    }

    async fn reference_coordinate(&self) -> StoreResult<Option<Coordinate>> {
        (**self).reference_coordinate().await
    }

    async fn list_attendees(&self) -> StoreResult<Vec<AttendanceRecord>> {
        (**self).list_attendees().await
    }
}
