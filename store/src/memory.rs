use async_trait::async_trait;
use rollcall_primitives::{
    AppendOutcome, AttendanceRecord, Coordinate, SessionSnapshot, SessionStore, StoreResult,
};
use std::sync::Arc;
use tokio::sync::RwLock;

pub type SessionHandle = Arc<RwLock<SessionSnapshot>>;

/// Process-local store. Every mutation holds the write lock for its whole
/// read-modify-write.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: SessionHandle,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> SessionHandle {
        self.inner.clone()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn start_session(&self, reference: Coordinate) -> StoreResult<()> {
        let mut guard = self.inner.write().await;
        guard.start(reference);
        log::debug!("Session started at version {}", guard.version);
        Ok(())
    }

    async fn end_session(&self) -> StoreResult<()> {
        let mut guard = self.inner.write().await;
        guard.end();
        log::debug!("Session ended at version {}", guard.version);
        Ok(())
    }

    async fn snapshot(&self) -> StoreResult<SessionSnapshot> {
        Ok(self.inner.read().await.clone())
    }

    async fn record_attendee(
        &self,
        session: u64,
        record: AttendanceRecord,
    ) -> StoreResult<AppendOutcome> {
        let mut guard = self.inner.write().await;
        let id = record.participant_id.clone();
        let outcome = guard.record(session, record);
        match outcome {
            AppendOutcome::Appended => log::debug!("{} added to attendance list", id),
            AppendOutcome::SessionChanged => {
                log::debug!("{} not recorded: session {} is gone", id, session)
            }
            AppendOutcome::AlreadyPresent => {}
        }
        Ok(outcome)
    }
}
