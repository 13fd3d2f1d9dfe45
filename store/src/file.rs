use async_trait::async_trait;
use rollcall_primitives::{
    AppendOutcome, AttendanceRecord, Coordinate, SessionSnapshot, SessionState, SessionStore, StoreError,
    StoreResult,
};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);
const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// On-disk layout: one key per logical piece of shared state.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    version: u64,
    #[serde(default)]
    session: u64,
    #[serde(rename = "professor_gps_location", default)]
    reference: Option<Coordinate>,
    #[serde(rename = "attendance_session_active", default)]
    active: bool,
    #[serde(rename = "attended_students_data", default)]
    attendees: Vec<AttendanceRecord>,
}

impl From<Document> for SessionSnapshot {
    fn from(doc: Document) -> Self {
        Self {
            version: doc.version,
            session: doc.session,
            state: SessionState {
                reference: doc.reference,
                active: doc.active,
                attendees: doc.attendees,
            },
        }
    }
}

impl From<&SessionSnapshot> for Document {
    fn from(snapshot: &SessionSnapshot) -> Self {
        Self {
            version: snapshot.version,
            session: snapshot.session,
            reference: snapshot.state.reference,
            active: snapshot.state.active,
            attendees: snapshot.state.attendees.clone(),
        }
    }
}

/// JSON document shared between processes.
///
/// Mutations take an in-process mutex, then an exclusive `<path>.lock` file,
/// then read-modify-write the document and publish it with an atomic rename.
/// Readers never take the lock and always see a whole document.
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
    tmp_path: PathBuf,
    lock_timeout: Duration,
    local: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = sibling(&path, ".lock");
        let tmp_path = sibling(&path, ".tmp");
        Self {
            path,
            lock_path,
            tmp_path,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            local: Mutex::new(()),
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> StoreResult<SessionSnapshot> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(SessionSnapshot::default()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        if content.trim().is_empty() {
            return Ok(SessionSnapshot::default());
        }

        serde_json::from_str::<Document>(&content)
            .map(SessionSnapshot::from)
            .map_err(|source| StoreError::Serialization {
                path: self.path.clone(),
                source,
            })
    }

    async fn write(&self, snapshot: &SessionSnapshot) -> StoreResult<()> {
        let body = serde_json::to_vec_pretty(&Document::from(snapshot)).map_err(|source| {
            StoreError::Serialization {
                path: self.path.clone(),
                source,
            }
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| self.io_error(source))?;
        }

        tokio::fs::write(&self.tmp_path, body)
            .await
            .map_err(|source| self.io_error(source))?;
        tokio::fs::rename(&self.tmp_path, &self.path)
            .await
            .map_err(|source| self.io_error(source))
    }

    /// Serialized read-modify-write. The document is only rewritten when the
    /// closure changed the version.
    async fn mutate<R>(&self, f: impl FnOnce(&mut SessionSnapshot) -> R) -> StoreResult<R> {
        let _local = self.local.lock().await;
        let _lock = LockFile::acquire(&self.lock_path, self.lock_timeout).await?;

        let mut snapshot = self.read().await?;
        let before = snapshot.version;
        let out = f(&mut snapshot);
        if snapshot.version != before {
            self.write(&snapshot).await?;
        }
        Ok(out)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl SessionStore for FileStore {
    async fn start_session(&self, reference: Coordinate) -> StoreResult<()> {
        let version = self
            .mutate(|snap| {
                snap.start(reference);
                snap.version
            })
            .await?;
        log::debug!("Session written to {:?} at version {}", self.path, version);
        Ok(())
    }

    async fn end_session(&self) -> StoreResult<()> {
        self.mutate(|snap| snap.end()).await?;
        log::debug!("Session data cleared in {:?}", self.path);
        Ok(())
    }

    async fn snapshot(&self) -> StoreResult<SessionSnapshot> {
        self.read().await
    }

    async fn record_attendee(
        &self,
        session: u64,
        record: AttendanceRecord,
    ) -> StoreResult<AppendOutcome> {
        let id = record.participant_id.clone();
        let outcome = self.mutate(|snap| snap.record(session, record)).await?;
        match outcome {
            AppendOutcome::Appended => {
                log::debug!("{} added to attendance list in {:?}", id, self.path)
            }
            AppendOutcome::SessionChanged => {
                log::debug!("{} not recorded: session {} is gone", id, session)
            }
            AppendOutcome::AlreadyPresent => {}
        }
        Ok(outcome)
    }
}

/// Exclusive cross-process lock; released on drop.
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    async fn acquire(path: &Path, timeout: Duration) -> StoreResult<Self> {
        let deadline = Instant::now() + timeout;
        loop {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(path)
                .await
            {
                Ok(_) => {
                    return Ok(Self {
                        path: path.to_path_buf(),
                    })
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        log::warn!("Store lock {:?} held past {:?}", path, timeout);
                        return Err(StoreError::LockTimeout {
                            path: path.to_path_buf(),
                        });
                    }
                    tokio::time::sleep(LOCK_RETRY_INTERVAL).await;
                }
                Err(source) => {
                    return Err(StoreError::Io {
                        path: path.to_path_buf(),
                        source,
                    })
                }
            }
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            log::warn!("Failed to release store lock {:?}: {}", self.path, e);
        }
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
