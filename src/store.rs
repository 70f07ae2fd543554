//! Persistence of confirmed events, keyed by `(user_id, event_id)`.
//!
//! [`CalendarEventStore`] is the seam the rest of the crate talks to. Two
//! implementations ship with the crate:
//!
//! * [`InMemoryEventStore`] for tests and embedding.
//! * [`JsonFileStore`], one JSON document per user under a directory,
//!   rewritten atomically (temp file + rename) on every change.
//!
//! `save` is an upsert: re-saving the same id replaces the record and keeps
//! its original `created_at`, which is what makes retried saves safe.

use crate::error::PersistenceError;
use crate::event::CalendarEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// An event as persisted, with server-assigned timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredEvent {
    pub user_id: String,
    #[serde(flatten)]
    pub event: CalendarEvent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Per-user event storage.
#[async_trait]
pub trait CalendarEventStore: Send + Sync {
    /// Insert or replace an event.
    async fn save(&self, user_id: &str, event: &CalendarEvent) -> Result<StoredEvent, PersistenceError>;

    /// All events of a user, in insertion order.
    async fn list(&self, user_id: &str) -> Result<Vec<StoredEvent>, PersistenceError>;

    /// Remove one event. Returns whether it existed; deleting a missing id
    /// is not an error.
    async fn delete(&self, user_id: &str, event_id: &str) -> Result<bool, PersistenceError>;

    /// Remove every event of a user. Returns how many were removed.
    async fn delete_all(&self, user_id: &str) -> Result<usize, PersistenceError>;
}

/// Reject ids that could escape the store directory or collide after
/// sanitising.
pub fn validate_user_id(user_id: &str) -> Result<(), PersistenceError> {
    let ok = !user_id.is_empty()
        && user_id.len() <= 128
        && !user_id.starts_with('.')
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'));
    if ok {
        Ok(())
    } else {
        Err(PersistenceError::InvalidUserId(user_id.to_string()))
    }
}

fn upsert(records: &mut Vec<StoredEvent>, user_id: &str, event: &CalendarEvent) -> StoredEvent {
    let now = Utc::now();
    match records.iter_mut().find(|r| r.event.id == event.id) {
        Some(existing) => {
            existing.event = event.clone();
            existing.updated_at = now;
            existing.clone()
        }
        None => {
            let record = StoredEvent {
                user_id: user_id.to_string(),
                event: event.clone(),
                created_at: now,
                updated_at: now,
            };
            records.push(record.clone());
            record
        }
    }
}

fn remove(records: &mut Vec<StoredEvent>, event_id: &str) -> bool {
    let before = records.len();
    records.retain(|r| r.event.id != event_id);
    records.len() != before
}

// ── In-memory ────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct InMemoryEventStore {
    users: Mutex<HashMap<String, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CalendarEventStore for InMemoryEventStore {
    async fn save(&self, user_id: &str, event: &CalendarEvent) -> Result<StoredEvent, PersistenceError> {
        validate_user_id(user_id)?;
        let mut users = self.users.lock().await;
        Ok(upsert(users.entry(user_id.to_string()).or_default(), user_id, event))
    }

    async fn list(&self, user_id: &str) -> Result<Vec<StoredEvent>, PersistenceError> {
        validate_user_id(user_id)?;
        Ok(self.users.lock().await.get(user_id).cloned().unwrap_or_default())
    }

    async fn delete(&self, user_id: &str, event_id: &str) -> Result<bool, PersistenceError> {
        validate_user_id(user_id)?;
        Ok(self
            .users
            .lock()
            .await
            .get_mut(user_id)
            .map(|records| remove(records, event_id))
            .unwrap_or(false))
    }

    async fn delete_all(&self, user_id: &str) -> Result<usize, PersistenceError> {
        validate_user_id(user_id)?;
        Ok(self.users.lock().await.remove(user_id).map(|r| r.len()).unwrap_or(0))
    }
}

// ── JSON files ───────────────────────────────────────────────────────────

/// Stores each user's events as `<dir>/<user_id>.json`.
///
/// All operations hold one lock, so concurrent saves from a parallel sync
/// never lose each other's writes within a process.
pub struct JsonFileStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn user_file(&self, user_id: &str) -> Result<PathBuf, PersistenceError> {
        validate_user_id(user_id)?;
        Ok(self.dir.join(format!("{user_id}.json")))
    }

    async fn load(path: &Path) -> Result<Vec<StoredEvent>, PersistenceError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, path: &Path, records: &[StoredEvent]) -> Result<(), PersistenceError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_vec_pretty(records)?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, path).await?;
        debug!("Wrote {} events → {}", records.len(), path.display());
        Ok(())
    }
}

#[async_trait]
impl CalendarEventStore for JsonFileStore {
    async fn save(&self, user_id: &str, event: &CalendarEvent) -> Result<StoredEvent, PersistenceError> {
        let path = self.user_file(user_id)?;
        let _guard = self.lock.lock().await;
        let mut records = Self::load(&path).await?;
        let stored = upsert(&mut records, user_id, event);
        self.persist(&path, &records).await?;
        Ok(stored)
    }

    async fn list(&self, user_id: &str) -> Result<Vec<StoredEvent>, PersistenceError> {
        let path = self.user_file(user_id)?;
        let _guard = self.lock.lock().await;
        Self::load(&path).await
    }

    async fn delete(&self, user_id: &str, event_id: &str) -> Result<bool, PersistenceError> {
        let path = self.user_file(user_id)?;
        let _guard = self.lock.lock().await;
        let mut records = Self::load(&path).await?;
        let removed = remove(&mut records, event_id);
        if removed {
            self.persist(&path, &records).await?;
        }
        Ok(removed)
    }

    async fn delete_all(&self, user_id: &str) -> Result<usize, PersistenceError> {
        let path = self.user_file(user_id)?;
        let _guard = self.lock.lock().await;
        let count = Self::load(&path).await?.len();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(count),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}
