//! Saving confirmed batches to a [`CalendarEventStore`].
//!
//! Each event is saved independently and in parallel; there is no
//! transaction and no rollback. Every store call is retried with bounded
//! exponential backoff, which is safe because `save` is an upsert. Whatever
//! still fails after the last attempt is reported in a [`SyncReport`] so the
//! caller can show a standing "sync failed" state and retry manually.

use crate::error::PersistenceError;
use crate::event::CalendarEvent;
use crate::store::CalendarEventStore;
use futures::future::join_all;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Highest exponent used when doubling the backoff.
const MAX_BACKOFF_EXPONENT: u32 = 10;

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 behave as 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each one after.
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        Duration::from_millis(self.base_backoff_ms.saturating_mul(2_u64.saturating_pow(exponent)))
    }
}

/// Run `op` until it succeeds or the policy is exhausted.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T, PersistenceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PersistenceError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts && is_transient(&e) => {
                let delay = policy.delay(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}, retrying in {:?}",
                    what, attempt, attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!("{} failed after {} attempt(s): {}", what, attempt, e);
                return Err(e);
            }
        }
    }
}

/// Bad ids and corrupt data will not fix themselves.
fn is_transient(e: &PersistenceError) -> bool {
    matches!(e, PersistenceError::Io(_))
}

/// Aggregate status of the last sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum SyncState {
    Synced,
    /// Some saves failed after all retries; the rest were kept.
    Failed { failed: usize, total: usize },
}

/// Outcome of [`sync_events`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub state: SyncState,
    /// Ids saved successfully, in input order.
    pub saved: Vec<String>,
    /// `(event id, error)` for every event that could not be saved.
    pub failed: Vec<(String, String)>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.state == SyncState::Synced
    }
}

/// Save every event in parallel, each with its own retries.
pub async fn sync_events(
    store: &dyn CalendarEventStore,
    user_id: &str,
    events: &[CalendarEvent],
    policy: &RetryPolicy,
) -> SyncReport {
    let saves = events.iter().map(|event| async move {
        let what = format!("save '{}'", event.title);
        let result = with_retry(policy, &what, || store.save(user_id, event)).await;
        (event.id.clone(), result)
    });

    let mut saved = Vec::new();
    let mut failed = Vec::new();
    for (id, result) in join_all(saves).await {
        match result {
            Ok(_) => saved.push(id),
            Err(e) => failed.push((id, e.to_string())),
        }
    }

    let state = if failed.is_empty() {
        SyncState::Synced
    } else {
        SyncState::Failed {
            failed: failed.len(),
            total: events.len(),
        }
    };
    let report = SyncReport { state, saved, failed };
    info!(
        "Synced {}/{} events for {}",
        report.saved.len(),
        events.len(),
        user_id
    );
    report
}

/// Delete one event with retries.
pub async fn delete_event(
    store: &dyn CalendarEventStore,
    user_id: &str,
    event_id: &str,
    policy: &RetryPolicy,
) -> Result<bool, PersistenceError> {
    with_retry(policy, &format!("delete {event_id}"), || store.delete(user_id, event_id)).await
}

/// Delete every event of a user with retries.
pub async fn clear_calendar(
    store: &dyn CalendarEventStore,
    user_id: &str,
    policy: &RetryPolicy,
) -> Result<usize, PersistenceError> {
    let removed = with_retry(policy, "clear calendar", || store.delete_all(user_id)).await?;
    info!("Cleared {} events for {}", removed, user_id);
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use crate::store::{InMemoryEventStore, StoredEvent};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Fails the first `failures[title]` saves of each titled event.
    struct FlakyStore {
        inner: InMemoryEventStore,
        failures: Mutex<HashMap<String, u32>>,
    }

    impl FlakyStore {
        fn new(failures: &[(&str, u32)]) -> Self {
            Self {
                inner: InMemoryEventStore::new(),
                failures: Mutex::new(failures.iter().map(|(t, n)| (t.to_string(), *n)).collect()),
            }
        }
    }

    #[async_trait]
    impl CalendarEventStore for FlakyStore {
        async fn save(&self, user_id: &str, event: &CalendarEvent) -> Result<StoredEvent, PersistenceError> {
            let should_fail = {
                let mut failures = self.failures.lock().unwrap();
                match failures.get_mut(&event.title) {
                    Some(n) if *n > 0 => {
                        *n -= 1;
                        true
                    }
                    _ => false,
                }
            };
            if should_fail {
                return Err(PersistenceError::Io("connection reset".into()));
            }
            self.inner.save(user_id, event).await
        }

        async fn list(&self, user_id: &str) -> Result<Vec<StoredEvent>, PersistenceError> {
            self.inner.list(user_id).await
        }

        async fn delete(&self, user_id: &str, event_id: &str) -> Result<bool, PersistenceError> {
            self.inner.delete(user_id, event_id).await
        }

        async fn delete_all(&self, user_id: &str) -> Result<usize, PersistenceError> {
            self.inner.delete_all(user_id).await
        }
    }

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_backoff_ms: 1,
        }
    }

    fn events(titles: &[&str]) -> Vec<CalendarEvent> {
        titles
            .iter()
            .map(|t| CalendarEvent::new(*t, EventType::Assignment))
            .collect()
    }

    #[test]
    fn backoff_doubles() {
        let p = RetryPolicy {
            max_attempts: 5,
            base_backoff_ms: 100,
        };
        assert_eq!(p.delay(1), Duration::from_millis(100));
        assert_eq!(p.delay(2), Duration::from_millis(200));
        assert_eq!(p.delay(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn transient_failures_are_retried() {
        let store = FlakyStore::new(&[("HW1", 2)]);
        let batch = events(&["HW1", "HW2"]);
        let report = sync_events(&store, "alice", &batch, &fast()).await;

        assert!(report.is_success());
        assert_eq!(report.saved, vec![batch[0].id.clone(), batch[1].id.clone()]);
        assert_eq!(store.list("alice").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn partial_failure_is_aggregated() {
        let store = FlakyStore::new(&[("HW2", 10)]);
        let batch = events(&["HW1", "HW2", "HW3"]);
        let report = sync_events(&store, "alice", &batch, &fast()).await;

        assert_eq!(report.state, SyncState::Failed { failed: 1, total: 3 });
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, batch[1].id);
        assert!(report.failed[0].1.contains("connection reset"));
        // Saved events stay saved.
        assert_eq!(store.list("alice").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn manual_retry_after_failure_is_idempotent() {
        let store = FlakyStore::new(&[("HW1", 3)]);
        let batch = events(&["HW1", "HW2"]);
        let first = sync_events(&store, "alice", &batch, &fast()).await;
        assert!(!first.is_success());

        let second = sync_events(&store, "alice", &batch, &fast()).await;
        assert!(second.is_success());
        assert_eq!(store.list("alice").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_batch_is_synced() {
        let store = InMemoryEventStore::new();
        let report = sync_events(&store, "alice", &[], &fast()).await;
        assert_eq!(report.state, SyncState::Synced);
    }

    #[tokio::test]
    async fn clear_and_delete() {
        let store = InMemoryEventStore::new();
        let batch = events(&["A", "B", "C"]);
        sync_events(&store, "alice", &batch, &fast()).await;

        assert!(delete_event(&store, "alice", &batch[0].id, &fast()).await.unwrap());
        assert_eq!(clear_calendar(&store, "alice", &fast()).await.unwrap(), 2);
        assert!(store.list("alice").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_user_is_not_retried_forever() {
        let store = InMemoryEventStore::new();
        let err = clear_calendar(&store, "", &fast()).await.unwrap_err();
        assert!(matches!(err, PersistenceError::InvalidUserId(_)));
    }

    #[test]
    fn sync_state_serialises_with_tag() {
        let json = serde_json::to_value(SyncState::Failed { failed: 1, total: 4 }).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["total"], 4);

        let json = serde_json::to_value(SyncState::Synced).unwrap();
        assert_eq!(json, serde_json::json!({ "state": "synced" }));
    }
}
