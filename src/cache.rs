//! Read-through snapshot cache
//!
//! Holds a short-lived copy of the full dataset for views that redraw from
//! it (calendar, today feed, admin tables). Every mutation goes to the store
//! first; the copy is then dropped and re-read, so a successful write is
//! always visible to the next read through this cache.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::TrackerError;
use crate::model::{RawSnapshot, Snapshot, UserCheckins};
use crate::report::{today_feed, FeedEntry};
use crate::session::LoginOutcome;
use crate::store::CheckinStore;

pub struct SnapshotCache {
    store: Arc<dyn CheckinStore>,
    cached: Mutex<Option<Snapshot>>,
}

impl SnapshotCache {
    pub fn new(store: Arc<dyn CheckinStore>) -> Self {
        Self {
            store,
            cached: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &Arc<dyn CheckinStore> {
        &self.store
    }

    /// Cached snapshot, fetched from the store on a miss
    pub async fn snapshot(&self) -> Result<Snapshot, TrackerError> {
        let mut cached = self.cached.lock().await;
        if let Some(snapshot) = cached.as_ref() {
            return Ok(snapshot.clone());
        }

        let snapshot = self.store.export_snapshot().await?;
        debug!(users = snapshot.len(), "Snapshot cache filled");
        *cached = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Drop the cached copy and fetch a fresh one
    pub async fn refresh(&self) -> Result<Snapshot, TrackerError> {
        self.invalidate().await;
        self.snapshot().await
    }

    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    pub async fn is_warm(&self) -> bool {
        self.cached.lock().await.is_some()
    }

    pub async fn user_checkins(&self, username: &str) -> Result<UserCheckins, TrackerError> {
        Ok(self
            .snapshot()
            .await?
            .remove(username)
            .map(|record| record.checkins)
            .unwrap_or_default())
    }

    pub async fn today_feed(&self, date: &str) -> Result<Vec<FeedEntry>, TrackerError> {
        Ok(today_feed(&self.snapshot().await?, date))
    }

    pub async fn add_checkin(&self, username: &str, date: &str, activity: &str) -> Result<(), TrackerError> {
        let result = self.store.add_checkin(username, date, activity).await;
        self.invalidate().await;
        result
    }

    pub async fn remove_checkin(&self, username: &str, date: &str, activity: &str) -> Result<(), TrackerError> {
        let result = self.store.remove_checkin(username, date, activity).await;
        self.invalidate().await;
        result
    }

    pub async fn delete_account(&self, username: &str) -> Result<(), TrackerError> {
        let result = self.store.delete_account(username).await;
        self.invalidate().await;
        result
    }

    pub async fn import_snapshot(&self, raw: RawSnapshot) -> Result<(), TrackerError> {
        let result = self.store.import_snapshot(raw).await;
        self.invalidate().await;
        result
    }

    /// Login can register an account, so it counts as a mutation
    pub async fn login(&self, username: &str, digest: &str) -> Result<LoginOutcome, TrackerError> {
        let result = self.store.login(username, digest).await;
        if matches!(&result, Ok(outcome) if outcome.created) {
            self.invalidate().await;
        }
        result
    }
}
