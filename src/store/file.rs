//! Local snapshot-file store
//!
//! Keeps the whole dataset as one JSON document in the snapshot wire format,
//! the same shape the export endpoint produces. Suited to single-user,
//! local-only installs. Without a path the store lives purely in memory.
//!
//! Files written by older versions may hold a day as a bare activity code;
//! those are normalized when the file is loaded and rewritten in list form
//! on the next write.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::CheckinStore;
use crate::error::TrackerError;
use crate::model::{
    checkins_on, validate_account, validate_checkin, Account, DateCheckins, RawSnapshot, Snapshot, UserCheckins,
    UserRecord,
};

/// File name of the snapshot inside the data directory
pub const SNAPSHOT_FILE_NAME: &str = "checkins.json";

pub struct FileStore {
    path: Option<PathBuf>,
    state: Mutex<Snapshot>,
}

impl FileStore {
    /// Open the snapshot file at `path`, starting empty if it does not exist
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, TrackerError> {
        let path = path.as_ref().to_path_buf();

        let state = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Snapshot::new(),
            Ok(content) => serde_json::from_str::<RawSnapshot>(&content)?.prepare_import()?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                Snapshot::new()
            }
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), users = state.len(), "Snapshot file loaded");

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    /// Memory-only store
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(Snapshot::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Apply `change` to a copy of the dataset, persist the copy, and only
    /// then make it current. A failed change or write leaves state untouched.
    async fn commit<F>(&self, change: F) -> Result<(), TrackerError>
    where
        F: FnOnce(&mut Snapshot) -> Result<(), TrackerError> + Send,
    {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        change(&mut next)?;
        self.persist(&next).await?;
        *state = next;
        Ok(())
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<(), TrackerError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let json = serde_json::to_vec_pretty(snapshot)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, path).await?;

        debug!(path = %path.display(), bytes = json.len(), "Snapshot file written");
        Ok(())
    }
}

#[async_trait]
impl CheckinStore for FileStore {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    async fn find_account(&self, username: &str) -> Result<Option<Account>, TrackerError> {
        let state = self.state.lock().await;
        Ok(state.get(username).map(|record| Account {
            username: username.to_string(),
            credential_digest: record.password.clone(),
        }))
    }

    async fn create_account(&self, username: &str, digest: &str) -> Result<Account, TrackerError> {
        validate_account(username, digest)?;
        self.commit(|snapshot| {
            if snapshot.contains_key(username) {
                return Err(TrackerError::AlreadyExists(username.to_string()));
            }
            snapshot.insert(
                username.to_string(),
                UserRecord {
                    password: digest.to_string(),
                    checkins: UserCheckins::new(),
                },
            );
            Ok(())
        })
        .await?;

        Ok(Account {
            username: username.to_string(),
            credential_digest: digest.to_string(),
        })
    }

    async fn delete_account(&self, username: &str) -> Result<(), TrackerError> {
        self.commit(|snapshot| {
            snapshot
                .remove(username)
                .map(|_| ())
                .ok_or_else(|| TrackerError::NotFound(format!("account '{}'", username)))
        })
        .await
    }

    async fn add_checkin(&self, username: &str, date: &str, activity: &str) -> Result<(), TrackerError> {
        validate_checkin(username, date, activity)?;
        self.commit(|snapshot| {
            let record = snapshot
                .get_mut(username)
                .ok_or_else(|| TrackerError::NotFound(format!("account '{}'", username)))?;

            if !record
                .checkins
                .entry(date.to_string())
                .or_default()
                .insert(activity.to_string())
            {
                return Err(TrackerError::Conflict(format!(
                    "{} already checked in {} on {}",
                    username, activity, date
                )));
            }
            Ok(())
        })
        .await
    }

    async fn remove_checkin(&self, username: &str, date: &str, activity: &str) -> Result<(), TrackerError> {
        self.commit(|snapshot| {
            if let Some(record) = snapshot.get_mut(username) {
                if let Some(day) = record.checkins.get_mut(date) {
                    day.remove(activity);
                    if day.is_empty() {
                        record.checkins.remove(date);
                    }
                }
            }
            Ok(())
        })
        .await
    }

    async fn user_checkins(&self, username: &str) -> Result<UserCheckins, TrackerError> {
        let state = self.state.lock().await;
        Ok(state
            .get(username)
            .map(|record| record.checkins.clone())
            .unwrap_or_default())
    }

    async fn checkins_for_date(&self, date: &str) -> Result<DateCheckins, TrackerError> {
        let state = self.state.lock().await;
        Ok(checkins_on(&state, date))
    }

    async fn export_snapshot(&self) -> Result<Snapshot, TrackerError> {
        Ok(self.state.lock().await.clone())
    }

    async fn import_snapshot(&self, raw: RawSnapshot) -> Result<(), TrackerError> {
        let imported = raw.prepare_import()?;
        let users = imported.len();
        self.commit(move |snapshot| {
            *snapshot = imported;
            Ok(())
        })
        .await?;

        info!(users, "Snapshot imported");
        Ok(())
    }
}
