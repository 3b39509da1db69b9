//! Check-in and account storage
//!
//! One data-access trait, [`CheckinStore`], with interchangeable adapters:
//!
//! - [`SqliteStore`] - embedded relational store, the server's source of truth
//! - [`FileStore`] - local-only JSON snapshot file (or pure memory)
//! - [`RemoteStore`] - talks to a running server over its HTTP API
//!
//! The adapter is picked at startup from [`Config::backend`]; business logic
//! above this layer never knows which one it has.

pub mod file;
pub mod remote;
pub mod sqlite;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::config::{Backend, Config};
use crate::error::TrackerError;
use crate::model::{Account, DateCheckins, RawSnapshot, Snapshot, UserCheckins};
use crate::session::{self, LoginOutcome};

pub use file::FileStore;
pub use remote::RemoteStore;
pub use sqlite::SqliteStore;

#[async_trait]
pub trait CheckinStore: Send + Sync {
    /// Short adapter name for logs
    fn backend_name(&self) -> &'static str;

    async fn find_account(&self, username: &str) -> Result<Option<Account>, TrackerError>;

    /// Fails with `AlreadyExists` when the username is taken
    async fn create_account(&self, username: &str, digest: &str) -> Result<Account, TrackerError>;

    /// Remove an account and every check-in it owns, atomically
    async fn delete_account(&self, username: &str) -> Result<(), TrackerError>;

    /// Compare a supplied digest with the stored one. `NotFound` when the
    /// account does not exist.
    async fn verify_credential(&self, username: &str, digest: &str) -> Result<bool, TrackerError> {
        match self.find_account(username).await? {
            Some(account) => Ok(crate::digest::digests_match(&account.credential_digest, digest)),
            None => Err(TrackerError::NotFound(format!("account '{}'", username))),
        }
    }

    /// Log in, registering the account on first sight
    async fn login(&self, username: &str, digest: &str) -> Result<LoginOutcome, TrackerError> {
        session::authenticate(self, username, digest).await
    }

    /// Fails with `Conflict` when the activity is already recorded that day
    async fn add_checkin(&self, username: &str, date: &str, activity: &str) -> Result<(), TrackerError>;

    /// Succeeds whether or not the record existed
    async fn remove_checkin(&self, username: &str, date: &str, activity: &str) -> Result<(), TrackerError>;

    async fn user_checkins(&self, username: &str) -> Result<UserCheckins, TrackerError>;

    /// Activities of every user on `date`, keyed (and so ordered) by username
    async fn checkins_for_date(&self, date: &str) -> Result<DateCheckins, TrackerError>;

    /// Full dataset, read fresh on every call
    async fn export_snapshot(&self) -> Result<Snapshot, TrackerError>;

    /// Replace everything with `raw` in one transaction
    async fn import_snapshot(&self, raw: RawSnapshot) -> Result<(), TrackerError>;

    /// Delete every account and check-in
    async fn clear_all(&self) -> Result<(), TrackerError> {
        self.import_snapshot(RawSnapshot::new()).await
    }
}

/// Open the adapter selected by the configuration
pub async fn open(config: &Config) -> Result<Arc<dyn CheckinStore>, TrackerError> {
    let store: Arc<dyn CheckinStore> = match config.backend {
        Backend::Sqlite => Arc::new(SqliteStore::open(&config.data_dir)?),
        Backend::File => Arc::new(FileStore::open(config.snapshot_path()).await?),
        Backend::Remote => {
            let url = config.remote_url.as_deref().ok_or_else(|| {
                TrackerError::Config("remote backend selected but remote_url is not set".to_string())
            })?;
            Arc::new(RemoteStore::new(
                url,
                config.admin.digest.clone(),
                Duration::from_secs(config.request_timeout_secs),
            )?)
        }
    };

    info!(backend = store.backend_name(), "Store opened");
    Ok(store)
}
