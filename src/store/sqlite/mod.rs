//! SQLite store
//!
//! Embedded relational storage for accounts and check-ins.
//!
//! ## Tables
//!
//! - `users` - one row per account (username, credential digest)
//! - `checkins` - one row per (username, date, activity), unique on that
//!   triple, cascade-deleted with the owning user
//!
//! Indexes on `checkins(username)` and `checkins(date)` serve the per-user
//! history and per-day feed queries.

pub mod accounts;
pub mod checkins;
pub mod schema;
pub mod snapshot;

use std::os::raw::c_int;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{Connection, ErrorCode};
use tracing::{debug, info};

use super::CheckinStore;
use crate::error::TrackerError;
use crate::model::{validate_account, validate_checkin, Account, DateCheckins, RawSnapshot, Snapshot, UserCheckins};

/// File name of the database inside the data directory
pub const DB_FILE_NAME: &str = "checkins.db";

/// Map a rusqlite error, classifying lock contention as retryable
pub(crate) fn db_error(context: &str, e: rusqlite::Error) -> TrackerError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if matches!(err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
        {
            TrackerError::Transient(format!("{}: {}", context, e))
        }
        _ => TrackerError::Database(format!("{}: {}", context, e)),
    }
}

/// Extended result code of a constraint violation, if `e` is one
pub(crate) fn constraint_code(e: &rusqlite::Error) -> Option<c_int> {
    match e {
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
            Some(err.extended_code)
        }
        _ => None,
    }
}

/// SQLite-backed [`CheckinStore`]
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database in `data_dir`
    pub fn open(data_dir: &Path) -> Result<Self, TrackerError> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join(DB_FILE_NAME);
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(&db_path)
            .map_err(|e| db_error("Failed to open SQLite", e))?;

        // WAL for concurrent readers while a writer holds the lock
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| db_error("Failed to set PRAGMA", e))?;

        Self::init(conn)
    }

    /// Open an in-memory database
    pub fn open_in_memory() -> Result<Self, TrackerError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()
            .map_err(|e| db_error("Failed to open in-memory SQLite", e))?;

        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, TrackerError> {
        conn.execute_batch("PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;")
            .map_err(|e| db_error("Failed to set PRAGMA", e))?;

        schema::init_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool
    async fn with_conn<F, T>(&self, f: F) -> Result<T, TrackerError>
    where
        F: FnOnce(&mut Connection) -> Result<T, TrackerError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| TrackerError::Internal(format!("Lock poisoned: {}", e)))?;
            f(&mut *conn)
        })
        .await
        .map_err(|e| TrackerError::Internal(format!("Blocking task failed: {}", e)))?
    }
}

#[async_trait]
impl CheckinStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn find_account(&self, username: &str) -> Result<Option<Account>, TrackerError> {
        let username = username.to_string();
        self.with_conn(move |conn| accounts::find_account(conn, &username)).await
    }

    async fn create_account(&self, username: &str, digest: &str) -> Result<Account, TrackerError> {
        validate_account(username, digest)?;
        let (username, digest) = (username.to_string(), digest.to_string());
        self.with_conn(move |conn| accounts::create_account(conn, &username, &digest)).await
    }

    async fn delete_account(&self, username: &str) -> Result<(), TrackerError> {
        let username = username.to_string();
        self.with_conn(move |conn| accounts::delete_account(conn, &username)).await
    }

    async fn add_checkin(&self, username: &str, date: &str, activity: &str) -> Result<(), TrackerError> {
        validate_checkin(username, date, activity)?;
        let (username, date, activity) = (username.to_string(), date.to_string(), activity.to_string());
        self.with_conn(move |conn| checkins::add_checkin(conn, &username, &date, &activity))
            .await
    }

    async fn remove_checkin(&self, username: &str, date: &str, activity: &str) -> Result<(), TrackerError> {
        let (username, date, activity) = (username.to_string(), date.to_string(), activity.to_string());
        self.with_conn(move |conn| checkins::remove_checkin(conn, &username, &date, &activity))
            .await
    }

    async fn user_checkins(&self, username: &str) -> Result<UserCheckins, TrackerError> {
        let username = username.to_string();
        self.with_conn(move |conn| checkins::user_checkins(conn, &username)).await
    }

    async fn checkins_for_date(&self, date: &str) -> Result<DateCheckins, TrackerError> {
        let date = date.to_string();
        self.with_conn(move |conn| checkins::checkins_for_date(conn, &date)).await
    }

    async fn export_snapshot(&self) -> Result<Snapshot, TrackerError> {
        self.with_conn(snapshot::export_snapshot).await
    }

    async fn import_snapshot(&self, raw: RawSnapshot) -> Result<(), TrackerError> {
        let prepared = raw.prepare_import()?;
        self.with_conn(move |conn| snapshot::import_snapshot(conn, &prepared)).await
    }
}
