//! Database schema definitions

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::TrackerError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), TrackerError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 && table_exists(conn, "checkins")? {
        // Tables from before versioning may lack the uniqueness constraint
        info!("Found unversioned tables, rebuilding as v{}", SCHEMA_VERSION);
        migrate_schema(conn, 1)?;
    } else if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        conn.execute_batch(USERS_TABLE)
            .and_then(|_| conn.execute_batch(CHECKINS_TABLE))
            .map_err(|e| TrackerError::Database(format!("Failed to create tables: {}", e)))?;
        conn.execute_batch(INDEXES_SCHEMA)
            .map_err(|e| TrackerError::Database(format!("Failed to create indexes: {}", e)))?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        migrate_schema(conn, current_version)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
pub fn get_schema_version(conn: &Connection) -> Result<i32, TrackerError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .map_err(|e| TrackerError::Database(format!("Failed to create schema_version table: {}", e)))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()
        .map_err(|e| TrackerError::Database(format!("Failed to read schema_version: {}", e)))?;

    Ok(version.unwrap_or(0))
}

fn table_exists(conn: &Connection, name: &str) -> Result<bool, TrackerError> {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get::<_, i64>(0),
    )
    .map(|count| count > 0)
    .map_err(|e| TrackerError::Database(format!("Failed to inspect tables: {}", e)))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), TrackerError> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| TrackerError::Database(format!("Failed to clear schema_version: {}", e)))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])
        .map_err(|e| TrackerError::Database(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

fn migrate_schema(conn: &Connection, from_version: i32) -> Result<(), TrackerError> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| TrackerError::Database(format!("Transaction failed: {}", e)))?;

    if from_version < 2 {
        // v1 had no uniqueness on (username, date, activity); collapse any
        // duplicates while rebuilding the table with the constraint.
        tx.execute_batch(USERS_TABLE)
            .map_err(|e| TrackerError::Database(format!("Failed to create users: {}", e)))?;
        tx.execute_batch(MIGRATE_V1_TO_V2)
            .map_err(|e| TrackerError::Database(format!("Failed to migrate checkins to v2: {}", e)))?;
        tx.execute_batch(INDEXES_SCHEMA)
            .map_err(|e| TrackerError::Database(format!("Failed to create indexes: {}", e)))?;
    }

    set_schema_version(&tx, SCHEMA_VERSION)?;

    tx.commit()
        .map_err(|e| TrackerError::Database(format!("Commit failed: {}", e)))?;
    Ok(())
}

const USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    username TEXT PRIMARY KEY NOT NULL,
    -- Credential digest, never a raw secret
    password TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

const CHECKINS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS checkins (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    date TEXT NOT NULL,
    activity TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (username, date, activity),
    FOREIGN KEY (username) REFERENCES users(username) ON DELETE CASCADE
);
"#;

const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_checkins_username ON checkins(username);
CREATE INDEX IF NOT EXISTS idx_checkins_date ON checkins(date);
"#;

const MIGRATE_V1_TO_V2: &str = r#"
CREATE TABLE checkins_v2 (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    date TEXT NOT NULL,
    activity TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (username, date, activity),
    FOREIGN KEY (username) REFERENCES users(username) ON DELETE CASCADE
);

INSERT OR IGNORE INTO checkins_v2 (username, date, activity)
    SELECT username, date, activity FROM checkins
    WHERE username IN (SELECT username FROM users)
    ORDER BY rowid;

DROP TABLE checkins;
ALTER TABLE checkins_v2 RENAME TO checkins;
"#;

/// v1 layout, kept so the migration path stays testable
#[cfg(test)]
pub(crate) const V1_SCHEMA: &str = r#"
CREATE TABLE users (
    username TEXT PRIMARY KEY NOT NULL,
    password TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE checkins (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL,
    date TEXT NOT NULL,
    activity TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (username) REFERENCES users(username) ON DELETE CASCADE
);

CREATE TABLE schema_version (version INTEGER NOT NULL);
INSERT INTO schema_version (version) VALUES (1);
"#;
