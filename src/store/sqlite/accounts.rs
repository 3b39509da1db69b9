//! Account CRUD operations

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::{constraint_code, db_error};
use crate::error::TrackerError;
use crate::model::Account;

fn account_from_row(row: &Row) -> Result<Account, rusqlite::Error> {
    Ok(Account {
        username: row.get("username")?,
        credential_digest: row.get("password")?,
    })
}

/// Get an account by username
pub fn find_account(conn: &Connection, username: &str) -> Result<Option<Account>, TrackerError> {
    conn.query_row(
        "SELECT username, password FROM users WHERE username = ?1",
        params![username],
        account_from_row,
    )
    .optional()
    .map_err(|e| db_error("Account lookup failed", e))
}

/// List all accounts ordered by username
pub fn list_accounts(conn: &Connection) -> Result<Vec<Account>, TrackerError> {
    let mut stmt = conn
        .prepare("SELECT username, password FROM users ORDER BY username")
        .map_err(|e| db_error("Prepare failed", e))?;

    let accounts = stmt
        .query_map([], account_from_row)
        .map_err(|e| db_error("Query failed", e))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| db_error("Row parse failed", e))?;

    Ok(accounts)
}

/// Insert a new account
pub fn create_account(conn: &Connection, username: &str, digest: &str) -> Result<Account, TrackerError> {
    match conn.execute(
        "INSERT INTO users (username, password) VALUES (?1, ?2)",
        params![username, digest],
    ) {
        Ok(_) => {
            debug!(username, "Account created");
            Ok(Account {
                username: username.to_string(),
                credential_digest: digest.to_string(),
            })
        }
        Err(e) if constraint_code(&e) == Some(rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY) => {
            Err(TrackerError::AlreadyExists(username.to_string()))
        }
        Err(e) => Err(db_error("Insert failed", e)),
    }
}

/// Delete an account and its check-ins in one transaction
pub fn delete_account(conn: &mut Connection, username: &str) -> Result<(), TrackerError> {
    let tx = conn
        .transaction()
        .map_err(|e| TrackerError::Transaction(format!("Begin failed: {}", e)))?;

    // Explicit rather than relying on ON DELETE CASCADE alone, which is a
    // no-op on connections opened without foreign key enforcement.
    let removed_checkins = tx
        .execute("DELETE FROM checkins WHERE username = ?1", params![username])
        .map_err(|e| TrackerError::Transaction(format!("Check-in delete failed: {}", e)))?;

    let removed_users = tx
        .execute("DELETE FROM users WHERE username = ?1", params![username])
        .map_err(|e| TrackerError::Transaction(format!("Account delete failed: {}", e)))?;

    if removed_users == 0 {
        // Dropping the transaction rolls back
        return Err(TrackerError::NotFound(format!("account '{}'", username)));
    }

    tx.commit()
        .map_err(|e| TrackerError::Transaction(format!("Commit failed: {}", e)))?;

    debug!(username, removed_checkins, "Account deleted");
    Ok(())
}
