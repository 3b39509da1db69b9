//! Full-dataset export and destructive import

use rusqlite::{params, Connection};
use tracing::{info, warn};

use super::{accounts, db_error};
use crate::error::TrackerError;
use crate::model::{Snapshot, UserRecord};

/// Assemble the full snapshot inside one read transaction
pub fn export_snapshot(conn: &mut Connection) -> Result<Snapshot, TrackerError> {
    let tx = conn
        .transaction()
        .map_err(|e| db_error("Transaction failed", e))?;

    let mut snapshot: Snapshot = accounts::list_accounts(&tx)?
        .into_iter()
        .map(|account| {
            (
                account.username,
                UserRecord {
                    password: account.credential_digest,
                    checkins: Default::default(),
                },
            )
        })
        .collect();

    {
        let mut stmt = tx
            .prepare("SELECT username, date, activity FROM checkins")
            .map_err(|e| db_error("Prepare failed", e))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| db_error("Query failed", e))?;

        for row in rows {
            let (username, date, activity) = row.map_err(|e| db_error("Row parse failed", e))?;
            match snapshot.get_mut(&username) {
                Some(record) => {
                    record.checkins.entry(date).or_default().insert(activity);
                }
                None => warn!(username, date, "Skipping orphaned check-in row"),
            }
        }
    }

    tx.commit()
        .map_err(|e| db_error("Commit failed", e))?;

    Ok(snapshot)
}

/// Replace every account and check-in with `snapshot`.
///
/// Runs as one transaction: on any failure nothing is committed and the
/// previous data stays visible to readers throughout.
pub fn import_snapshot(conn: &mut Connection, snapshot: &Snapshot) -> Result<(), TrackerError> {
    let tx = conn
        .transaction()
        .map_err(|e| TrackerError::Transaction(format!("Begin failed: {}", e)))?;

    tx.execute("DELETE FROM checkins", [])
        .map_err(|e| TrackerError::Transaction(format!("Clearing checkins failed: {}", e)))?;
    tx.execute("DELETE FROM users", [])
        .map_err(|e| TrackerError::Transaction(format!("Clearing users failed: {}", e)))?;

    let mut checkin_count = 0usize;
    {
        let mut insert_user = tx
            .prepare("INSERT INTO users (username, password) VALUES (?1, ?2)")
            .map_err(|e| TrackerError::Transaction(format!("Prepare failed: {}", e)))?;
        let mut insert_checkin = tx
            .prepare("INSERT INTO checkins (username, date, activity) VALUES (?1, ?2, ?3)")
            .map_err(|e| TrackerError::Transaction(format!("Prepare failed: {}", e)))?;

        for (username, record) in snapshot {
            insert_user
                .execute(params![username, record.password])
                .map_err(|e| TrackerError::Transaction(format!("User insert failed for {}: {}", username, e)))?;

            for (date, activities) in &record.checkins {
                for activity in activities {
                    insert_checkin
                        .execute(params![username, date, activity])
                        .map_err(|e| {
                            TrackerError::Transaction(format!(
                                "Check-in insert failed for {} on {}: {}",
                                username, date, e
                            ))
                        })?;
                    checkin_count += 1;
                }
            }
        }
    }

    tx.commit()
        .map_err(|e| TrackerError::Transaction(format!("Commit failed: {}", e)))?;

    info!(users = snapshot.len(), checkins = checkin_count, "Snapshot imported");
    Ok(())
}
