//! Check-in row operations

use rusqlite::{params, Connection};
use tracing::debug;

use super::{constraint_code, db_error};
use crate::error::TrackerError;
use crate::model::{DateCheckins, UserCheckins};

pub fn add_checkin(conn: &Connection, username: &str, date: &str, activity: &str) -> Result<(), TrackerError> {
    let result = conn.execute(
        "INSERT INTO checkins (username, date, activity) VALUES (?1, ?2, ?3)",
        params![username, date, activity],
    );

    match result {
        Ok(_) => {
            debug!(username, date, activity, "Check-in added");
            Ok(())
        }
        Err(e) => match constraint_code(&e) {
            Some(rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) => Err(TrackerError::Conflict(format!(
                "{} already checked in {} on {}",
                username, activity, date
            ))),
            Some(rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
                Err(TrackerError::NotFound(format!("account '{}'", username)))
            }
            _ => Err(db_error("Insert failed", e)),
        },
    }
}

pub fn remove_checkin(conn: &Connection, username: &str, date: &str, activity: &str) -> Result<(), TrackerError> {
    let removed = conn
        .execute(
            "DELETE FROM checkins WHERE username = ?1 AND date = ?2 AND activity = ?3",
            params![username, date, activity],
        )
        .map_err(|e| db_error("Delete failed", e))?;

    debug!(username, date, activity, removed, "Check-in removed");
    Ok(())
}

pub fn user_checkins(conn: &Connection, username: &str) -> Result<UserCheckins, TrackerError> {
    let mut stmt = conn
        .prepare_cached("SELECT date, activity FROM checkins WHERE username = ?1")
        .map_err(|e| db_error("Prepare failed", e))?;

    let rows = stmt
        .query_map(params![username], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(|e| db_error("Query failed", e))?;

    let mut checkins = UserCheckins::new();
    for row in rows {
        let (date, activity) = row.map_err(|e| db_error("Row parse failed", e))?;
        checkins.entry(date).or_default().insert(activity);
    }

    Ok(checkins)
}

pub fn checkins_for_date(conn: &Connection, date: &str) -> Result<DateCheckins, TrackerError> {
    let mut stmt = conn
        .prepare_cached("SELECT username, activity FROM checkins WHERE date = ?1")
        .map_err(|e| db_error("Prepare failed", e))?;

    let rows = stmt
        .query_map(params![date], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(|e| db_error("Query failed", e))?;

    let mut by_user = DateCheckins::new();
    for row in rows {
        let (username, activity) = row.map_err(|e| db_error("Row parse failed", e))?;
        by_user.entry(username).or_default().insert(activity);
    }

    Ok(by_user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::sqlite::accounts::create_account;
    use crate::store::sqlite::schema::init_schema;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        init_schema(&conn).unwrap();
        create_account(&conn, "alice", "d").unwrap();
        conn
    }

    #[test]
    fn test_duplicate_is_conflict() {
        let conn = conn();
        add_checkin(&conn, "alice", "2024-03-01", "paper").unwrap();
        assert!(matches!(
            add_checkin(&conn, "alice", "2024-03-01", "paper"),
            Err(TrackerError::Conflict(_))
        ));
        assert_eq!(user_checkins(&conn, "alice").unwrap()["2024-03-01"].len(), 1);
    }

    #[test]
    fn test_unknown_user_is_not_found() {
        let conn = conn();
        assert!(matches!(
            add_checkin(&conn, "ghost", "2024-03-01", "paper"),
            Err(TrackerError::NotFound(_))
        ));
    }

    #[test]
    fn test_rows_grouped_by_day() {
        let conn = conn();
        add_checkin(&conn, "alice", "2024-03-01", "paper").unwrap();
        add_checkin(&conn, "alice", "2024-03-01", "fitness").unwrap();
        add_checkin(&conn, "alice", "2024-03-02", "quant").unwrap();

        let checkins = user_checkins(&conn, "alice").unwrap();
        assert_eq!(checkins.len(), 2);
        assert_eq!(checkins["2024-03-01"].len(), 2);

        remove_checkin(&conn, "alice", "2024-03-02", "quant").unwrap();
        remove_checkin(&conn, "alice", "2024-03-02", "quant").unwrap();
        assert!(!user_checkins(&conn, "alice").unwrap().contains_key("2024-03-02"));
    }
}
