//! Check-in data model
//!
//! A user's history is a map of `YYYY-MM-DD` date to the set of activity
//! codes recorded that day. Days with no activities are never represented.
//!
//! ## Legacy day values
//!
//! Older exports stored a day as a single bare code (`"fitness"`) instead of
//! a list. [`DayEntry`] accepts both shapes and [`DayEntry::into_set`] is the
//! one place that turns either into a set. Stores call it whenever raw data
//! crosses into the canonical model (file load, import); everything written
//! back out is the list form.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::TrackerError;

/// Date format used for every stored and exchanged date
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Activity codes recorded on one day
pub type ActivitySet = BTreeSet<String>;

/// One user's history: date → activities
pub type UserCheckins = BTreeMap<String, ActivitySet>;

/// One date across users: username → activities
pub type DateCheckins = BTreeMap<String, ActivitySet>;

/// Full dataset: username → account and history. Export/import unit.
pub type Snapshot = BTreeMap<String, UserRecord>;

/// An account row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    /// Hex digest of the user's secret; never the secret itself
    #[serde(rename = "password")]
    pub credential_digest: String,
}

/// Snapshot entry for one user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Credential digest. Named `password` in the wire format.
    pub password: String,
    #[serde(default)]
    pub checkins: UserCheckins,
}

/// A day's value as found in persisted or imported data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DayEntry {
    Many(Vec<String>),
    Legacy(String),
}

impl DayEntry {
    /// Canonical set form of this day
    pub fn into_set(self) -> ActivitySet {
        match self {
            DayEntry::Many(codes) => codes.into_iter().collect(),
            DayEntry::Legacy(code) => BTreeSet::from([code]),
        }
    }
}

impl From<ActivitySet> for DayEntry {
    fn from(set: ActivitySet) -> Self {
        DayEntry::Many(set.into_iter().collect())
    }
}

/// Snapshot entry as it may appear on disk or in an import payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUserRecord {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub checkins: BTreeMap<String, DayEntry>,
}

/// Snapshot that may still contain legacy day values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawSnapshot(pub BTreeMap<String, RawUserRecord>);

impl RawSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Convert to the canonical model: legacy days become singleton sets and
    /// days left empty are dropped. Performs no validation.
    pub fn canonicalize(self) -> Snapshot {
        self.0
            .into_iter()
            .map(|(username, raw)| {
                let checkins = raw
                    .checkins
                    .into_iter()
                    .map(|(date, entry)| (date, entry.into_set()))
                    .filter(|(_, set)| !set.is_empty())
                    .collect();
                (
                    username,
                    UserRecord {
                        password: raw.password,
                        checkins,
                    },
                )
            })
            .collect()
    }

    /// Check every field an import would write. Nothing is written when this
    /// fails, so the caller's data is left as it was.
    pub fn validate(&self) -> Result<(), TrackerError> {
        for (username, record) in &self.0 {
            validate_account(username, &record.password)?;
            for (date, entry) in &record.checkins {
                parse_date(date)?;
                match entry {
                    DayEntry::Many(codes) => {
                        for code in codes {
                            validate_checkin(username, date, code)?;
                        }
                    }
                    DayEntry::Legacy(code) => validate_checkin(username, date, code)?,
                }
            }
        }
        Ok(())
    }

    /// Validate then canonicalize; the path every import takes
    pub fn prepare_import(self) -> Result<Snapshot, TrackerError> {
        self.validate()?;
        Ok(self.canonicalize())
    }
}

impl From<Snapshot> for RawSnapshot {
    fn from(snapshot: Snapshot) -> Self {
        RawSnapshot(
            snapshot
                .into_iter()
                .map(|(username, record)| {
                    let checkins = record
                        .checkins
                        .into_iter()
                        .map(|(date, set)| (date, DayEntry::from(set)))
                        .collect();
                    (
                        username,
                        RawUserRecord {
                            password: record.password,
                            checkins,
                        },
                    )
                })
                .collect(),
        )
    }
}

/// Parse a `YYYY-MM-DD` date, rejecting any non-canonical spelling
pub fn parse_date(date: &str) -> Result<NaiveDate, TrackerError> {
    NaiveDate::parse_from_str(date, DATE_FORMAT)
        .ok()
        .filter(|parsed| parsed.format(DATE_FORMAT).to_string() == date)
        .ok_or_else(|| TrackerError::InvalidInput(format!("invalid date '{}', expected YYYY-MM-DD", date)))
}

/// Today's date from local wall-clock time.
///
/// No timezone is recorded; users in different zones can disagree on what
/// "today" is around midnight.
pub fn today() -> String {
    Local::now().date_naive().format(DATE_FORMAT).to_string()
}

pub fn validate_username(username: &str) -> Result<(), TrackerError> {
    if username.is_empty() {
        return Err(TrackerError::InvalidInput("username must not be empty".to_string()));
    }
    Ok(())
}

/// Fields of a new account. Stores apply the same rules as import, so
/// whatever they hold can be exported and imported back.
pub fn validate_account(username: &str, digest: &str) -> Result<(), TrackerError> {
    validate_username(username)?;
    if digest.is_empty() {
        return Err(TrackerError::InvalidInput(format!(
            "user '{}' has no credential digest",
            username
        )));
    }
    Ok(())
}

/// Fields of a new check-in. Any non-empty code is accepted; catalog
/// membership is checked by callers that take user input.
pub fn validate_checkin(username: &str, date: &str, activity: &str) -> Result<(), TrackerError> {
    validate_username(username)?;
    parse_date(date)?;
    if activity.is_empty() {
        return Err(TrackerError::InvalidInput(format!(
            "user '{}' has an empty activity on {}",
            username, date
        )));
    }
    Ok(())
}

/// Check-ins of every user on one date, users without activity omitted
pub fn checkins_on(snapshot: &Snapshot, date: &str) -> DateCheckins {
    snapshot
        .iter()
        .filter_map(|(username, record)| {
            record
                .checkins
                .get(date)
                .filter(|set| !set.is_empty())
                .map(|set| (username.clone(), set.clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> RawSnapshot {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_legacy_scalar_becomes_singleton() {
        let snapshot = raw(r#"{"bob": {"password": "abc", "checkins": {"2024-03-01": "fitness"}}}"#)
            .canonicalize();

        let day = &snapshot["bob"].checkins["2024-03-01"];
        assert_eq!(day, &BTreeSet::from(["fitness".to_string()]));
    }

    #[test]
    fn test_list_days_deduplicated_and_empty_days_dropped() {
        let snapshot = raw(
            r#"{"bob": {"password": "abc", "checkins": {
                "2024-03-01": ["paper", "paper", "quant"],
                "2024-03-02": []
            }}}"#,
        )
        .canonicalize();

        let checkins = &snapshot["bob"].checkins;
        assert_eq!(checkins.len(), 1);
        assert_eq!(checkins["2024-03-01"].len(), 2);
    }

    #[test]
    fn test_missing_checkins_key_means_no_history() {
        let snapshot = raw(r#"{"carol": {"password": "abc"}}"#).canonicalize();
        assert!(snapshot["carol"].checkins.is_empty());
    }

    #[test]
    fn test_canonical_form_serializes_as_lists() {
        let snapshot = raw(r#"{"bob": {"password": "abc", "checkins": {"2024-03-01": "fitness"}}}"#)
            .canonicalize();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(
            json,
            r#"{"bob":{"password":"abc","checkins":{"2024-03-01":["fitness"]}}}"#
        );
    }

    #[test]
    fn test_validate_rejects_bad_dates_and_empty_fields() {
        let bad_date = raw(r#"{"bob": {"password": "abc", "checkins": {"2024-3-1": ["paper"]}}}"#);
        assert!(matches!(bad_date.validate(), Err(TrackerError::InvalidInput(_))));

        let no_password = raw(r#"{"bob": {"checkins": {}}}"#);
        assert!(matches!(no_password.validate(), Err(TrackerError::InvalidInput(_))));

        let empty_user = raw(r#"{"": {"password": "abc"}}"#);
        assert!(matches!(empty_user.validate(), Err(TrackerError::InvalidInput(_))));

        let empty_code = raw(r#"{"bob": {"password": "abc", "checkins": {"2024-03-01": ""}}}"#);
        assert!(matches!(empty_code.validate(), Err(TrackerError::InvalidInput(_))));
    }

    #[test]
    fn test_write_rules_match_import_rules() {
        assert!(validate_account("alice", "abc").is_ok());
        assert!(matches!(validate_account("", "abc"), Err(TrackerError::InvalidInput(_))));
        assert!(matches!(validate_account("alice", ""), Err(TrackerError::InvalidInput(_))));

        assert!(validate_checkin("alice", "2024-03-01", "yoga").is_ok());
        assert!(matches!(
            validate_checkin("alice", "2024-3-1", "paper"),
            Err(TrackerError::InvalidInput(_))
        ));
        assert!(matches!(
            validate_checkin("alice", "2024-03-01", ""),
            Err(TrackerError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_parse_date_is_strict() {
        assert!(parse_date("2024-03-01").is_ok());
        assert!(parse_date("2024-02-30").is_err());
        assert!(parse_date("2024-3-01").is_err());
        assert!(parse_date("01/03/2024").is_err());
        assert!(parse_date("").is_err());
    }

    #[test]
    fn test_today_is_canonical() {
        assert!(parse_date(&today()).is_ok());
    }

    #[test]
    fn test_checkins_on_filters_by_date() {
        let snapshot = raw(
            r#"{
                "bob": {"password": "a", "checkins": {"2024-03-01": ["paper"]}},
                "alice": {"password": "b", "checkins": {"2024-03-02": ["quant"]}}
            }"#,
        )
        .canonicalize();

        let day = checkins_on(&snapshot, "2024-03-01");
        assert_eq!(day.len(), 1);
        assert!(day.contains_key("bob"));
    }

    #[test]
    fn test_raw_round_trip_from_snapshot() {
        let snapshot = raw(r#"{"bob": {"password": "abc", "checkins": {"2024-03-01": "fitness"}}}"#)
            .canonicalize();
        let back = RawSnapshot::from(snapshot.clone()).canonicalize();
        assert_eq!(back, snapshot);
    }
}
