//! Views computed from a snapshot: the "who checked in today" feed, admin
//! statistics, per-user summaries and streaks.

use std::collections::BTreeMap;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::activity::Activity;
use crate::model::{checkins_on, parse_date, Snapshot, UserCheckins, DATE_FORMAT};

/// One line of the today feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub username: String,
    pub activities: Vec<String>,
}

/// Users with at least one activity on `date`, ordered by username
pub fn today_feed(snapshot: &Snapshot, date: &str) -> Vec<FeedEntry> {
    checkins_on(snapshot, date)
        .into_iter()
        .map(|(username, activities)| FeedEntry {
            username,
            activities: activities.into_iter().collect(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminStats {
    pub total_users: usize,
    /// Distinct (user, date) pairs with any activity
    pub total_checkin_days: usize,
    pub total_activities: usize,
    /// Users with any activity on the reference date
    pub active_today: usize,
    /// Activity code → number of check-ins. Always lists the whole catalog.
    pub per_activity: BTreeMap<String, usize>,
}

pub fn admin_stats(snapshot: &Snapshot, today: &str) -> AdminStats {
    let mut per_activity: BTreeMap<String, usize> = Activity::ALL
        .iter()
        .map(|a| (a.code().to_string(), 0))
        .collect();
    let mut total_checkin_days = 0;
    let mut total_activities = 0;

    for record in snapshot.values() {
        total_checkin_days += record.checkins.len();
        for activities in record.checkins.values() {
            total_activities += activities.len();
            for code in activities {
                *per_activity.entry(code.clone()).or_default() += 1;
            }
        }
    }

    AdminStats {
        total_users: snapshot.len(),
        total_checkin_days,
        total_activities,
        active_today: checkins_on(snapshot, today).len(),
        per_activity,
    }
}

/// Admin view of one account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub username: String,
    pub checkin_days: usize,
    pub total_activities: usize,
    pub last_checkin: Option<String>,
}

pub fn user_summaries(snapshot: &Snapshot) -> Vec<UserSummary> {
    snapshot
        .iter()
        .map(|(username, record)| UserSummary {
            username: username.clone(),
            checkin_days: record.checkins.len(),
            total_activities: record.checkins.values().map(|a| a.len()).sum(),
            last_checkin: record.checkins.keys().next_back().cloned(),
        })
        .collect()
}

/// Consecutive days with activity, ending today, or yesterday when nothing
/// is recorded yet today. Zero if `today` is not a valid date.
pub fn current_streak(checkins: &UserCheckins, today: &str) -> u32 {
    let Ok(mut day) = parse_date(today) else {
        return 0;
    };

    let has_activity = |d: &chrono::NaiveDate| {
        checkins
            .get(&d.format(DATE_FORMAT).to_string())
            .is_some_and(|a| !a.is_empty())
    };

    if !has_activity(&day) {
        day -= Duration::days(1);
    }

    let mut streak = 0;
    while has_activity(&day) {
        streak += 1;
        day -= Duration::days(1);
    }
    streak
}
