//! API route handlers

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::info;

use super::{SharedState, ADMIN_HEADER};
use crate::activity::Activity;
use crate::error::TrackerError;
use crate::model::{self, Account, DateCheckins, RawSnapshot, Snapshot, UserCheckins};
use crate::report::{self, AdminStats, FeedEntry, UserSummary};
use crate::session::LoginOutcome;

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    "OK"
}

fn success() -> Json<Value> {
    Json(json!({ "success": true }))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, TrackerError> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| TrackerError::InvalidInput(e.body_text()))
}

fn required(value: Option<String>, field: &str) -> Result<String, TrackerError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| TrackerError::InvalidInput(format!("missing field '{}'", field)))
}

fn require_admin(state: &SharedState, headers: &HeaderMap) -> Result<(), TrackerError> {
    let supplied = headers.get(ADMIN_HEADER).and_then(|v| v.to_str().ok());
    state.admin.verify(supplied)
}

/// Date from the query string, today when absent
fn date_or_today(query: DateQuery) -> Result<String, TrackerError> {
    match query.date {
        Some(date) => {
            model::parse_date(&date)?;
            Ok(date)
        }
        None => Ok(model::today()),
    }
}

#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    #[serde(default)]
    pub date: Option<String>,
}

/// Username plus credential digest; `password` is the digest, never the
/// raw secret
#[derive(Debug, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CheckinRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub activity: Option<String>,
}

// === User API ===

/// POST /api/login
pub async fn login(
    State(state): State<SharedState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<LoginOutcome>, TrackerError> {
    let req = body(payload)?;
    let username = required(req.username, "username")?;
    let password = required(req.password, "password")?;

    let outcome = state.cache.login(&username, &password).await?;
    Ok(Json(outcome))
}

/// GET /api/data - every user's history, credential digests blanked
pub async fn data(State(state): State<SharedState>) -> Result<Json<Snapshot>, TrackerError> {
    let mut snapshot = state.cache.snapshot().await?;
    for record in snapshot.values_mut() {
        record.password.clear();
    }
    Ok(Json(snapshot))
}

/// GET /api/today?date=YYYY-MM-DD
pub async fn today(
    State(state): State<SharedState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<Vec<FeedEntry>>, TrackerError> {
    let date = date_or_today(query)?;
    Ok(Json(state.cache.today_feed(&date).await?))
}

/// GET /api/checkins?date=YYYY-MM-DD
pub async fn checkins_for_date(
    State(state): State<SharedState>,
    Query(query): Query<DateQuery>,
) -> Result<Json<DateCheckins>, TrackerError> {
    let date = required(query.date, "date")?;
    model::parse_date(&date)?;
    Ok(Json(state.store.checkins_for_date(&date).await?))
}

/// POST /api/checkin
pub async fn add_checkin(
    State(state): State<SharedState>,
    payload: Result<Json<CheckinRequest>, JsonRejection>,
) -> Result<Json<Value>, TrackerError> {
    let req = body(payload)?;
    let username = required(req.username, "username")?;
    let date = required(req.date, "date")?;
    let activity = required(req.activity, "activity")?;

    model::parse_date(&date)?;
    let activity: Activity = activity.parse()?;

    state.cache.add_checkin(&username, &date, activity.code()).await?;
    Ok(success())
}

/// DELETE /api/checkin
///
/// Accepts codes outside the catalog so stray records can still be removed.
pub async fn remove_checkin(
    State(state): State<SharedState>,
    payload: Result<Json<CheckinRequest>, JsonRejection>,
) -> Result<Json<Value>, TrackerError> {
    let req = body(payload)?;
    let username = required(req.username, "username")?;
    let date = required(req.date, "date")?;
    let activity = required(req.activity, "activity")?;

    state.cache.remove_checkin(&username, &date, &activity).await?;
    Ok(success())
}

/// GET /api/user/checkins?username=
pub async fn user_checkins(
    State(state): State<SharedState>,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<UserCheckins>, TrackerError> {
    let username = required(query.username, "username")?;
    Ok(Json(state.store.user_checkins(&username).await?))
}

// === Admin API ===

/// POST /api/admin/verify
pub async fn admin_verify(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<Value>, TrackerError> {
    require_admin(&state, &headers)?;
    Ok(success())
}

/// GET /api/admin/stats?date=YYYY-MM-DD
pub async fn admin_stats(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<DateQuery>,
) -> Result<Json<AdminStats>, TrackerError> {
    require_admin(&state, &headers)?;
    let date = date_or_today(query)?;
    let snapshot = state.cache.snapshot().await?;
    Ok(Json(report::admin_stats(&snapshot, &date)))
}

/// GET /api/admin/users
pub async fn admin_users(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<Vec<UserSummary>>, TrackerError> {
    require_admin(&state, &headers)?;
    let snapshot = state.cache.snapshot().await?;
    Ok(Json(report::user_summaries(&snapshot)))
}

/// POST /api/users
pub async fn create_user(
    State(state): State<SharedState>,
    headers: HeaderMap,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<Account>, TrackerError> {
    require_admin(&state, &headers)?;
    let req = body(payload)?;
    let username = required(req.username, "username")?;
    let password = required(req.password, "password")?;

    let account = state.store.create_account(&username, &password).await;
    state.cache.invalidate().await;
    Ok(Json(account?))
}

/// GET /api/user?username=
pub async fn get_user(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<Account>, TrackerError> {
    require_admin(&state, &headers)?;
    let username = required(query.username, "username")?;
    state
        .store
        .find_account(&username)
        .await?
        .map(Json)
        .ok_or_else(|| TrackerError::NotFound(format!("account '{}'", username)))
}

/// DELETE /api/user?username=
pub async fn delete_user(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(query): Query<UsernameQuery>,
) -> Result<Json<Value>, TrackerError> {
    require_admin(&state, &headers)?;
    let username = required(query.username, "username")?;
    state.cache.delete_account(&username).await?;
    info!(username, "Account deleted by admin");
    Ok(success())
}

/// GET /api/export
pub async fn export(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<Snapshot>, TrackerError> {
    require_admin(&state, &headers)?;
    Ok(Json(state.store.export_snapshot().await?))
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub success: bool,
    pub users: usize,
}

/// POST /api/import - replaces all data; `{}` clears everything
pub async fn import(
    State(state): State<SharedState>,
    headers: HeaderMap,
    payload: Result<Json<RawSnapshot>, JsonRejection>,
) -> Result<Json<ImportResponse>, TrackerError> {
    require_admin(&state, &headers)?;
    let raw = body(payload)?;
    let users = raw.0.len();

    state.cache.import_snapshot(raw).await?;
    info!(users, "Dataset replaced by admin import");
    Ok(Json(ImportResponse { success: true, users }))
}
