//! HTTP API
//!
//! JSON endpoints over a [`CheckinStore`]. User-facing routes take the
//! username in the request, as the web client does; admin routes require the
//! admin digest in the `x-admin-digest` header.
//!
//! Usernames travel in the query string or body, never as a path segment:
//! `.` and `..` are valid usernames and would be folded away by URL path
//! normalization.

pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header::CONTENT_TYPE, HeaderName, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

use crate::cache::SnapshotCache;
use crate::error::TrackerError;
use crate::session::AdminGate;
use crate::store::CheckinStore;

/// Header carrying the admin digest on admin routes
pub const ADMIN_HEADER: &str = "x-admin-digest";

/// State shared across handlers
pub struct AppState {
    /// Reads that must reflect the latest commit (export) go here directly
    pub store: Arc<dyn CheckinStore>,
    /// Every mutation goes through the cache so its copy never goes stale
    pub cache: SnapshotCache,
    pub admin: AdminGate,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(store: Arc<dyn CheckinStore>, admin_digest: Option<String>) -> SharedState {
        Arc::new(Self {
            cache: SnapshotCache::new(Arc::clone(&store)),
            store,
            admin: AdminGate::new(admin_digest),
        })
    }
}

impl IntoResponse for TrackerError {
    fn into_response(self) -> Response {
        let status = match &self {
            TrackerError::InvalidCredential | TrackerError::Unauthorized => StatusCode::UNAUTHORIZED,
            TrackerError::Conflict(_) | TrackerError::AlreadyExists(_) => StatusCode::CONFLICT,
            TrackerError::NotFound(_) => StatusCode::NOT_FOUND,
            TrackerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            TrackerError::Transient(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(error = %self, "Request rejected");
        }

        let body = json!({ "error": self.public_message(), "code": self.code() });
        (status, Json(body)).into_response()
    }
}

/// Create the API router
pub fn create_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(ADMIN_HEADER)])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(routes::health))
        // User API
        .route("/api/login", post(routes::login))
        .route("/api/data", get(routes::data))
        .route("/api/today", get(routes::today))
        .route("/api/checkins", get(routes::checkins_for_date))
        .route(
            "/api/checkin",
            post(routes::add_checkin).delete(routes::remove_checkin),
        )
        .route("/api/user/checkins", get(routes::user_checkins))
        // Admin API
        .route("/api/admin/verify", post(routes::admin_verify))
        .route("/api/admin/stats", get(routes::admin_stats))
        .route("/api/admin/users", get(routes::admin_users))
        .route("/api/users", post(routes::create_user))
        .route("/api/user", get(routes::get_user).delete(routes::delete_user))
        .route("/api/export", get(routes::export))
        .route("/api/import", post(routes::import))
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `listener` until Ctrl+C
pub async fn serve(listener: TcpListener, state: SharedState) -> Result<(), TrackerError> {
    let addr = listener.local_addr()?;
    info!(backend = state.store.backend_name(), "Server running on http://{}", addr);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}
