//! Remote store
//!
//! Speaks the server's JSON API so a client can use a running tracker as its
//! store. Error bodies carry a `code` that maps back onto [`TrackerError`],
//! so callers see the same variants as with an embedded store.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::CheckinStore;
use crate::error::TrackerError;
use crate::http::ADMIN_HEADER;
use crate::model::{validate_account, validate_checkin, Account, DateCheckins, RawSnapshot, Snapshot, UserCheckins};
use crate::session::LoginOutcome;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    #[serde(default)]
    code: Option<String>,
}

fn transport_error(e: reqwest::Error) -> TrackerError {
    if e.is_decode() {
        TrackerError::Internal(format!("Malformed response: {}", e))
    } else {
        TrackerError::Transient(format!("Request failed: {}", e))
    }
}

/// HTTP-backed [`CheckinStore`]
#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: Client,
    base: Url,
    /// Sent on admin-only routes (account lookup, export, import)
    admin_digest: Option<String>,
}

impl RemoteStore {
    pub fn new(base_url: &str, admin_digest: Option<String>, timeout: Duration) -> Result<Self, TrackerError> {
        let base = Url::parse(base_url)
            .map_err(|e| TrackerError::Config(format!("Invalid remote_url '{}': {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(TrackerError::Config(format!("Invalid remote_url '{}'", base_url)));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrackerError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base,
            admin_digest: admin_digest.filter(|d| !d.is_empty()),
        })
    }

    /// Base URL extended with fixed route segments. Usernames never go here:
    /// path normalization drops `.` and `..` segments.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Request on `route` naming `username` in the query string
    fn for_user(&self, method: Method, route: &[&str], username: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(route))
            .query(&[("username", username)])
    }

    fn admin(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.admin_digest {
            Some(digest) => request.header(ADMIN_HEADER, digest),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, TrackerError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        debug!(url = %response.url(), %status, "Remote call");

        if status.is_success() {
            return Ok(response);
        }

        let body = response.json::<ErrorBody>().await.ok();
        Err(match body {
            Some(ErrorBody { error, code: Some(code) }) => TrackerError::from_code(&code, error),
            body => {
                let message = body.map(|b| b.error).unwrap_or_else(|| status.to_string());
                match status {
                    StatusCode::UNAUTHORIZED => TrackerError::Unauthorized,
                    StatusCode::NOT_FOUND => TrackerError::NotFound(message),
                    StatusCode::CONFLICT => TrackerError::Conflict(message),
                    StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                        TrackerError::InvalidInput(message)
                    }
                    StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
                        TrackerError::Transient(message)
                    }
                    _ => TrackerError::Internal(message),
                }
            }
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, TrackerError> {
        self.send(request).await?.json::<T>().await.map_err(transport_error)
    }
}

#[async_trait]
impl CheckinStore for RemoteStore {
    fn backend_name(&self) -> &'static str {
        "remote"
    }

    async fn find_account(&self, username: &str) -> Result<Option<Account>, TrackerError> {
        let request = self.admin(self.for_user(Method::GET, &["api", "user"], username));
        match self.fetch::<Account>(request).await {
            Ok(account) => Ok(Some(account)),
            Err(TrackerError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_account(&self, username: &str, digest: &str) -> Result<Account, TrackerError> {
        validate_account(username, digest)?;
        let request = self
            .admin(self.client.post(self.url(&["api", "users"])))
            .json(&json!({ "username": username, "password": digest }));
        self.fetch(request).await
    }

    async fn delete_account(&self, username: &str) -> Result<(), TrackerError> {
        let request = self.admin(self.for_user(Method::DELETE, &["api", "user"], username));
        self.send(request).await.map(|_| ())
    }

    /// The server runs the login protocol itself; no admin digest needed.
    async fn login(&self, username: &str, digest: &str) -> Result<LoginOutcome, TrackerError> {
        let request = self
            .client
            .post(self.url(&["api", "login"]))
            .json(&json!({ "username": username, "password": digest }));
        self.fetch(request).await
    }

    async fn add_checkin(&self, username: &str, date: &str, activity: &str) -> Result<(), TrackerError> {
        validate_checkin(username, date, activity)?;
        let request = self
            .client
            .post(self.url(&["api", "checkin"]))
            .json(&json!({ "username": username, "date": date, "activity": activity }));
        self.send(request).await.map(|_| ())
    }

    async fn remove_checkin(&self, username: &str, date: &str, activity: &str) -> Result<(), TrackerError> {
        let request = self
            .client
            .delete(self.url(&["api", "checkin"]))
            .json(&json!({ "username": username, "date": date, "activity": activity }));
        self.send(request).await.map(|_| ())
    }

    async fn user_checkins(&self, username: &str) -> Result<UserCheckins, TrackerError> {
        let request = self.for_user(Method::GET, &["api", "user", "checkins"], username);
        self.fetch(request).await
    }

    async fn checkins_for_date(&self, date: &str) -> Result<DateCheckins, TrackerError> {
        let request = self
            .client
            .get(self.url(&["api", "checkins"]))
            .query(&[("date", date)]);
        self.fetch(request).await
    }

    async fn export_snapshot(&self) -> Result<Snapshot, TrackerError> {
        let request = self.admin(self.client.get(self.url(&["api", "export"])));
        self.fetch(request).await
    }

    async fn import_snapshot(&self, raw: RawSnapshot) -> Result<(), TrackerError> {
        let request = self
            .admin(self.client.post(self.url(&["api", "import"])))
            .json(&raw);
        self.send(request).await.map(|_| ())
    }
}
