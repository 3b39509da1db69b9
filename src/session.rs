//! Session and admin access
//!
//! Two unrelated gates:
//!
//! - [`UserSession`] tracks the logged-in end user and runs the login /
//!   auto-registration protocol.
//! - [`AdminGate`] checks a single shared admin digest taken from server-side
//!   configuration. Being logged in as a user grants nothing here, and
//!   opening the admin gate does not log anyone in.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::digest::digests_match;
use crate::error::TrackerError;
use crate::model::validate_username;
use crate::store::CheckinStore;

/// Result of a successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOutcome {
    pub username: String,
    /// Whether this login registered a new account
    pub created: bool,
}

/// Login protocol: unknown usernames are registered with the supplied
/// digest; known ones must match. No lockout, any number of attempts.
pub async fn authenticate<S>(store: &S, username: &str, digest: &str) -> Result<LoginOutcome, TrackerError>
where
    S: CheckinStore + ?Sized,
{
    validate_username(username)?;
    if digest.is_empty() {
        return Err(TrackerError::InvalidInput("password must not be empty".to_string()));
    }

    let existing = match store.find_account(username).await? {
        Some(account) => account,
        None => match store.create_account(username, digest).await {
            Ok(_) => {
                info!(username, "Registered new account");
                return Ok(LoginOutcome {
                    username: username.to_string(),
                    created: true,
                });
            }
            // Another request registered the name first; check against theirs.
            Err(TrackerError::AlreadyExists(_)) => store
                .find_account(username)
                .await?
                .ok_or_else(|| TrackerError::Internal(format!("account '{}' vanished during login", username)))?,
            Err(e) => return Err(e),
        },
    };

    if digests_match(&existing.credential_digest, digest) {
        debug!(username, "Login accepted");
        Ok(LoginOutcome {
            username: username.to_string(),
            created: false,
        })
    } else {
        warn!(username, "Login rejected: credential mismatch");
        Err(TrackerError::InvalidCredential)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticating,
    Authenticated {
        username: String,
    },
}

/// End-user identity for the life of one client session
#[derive(Debug, Default)]
pub struct UserSession {
    state: SessionState,
}

impl UserSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn username(&self) -> Option<&str> {
        match &self.state {
            SessionState::Authenticated { username } => Some(username),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.username().is_some()
    }

    /// Any failure leaves the session anonymous, including when a different
    /// user was logged in before.
    pub async fn login(
        &mut self,
        store: &dyn CheckinStore,
        username: &str,
        digest: &str,
    ) -> Result<LoginOutcome, TrackerError> {
        self.state = SessionState::Authenticating;

        match store.login(username, digest).await {
            Ok(outcome) => {
                self.state = SessionState::Authenticated {
                    username: outcome.username.clone(),
                };
                Ok(outcome)
            }
            Err(e) => {
                self.state = SessionState::Anonymous;
                Err(e)
            }
        }
    }

    pub fn logout(&mut self) {
        self.state = SessionState::Anonymous;
    }
}

/// Shared-secret admin gate
#[derive(Debug, Clone)]
pub struct AdminGate {
    /// Configured admin digest; `None` disables admin access entirely
    expected: Option<String>,
    open: bool,
}

impl AdminGate {
    pub fn new(expected: Option<String>) -> Self {
        Self {
            expected: expected.filter(|d| !d.is_empty()),
            open: false,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.expected.is_some()
    }

    /// Stateless check of a supplied digest
    pub fn verify(&self, supplied: Option<&str>) -> Result<(), TrackerError> {
        match (self.expected.as_deref(), supplied) {
            (Some(expected), Some(supplied)) if digests_match(expected, supplied) => Ok(()),
            (_, None) => Err(TrackerError::Unauthorized),
            _ => Err(TrackerError::InvalidCredential),
        }
    }

    /// Open the gate for as long as this value lives
    pub fn unlock(&mut self, supplied: &str) -> Result<(), TrackerError> {
        self.verify(Some(supplied))?;
        self.open = true;
        Ok(())
    }

    pub fn close(&mut self) {
        self.open = false;
    }

    pub fn is_open(&self) -> bool {
        self.open
    }
}
