//! Configuration for checkin-tracker

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::digest::is_digest;
use crate::error::TrackerError;
use crate::store::file::SNAPSHOT_FILE_NAME;

/// Default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("checkin-tracker")
}

/// Which store adapter to open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Embedded SQLite database in the data directory
    Sqlite,
    /// JSON snapshot file in the data directory
    File,
    /// A running tracker server at `remote_url`
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_backend")]
    pub backend: Backend,

    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Base URL of the server, for the remote backend
    #[serde(default)]
    pub remote_url: Option<String>,

    /// Timeout for remote store requests
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_http_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Hex SHA-256 digest of the admin secret. Admin routes are disabled
    /// when unset.
    #[serde(default)]
    pub digest: Option<String>,
}

fn default_backend() -> Backend {
    Backend::Sqlite
}

fn default_request_timeout() -> u64 {
    10
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_http_port(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            data_dir: default_data_dir(),
            remote_url: None,
            request_timeout_secs: default_request_timeout(),
            http: HttpConfig::default(),
            admin: AdminConfig::default(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TrackerError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| TrackerError::Config(e.to_string()))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), TrackerError> {
        let content = toml::to_string_pretty(self).map_err(|e| TrackerError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject combinations that cannot work before anything is opened
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.backend == Backend::Remote && self.remote_url.as_deref().map_or(true, str::is_empty) {
            return Err(TrackerError::Config(
                "remote backend selected but remote_url is not set".to_string(),
            ));
        }

        if let Some(digest) = self.admin.digest.as_deref() {
            if !is_digest(digest) {
                return Err(TrackerError::Config(
                    "admin.digest must be a lowercase hex SHA-256 digest".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Snapshot file used by the file backend
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE_NAME)
    }

    /// Address the HTTP server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.http.bind, self.http.port)
    }
}
