//! checkin-tracker: multi-user habit check-in tracker
//!
//! Users record which of a fixed set of daily activities they did on a given
//! date. The crate provides:
//! - The activity catalog and check-in data model ([`activity`], [`model`])
//! - One storage trait with SQLite, JSON-file and remote HTTP adapters ([`store`])
//! - Login with auto-registration and the admin gate ([`session`])
//! - Snapshot export/import with legacy-format normalization
//! - The JSON HTTP API a browser client talks to ([`http`])

pub mod activity;
pub mod cache;
pub mod config;
pub mod digest;
pub mod error;
pub mod http;
pub mod model;
pub mod report;
pub mod session;
pub mod store;

pub use activity::Activity;
pub use cache::SnapshotCache;
pub use config::{Backend, Config};
pub use error::TrackerError;
pub use model::{Account, RawSnapshot, Snapshot, UserRecord};
pub use session::{AdminGate, LoginOutcome, UserSession};
pub use store::{CheckinStore, FileStore, RemoteStore, SqliteStore};
