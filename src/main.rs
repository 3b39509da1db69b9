//! checkin-tracker: daily habit check-ins for a small group of users
//!
//! `serve` runs the JSON API over the configured store. The other
//! subcommands work on the store directly, for backups and admin chores.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::info;

use checkin_tracker::config::{Backend, Config};
use checkin_tracker::digest::digest_secret;
use checkin_tracker::http::{self, AppState};
use checkin_tracker::model::{self, RawSnapshot};
use checkin_tracker::report::{self, AdminStats, UserSummary};
use checkin_tracker::store;

#[derive(Parser)]
#[command(name = "checkin-tracker")]
#[command(about = "Multi-user daily habit check-in tracker")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "checkin-tracker.toml")]
    config: String,

    /// Data directory
    #[arg(short, long, env = "CHECKIN_DATA_DIR")]
    data_dir: Option<String>,

    /// Storage backend (overrides config file)
    #[arg(long, env = "CHECKIN_BACKEND", value_enum)]
    backend: Option<Backend>,

    /// Server URL for the remote backend (overrides config file)
    #[arg(long, env = "CHECKIN_REMOTE_URL")]
    remote_url: Option<String>,

    /// Hex SHA-256 digest of the admin secret (overrides config file)
    #[arg(long, env = "CHECKIN_ADMIN_DIGEST")]
    admin_digest: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Port to listen on (overrides config file)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Write the full dataset as JSON
    Export {
        /// Output file; stdout when omitted
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Replace the full dataset from a JSON export
    Import {
        /// Export file to load. Legacy single-activity days are accepted.
        file: PathBuf,
    },
    /// Print usage statistics
    Stats {
        /// Reference date for "active today" and streaks
        #[arg(long)]
        date: Option<String>,
    },
    /// Print the credential digest of a secret
    Digest {
        secret: String,
    },
}

#[derive(Serialize)]
struct StatsReport {
    date: String,
    #[serde(flatten)]
    stats: AdminStats,
    users: Vec<UserStats>,
}

#[derive(Serialize)]
struct UserStats {
    #[serde(flatten)]
    summary: UserSummary,
    streak: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("checkin_tracker=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Digest needs no config or store
    if let Command::Digest { secret } = &cli.command {
        println!("{}", digest_secret(secret));
        return Ok(());
    }

    let mut config = if std::path::Path::new(&cli.config).exists() {
        Config::load(&cli.config).with_context(|| format!("loading {}", cli.config))?
    } else {
        info!("Config file not found, using defaults");
        Config::default()
    };

    // Apply CLI overrides
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = PathBuf::from(data_dir);
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }
    if let Some(remote_url) = cli.remote_url {
        config.remote_url = Some(remote_url);
    }
    if let Some(digest) = cli.admin_digest {
        config.admin.digest = Some(digest);
    }
    config.validate()?;

    info!("Backend: {:?}", config.backend);
    info!("Data dir: {}", config.data_dir.display());

    let store = store::open(&config).await?;

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.http.port = port;
            }
            if config.admin.digest.is_none() {
                info!("No admin digest configured, admin routes are disabled");
            }

            let addr = config.bind_addr();
            let listener = TcpListener::bind(&addr)
                .await
                .with_context(|| format!("binding {}", addr))?;
            let state = AppState::new(store, config.admin.digest.clone());
            http::serve(listener, state).await?;
        }
        Command::Export { out } => {
            let snapshot = store.export_snapshot().await?;
            let json = serde_json::to_string_pretty(&snapshot)?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
                    info!(users = snapshot.len(), "Exported to {}", path.display());
                }
                None => println!("{}", json),
            }
        }
        Command::Import { file } => {
            let content =
                std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let raw: RawSnapshot = serde_json::from_str(&content)
                .with_context(|| format!("{} is not a check-in export", file.display()))?;
            let users = raw.0.len();
            store.import_snapshot(raw).await?;
            info!(users, "Imported {}", file.display());
        }
        Command::Stats { date } => {
            let date = match date {
                Some(date) => {
                    model::parse_date(&date)?;
                    date
                }
                None => model::today(),
            };
            let snapshot = store.export_snapshot().await?;
            let users = report::user_summaries(&snapshot)
                .into_iter()
                .map(|summary| {
                    let streak = snapshot
                        .get(&summary.username)
                        .map_or(0, |record| report::current_streak(&record.checkins, &date));
                    UserStats { summary, streak }
                })
                .collect();
            let stats_report = StatsReport {
                stats: report::admin_stats(&snapshot, &date),
                date,
                users,
            };
            println!("{}", serde_json::to_string_pretty(&stats_report)?);
        }
        Command::Digest { .. } => {}
    }

    Ok(())
}
