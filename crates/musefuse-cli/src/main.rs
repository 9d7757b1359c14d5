//! MuseFuse CLI - log in, browse and upload photos from the terminal.
//!
//! One `SessionManager` is built here and shared by every command, so the
//! token, its expiry timer and the persisted record stay in one place.

mod commands;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use musefuse_core::auth::FileTokenStore;
use musefuse_core::{ApiClient, Config, PhotoService, RestoreOutcome, SessionManager};

#[derive(Parser, Debug)]
#[command(name = "musefuse", version, about = "MuseFuse photo sharing client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account
    Register {
        #[arg(long)]
        username: Option<String>,
    },
    /// Log in and store the session
    Login {
        #[arg(long)]
        username: Option<String>,
    },
    /// End the session and remove the stored token
    Logout,
    /// Show whether a session is active and when it expires
    Status,
    /// Exchange the current token for a fresh one
    Refresh,
    /// Print authentication changes until the session ends
    Watch,
    /// List photos
    Photos {
        /// Only photos uploaded by the logged in user
        #[arg(long)]
        mine: bool,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 20)]
        per_page: usize,
    },
    /// Upload one or more images
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Delete one of your photos
    Delete { filename: String },
}

/// Everything a command needs, built once per invocation
pub struct App {
    pub config: Config,
    pub api: ApiClient,
    pub session: SessionManager,
    pub photos: PhotoService,
}

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // RUST_LOG controls the level (e.g. RUST_LOG=musefuse_core=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn build_app() -> Result<App> {
    let config = Config::load().context("Failed to load configuration")?;
    let api = ApiClient::from_config(&config).context("Invalid API configuration")?;
    let data_dir = config.data_dir()?;
    debug!(api_url = %config.api_url, data_dir = %data_dir.display(), "Building session");

    let store = FileTokenStore::new(data_dir);
    let session = SessionManager::new(Arc::new(store), Arc::new(api.clone()));

    match session.initialize() {
        RestoreOutcome::NoSession => {}
        RestoreOutcome::Restored { expires_at } => {
            debug!(%expires_at, "Restored stored session");
        }
        RestoreOutcome::Discarded(reason) => {
            eprintln!("Stored session discarded: {}", reason);
        }
    }

    let photos = PhotoService::new(api.clone(), session.clone());
    Ok(App {
        config,
        api,
        session,
        photos,
    })
}

async fn run(cli: Cli) -> Result<()> {
    let mut app = build_app()?;

    match cli.command {
        Command::Register { username } => commands::register(&app, username).await,
        Command::Login { username } => commands::login(&mut app, username).await,
        Command::Logout => commands::logout(&app),
        Command::Status => commands::status(&app),
        Command::Refresh => commands::refresh(&app).await,
        Command::Watch => commands::watch(&app).await,
        Command::Photos {
            mine,
            page,
            per_page,
        } => commands::photos(&app, mine, page, per_page).await,
        Command::Upload { files } => commands::upload(&app, files).await,
        Command::Delete { filename } => commands::delete(&app, &filename).await,
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    let cli = Cli::parse();
    info!(command = ?cli.command, "musefuse starting");

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
