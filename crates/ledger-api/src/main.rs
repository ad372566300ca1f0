//! ledger-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! SQLite store (falling back to in-memory when the file is unavailable),
//! hydrates the engine, attaches the configured owner, and serves the JSON
//! API over HTTP.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `auth_password_hash` in config.toml:
//!
//! ```
//! cargo run -p ledger-api --bin ledger-server -- --hash-password
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use ledger_api::{AppState, ServerConfig, auth::AuthConfig};
use ledger_core::clock::SystemClock;
use ledger_engine::SyncService;
use ledger_remote::HttpRemote;
use ledger_store_sqlite::SqliteStore;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "habit-ledger sync engine server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Helper mode: hash a password and exit.
  if cli.hash_password {
    let password = read_password()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("LEDGER"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open the SQLite store; an unavailable durable medium degrades the engine
  // to memory-only operation instead of refusing to start.
  let store = match SqliteStore::open(&store_path).await {
    Ok(store) => store,
    Err(e) => {
      tracing::warn!("cannot open store at {store_path:?}, running in memory: {e}");
      SqliteStore::open_in_memory()
        .await
        .context("opening in-memory store")?
    }
  };

  // Remote client; absent configuration means local-only mode.
  let remote = match server_cfg.remote.clone() {
    Some(remote_cfg) => {
      HttpRemote::new(remote_cfg).context("building remote client")?
    }
    None => {
      tracing::info!("no remote configured, running local-only");
      HttpRemote::disabled()
    }
  };

  let service = SyncService::new(store, remote, SystemClock);
  service.hydrate().await;

  // Successful-authentication trigger: attach the configured owner and run
  // the initial sync cycle in the background.
  if let Some(owner) = server_cfg.owner_id {
    let service = service.clone();
    tokio::spawn(async move { service.attach_owner(owner).await });
  }

  // Build application state.
  let state = AppState {
    service,
    auth: Arc::new(AuthConfig {
      username:      server_cfg.auth_username.clone(),
      password_hash: server_cfg.auth_password_hash.clone(),
    }),
  };

  let app = ledger_api::router(state).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
