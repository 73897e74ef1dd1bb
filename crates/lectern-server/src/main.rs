//! `lectern-server`: serves the reporting API from a SQLite store.
//!
//! Settings come from `--config` (default `config.toml`) overlaid with
//! `LECTERN__*` environment variables. Run with `--hash-password` to turn a
//! password typed on stdin into the argon2 string an `[[accounts]]` entry
//! expects.

use std::{io::BufRead as _, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context as _, bail};
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use lectern_export::FsBlobStore;
use lectern_reports::ReportEngine;
use lectern_server::{AppState, ServerConfig, auth::AuthConfig};
use lectern_store_sqlite::SqliteStore;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Lectern reporting server")]
struct Cli {
  /// TOML file with server settings and accounts.
  #[arg(short, long, default_value = "config.toml", env = "LECTERN_CONFIG")]
  config: PathBuf,

  /// Hash a password read from stdin, print it and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  if cli.hash_password {
    println!("{}", hash_stdin_password()?);
    return Ok(());
  }

  let cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load {:?}", cli.config))?
    .with_home(std::env::var_os("HOME"));
  if cfg.accounts.is_empty() {
    tracing::warn!("no accounts configured; every API request will be rejected");
  }

  let state = open_state(&cfg).await?;
  let app = lectern_server::router(state, Duration::from_secs(cfg.request_timeout_secs));

  let address = format!("{}:{}", cfg.host, cfg.port);
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  tracing::info!(%address, store = ?cfg.store_path, exports = ?cfg.export_dir, "serving");

  axum::serve(listener, app).await.context("server error")
}

/// Open the store and export directory named in `cfg` and wire up the engine.
async fn open_state(cfg: &ServerConfig) -> anyhow::Result<AppState<SqliteStore, SqliteStore>> {
  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;
  let store = Arc::new(store);

  tokio::fs::create_dir_all(&cfg.export_dir)
    .await
    .with_context(|| format!("failed to create export dir {:?}", cfg.export_dir))?;
  let blobs = FsBlobStore::new(&cfg.export_dir, cfg.files_url(), cfg.signing_secret.clone());

  let engine = ReportEngine::new(store.clone(), store, blobs, cfg.engine.clone());
  Ok(AppState {
    engine: Arc::new(engine),
    auth:   Arc::new(AuthConfig { accounts: cfg.accounts.clone() }),
  })
}

fn hash_stdin_password() -> anyhow::Result<String> {
  eprint!("Password: ");
  let Some(line) = std::io::stdin().lock().lines().next() else {
    bail!("no password on stdin");
  };
  let password = line?;
  let salt = SaltString::generate(&mut OsRng);
  let hash = Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
  Ok(hash.to_string())
}
