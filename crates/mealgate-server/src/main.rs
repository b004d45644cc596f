//! Mealgate server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and serves the checkpoint API over HTTP.

mod config;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use mealgate_api::AppState;
use mealgate_core::{Checkpoint, notify::Broadcaster, store::DirectoryProvider};
use mealgate_store_sqlite::{RosterProvider, SqliteStore};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;

#[derive(Parser)]
#[command(author, version, about = "Mealgate cafeteria checkpoint server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
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

  // Load configuration.
  let settings = ::config::Config::builder()
    .add_source(::config::File::from(cli.config).required(false))
    .add_source(::config::Environment::with_prefix("MEALGATE"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  for shift in &server_cfg.shifts {
    store
      .add_shift(shift.clone())
      .await
      .with_context(|| format!("failed to save shift {}", shift.id))?;
  }

  let providers: Vec<Arc<dyn DirectoryProvider>> = server_cfg
    .providers
    .iter()
    .map(|&kind| {
      Arc::new(RosterProvider::new(store.clone(), kind.into())) as Arc<dyn DirectoryProvider>
    })
    .collect();

  // Build application state.
  let store = Arc::new(store);
  let events = Broadcaster::new(server_cfg.event_buffer);
  let checkpoint = Checkpoint::new(Arc::clone(&store), Arc::new(events.clone()))
    .with_providers(providers)
    .with_timeout(server_cfg.verify_timeout());

  tracing::info!(
    providers = ?checkpoint.resolver().providers().collect::<Vec<_>>(),
    shifts = server_cfg.shifts.len(),
    timeout = ?server_cfg.verify_timeout(),
    "checkpoint ready"
  );

  let state = AppState { checkpoint: Arc::new(checkpoint), store, events };
  let app = mealgate_api::api_router(state).layer(TraceLayer::new_for_http());
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
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
