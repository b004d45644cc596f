//! Runtime configuration, read from a TOML file and `MEALGATE_*` environment
//! variables.

use std::{path::PathBuf, time::Duration};

use mealgate_core::{checkpoint::DEFAULT_TIMEOUT_MS, notify, shift::Shift};
use mealgate_store_sqlite::RosterSource;
use serde::Deserialize;

/// A reference source the resolver may consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
  Reservations,
  Payroll,
}

impl From<ProviderKind> for RosterSource {
  fn from(kind: ProviderKind) -> Self {
    match kind {
      ProviderKind::Reservations => RosterSource::Reservations,
      ProviderKind::Payroll => RosterSource::Payroll,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub host:              String,
  pub port:              u16,
  pub store_path:        PathBuf,
  /// Budget for one verification, in milliseconds.
  pub verify_timeout_ms: u64,
  /// Events a slow display may fall behind before it starts missing some.
  pub event_buffer:      usize,
  /// Consulted in this order when a diner is not known locally.
  pub providers:         Vec<ProviderKind>,
  /// Meal windows written to the store at startup, replacing any with the
  /// same id.
  pub shifts:            Vec<Shift>,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:              "127.0.0.1".to_owned(),
      port:              8080,
      store_path:        PathBuf::from("mealgate.db"),
      verify_timeout_ms: DEFAULT_TIMEOUT_MS,
      event_buffer:      notify::DEFAULT_CAPACITY,
      providers:         vec![ProviderKind::Reservations, ProviderKind::Payroll],
      shifts:            Vec::new(),
    }
  }
}

impl ServerConfig {
  pub fn verify_timeout(&self) -> Duration { Duration::from_millis(self.verify_timeout_ms) }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}
