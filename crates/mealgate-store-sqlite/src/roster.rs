//! Reference rosters mirrored into the local database.

use std::fmt;

use async_trait::async_trait;
use mealgate_core::{
  diner::RosterEntry,
  store::{DirectoryProvider, ProviderError},
};

use crate::SqliteStore;

/// Which mirrored roster a [`RosterProvider`] reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RosterSource {
  Reservations,
  Payroll,
}

impl RosterSource {
  pub(crate) fn table(self) -> &'static str {
    match self {
      Self::Reservations => "reservation_roster",
      Self::Payroll => "payroll_roster",
    }
  }

  pub fn name(self) -> &'static str {
    match self {
      Self::Reservations => "reservations",
      Self::Payroll => "payroll",
    }
  }
}

impl fmt::Display for RosterSource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

/// A [`DirectoryProvider`] backed by one of the roster tables.
#[derive(Clone)]
pub struct RosterProvider {
  store:  SqliteStore,
  source: RosterSource,
}

impl RosterProvider {
  pub fn new(store: SqliteStore, source: RosterSource) -> Self { Self { store, source } }
}

#[async_trait]
impl DirectoryProvider for RosterProvider {
  fn name(&self) -> &str { self.source.name() }

  async fn lookup(&self, identification: &str) -> Result<Option<RosterEntry>, ProviderError> {
    Ok(self.store.roster_lookup(self.source, identification).await?)
  }
}
