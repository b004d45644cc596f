//! Diner records and the flat projection returned by reference sources.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Canonical comparison form of an identification number: hyphens and
/// quotes are removed and surrounding whitespace trimmed.
///
/// Terminals and imported rosters disagree on punctuation (`"001-2345678-9"`
/// vs `"00123456789"`), so every lookup and the uniqueness key use this form.
pub fn normalize_identification(raw: &str) -> String {
  raw
    .trim()
    .chars()
    .filter(|c| !matches!(c, '-' | '\'' | '"'))
    .collect()
}

// ─── Alert metadata ──────────────────────────────────────────────────────────

/// Optional mail alert raised when the diner is served.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSettings {
  pub enabled:      bool,
  pub mail_subject: Option<String>,
  pub mail_to:      Option<String>,
  pub mail_from:    Option<String>,
  pub mail_cc:      Option<String>,
}

// ─── Diner ───────────────────────────────────────────────────────────────────

/// A person eligible to receive meals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diner {
  pub id:               i64,
  /// As entered or imported; lookups go through [`normalize_identification`].
  pub identification:   String,
  pub name:             String,
  pub area:             Option<String>,
  pub cost_center:      Option<String>,
  pub note:             Option<String>,
  pub active:           bool,
  pub registered_from:  Option<NaiveDateTime>,
  pub registered_until: Option<NaiveDateTime>,
  pub alert:            AlertSettings,
}

/// Input to [`crate::store::DinerStore::upsert_diner`].
///
/// The store matches existing records on the normalized identification and
/// overwrites every field; a fresh id is assigned only on first insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDiner {
  pub identification:   String,
  pub name:             String,
  #[serde(default)]
  pub area:             Option<String>,
  #[serde(default)]
  pub cost_center:      Option<String>,
  #[serde(default)]
  pub note:             Option<String>,
  #[serde(default = "default_active")]
  pub active:           bool,
  #[serde(default)]
  pub registered_from:  Option<NaiveDateTime>,
  #[serde(default)]
  pub registered_until: Option<NaiveDateTime>,
  #[serde(default)]
  pub alert:            AlertSettings,
}

fn default_active() -> bool { true }

impl NewDiner {
  /// A diner provisioned from a reference source on first sight.
  pub fn from_roster(entry: RosterEntry, now: NaiveDateTime) -> Self {
    Self {
      identification:   entry.identification,
      name:             entry.name,
      area:             entry.area,
      cost_center:      entry.cost_center,
      note:             entry.note,
      active:           true,
      registered_from:  Some(now),
      registered_until: None,
      alert:            AlertSettings::default(),
    }
  }
}

// ─── Reference projection ────────────────────────────────────────────────────

/// The flat record an external reference source (reservations, payroll)
/// yields for an identification number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
  pub identification: String,
  pub name:           String,
  pub area:           Option<String>,
  pub cost_center:    Option<String>,
  pub note:           Option<String>,
}
