//! Encoding and decoding helpers between domain types and the plain
//! representations stored in SQLite columns.
//!
//! Timestamps are local wall-clock ISO 8601 strings without offset; dates are
//! `YYYY-MM-DD`. Flags are stored as 0/1 integers.

use chrono::{NaiveDate, NaiveDateTime};
use mealgate_core::{
  diner::{AlertSettings, Diner},
  dispatch::{Dispatch, DispatchOrigin},
  shift::Shift,
};

use crate::{Error, Result};

// ─── NaiveDateTime / NaiveDate ───────────────────────────────────────────────

pub fn encode_dt(dt: NaiveDateTime) -> String { dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string() }

pub fn decode_dt(s: &str) -> Result<NaiveDateTime> {
  s.parse::<NaiveDateTime>()
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

// ─── DispatchOrigin ──────────────────────────────────────────────────────────

pub fn encode_origin(o: DispatchOrigin) -> &'static str {
  match o {
    DispatchOrigin::Administration => "administration",
    DispatchOrigin::Verification => "verification",
  }
}

pub fn decode_origin(s: &str) -> Result<DispatchOrigin> {
  match s {
    "administration" => Ok(DispatchOrigin::Administration),
    "verification" => Ok(DispatchOrigin::Verification),
    other => Err(Error::UnknownOrigin(other.to_owned())),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const DINER_COLUMNS: &str = "diner_id, identification, name, area, cost_center, note, \
   active, registered_from, registered_until, alert_enabled, alert_mail_subject, \
   alert_mail_to, alert_mail_from, alert_mail_cc";

/// Raw values read directly from a `diners` row.
pub struct RawDiner {
  pub diner_id:           i64,
  pub identification:     String,
  pub name:               String,
  pub area:               Option<String>,
  pub cost_center:        Option<String>,
  pub note:               Option<String>,
  pub active:             bool,
  pub registered_from:    Option<String>,
  pub registered_until:   Option<String>,
  pub alert_enabled:      bool,
  pub alert_mail_subject: Option<String>,
  pub alert_mail_to:      Option<String>,
  pub alert_mail_from:    Option<String>,
  pub alert_mail_cc:      Option<String>,
}

impl RawDiner {
  /// Map a row selected with [`DINER_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      diner_id:           row.get(0)?,
      identification:     row.get(1)?,
      name:               row.get(2)?,
      area:               row.get(3)?,
      cost_center:        row.get(4)?,
      note:               row.get(5)?,
      active:             row.get(6)?,
      registered_from:    row.get(7)?,
      registered_until:   row.get(8)?,
      alert_enabled:      row.get(9)?,
      alert_mail_subject: row.get(10)?,
      alert_mail_to:      row.get(11)?,
      alert_mail_from:    row.get(12)?,
      alert_mail_cc:      row.get(13)?,
    })
  }

  pub fn into_diner(self) -> Result<Diner> {
    Ok(Diner {
      id:               self.diner_id,
      identification:   self.identification,
      name:             self.name,
      area:             self.area,
      cost_center:      self.cost_center,
      note:             self.note,
      active:           self.active,
      registered_from:  self.registered_from.as_deref().map(decode_dt).transpose()?,
      registered_until: self.registered_until.as_deref().map(decode_dt).transpose()?,
      alert:            AlertSettings {
        enabled:      self.alert_enabled,
        mail_subject: self.alert_mail_subject,
        mail_to:      self.alert_mail_to,
        mail_from:    self.alert_mail_from,
        mail_cc:      self.alert_mail_cc,
      },
    })
  }
}

pub const SHIFT_COLUMNS: &str =
  "shift_id, starts, ends, label, accept_chime_repeats, reject_chime_repeats";

/// Shifts hold no encoded columns, so rows map straight to the domain type.
pub fn shift_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Shift> {
  Ok(Shift {
    id:                   row.get(0)?,
    starts:               row.get(1)?,
    ends:                 row.get(2)?,
    label:                row.get(3)?,
    accept_chime_repeats: row.get(4)?,
    reject_chime_repeats: row.get(5)?,
  })
}

pub const DISPATCH_COLUMNS: &str = "dispatch_id, diner_id, shift_id, registered_at, \
   identification, quantity, unit_cost, active, dispatched, handed_out_at, origin";

/// Raw values read directly from a `dispatches` row.
pub struct RawDispatch {
  pub dispatch_id:    i64,
  pub diner_id:       i64,
  pub shift_id:       i64,
  pub registered_at:  String,
  pub identification: String,
  pub quantity:       i64,
  pub unit_cost:      f64,
  pub active:         bool,
  pub dispatched:     bool,
  pub handed_out_at:  Option<String>,
  pub origin:         String,
}

impl RawDispatch {
  /// Map a row selected with [`DISPATCH_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      dispatch_id:    row.get(0)?,
      diner_id:       row.get(1)?,
      shift_id:       row.get(2)?,
      registered_at:  row.get(3)?,
      identification: row.get(4)?,
      quantity:       row.get(5)?,
      unit_cost:      row.get(6)?,
      active:         row.get(7)?,
      dispatched:     row.get(8)?,
      handed_out_at:  row.get(9)?,
      origin:         row.get(10)?,
    })
  }

  pub fn into_dispatch(self) -> Result<Dispatch> {
    Ok(Dispatch {
      id:             self.dispatch_id,
      diner_id:       self.diner_id,
      shift_id:       self.shift_id,
      registered_at:  decode_dt(&self.registered_at)?,
      identification: self.identification,
      quantity:       self.quantity,
      unit_cost:      self.unit_cost,
      active:         self.active,
      dispatched:     self.dispatched,
      handed_out_at:  self.handed_out_at.as_deref().map(decode_dt).transpose()?,
      origin:         decode_origin(&self.origin)?,
    })
  }
}
