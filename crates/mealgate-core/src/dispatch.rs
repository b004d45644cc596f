//! Dispatch records: one meal issued (or reserved) to a diner for a shift
//! on a calendar date.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Quantity recorded for a checkpoint dispatch.
pub const DEFAULT_QUANTITY: i64 = 1;

/// Unit cost recorded for a checkpoint dispatch.
pub const DEFAULT_UNIT_COST: f64 = 1.0;

/// Who created the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOrigin {
  /// Entered manually by staff.
  Administration,
  /// Created by the verification checkpoint.
  Verification,
}

/// The duplicate-prevention key: at most one active dispatch may exist per
/// `(diner, shift, date)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DispatchKey {
  pub diner_id: i64,
  pub shift_id: i64,
  pub date:     NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispatch {
  pub id:             i64,
  pub diner_id:       i64,
  pub shift_id:       i64,
  pub registered_at:  NaiveDateTime,
  /// Copy taken at creation so audits survive later edits to the diner.
  pub identification: String,
  pub quantity:       i64,
  pub unit_cost:      f64,
  /// `false` once annulled.
  pub active:         bool,
  pub dispatched:     bool,
  pub handed_out_at:  Option<NaiveDateTime>,
  pub origin:         DispatchOrigin,
}

impl Dispatch {
  pub fn key(&self) -> DispatchKey {
    DispatchKey {
      diner_id: self.diner_id,
      shift_id: self.shift_id,
      date:     self.registered_at.date(),
    }
  }
}

/// Input to [`crate::store::DispatchStore::insert_dispatch`]. The id is
/// assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDispatch {
  pub diner_id:       i64,
  pub shift_id:       i64,
  pub registered_at:  NaiveDateTime,
  pub identification: String,
  pub quantity:       i64,
  pub unit_cost:      f64,
  pub origin:         DispatchOrigin,
}

impl NewDispatch {
  pub fn key(&self) -> DispatchKey {
    DispatchKey {
      diner_id: self.diner_id,
      shift_id: self.shift_id,
      date:     self.registered_at.date(),
    }
  }
}

/// Staff-entered dispatch. Origin is always [`DispatchOrigin::Administration`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ManualDispatch {
  pub diner_id:       i64,
  pub shift_id:       i64,
  /// Defaults to the current time.
  #[serde(default)]
  pub registered_at:  Option<NaiveDateTime>,
  pub identification: String,
  pub quantity:       i64,
  #[serde(default = "default_unit_cost")]
  pub unit_cost:      f64,
}

fn default_unit_cost() -> f64 { DEFAULT_UNIT_COST }

/// Administrative edit of an existing dispatch. Status flags other than
/// `active` are changed through their own operations.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DispatchUpdate {
  pub diner_id:       i64,
  pub shift_id:       i64,
  pub registered_at:  NaiveDateTime,
  pub identification: String,
  pub quantity:       i64,
  pub unit_cost:      f64,
  pub active:         bool,
}

impl DispatchUpdate {
  pub(crate) fn apply(self, dispatch: &mut Dispatch) {
    dispatch.diner_id = self.diner_id;
    dispatch.shift_id = self.shift_id;
    dispatch.registered_at = self.registered_at;
    dispatch.identification = self.identification;
    dispatch.quantity = self.quantity;
    dispatch.unit_cost = self.unit_cost;
    dispatch.active = self.active;
  }
}
