//! Storage and collaborator traits consumed by the engine.
//!
//! Storage backends (e.g. `mealgate-store-sqlite`) implement [`DinerStore`],
//! [`ShiftStore`] and [`DispatchStore`]; the engine depends on these
//! abstractions, never on a concrete backend.

use std::future::Future;

use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveDateTime};

use crate::{
  diner::{Diner, NewDiner, RosterEntry},
  dispatch::{Dispatch, NewDispatch},
  shift::Shift,
};

// ─── Backend ─────────────────────────────────────────────────────────────────

/// Common supertrait carrying the backend's error type.
///
/// All methods return `Send` futures so stores can be shared across a
/// multi-threaded runtime (e.g. tokio with `axum`).
pub trait Store: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;
}

/// Result of a write that is subject to the duplicate-dispatch constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
  Written,
  /// No record with that id.
  Missing,
  /// Another active dispatch already holds the same (diner, shift, date).
  Conflict,
}

// ─── Diners ──────────────────────────────────────────────────────────────────

pub trait DinerStore: Store {
  /// The active diner whose normalized identification equals `key`.
  fn find_active_diner<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<Diner>, Self::Error>> + Send + 'a;

  fn get_diner(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Diner>, Self::Error>> + Send + '_;

  /// Insert or overwrite the diner with the same normalized identification.
  /// Returns the stored record.
  fn upsert_diner(
    &self,
    input: NewDiner,
  ) -> impl Future<Output = Result<Diner, Self::Error>> + Send + '_;

  /// Clear the activity flag. Returns `false` if no such diner exists.
  fn deactivate_diner(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

// ─── Shifts ──────────────────────────────────────────────────────────────────

pub trait ShiftStore: Store {
  /// All shifts in configured order.
  fn list_shifts(
    &self,
  ) -> impl Future<Output = Result<Vec<Shift>, Self::Error>> + Send + '_;

  fn get_shift(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Shift>, Self::Error>> + Send + '_;
}

// ─── Dispatches ──────────────────────────────────────────────────────────────

pub trait DispatchStore: Store {
  fn get_dispatch(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Dispatch>, Self::Error>> + Send + '_;

  /// The active dispatch for `(diner, shift)` registered on `date`, if any.
  fn find_active_dispatch(
    &self,
    diner_id: i64,
    shift_id: i64,
    date: NaiveDate,
  ) -> impl Future<Output = Result<Option<Dispatch>, Self::Error>> + Send + '_;

  /// Active dispatches not yet handed out, oldest first.
  fn pending_dispatches(
    &self,
  ) -> impl Future<Output = Result<Vec<Dispatch>, Self::Error>> + Send + '_;

  /// Persist a new active, not-dispatched record.
  ///
  /// Returns `None` when the store's uniqueness constraint rejects it because
  /// an active dispatch already exists for the same key.
  fn insert_dispatch(
    &self,
    input: NewDispatch,
  ) -> impl Future<Output = Result<Option<Dispatch>, Self::Error>> + Send + '_;

  /// Overwrite every mutable column of an existing record.
  fn update_dispatch(
    &self,
    dispatch: Dispatch,
  ) -> impl Future<Output = Result<WriteOutcome, Self::Error>> + Send + '_;

  /// Set only the activity flag, leaving every other column as stored.
  fn set_dispatch_active(
    &self,
    id: i64,
    active: bool,
  ) -> impl Future<Output = Result<WriteOutcome, Self::Error>> + Send + '_;

  /// Set the dispatched flag and hand-out time, leaving every other column
  /// as stored. Returns `false` if no such dispatch exists.
  fn mark_handed_out(
    &self,
    id: i64,
    at: NaiveDateTime,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Returns `false` if no such dispatch exists.
  fn delete_dispatch(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}

// ─── Reference sources ───────────────────────────────────────────────────────

pub type ProviderError = Box<dyn std::error::Error + Send + Sync>;

/// A read-only external directory (reservations, payroll, ...) consulted
/// when a diner is not known locally. Providers are held in an ordered list
/// and queried until one answers.
#[async_trait]
pub trait DirectoryProvider: Send + Sync {
  /// Short name used in logs.
  fn name(&self) -> &str;

  async fn lookup(
    &self,
    identification: &str,
  ) -> Result<Option<RosterEntry>, ProviderError>;
}

// ─── Clock ───────────────────────────────────────────────────────────────────

/// Source of the local wall-clock time. Shifts and calendar days are
/// evaluated in the checkpoint's local time.
pub trait Clock: Send + Sync {
  fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> NaiveDateTime { Local::now().naive_local() }
}

/// A clock that only moves when told to. Used by tests and replay tooling.
#[derive(Debug)]
pub struct FixedClock(std::sync::Mutex<NaiveDateTime>);

impl FixedClock {
  pub fn new(at: NaiveDateTime) -> Self { Self(std::sync::Mutex::new(at)) }

  pub fn set(&self, at: NaiveDateTime) {
    *self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = at;
  }
}

impl Clock for FixedClock {
  fn now(&self) -> NaiveDateTime {
    *self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
  }
}
