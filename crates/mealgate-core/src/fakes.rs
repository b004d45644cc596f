//! In-memory collaborators for engine tests.

use std::{
  collections::HashMap,
  sync::{
    Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
  },
  time::Duration,
};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

use crate::{
  diner::{Diner, NewDiner, RosterEntry, normalize_identification},
  dispatch::{Dispatch, NewDispatch},
  notify::{DispatchEvent, Publisher},
  shift::Shift,
  store::{
    DinerStore, DirectoryProvider, DispatchStore, ProviderError, ShiftStore, Store,
    WriteOutcome,
  },
};

#[derive(Debug, Error)]
#[error("memory store unavailable")]
pub struct Unavailable;

#[derive(Default)]
struct Tables {
  diners:     Vec<Diner>,
  shifts:     Vec<Shift>,
  dispatches: Vec<Dispatch>,
}

/// Mirrors the SQLite backend's constraints: unique normalized
/// identification, and one active dispatch per (diner, shift, date).
#[derive(Default)]
pub struct MemoryStore {
  tables:  Mutex<Tables>,
  offline: AtomicBool,
}

impl MemoryStore {
  pub fn with_shifts(shifts: Vec<Shift>) -> Self {
    let store = Self::default();
    store.tables.lock().unwrap().shifts = shifts;
    store
  }

  pub fn set_offline(&self, offline: bool) { self.offline.store(offline, Ordering::SeqCst) }

  pub fn diners(&self) -> Vec<Diner> { self.tables.lock().unwrap().diners.clone() }

  pub fn dispatches(&self) -> Vec<Dispatch> { self.tables.lock().unwrap().dispatches.clone() }

  fn check(&self) -> Result<(), Unavailable> {
    if self.offline.load(Ordering::SeqCst) { Err(Unavailable) } else { Ok(()) }
  }
}

fn same_active_key(a: &Dispatch, b: &Dispatch) -> bool {
  a.active && b.active && a.id != b.id && a.key() == b.key()
}

impl Store for MemoryStore {
  type Error = Unavailable;
}

impl DinerStore for MemoryStore {
  async fn find_active_diner<'a>(&'a self, key: &'a str) -> Result<Option<Diner>, Unavailable> {
    self.check()?;
    let tables = self.tables.lock().unwrap();
    Ok(
      tables
        .diners
        .iter()
        .find(|d| d.active && normalize_identification(&d.identification) == key)
        .cloned(),
    )
  }

  async fn get_diner(&self, id: i64) -> Result<Option<Diner>, Unavailable> {
    self.check()?;
    Ok(self.tables.lock().unwrap().diners.iter().find(|d| d.id == id).cloned())
  }

  async fn upsert_diner(&self, input: NewDiner) -> Result<Diner, Unavailable> {
    self.check()?;
    let mut tables = self.tables.lock().unwrap();
    let key = normalize_identification(&input.identification);
    let existing = tables
      .diners
      .iter()
      .position(|d| normalize_identification(&d.identification) == key);
    let id = match existing {
      Some(i) => tables.diners[i].id,
      None => tables.diners.len() as i64 + 1,
    };
    let diner = Diner {
      id,
      identification: input.identification,
      name: input.name,
      area: input.area,
      cost_center: input.cost_center,
      note: input.note,
      active: input.active,
      registered_from: input.registered_from,
      registered_until: input.registered_until,
      alert: input.alert,
    };
    match existing {
      Some(i) => tables.diners[i] = diner.clone(),
      None => tables.diners.push(diner.clone()),
    }
    Ok(diner)
  }

  async fn deactivate_diner(&self, id: i64) -> Result<bool, Unavailable> {
    self.check()?;
    let mut tables = self.tables.lock().unwrap();
    Ok(match tables.diners.iter_mut().find(|d| d.id == id) {
      Some(d) => {
        d.active = false;
        true
      }
      None => false,
    })
  }
}

impl ShiftStore for MemoryStore {
  async fn list_shifts(&self) -> Result<Vec<Shift>, Unavailable> {
    self.check()?;
    Ok(self.tables.lock().unwrap().shifts.clone())
  }

  async fn get_shift(&self, id: i64) -> Result<Option<Shift>, Unavailable> {
    self.check()?;
    Ok(self.tables.lock().unwrap().shifts.iter().find(|s| s.id == id).cloned())
  }
}

impl DispatchStore for MemoryStore {
  async fn get_dispatch(&self, id: i64) -> Result<Option<Dispatch>, Unavailable> {
    self.check()?;
    Ok(self.tables.lock().unwrap().dispatches.iter().find(|d| d.id == id).cloned())
  }

  async fn find_active_dispatch(
    &self,
    diner_id: i64,
    shift_id: i64,
    date: NaiveDate,
  ) -> Result<Option<Dispatch>, Unavailable> {
    self.check()?;
    let tables = self.tables.lock().unwrap();
    Ok(
      tables
        .dispatches
        .iter()
        .find(|d| {
          d.active
            && d.diner_id == diner_id
            && d.shift_id == shift_id
            && d.registered_at.date() == date
        })
        .cloned(),
    )
  }

  async fn pending_dispatches(&self) -> Result<Vec<Dispatch>, Unavailable> {
    self.check()?;
    let tables = self.tables.lock().unwrap();
    Ok(
      tables
        .dispatches
        .iter()
        .filter(|d| d.active && !d.dispatched)
        .cloned()
        .collect(),
    )
  }

  async fn insert_dispatch(&self, input: NewDispatch) -> Result<Option<Dispatch>, Unavailable> {
    self.check()?;
    let mut tables = self.tables.lock().unwrap();
    let dispatch = Dispatch {
      id:             tables.dispatches.iter().map(|d| d.id).max().unwrap_or(0) + 1,
      diner_id:       input.diner_id,
      shift_id:       input.shift_id,
      registered_at:  input.registered_at,
      identification: input.identification,
      quantity:       input.quantity,
      unit_cost:      input.unit_cost,
      active:         true,
      dispatched:     false,
      handed_out_at:  None,
      origin:         input.origin,
    };
    if tables.dispatches.iter().any(|d| same_active_key(d, &dispatch)) {
      return Ok(None);
    }
    tables.dispatches.push(dispatch.clone());
    Ok(Some(dispatch))
  }

  async fn update_dispatch(&self, dispatch: Dispatch) -> Result<WriteOutcome, Unavailable> {
    self.check()?;
    let mut tables = self.tables.lock().unwrap();
    if tables.dispatches.iter().any(|d| same_active_key(d, &dispatch)) {
      return Ok(WriteOutcome::Conflict);
    }
    Ok(match tables.dispatches.iter_mut().find(|d| d.id == dispatch.id) {
      Some(slot) => {
        *slot = dispatch;
        WriteOutcome::Written
      }
      None => WriteOutcome::Missing,
    })
  }

  async fn set_dispatch_active(&self, id: i64, active: bool) -> Result<WriteOutcome, Unavailable> {
    self.check()?;
    let mut tables = self.tables.lock().unwrap();
    let Some(current) = tables.dispatches.iter().find(|d| d.id == id).cloned() else {
      return Ok(WriteOutcome::Missing);
    };
    let updated = Dispatch { active, ..current };
    if tables.dispatches.iter().any(|d| same_active_key(d, &updated)) {
      return Ok(WriteOutcome::Conflict);
    }
    if let Some(slot) = tables.dispatches.iter_mut().find(|d| d.id == id) {
      slot.active = active;
    }
    Ok(WriteOutcome::Written)
  }

  async fn mark_handed_out(&self, id: i64, at: NaiveDateTime) -> Result<bool, Unavailable> {
    self.check()?;
    let mut tables = self.tables.lock().unwrap();
    Ok(match tables.dispatches.iter_mut().find(|d| d.id == id) {
      Some(d) => {
        d.dispatched = true;
        d.handed_out_at = Some(at);
        true
      }
      None => false,
    })
  }

  async fn delete_dispatch(&self, id: i64) -> Result<bool, Unavailable> {
    self.check()?;
    let mut tables = self.tables.lock().unwrap();
    let before = tables.dispatches.len();
    tables.dispatches.retain(|d| d.id != id);
    Ok(tables.dispatches.len() != before)
  }
}

// ─── Providers ───────────────────────────────────────────────────────────────

/// A fixed roster. `failing` providers always error; `delay` simulates a
/// slow upstream.
pub struct StaticProvider {
  pub name:    &'static str,
  pub entries: HashMap<String, RosterEntry>,
  pub failing: bool,
  pub delay:   Option<Duration>,
  pub lookups: AtomicUsize,
}

impl StaticProvider {
  pub fn new(name: &'static str, entries: Vec<RosterEntry>) -> Self {
    Self {
      name,
      entries: entries
        .into_iter()
        .map(|e| (e.identification.clone(), e))
        .collect(),
      failing: false,
      delay: None,
      lookups: AtomicUsize::new(0),
    }
  }
}

#[async_trait]
impl DirectoryProvider for StaticProvider {
  fn name(&self) -> &str { self.name }

  async fn lookup(&self, identification: &str) -> Result<Option<RosterEntry>, ProviderError> {
    self.lookups.fetch_add(1, Ordering::SeqCst);
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
    if self.failing {
      return Err(format!("{} unreachable", self.name).into());
    }
    Ok(self.entries.get(identification).cloned())
  }
}

// ─── Publisher ───────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingPublisher {
  pub events: Mutex<Vec<DispatchEvent>>,
}

impl RecordingPublisher {
  pub fn events(&self) -> Vec<DispatchEvent> { self.events.lock().unwrap().clone() }
}

impl Publisher for RecordingPublisher {
  fn publish(&self, event: DispatchEvent) { self.events.lock().unwrap().push(event) }
}
