//! The dispatch ledger: creation, status transitions and the
//! one-active-dispatch-per-(diner, shift, day) invariant.
//!
//! The invariant is enforced twice. Check-then-insert runs under a per-key
//! lock so concurrent requests in this process queue up, and the store's own
//! uniqueness constraint rejects anything that slips past (another process,
//! a direct write).
//!
//! Annulment and hand-out change only their own columns in the store, and
//! every change to one record runs under that record's lock, so concurrent
//! transitions never overwrite each other.

use std::{collections::HashMap, sync::Arc};

use chrono::{NaiveDate, NaiveDateTime};

use crate::{
  Error, Result,
  error::Entity,
  dispatch::{
    DEFAULT_QUANTITY, DEFAULT_UNIT_COST, Dispatch, DispatchKey, DispatchOrigin,
    DispatchUpdate, ManualDispatch, NewDispatch,
  },
  keyed_lock::KeyedLocks,
  notify::DispatchEvent,
  shift::Shift,
  store::{Clock, DinerStore, DispatchStore, ShiftStore, WriteOutcome},
};

pub struct Ledger<S> {
  store:            Arc<S>,
  /// Serializes check-then-insert per (diner, shift, date).
  locks:            KeyedLocks<DispatchKey>,
  /// Serializes edits and transitions of one record.
  records:          KeyedLocks<i64>,
  pub(crate) clock: Arc<dyn Clock>,
}

impl<S> Ledger<S>
where
  S: DinerStore + ShiftStore + DispatchStore,
{
  pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
    Self { store, locks: KeyedLocks::new(), records: KeyedLocks::new(), clock }
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  pub async fn get(&self, id: i64) -> Result<Option<Dispatch>> {
    self.store.get_dispatch(id).await.map_err(Error::storage)
  }

  /// Whether an active dispatch exists for the diner and shift on `date`.
  /// Time of day is ignored.
  pub async fn has_active_dispatch(
    &self,
    diner_id: i64,
    shift_id: i64,
    date: NaiveDate,
  ) -> Result<bool> {
    Ok(
      self
        .store
        .find_active_dispatch(diner_id, shift_id, date)
        .await
        .map_err(Error::storage)?
        .is_some(),
    )
  }

  /// Pending dispatches projected for display, for screens that connect
  /// after the live events were sent.
  pub async fn pending(&self) -> Result<Vec<DispatchEvent>> {
    let dispatches = self.store.pending_dispatches().await.map_err(Error::storage)?;
    let shifts: HashMap<i64, Shift> = self
      .store
      .list_shifts()
      .await
      .map_err(Error::storage)?
      .into_iter()
      .map(|s| (s.id, s))
      .collect();

    let mut diners = HashMap::new();
    let mut events = Vec::with_capacity(dispatches.len());
    for dispatch in &dispatches {
      if !diners.contains_key(&dispatch.diner_id) {
        let diner = self
          .store
          .get_diner(dispatch.diner_id)
          .await
          .map_err(Error::storage)?;
        diners.insert(dispatch.diner_id, diner);
      }
      let diner = diners.get(&dispatch.diner_id).and_then(Option::as_ref);
      events.push(DispatchEvent::project(dispatch, diner, shifts.get(&dispatch.shift_id)));
    }
    Ok(events)
  }

  // ── Creation ──────────────────────────────────────────────────────────────

  /// Record a checkpoint dispatch for the given shift, registered now.
  ///
  /// Fails with [`Error::NoActiveShift`] when `shift` is `None` and with
  /// [`Error::DuplicateDispatch`] when the diner was already served.
  pub async fn create_from_verification(
    &self,
    diner_id: i64,
    identification: &str,
    shift: Option<&Shift>,
  ) -> Result<Dispatch> {
    self
      .create_from_verification_at(diner_id, identification, shift, self.clock.now())
      .await
  }

  pub(crate) async fn create_from_verification_at(
    &self,
    diner_id: i64,
    identification: &str,
    shift: Option<&Shift>,
    now: NaiveDateTime,
  ) -> Result<Dispatch> {
    let shift = shift.ok_or(Error::NoActiveShift)?;
    self
      .insert_exclusive(NewDispatch {
        diner_id,
        shift_id: shift.id,
        registered_at: now,
        identification: identification.to_owned(),
        quantity: DEFAULT_QUANTITY,
        unit_cost: DEFAULT_UNIT_COST,
        origin: DispatchOrigin::Verification,
      })
      .await
  }

  /// Record a staff-entered dispatch. Never broadcast.
  pub async fn create_manual(&self, input: ManualDispatch) -> Result<Dispatch> {
    if input.identification.trim().is_empty() {
      return Err(Error::InvalidInput("identification is required".into()));
    }
    if input.quantity <= 0 {
      return Err(Error::InvalidInput("quantity must be positive".into()));
    }
    self.ensure_references(input.diner_id, input.shift_id).await?;

    self
      .insert_exclusive(NewDispatch {
        diner_id:       input.diner_id,
        shift_id:       input.shift_id,
        registered_at:  input.registered_at.unwrap_or_else(|| self.clock.now()),
        identification: input.identification,
        quantity:       input.quantity,
        unit_cost:      input.unit_cost,
        origin:         DispatchOrigin::Administration,
      })
      .await
  }

  async fn insert_exclusive(&self, input: NewDispatch) -> Result<Dispatch> {
    let key = input.key();
    let _guard = self.locks.lock(key).await;

    if self
      .has_active_dispatch(key.diner_id, key.shift_id, key.date)
      .await?
    {
      return Err(Error::DuplicateDispatch);
    }

    match self.store.insert_dispatch(input).await.map_err(Error::storage)? {
      Some(dispatch) => {
        tracing::info!(
          dispatch_id = dispatch.id,
          diner_id = dispatch.diner_id,
          shift_id = dispatch.shift_id,
          origin = ?dispatch.origin,
          "dispatch recorded"
        );
        Ok(dispatch)
      }
      None => {
        tracing::warn!(?key, "store rejected duplicate dispatch");
        Err(Error::DuplicateDispatch)
      }
    }
  }

  async fn ensure_references(&self, diner_id: i64, shift_id: i64) -> Result<()> {
    if self
      .store
      .get_diner(diner_id)
      .await
      .map_err(Error::storage)?
      .is_none()
    {
      return Err(Error::NotFound(Entity::Diner, diner_id));
    }
    if self
      .store
      .get_shift(shift_id)
      .await
      .map_err(Error::storage)?
      .is_none()
    {
      return Err(Error::NotFound(Entity::Shift, shift_id));
    }
    Ok(())
  }

  // ── Transitions ───────────────────────────────────────────────────────────

  /// Apply an administrative edit. Returns `None` if the dispatch does not
  /// exist; changed diner or shift references must exist.
  pub async fn update(&self, id: i64, edit: DispatchUpdate) -> Result<Option<Dispatch>> {
    let _record = self.records.lock(id).await;
    let Some(mut dispatch) = self.get(id).await? else {
      return Ok(None);
    };

    if dispatch.diner_id != edit.diner_id
      && self
        .store
        .get_diner(edit.diner_id)
        .await
        .map_err(Error::storage)?
        .is_none()
    {
      return Err(Error::NotFound(Entity::Diner, edit.diner_id));
    }
    if dispatch.shift_id != edit.shift_id
      && self
        .store
        .get_shift(edit.shift_id)
        .await
        .map_err(Error::storage)?
        .is_none()
    {
      return Err(Error::NotFound(Entity::Shift, edit.shift_id));
    }

    edit.apply(&mut dispatch);
    let key = dispatch.key();
    let _guard = self.locks.lock(key).await;

    if dispatch.active {
      let holder = self
        .store
        .find_active_dispatch(key.diner_id, key.shift_id, key.date)
        .await
        .map_err(Error::storage)?;
      if holder.is_some_and(|other| other.id != id) {
        return Err(Error::DuplicateDispatch);
      }
    }

    match self
      .store
      .update_dispatch(dispatch.clone())
      .await
      .map_err(Error::storage)?
    {
      WriteOutcome::Written => {
        tracing::info!(dispatch_id = id, "dispatch edited");
        Ok(Some(dispatch))
      }
      WriteOutcome::Missing => Ok(None),
      WriteOutcome::Conflict => Err(Error::DuplicateDispatch),
    }
  }

  /// Mark a dispatch as handed out now. Calling it again overwrites the
  /// hand-out time.
  pub async fn mark_dispatched(&self, id: i64) -> Result<Dispatch> {
    let _record = self.records.lock(id).await;
    let at = self.clock.now();
    if !self
      .store
      .mark_handed_out(id, at)
      .await
      .map_err(Error::storage)?
    {
      return Err(Error::NotFound(Entity::Dispatch, id));
    }
    tracing::info!(dispatch_id = id, "dispatch handed out");

    self.get(id).await?.ok_or(Error::NotFound(Entity::Dispatch, id))
  }

  /// Annul a dispatch. The record is kept but no longer counts toward the
  /// duplicate check. Returns `false` if it does not exist.
  pub async fn annul(&self, id: i64) -> Result<bool> {
    let _record = self.records.lock(id).await;
    match self
      .store
      .set_dispatch_active(id, false)
      .await
      .map_err(Error::storage)?
    {
      WriteOutcome::Written => {
        tracing::info!(dispatch_id = id, "dispatch annulled");
        Ok(true)
      }
      WriteOutcome::Missing => Ok(false),
      WriteOutcome::Conflict => Err(Error::DuplicateDispatch),
    }
  }

  /// Hard-delete a dispatch. Returns `false` if it does not exist.
  pub async fn delete(&self, id: i64) -> Result<bool> {
    let _record = self.records.lock(id).await;
    let deleted = self.store.delete_dispatch(id).await.map_err(Error::storage)?;
    if deleted {
      tracing::info!(dispatch_id = id, "dispatch deleted");
    }
    Ok(deleted)
  }
}
