//! [`SqliteStore`], the SQLite implementation of the Mealgate store traits.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::OptionalExtension as _;

use mealgate_core::{
  diner::{Diner, NewDiner, RosterEntry, normalize_identification},
  dispatch::{Dispatch, NewDispatch},
  shift::Shift,
  store::{DinerStore, DispatchStore, ShiftStore, Store, WriteOutcome},
};

use crate::{
  Error, Result,
  encode::{
    DINER_COLUMNS, DISPATCH_COLUMNS, RawDiner, RawDispatch, SHIFT_COLUMNS, encode_date,
    encode_dt, encode_origin, shift_from_row,
  },
  roster::RosterSource,
  schema::SCHEMA,
};

/// Whether `e` is a violation of a UNIQUE constraint or index.
fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(err, _)
      if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Mealgate store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    tracing::debug!(path = %path.display(), "opened sqlite store");
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Administration ────────────────────────────────────────────────────────

  /// Insert or replace a shift definition. Shifts are matched in id order.
  pub async fn add_shift(&self, shift: Shift) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO shifts (shift_id, starts, ends, label, accept_chime_repeats, reject_chime_repeats)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT(shift_id) DO UPDATE SET
             starts = excluded.starts,
             ends = excluded.ends,
             label = excluded.label,
             accept_chime_repeats = excluded.accept_chime_repeats,
             reject_chime_repeats = excluded.reject_chime_repeats",
          rusqlite::params![
            shift.id,
            shift.starts,
            shift.ends,
            shift.label,
            shift.accept_chime_repeats,
            shift.reject_chime_repeats,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Insert or replace an entry in one of the reference rosters.
  pub async fn add_roster_entry(&self, source: RosterSource, entry: RosterEntry) -> Result<()> {
    let sql = format!(
      "INSERT OR REPLACE INTO {} (identification, name, area, cost_center, note)
       VALUES (?1, ?2, ?3, ?4, ?5)",
      source.table()
    );
    self
      .conn
      .call(move |conn| {
        conn.execute(
          &sql,
          rusqlite::params![
            entry.identification,
            entry.name,
            entry.area,
            entry.cost_center,
            entry.note,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub(crate) async fn roster_lookup(
    &self,
    source: RosterSource,
    identification: &str,
  ) -> Result<Option<RosterEntry>> {
    let sql = format!(
      "SELECT identification, name, area, cost_center, note FROM {} WHERE identification = ?1",
      source.table()
    );
    let identification = identification.to_owned();

    let entry = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(&sql, rusqlite::params![identification], |row| {
            Ok(RosterEntry {
              identification: row.get(0)?,
              name:           row.get(1)?,
              area:           row.get(2)?,
              cost_center:    row.get(3)?,
              note:           row.get(4)?,
            })
          })
          .optional()?)
      })
      .await?;
    Ok(entry)
  }

  async fn diner_where(&self, clause: &'static str, param: rusqlite::types::Value) -> Result<Option<Diner>> {
    let sql = format!("SELECT {DINER_COLUMNS} FROM diners WHERE {clause}");

    let raw: Option<RawDiner> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(&sql, rusqlite::params![param], RawDiner::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDiner::into_diner).transpose()
  }

  async fn dispatches_where(
    &self,
    clause: &'static str,
    params: Vec<rusqlite::types::Value>,
  ) -> Result<Vec<Dispatch>> {
    let sql = format!("SELECT {DISPATCH_COLUMNS} FROM dispatches WHERE {clause}");

    let raws: Vec<RawDispatch> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawDispatch::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDispatch::into_dispatch).collect()
  }
}

impl Store for SqliteStore {
  type Error = Error;
}

// ─── Diners ──────────────────────────────────────────────────────────────────

impl DinerStore for SqliteStore {
  async fn find_active_diner<'a>(&'a self, key: &'a str) -> Result<Option<Diner>> {
    self
      .diner_where("identification_key = ?1 AND active = 1", key.to_owned().into())
      .await
  }

  async fn get_diner(&self, id: i64) -> Result<Option<Diner>> {
    self.diner_where("diner_id = ?1", id.into()).await
  }

  async fn upsert_diner(&self, input: NewDiner) -> Result<Diner> {
    let key              = normalize_identification(&input.identification);
    let registered_from  = input.registered_from.map(encode_dt);
    let registered_until = input.registered_until.map(encode_dt);

    let raw: RawDiner = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO diners (
             identification, identification_key, name, area, cost_center, note,
             active, registered_from, registered_until, alert_enabled,
             alert_mail_subject, alert_mail_to, alert_mail_from, alert_mail_cc
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
           ON CONFLICT(identification_key) DO UPDATE SET
             identification     = excluded.identification,
             name               = excluded.name,
             area               = excluded.area,
             cost_center        = excluded.cost_center,
             note               = excluded.note,
             active             = excluded.active,
             registered_from    = excluded.registered_from,
             registered_until   = excluded.registered_until,
             alert_enabled      = excluded.alert_enabled,
             alert_mail_subject = excluded.alert_mail_subject,
             alert_mail_to      = excluded.alert_mail_to,
             alert_mail_from    = excluded.alert_mail_from,
             alert_mail_cc      = excluded.alert_mail_cc",
          rusqlite::params![
            input.identification,
            key,
            input.name,
            input.area,
            input.cost_center,
            input.note,
            input.active,
            registered_from,
            registered_until,
            input.alert.enabled,
            input.alert.mail_subject,
            input.alert.mail_to,
            input.alert.mail_from,
            input.alert.mail_cc,
          ],
        )?;
        let raw = tx.query_row(
          &format!("SELECT {DINER_COLUMNS} FROM diners WHERE identification_key = ?1"),
          rusqlite::params![key],
          RawDiner::from_row,
        )?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_diner()
  }

  async fn deactivate_diner(&self, id: i64) -> Result<bool> {
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE diners SET active = 0 WHERE diner_id = ?1",
          rusqlite::params![id],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }
}

// ─── Shifts ──────────────────────────────────────────────────────────────────

impl ShiftStore for SqliteStore {
  async fn list_shifts(&self) -> Result<Vec<Shift>> {
    let shifts = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare(&format!("SELECT {SHIFT_COLUMNS} FROM shifts ORDER BY shift_id"))?;
        let rows = stmt
          .query_map([], shift_from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(shifts)
  }

  async fn get_shift(&self, id: i64) -> Result<Option<Shift>> {
    let shift = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {SHIFT_COLUMNS} FROM shifts WHERE shift_id = ?1"),
              rusqlite::params![id],
              shift_from_row,
            )
            .optional()?,
        )
      })
      .await?;
    Ok(shift)
  }
}

// ─── Dispatches ──────────────────────────────────────────────────────────────

impl DispatchStore for SqliteStore {
  async fn get_dispatch(&self, id: i64) -> Result<Option<Dispatch>> {
    Ok(
      self
        .dispatches_where("dispatch_id = ?1", vec![id.into()])
        .await?
        .into_iter()
        .next(),
    )
  }

  async fn find_active_dispatch(
    &self,
    diner_id: i64,
    shift_id: i64,
    date:     NaiveDate,
  ) -> Result<Option<Dispatch>> {
    Ok(
      self
        .dispatches_where(
          "diner_id = ?1 AND shift_id = ?2 AND dispatch_date = ?3 AND active = 1",
          vec![diner_id.into(), shift_id.into(), encode_date(date).into()],
        )
        .await?
        .into_iter()
        .next(),
    )
  }

  async fn pending_dispatches(&self) -> Result<Vec<Dispatch>> {
    self
      .dispatches_where(
        "dispatched = 0 AND active = 1 ORDER BY registered_at, dispatch_id",
        Vec::new(),
      )
      .await
  }

  async fn insert_dispatch(&self, input: NewDispatch) -> Result<Option<Dispatch>> {
    let registered_at_str = encode_dt(input.registered_at);
    let date_str          = encode_date(input.registered_at.date());
    let origin_str        = encode_origin(input.origin);
    let identification    = input.identification.clone();

    let id: Option<i64> = self
      .conn
      .call(move |conn| {
        let inserted = conn.execute(
          "INSERT INTO dispatches (
             diner_id, shift_id, registered_at, dispatch_date, identification,
             quantity, unit_cost, active, dispatched, handed_out_at, origin
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, 0, NULL, ?8)",
          rusqlite::params![
            input.diner_id,
            input.shift_id,
            registered_at_str,
            date_str,
            identification,
            input.quantity,
            input.unit_cost,
            origin_str,
          ],
        );
        match inserted {
          Ok(_) => Ok(Some(conn.last_insert_rowid())),
          Err(e) if is_unique_violation(&e) => Ok(None),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    Ok(id.map(|id| Dispatch {
      id,
      diner_id: input.diner_id,
      shift_id: input.shift_id,
      registered_at: input.registered_at,
      identification: input.identification,
      quantity: input.quantity,
      unit_cost: input.unit_cost,
      active: true,
      dispatched: false,
      handed_out_at: None,
      origin: input.origin,
    }))
  }

  async fn update_dispatch(&self, dispatch: Dispatch) -> Result<WriteOutcome> {
    let registered_at_str = encode_dt(dispatch.registered_at);
    let date_str          = encode_date(dispatch.registered_at.date());
    let handed_out_str    = dispatch.handed_out_at.map(encode_dt);
    let origin_str        = encode_origin(dispatch.origin);

    let outcome = self
      .conn
      .call(move |conn| {
        let updated = conn.execute(
          "UPDATE dispatches SET
             diner_id = ?2, shift_id = ?3, registered_at = ?4, dispatch_date = ?5,
             identification = ?6, quantity = ?7, unit_cost = ?8, active = ?9,
             dispatched = ?10, handed_out_at = ?11, origin = ?12
           WHERE dispatch_id = ?1",
          rusqlite::params![
            dispatch.id,
            dispatch.diner_id,
            dispatch.shift_id,
            registered_at_str,
            date_str,
            dispatch.identification,
            dispatch.quantity,
            dispatch.unit_cost,
            dispatch.active,
            dispatch.dispatched,
            handed_out_str,
            origin_str,
          ],
        );
        match updated {
          Ok(0) => Ok(WriteOutcome::Missing),
          Ok(_) => Ok(WriteOutcome::Written),
          Err(e) if is_unique_violation(&e) => Ok(WriteOutcome::Conflict),
          Err(e) => Err(e.into()),
        }
      })
      .await?;
    Ok(outcome)
  }

  async fn set_dispatch_active(&self, id: i64, active: bool) -> Result<WriteOutcome> {
    let outcome = self
      .conn
      .call(move |conn| {
        let updated = conn.execute(
          "UPDATE dispatches SET active = ?2 WHERE dispatch_id = ?1",
          rusqlite::params![id, active],
        );
        match updated {
          Ok(0) => Ok(WriteOutcome::Missing),
          Ok(_) => Ok(WriteOutcome::Written),
          Err(e) if is_unique_violation(&e) => Ok(WriteOutcome::Conflict),
          Err(e) => Err(e.into()),
        }
      })
      .await?;
    Ok(outcome)
  }

  async fn mark_handed_out(&self, id: i64, at: NaiveDateTime) -> Result<bool> {
    let at = encode_dt(at);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE dispatches SET dispatched = 1, handed_out_at = ?2 WHERE dispatch_id = ?1",
          rusqlite::params![id, at],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  async fn delete_dispatch(&self, id: i64) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM dispatches WHERE dispatch_id = ?1",
          rusqlite::params![id],
        )?)
      })
      .await?;
    Ok(deleted > 0)
  }
}
