//! Handlers for `/dispatches` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/dispatches` | Manual entry; 400 if the diner or shift is unknown |
//! | `GET`    | `/dispatches/pending` | Not yet handed out, projected for displays |
//! | `GET`    | `/dispatches/:id` | 404 if not found |
//! | `PUT`    | `/dispatches/:id` | Full edit |
//! | `DELETE` | `/dispatches/:id` | 204 / 404 |
//! | `POST`   | `/dispatches/:id/dispatched` | Hand out now |
//! | `POST`   | `/dispatches/:id/annul` | 204 / 404 |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use mealgate_core::{
  Error as CoreError,
  dispatch::{Dispatch, DispatchUpdate, ManualDispatch},
  notify::DispatchEvent,
  store::{DinerStore, DispatchStore, ShiftStore},
};

use crate::{AppState, error::ApiError};

fn not_found(id: i64) -> ApiError { ApiError::NotFound(format!("dispatch {id} not found")) }

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /dispatches`
pub async fn create<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<ManualDispatch>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DinerStore + ShiftStore + DispatchStore,
{
  let dispatch = state
    .checkpoint
    .ledger()
    .create_manual(body)
    .await
    .map_err(|e| match e {
      // A dangling reference in the body is the caller's mistake.
      CoreError::NotFound(entity, id) => ApiError::BadRequest(format!("{entity} {id} does not exist")),
      e => e.into(),
    })?;
  Ok((StatusCode::CREATED, Json(dispatch)))
}

// ─── Reads ────────────────────────────────────────────────────────────────────

/// `GET /dispatches/pending`
pub async fn pending<S>(
  State(state): State<AppState<S>>,
) -> Result<Json<Vec<DispatchEvent>>, ApiError>
where
  S: DinerStore + ShiftStore + DispatchStore,
{
  Ok(Json(state.checkpoint.ledger().pending().await?))
}

/// `GET /dispatches/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Dispatch>, ApiError>
where
  S: DinerStore + ShiftStore + DispatchStore,
{
  let dispatch = state
    .checkpoint
    .ledger()
    .get(id)
    .await?
    .ok_or_else(|| not_found(id))?;
  Ok(Json(dispatch))
}

// ─── Transitions ──────────────────────────────────────────────────────────────

/// `PUT /dispatches/:id`
pub async fn update<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
  Json(body): Json<DispatchUpdate>,
) -> Result<Json<Dispatch>, ApiError>
where
  S: DinerStore + ShiftStore + DispatchStore,
{
  let dispatch = state
    .checkpoint
    .ledger()
    .update(id, body)
    .await?
    .ok_or_else(|| not_found(id))?;
  Ok(Json(dispatch))
}

/// `POST /dispatches/:id/dispatched`
pub async fn mark_dispatched<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Dispatch>, ApiError>
where
  S: DinerStore + ShiftStore + DispatchStore,
{
  Ok(Json(state.checkpoint.ledger().mark_dispatched(id).await?))
}

/// `POST /dispatches/:id/annul`
pub async fn annul<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: DinerStore + ShiftStore + DispatchStore,
{
  if state.checkpoint.ledger().annul(id).await? {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(not_found(id))
  }
}

/// `DELETE /dispatches/:id`
pub async fn delete_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: DinerStore + ShiftStore + DispatchStore,
{
  if state.checkpoint.ledger().delete(id).await? {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(not_found(id))
  }
}
