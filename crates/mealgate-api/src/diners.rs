//! Handlers for `/diners` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `PUT`  | `/diners` | Upsert by normalized identification |
//! | `GET`  | `/diners/:id` | 404 if not found |
//! | `POST` | `/diners/:id/deactivate` | 204 / 404 |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use mealgate_core::{
  diner::{Diner, NewDiner, normalize_identification},
  store::{DinerStore, DispatchStore, ShiftStore},
};

use crate::{AppState, error::ApiError};

/// `PUT /diners`
pub async fn upsert<S>(
  State(state): State<AppState<S>>,
  Json(body): Json<NewDiner>,
) -> Result<Json<Diner>, ApiError>
where
  S: DinerStore + ShiftStore + DispatchStore,
{
  if normalize_identification(&body.identification).is_empty() {
    return Err(ApiError::BadRequest("identification is required".into()));
  }
  if body.name.trim().is_empty() {
    return Err(ApiError::BadRequest("name is required".into()));
  }

  let diner = state.store.upsert_diner(body).await.map_err(ApiError::store)?;
  tracing::info!(diner_id = diner.id, "diner saved");
  Ok(Json(diner))
}

/// `GET /diners/:id`
pub async fn get_one<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
) -> Result<Json<Diner>, ApiError>
where
  S: DinerStore + ShiftStore + DispatchStore,
{
  let diner = state
    .store
    .get_diner(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("diner {id} not found")))?;
  Ok(Json(diner))
}

/// `POST /diners/:id/deactivate`
pub async fn deactivate<S>(
  State(state): State<AppState<S>>,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: DinerStore + ShiftStore + DispatchStore,
{
  if state.store.deactivate_diner(id).await.map_err(ApiError::store)? {
    tracing::info!(diner_id = id, "diner deactivated");
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::NotFound(format!("diner {id} not found")))
  }
}
