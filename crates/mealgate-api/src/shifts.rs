//! `GET /shifts`: configured meal windows in matching order.

use axum::{Json, extract::State};
use mealgate_core::{
  shift::Shift,
  store::{DinerStore, DispatchStore, ShiftStore},
};

use crate::{AppState, error::ApiError};

pub async fn list<S>(State(state): State<AppState<S>>) -> Result<Json<Vec<Shift>>, ApiError>
where
  S: DinerStore + ShiftStore + DispatchStore,
{
  let shifts = state.store.list_shifts().await.map_err(ApiError::store)?;
  Ok(Json(shifts))
}
