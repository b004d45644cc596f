//! Handler for the checkpoint terminal.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/verify/:identification` | 200 with the diner, 404 with the rejection reason |

use axum::{
  Json,
  extract::{Path, State},
};
use mealgate_core::{
  diner::Diner,
  store::{DinerStore, DispatchStore, ShiftStore},
};

use crate::{AppState, error::ApiError};

/// `GET /verify/:identification`
pub async fn handler<S>(
  State(state): State<AppState<S>>,
  Path(identification): Path<String>,
) -> Result<Json<Diner>, ApiError>
where
  S: DinerStore + ShiftStore + DispatchStore,
{
  if identification.trim().is_empty() {
    return Err(ApiError::BadRequest("identification is required".into()));
  }

  let verification = state.checkpoint.verify_and_dispatch(&identification).await?;
  match verification.diner {
    Some(diner) => Ok(Json(diner)),
    None => Err(ApiError::NotFound(verification.reason.unwrap_or_default())),
  }
}
