//! JSON REST API for the Mealgate checkpoint.
//!
//! Exposes an axum [`Router`] over a [`Checkpoint`] and the store behind it.
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", mealgate_api::api_router(state))
//! ```

pub mod diners;
pub mod dispatches;
pub mod error;
pub mod events;
pub mod shifts;
pub mod verify;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use mealgate_core::{
  Checkpoint,
  notify::Broadcaster,
  store::{DinerStore, DispatchStore, ShiftStore},
};

pub use error::ApiError;

/// Shared handler state.
pub struct AppState<S> {
  pub checkpoint: Arc<Checkpoint<S>>,
  pub store:      Arc<S>,
  /// The same broadcaster the checkpoint publishes to.
  pub events:     Broadcaster,
}

// `S` itself need not be `Clone`.
impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      checkpoint: Arc::clone(&self.checkpoint),
      store:      Arc::clone(&self.store),
      events:     self.events.clone(),
    }
  }
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: DinerStore + ShiftStore + DispatchStore + 'static,
{
  Router::new()
    // Checkpoint
    .route("/verify/{identification}", get(verify::handler::<S>))
    // Dispatches
    .route("/dispatches", post(dispatches::create::<S>))
    .route("/dispatches/pending", get(dispatches::pending::<S>))
    .route(
      "/dispatches/{id}",
      get(dispatches::get_one::<S>)
        .put(dispatches::update::<S>)
        .delete(dispatches::delete_one::<S>),
    )
    .route("/dispatches/{id}/dispatched", post(dispatches::mark_dispatched::<S>))
    .route("/dispatches/{id}/annul", post(dispatches::annul::<S>))
    // Diners
    .route("/diners", put(diners::upsert::<S>))
    .route("/diners/{id}", get(diners::get_one::<S>))
    .route("/diners/{id}/deactivate", post(diners::deactivate::<S>))
    // Shifts
    .route("/shifts", get(shifts::list::<S>))
    // Displays
    .route("/events", get(events::stream::<S>))
    .with_state(state)
}
