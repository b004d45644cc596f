//! `GET /events`: live dispatch events for kitchen displays, as
//! Server-Sent Events.
//!
//! Each event's `data` is a JSON [`DispatchEvent`]. Delivery is at most
//! once; a display that falls behind gets a `lagged` comment and resumes with
//! the newest events. Displays that connect late should first read
//! `/dispatches/pending`.

use std::{convert::Infallible, time::Duration};

use axum::{
  extract::State,
  response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::{self, Stream};
use mealgate_core::{
  notify::DispatchEvent,
  store::{DinerStore, DispatchStore, ShiftStore},
};
use tokio::sync::broadcast::error::RecvError;

use crate::AppState;

fn to_sse(event: &DispatchEvent) -> Event {
  match Event::default()
    .event("dispatch")
    .id(event.event_id.to_string())
    .json_data(event)
  {
    Ok(sse) => sse,
    Err(e) => {
      tracing::warn!(error = %e, dispatch_id = event.dispatch_id, "unencodable dispatch event");
      Event::default().comment("unencodable event")
    }
  }
}

pub async fn stream<S>(
  State(state): State<AppState<S>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
  S: DinerStore + ShiftStore + DispatchStore,
{
  let rx = state.events.subscribe();
  tracing::debug!(subscribers = state.events.subscriber_count(), "display connected");

  let stream = stream::unfold(rx, |mut rx| async move {
    match rx.recv().await {
      Ok(event) => Some((Ok(to_sse(&event)), rx)),
      Err(RecvError::Lagged(skipped)) => {
        tracing::warn!(skipped, "display lagged behind the event stream");
        Some((Ok(Event::default().comment("lagged")), rx))
      }
      Err(RecvError::Closed) => None,
    }
  });

  Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
}
