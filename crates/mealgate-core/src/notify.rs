//! Live dispatch notifications for kitchen and dispatch displays.
//!
//! Delivery is best-effort and at-most-once: an event goes to whoever is
//! subscribed when it is published and is never stored or retried.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{diner::Diner, dispatch::Dispatch, shift::Shift};

/// Events buffered per subscriber before a slow one starts lagging.
pub const DEFAULT_CAPACITY: usize = 256;

/// Format used for the hand-out time on displays, e.g. `01:05:09 PM`.
const HAND_OUT_FORMAT: &str = "%I:%M:%S %p";

/// What displays receive for each dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchEvent {
  pub event_id:       Uuid,
  pub dispatch_id:    i64,
  pub identification: String,
  pub diner_name:     String,
  /// `"start - end"` of the shift.
  pub shift_window:   String,
  pub registered_at:  NaiveDateTime,
  /// Empty until the meal is handed out.
  pub handed_out_at:  String,
  pub dispatched:     bool,
}

impl DispatchEvent {
  /// Project a dispatch for display. Missing diner or shift records (e.g.
  /// deleted by an administrator) render as `N/A`.
  pub fn project(
    dispatch: &Dispatch,
    diner: Option<&Diner>,
    shift: Option<&Shift>,
  ) -> Self {
    Self {
      event_id:       Uuid::new_v4(),
      dispatch_id:    dispatch.id,
      identification: dispatch.identification.clone(),
      diner_name:     diner.map_or_else(|| "N/A".to_owned(), |d| d.name.clone()),
      shift_window:   shift
        .map_or_else(|| "N/A - N/A".to_owned(), Shift::window_label),
      registered_at:  dispatch.registered_at,
      handed_out_at:  dispatch
        .handed_out_at
        .map(|t| t.format(HAND_OUT_FORMAT).to_string())
        .unwrap_or_default(),
      dispatched:     dispatch.dispatched,
    }
  }
}

// ─── Publisher seam ──────────────────────────────────────────────────────────

/// A fire-and-forget sink for dispatch events. Implementations must not
/// block and must not fail the caller.
pub trait Publisher: Send + Sync {
  fn publish(&self, event: DispatchEvent);
}

/// In-process fan-out over a tokio broadcast channel. Cloning is cheap and
/// every clone publishes to the same subscribers.
#[derive(Debug, Clone)]
pub struct Broadcaster {
  sender: broadcast::Sender<DispatchEvent>,
}

impl Broadcaster {
  pub fn new(capacity: usize) -> Self {
    let (sender, _) = broadcast::channel(capacity.max(1));
    Self { sender }
  }

  /// Receive every event published from now on.
  pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
    self.sender.subscribe()
  }

  pub fn subscriber_count(&self) -> usize { self.sender.receiver_count() }
}

impl Default for Broadcaster {
  fn default() -> Self { Self::new(DEFAULT_CAPACITY) }
}

impl Publisher for Broadcaster {
  fn publish(&self, event: DispatchEvent) {
    let dispatch_id = event.dispatch_id;
    // An error only means nobody is listening.
    match self.sender.send(event) {
      Ok(n) => tracing::debug!(dispatch_id, subscribers = n, "dispatch event published"),
      Err(_) => tracing::debug!(dispatch_id, "dispatch event dropped: no subscribers"),
    }
  }
}
