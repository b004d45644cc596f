//! Shift windows and the matcher that picks the active one.
//!
//! A shift is a wall-clock interval with no date component. When the start
//! is later than the end the window wraps past midnight (e.g. `22:00`–`06:00`).

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// A configured meal window. Times are kept as entered so that malformed
/// configuration degrades to "never matches" instead of failing the read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
  pub id:                   i64,
  /// Start of the window, `HH:MM` or `HH:MM:SS`.
  pub starts:               String,
  /// End of the window (inclusive).
  pub ends:                 String,
  /// Meal name shown on terminals, e.g. "Breakfast".
  pub label:                String,
  /// Chime repeats on an accepted verification; opaque to the core.
  pub accept_chime_repeats: Option<i64>,
  /// Chime repeats on a rejected verification; opaque to the core.
  pub reject_chime_repeats: Option<i64>,
}

/// Parse a wall-clock time of day. Accepts `H:MM`, `HH:MM` and `HH:MM:SS`.
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
  let raw = raw.trim();
  NaiveTime::parse_from_str(raw, "%H:%M:%S")
    .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
    .ok()
}

impl Shift {
  /// Whether `now` falls inside this window. Both bounds are inclusive.
  pub fn contains(&self, now: NaiveTime) -> bool {
    let (Some(start), Some(end)) =
      (parse_time_of_day(&self.starts), parse_time_of_day(&self.ends))
    else {
      return false;
    };

    if start <= end {
      start <= now && now <= end
    } else {
      now >= start || now <= end
    }
  }

  /// The `"start - end"` form shown on dispatch displays.
  pub fn window_label(&self) -> String { format!("{} - {}", self.starts, self.ends) }
}

/// The first shift, in configured order, whose window contains `now`.
///
/// Overlapping windows are not rejected here; configuration order decides.
pub fn current_shift(shifts: &[Shift], now: NaiveTime) -> Option<&Shift> {
  shifts.iter().find(|s| s.contains(now))
}
