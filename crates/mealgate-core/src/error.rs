//! Error types for `mealgate-core`.

use std::fmt;

use thiserror::Error;

/// The kind of record a [`Error::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
  Diner,
  Shift,
  Dispatch,
}

impl fmt::Display for Entity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Diner => "diner",
      Self::Shift => "shift",
      Self::Dispatch => "dispatch",
    })
  }
}

#[derive(Debug, Error)]
pub enum Error {
  /// The identification number resolved to no usable diner in any source.
  #[error("diner not found or not eligible")]
  NotEligible,

  /// An active dispatch already exists for the same diner, shift and day.
  #[error("already has a record for the current shift and day")]
  DuplicateDispatch,

  #[error("no shift is active at the current time")]
  NoActiveShift,

  #[error("{0} not found: {1}")]
  NotFound(Entity, i64),

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("verification timed out")]
  Timeout,
}

impl Error {
  /// Wrap a backend error.
  pub fn storage<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Storage(Box::new(e))
  }

  /// Whether the error is an expected business outcome rather than a fault.
  pub fn is_recoverable(&self) -> bool {
    !matches!(self, Self::Storage(_) | Self::Timeout)
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
