//! SQLite backend for the Mealgate checkpoint.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod encode;
mod roster;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use roster::{RosterProvider, RosterSource};
pub use store::SqliteStore;
