//! Core types, collaborator traits and the verification-and-dispatch engine
//! for the Mealgate cafeteria checkpoint.
//!
//! This crate is free of HTTP and database dependencies. Storage backends
//! implement the traits in [`store`]; the HTTP layer drives
//! [`checkpoint::Checkpoint`].

pub mod checkpoint;
pub mod diner;
pub mod dispatch;
pub mod error;
pub mod keyed_lock;
pub mod ledger;
pub mod notify;
pub mod resolver;
pub mod shift;
pub mod store;

pub use checkpoint::{Checkpoint, Verification};
pub use error::{Entity, Error, Result};

#[cfg(test)]
mod fakes;
#[cfg(test)]
mod tests;
