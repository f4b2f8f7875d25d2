//! buzz-core - Core library for Buzz
//!
//! This crate contains the notification models, the entity store and its
//! reducer, the background sync loop, and the read-state mutation logic used by
//! every Buzz front end.

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod mutation;
pub mod normalize;
pub mod selectors;
pub mod session;
pub mod store;
pub mod sync;
pub mod util;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use models::{Notification, NotificationId};
