//! SQLite backend for the Zolaris entity hierarchy.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. One [`SqliteStore`] implements every
//! trait in [`zolaris_core::store`].

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
