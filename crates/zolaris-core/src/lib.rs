//! Core types, collaborator traits and the entity hierarchy engine for
//! Zolaris.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement the traits in [`store`]; the engine in
//! [`engine`] drives them.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod category;
pub mod device;
pub mod engine;
pub mod entity;
pub mod error;
pub mod link;
pub mod store;
pub mod tree;
pub mod user;

pub use engine::HierarchyEngine;
pub use error::{Error, Result};
