//! Search indexing pipeline for the recipe and meal-planning catalog.
//!
//! Entities live in a relational datastore, the source of truth. Each kind has
//! a full-text index holding a trimmed projection of every live row. Writes
//! through the HTTP API publish change events that enqueue index requests; a
//! periodic scheduler re-queues anything the datastore reports as stale, so
//! the indexes converge even when events are lost.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod indexing;
pub mod search;
pub mod store;
pub mod telemetry;
pub mod types;

pub use error::{Error, Result};
