//! Keeps search indexes in sync with the datastore.
//!
//! Producers (the backlog [`IndexingScheduler`] and the change-event
//! subscriber) put [`IndexRequest`]s on a bounded queue. Workers hand each one
//! to the [`IndexDispatcher`], which loads the row, projects it, writes the
//! projection and marks the row as indexed.

pub mod dispatcher;
pub mod request;
pub mod scheduler;
pub mod subsets;
pub mod worker;

pub use dispatcher::IndexDispatcher;
pub use request::{IndexRequest, IndexType};
pub use scheduler::{IndexingScheduler, TickStats};
pub use worker::{IndexQueue, IndexQueueReceiver, index_queue, spawn_index_workers};
