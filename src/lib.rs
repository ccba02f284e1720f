//! Request-scoped grouped data loading.
//!
//! A [`Loader`] collects the parent keys requested by the resolvers of one request, fetches all
//! of their children with a single call to a [`BatchFunction`], and hands every caller the rows
//! belonging to its own key.

mod batch_function;
mod cache;
mod config;
mod error;
mod loader;
mod loader_op;
mod loader_worker;
mod worker_stats;

pub use batch_function::BatchFunction;
pub use config::LoaderConfig;
pub use error::{LoadError, SharedError};
pub use loader::Loader;
pub use worker_stats::WorkerStats;
