//! Medidesk core: data-access layer for a small-clinic management
//! system over an embedded single-table key-value store.
//!
//! Everything consistency-critical rides on conditional writes and
//! bounded multi-item transactions; there is no locking anywhere. See
//! the `store` module for the substrate and `repository` for the typed
//! operations.

pub mod audit;
pub mod config;
pub mod errors;
pub mod models;
pub mod repository;
pub mod store;

pub use errors::DataError;
pub use store::{KvStore, StoreError};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. `RUST_LOG` wins when set;
/// otherwise the built-in default filter applies.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
