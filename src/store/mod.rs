//! Storage substrate: the single-table key-value store and the pure
//! helpers that shape data for it (key building, normalization, cursors).

pub mod cursor;
pub mod keys;
pub mod kv;
pub mod normalize;

pub use cursor::LastKey;
pub use kv::{Condition, Item, KvStore, Page, Query, QueryTarget, WriteOp};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A write-time precondition did not hold; the whole write set was
    /// rolled back.
    #[error("conditional check failed")]
    ConditionFailed,

    #[error("migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("corrupt item: {0}")]
    Corrupt(String),
}
