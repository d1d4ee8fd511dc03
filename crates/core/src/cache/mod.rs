//! SQLite-backed cache of statistics documents.
//!
//! Entries are keyed by [`QueryKey`] and written with last-writer-wins
//! upserts. The store never deletes entries; staleness is decided by the
//! coordinator against the freshness marker.

pub mod connection;
pub mod entries;
pub mod migrations;

pub use crate::Error;
use crate::model::QueryKey;

pub use connection::CacheDb;
pub use entries::CacheEntry;

/// Keyed storage for cached statistics.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &QueryKey) -> Result<Option<CacheEntry>, Error>;

    /// Insert the entry or replace the one stored under the same key.
    async fn upsert(&self, entry: &CacheEntry) -> Result<(), Error>;
}
