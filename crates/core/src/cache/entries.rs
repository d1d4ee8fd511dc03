//! Cache entry CRUD operations.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::CacheStore;
use super::connection::CacheDb;
use crate::Error;
use crate::model::{AreaQuery, QueryKey};
use crate::stats::StatisticsDocument;

/// A cached statistics document for one area query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: QueryKey,
    pub area: String,
    pub area_type: String,
    pub data: StatisticsDocument,
    pub last_updated: DateTime<Utc>,
    /// Time spent aggregating, in milliseconds.
    pub exec_ms: u64,
    /// Time spent loading records, in milliseconds.
    pub load_ms: u64,
}

impl CacheEntry {
    pub fn new(query: &AreaQuery, data: StatisticsDocument, last_updated: DateTime<Utc>) -> Self {
        Self {
            id: query.key(),
            area: query.area.clone(),
            area_type: query.area_type.as_str().to_string(),
            data,
            last_updated,
            exec_ms: 0,
            load_ms: 0,
        }
    }

    pub fn with_timings(mut self, load_ms: u64, exec_ms: u64) -> Self {
        self.load_ms = load_ms;
        self.exec_ms = exec_ms;
        self
    }
}

/// Raw row before the document and timestamp are decoded.
struct StoredRow {
    id: String,
    area: String,
    area_type: String,
    data: String,
    last_updated: String,
    exec_ms: i64,
    load_ms: i64,
}

impl StoredRow {
    fn decode(self) -> Result<CacheEntry, Error> {
        let corrupt = |reason: String| Error::CorruptEntry { key: self.id.clone(), reason };
        let data = serde_json::from_str(&self.data).map_err(|e| corrupt(format!("data: {e}")))?;
        let last_updated = DateTime::parse_from_rfc3339(&self.last_updated)
            .map_err(|e| corrupt(format!("last_updated: {e}")))?
            .with_timezone(&Utc);

        Ok(CacheEntry {
            area: self.area,
            area_type: self.area_type,
            data,
            last_updated,
            exec_ms: self.exec_ms.max(0) as u64,
            load_ms: self.load_ms.max(0) as u64,
            id: QueryKey::from_stored(self.id),
        })
    }
}

impl CacheDb {
    /// Insert or replace the entry stored under `entry.id`.
    pub async fn upsert_entry(&self, entry: &CacheEntry) -> Result<(), Error> {
        let data = serde_json::to_string(&entry.data).map_err(|e: serde_json::Error| Error::CorruptEntry {
            key: entry.id.to_string(),
            reason: e.to_string(),
        })?;
        let id = entry.id.to_string();
        let area = entry.area.clone();
        let area_type = entry.area_type.clone();
        let last_updated = entry.last_updated.to_rfc3339_opts(SecondsFormat::Micros, true);
        let exec_ms = entry.exec_ms as i64;
        let load_ms = entry.load_ms as i64;

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_entries (id, area, area_type, data, last_updated, exec_ms, load_ms)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(id) DO UPDATE SET
                        area = excluded.area,
                        area_type = excluded.area_type,
                        data = excluded.data,
                        last_updated = excluded.last_updated,
                        exec_ms = excluded.exec_ms,
                        load_ms = excluded.load_ms",
                    params![id, area, area_type, data, last_updated, exec_ms, load_ms],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Get the entry for `key`, `None` when nothing is stored.
    pub async fn get_entry(&self, key: &QueryKey) -> Result<Option<CacheEntry>, Error> {
        let key = key.to_string();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<StoredRow>, Error> {
                let result = conn.query_row(
                    "SELECT id, area, area_type, data, last_updated, exec_ms, load_ms
                     FROM cache_entries WHERE id = ?1",
                    params![key],
                    |row| {
                        Ok(StoredRow {
                            id: row.get(0)?,
                            area: row.get(1)?,
                            area_type: row.get(2)?,
                            data: row.get(3)?,
                            last_updated: row.get(4)?,
                            exec_ms: row.get(5)?,
                            load_ms: row.get(6)?,
                        })
                    },
                );

                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        row.map(StoredRow::decode).transpose()
    }

    /// Number of stored entries.
    pub async fn count_entries(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
                Ok(count.max(0) as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait::async_trait]
impl CacheStore for CacheDb {
    async fn get(&self, key: &QueryKey) -> Result<Option<CacheEntry>, Error> {
        self.get_entry(key).await
    }

    async fn upsert(&self, entry: &CacheEntry) -> Result<(), Error> {
        self.upsert_entry(entry).await
    }
}
