//! Cache coordination: serve a fresh cached document or recompute and store.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::cache::{CacheEntry, CacheStore};
use crate::config::AppConfig;
use crate::freshness::{FreshnessPolicy, is_fresh};
use crate::model::AreaQuery;
use crate::source::SaleSource;
use crate::stats::{AggregateOptions, Aggregator, StatisticsDocument};

/// Policy knobs the coordinator takes from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinatorOptions {
    pub outlier_factor: Option<f64>,
    pub freshness: FreshnessPolicy,
    pub cache_empty_results: bool,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self { outlier_factor: Some(3.0), freshness: FreshnessPolicy::default(), cache_empty_results: false }
    }
}

impl From<&AppConfig> for CoordinatorOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            outlier_factor: config.outlier_factor(),
            freshness: config.freshness(),
            cache_empty_results: config.cache_empty_results,
        }
    }
}

/// A cache entry and whether it was served without recomputing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedStats {
    pub entry: CacheEntry,
    pub cache_hit: bool,
}

/// Decides staleness and runs load, aggregate and store on a miss.
///
/// Concurrent misses for the same key both recompute; the later upsert wins.
#[derive(Clone)]
pub struct CacheCoordinator {
    source: Arc<dyn SaleSource>,
    store: Arc<dyn CacheStore>,
    options: CoordinatorOptions,
}

impl CacheCoordinator {
    pub fn new(source: Arc<dyn SaleSource>, store: Arc<dyn CacheStore>, options: CoordinatorOptions) -> Self {
        Self { source, store, options }
    }

    /// Return the cached statistics for an area, recomputing when stale.
    pub async fn get_or_compute(&self, area: &str, area_type: &str) -> Result<CachedStats, Error> {
        self.get_or_compute_at(area, area_type, Utc::now()).await
    }

    /// [`Self::get_or_compute`] with an explicit clock reading.
    pub async fn get_or_compute_at(
        &self, area: &str, area_type: &str, now: DateTime<Utc>,
    ) -> Result<CachedStats, Error> {
        let query = AreaQuery::parse(area, area_type)?;
        let key = query.key();

        let raw_marker = self.source.fetch_freshness_marker().await?;
        let effective = self.options.freshness.effective_marker(raw_marker, now);

        let stored = match self.store.get(&key).await {
            Ok(stored) => stored,
            Err(Error::CorruptEntry { reason, .. }) => {
                tracing::warn!(%key, %reason, "Recomputing over undecodable cache entry");
                None
            }
            Err(e) => return Err(e),
        };

        if let Some(entry) = stored
            && is_fresh(entry.last_updated, effective)
        {
            if entry.data.is_empty() {
                tracing::debug!(%key, "Cached empty result is fresh");
                return Err(Error::NotFound(format!("no sales for {query}")));
            }
            tracing::debug!(%key, last_updated = %entry.last_updated, %effective, "Cache hit");
            return Ok(CachedStats { entry, cache_hit: true });
        }

        let load_start = Instant::now();
        let records = match self.source.fetch_records(&query).await {
            Ok(records) if !records.is_empty() => records,
            Ok(_) | Err(Error::NotFound(_)) => return Err(self.no_data(&query, now).await),
            Err(e) => return Err(e),
        };
        let load_ms = load_start.elapsed().as_millis() as u64;

        // without an ingest marker there is no boundary to pad up to
        let latest = raw_marker.map(|_| effective.naive_utc());
        let exec_start = Instant::now();
        let aggregator = Aggregator::new(AggregateOptions { latest, outlier_factor: self.options.outlier_factor });
        let record_count = records.len();
        let document = tokio::task::spawn_blocking(move || aggregator.aggregate_all(&records))
            .await
            .map_err(|e| Error::TaskFailed(format!("aggregation for {query}: {e}")))?;
        let exec_ms = exec_start.elapsed().as_millis() as u64;

        let entry = CacheEntry::new(&query, document, now).with_timings(load_ms, exec_ms);
        self.store.upsert(&entry).await?;

        tracing::info!(%key, records = record_count, load_ms, exec_ms, %effective, "Recomputed area statistics");
        Ok(CachedStats { entry, cache_hit: false })
    }

    /// The stored entry for an area without recomputing. `CacheMiss` when absent.
    pub async fn cached(&self, area: &str, area_type: &str) -> Result<CacheEntry, Error> {
        let query = AreaQuery::parse(area, area_type)?;
        let key = query.key();
        self.store.get(&key).await?.ok_or_else(|| Error::CacheMiss(key.to_string()))
    }

    async fn no_data(&self, query: &AreaQuery, now: DateTime<Utc>) -> Error {
        if self.options.cache_empty_results {
            let entry = CacheEntry::new(query, StatisticsDocument::default(), now);
            if let Err(err) = self.store.upsert(&entry).await {
                tracing::warn!(key = %entry.id, error = %err, "Failed to cache empty result");
                return err;
            }
            tracing::debug!(key = %entry.id, "Cached empty result");
        }
        Error::NotFound(format!("no sales for {query}"))
    }
}
