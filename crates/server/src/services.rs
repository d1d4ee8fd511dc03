//! Wiring of the stats services behind the MCP tools.

use std::sync::Arc;

use housestats_client::SqliteSaleSource;
use housestats_core::{
    AppConfig, CacheCoordinator, CacheDb, CacheStore, CoordinatorOptions, Error, RetryingSource, SaleSource,
    TaskOrchestrator, Valuer,
};

/// Shared handles used by every tool call.
#[derive(Clone)]
pub struct Services {
    pub coordinator: CacheCoordinator,
    pub orchestrator: TaskOrchestrator,
    pub valuer: Arc<Valuer>,
}

impl Services {
    /// Open both databases named in `config` and build the services.
    pub async fn open(config: &AppConfig) -> Result<Self, Error> {
        let cache = CacheDb::open(&config.cache_db_path).await?;
        let sales = SqliteSaleSource::open(&config.sales_db_path).await?;
        Ok(Self::build(config, sales, Arc::new(cache)))
    }

    /// Build the services over an already opened sale source and cache.
    pub fn build(config: &AppConfig, sales: SqliteSaleSource, store: Arc<dyn CacheStore>) -> Self {
        let source: Arc<dyn SaleSource> =
            Arc::new(RetryingSource::new(sales, config.source_retry_attempts, config.source_retry_backoff()));
        let coordinator = CacheCoordinator::new(Arc::clone(&source), store, CoordinatorOptions::from(config));
        let orchestrator = TaskOrchestrator::from_config(Arc::new(coordinator.clone()), config);
        let valuer = Arc::new(Valuer::new(source, orchestrator.clone()));

        tracing::info!(
            max_concurrency = config.max_concurrency,
            job_timeout_ms = config.job_timeout_ms,
            outlier_factor = ?config.outlier_factor(),
            cache_empty_results = config.cache_empty_results,
            "Services ready"
        );

        Self { coordinator, orchestrator, valuer }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tokio_rusqlite::Connection;

    /// Sale store fixture: two Chester houses, one resold, and one Exeter
    /// house with no sales.
    pub(crate) const FIXTURE: &str = "
        CREATE TABLE postcodes (
            postcode TEXT PRIMARY KEY, street TEXT, town TEXT, district TEXT, county TEXT,
            outcode TEXT, area TEXT, sector TEXT
        );
        CREATE TABLE houses (houseid TEXT PRIMARY KEY, postcode TEXT, type TEXT, paon TEXT, saon TEXT);
        CREATE TABLE sales (houseid TEXT, price INTEGER, date TEXT, ppd_cat TEXT);
        CREATE TABLE settings (name TEXT PRIMARY KEY, data TEXT);

        INSERT INTO postcodes VALUES
            ('CH1 1AA', 'HIGH STREET', 'CHESTER', 'CHESHIRE WEST', 'CHESHIRE', 'CH1', 'CH', 'CH1 1'),
            ('CH2 2BB', 'LOW ROAD', 'CHESTER', 'CHESHIRE WEST', 'CHESHIRE', 'CH2', 'CH', 'CH2 2'),
            ('EX2 4AB', 'QUAY LANE', 'EXETER', 'EXETER', 'DEVON', 'EX2', 'EX', 'EX2 4');
        INSERT INTO houses VALUES
            ('h1', 'CH1 1AA', 'D', '1', NULL),
            ('h2', 'CH2 2BB', 'S', '2', NULL),
            ('h4', 'EX2 4AB', 'F', '4', 'FLAT 1');
        INSERT INTO sales VALUES
            ('h1', 100000, '2023-01-10', 'A'),
            ('h1', 150000, '2023-02-12', 'A'),
            ('h2', 120000, '2023-02-20', 'A'),
            ('h2', 132000, '2023-03-20', 'A');
        INSERT INTO settings VALUES ('last_updated', '1685577600');
    ";

    pub(crate) async fn services() -> Services {
        let conn = Connection::open_in_memory().await.unwrap();
        conn.call(|conn| conn.execute_batch(FIXTURE)).await.unwrap();
        let cache = CacheDb::open_in_memory().await.unwrap();
        Services::build(&AppConfig::default(), SqliteSaleSource::from_connection(conn), Arc::new(cache))
    }

    #[tokio::test]
    async fn test_services_compute_from_store() {
        let services = services().await;
        let stats = services.coordinator.get_or_compute("ch", "area").await.unwrap();
        assert!(!stats.cache_hit);
        assert_eq!(stats.entry.data.periods.len(), 4);

        let again = services.coordinator.get_or_compute("CH", "AREA").await.unwrap();
        assert!(again.cache_hit);
    }
}
