//! Sale record source abstraction.
//!
//! The coordinator and valuation only see [`SaleSource`]; the SQLite reader in
//! `housestats-client` is one implementation and tests plug in fakes.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::Error;
use crate::model::{AreaQuery, HouseProfile, SaleRecord};

/// Read-only access to the relational sale store.
#[async_trait::async_trait]
pub trait SaleSource: Send + Sync {
    /// All qualifying sales in the area. `NotFound` when the area is unknown or
    /// has no sales.
    async fn fetch_records(&self, query: &AreaQuery) -> Result<Vec<SaleRecord>, Error>;

    /// Timestamp of the last ingest, if the pipeline has recorded one.
    async fn fetch_freshness_marker(&self) -> Result<Option<DateTime<Utc>>, Error>;

    /// A house with its sale history and the areas it belongs to.
    async fn fetch_house(&self, house_id: &str) -> Result<Option<HouseProfile>, Error>;
}

/// Retries [`Error::SourceUnavailable`] with exponential backoff. Every other
/// error is returned on the first attempt.
pub struct RetryingSource<S> {
    inner: S,
    attempts: u32,
    backoff: Duration,
}

impl<S: SaleSource> RetryingSource<S> {
    pub fn new(inner: S, attempts: u32, backoff: Duration) -> Self {
        Self { inner, attempts: attempts.max(1), backoff }
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, Error>> + Send,
    {
        let mut delay = self.backoff;
        let mut attempt = 1;
        loop {
            match call().await {
                Err(err) if err.is_retryable() && attempt < self.attempts => {
                    tracing::warn!(
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Sale source unavailable, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[async_trait::async_trait]
impl<S: SaleSource> SaleSource for RetryingSource<S> {
    async fn fetch_records(&self, query: &AreaQuery) -> Result<Vec<SaleRecord>, Error> {
        self.with_retry("fetch_records", || self.inner.fetch_records(query)).await
    }

    async fn fetch_freshness_marker(&self) -> Result<Option<DateTime<Utc>>, Error> {
        self.with_retry("fetch_freshness_marker", || self.inner.fetch_freshness_marker()).await
    }

    async fn fetch_house(&self, house_id: &str) -> Result<Option<HouseProfile>, Error> {
        self.with_retry("fetch_house", || self.inner.fetch_house(house_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        calls: AtomicU32,
        failures: u32,
        error: fn() -> Error,
    }

    impl Flaky {
        fn new(failures: u32, error: fn() -> Error) -> Self {
            Self { calls: AtomicU32::new(0), failures, error }
        }
    }

    #[async_trait::async_trait]
    impl SaleSource for Flaky {
        async fn fetch_records(&self, _query: &AreaQuery) -> Result<Vec<SaleRecord>, Error> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures { Err((self.error)()) } else { Ok(Vec::new()) }
        }

        async fn fetch_freshness_marker(&self) -> Result<Option<DateTime<Utc>>, Error> {
            Ok(None)
        }

        async fn fetch_house(&self, _house_id: &str) -> Result<Option<HouseProfile>, Error> {
            Ok(None)
        }
    }

    fn unavailable() -> Error {
        Error::SourceUnavailable("connection refused".into())
    }

    fn not_found() -> Error {
        Error::NotFound("CHAREA".into())
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_unavailable_until_success() {
        let source = RetryingSource::new(Flaky::new(2, unavailable), 3, Duration::from_millis(200));
        let records = source.fetch_records(&AreaQuery::country()).await.unwrap();
        assert!(records.is_empty());
        assert_eq!(source.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_attempts() {
        let source = RetryingSource::new(Flaky::new(10, unavailable), 3, Duration::from_millis(200));
        let result = source.fetch_records(&AreaQuery::country()).await;
        assert!(matches!(result, Err(Error::SourceUnavailable(_))));
        assert_eq!(source.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_does_not_retry_other_errors() {
        let source = RetryingSource::new(Flaky::new(1, not_found), 3, Duration::from_millis(200));
        let result = source.fetch_records(&AreaQuery::country()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(source.inner.calls.load(Ordering::SeqCst), 1);
    }
}
