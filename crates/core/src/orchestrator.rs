//! Multi-area fan-out and join.
//!
//! Each `(area, area_type)` pair runs as its own tokio task, bounded by a
//! semaphore. Results are joined in submission order by awaiting the task
//! handles, so a slow first area holds the reply but never blocks the others
//! from running.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::Error;
use crate::config::AppConfig;
use crate::coordinator::CacheCoordinator;
use crate::stats::StatisticsDocument;

/// One unit of per-area work.
#[async_trait::async_trait]
pub trait AreaJob: Send + Sync {
    async fn run(&self, area: &str, area_type: &str) -> Result<StatisticsDocument, Error>;
}

#[async_trait::async_trait]
impl AreaJob for CacheCoordinator {
    async fn run(&self, area: &str, area_type: &str) -> Result<StatisticsDocument, Error> {
        self.get_or_compute(area, area_type).await.map(|stats| stats.entry.data)
    }
}

/// How a single area job ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AreaOutcome {
    Completed { document: StatisticsDocument },
    NoData { reason: String },
    Failed { reason: String },
    /// The job outlived its timeout. It keeps running detached and its cache
    /// write still lands.
    TimedOut { after_ms: u64 },
}

impl AreaOutcome {
    fn from_result(result: Result<StatisticsDocument, Error>) -> Self {
        match result {
            Ok(document) => AreaOutcome::Completed { document },
            Err(Error::NotFound(reason)) => AreaOutcome::NoData { reason },
            Err(err) => AreaOutcome::Failed { reason: err.to_string() },
        }
    }

    pub fn document(&self) -> Option<&StatisticsDocument> {
        match self {
            AreaOutcome::Completed { document } => Some(document),
            _ => None,
        }
    }
}

/// Runs area jobs on a bounded pool of tokio tasks.
#[derive(Clone)]
pub struct TaskOrchestrator {
    runner: Arc<dyn AreaJob>,
    permits: Arc<Semaphore>,
    job_timeout: Duration,
}

impl TaskOrchestrator {
    pub fn new(runner: Arc<dyn AreaJob>, max_concurrency: usize, job_timeout: Duration) -> Self {
        Self { runner, permits: Arc::new(Semaphore::new(max_concurrency.max(1))), job_timeout }
    }

    pub fn from_config(runner: Arc<dyn AreaJob>, config: &AppConfig) -> Self {
        Self::new(runner, config.max_concurrency, config.job_timeout())
    }

    /// Run one job per area and return the outcomes in submission order.
    pub async fn run_multi_area_job(&self, areas: Vec<(String, String)>) -> Vec<AreaOutcome> {
        let total = areas.len();
        let handles: Vec<_> = areas.into_iter().map(|(area, area_type)| self.submit(area, area_type)).collect();

        let mut outcomes = Vec::with_capacity(total);
        for handle in handles {
            let outcome = handle
                .await
                .unwrap_or_else(|e| AreaOutcome::Failed { reason: format!("area task panicked: {e}") });
            outcomes.push(outcome);
        }

        let completed = outcomes.iter().filter(|o| o.document().is_some()).count();
        tracing::info!(total, completed, "Multi-area job joined");
        outcomes
    }

    /// Spawn the supervising task for one area.
    ///
    /// The supervisor waits for a permit, then spawns the job itself so the
    /// timeout can give up on it without dropping it. The permit travels with
    /// the job and is released only when the job finishes.
    fn submit(&self, area: String, area_type: String) -> tokio::task::JoinHandle<AreaOutcome> {
        let runner = Arc::clone(&self.runner);
        let permits = Arc::clone(&self.permits);
        let job_timeout = self.job_timeout;

        tokio::spawn(async move {
            let permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => return AreaOutcome::Failed { reason: format!("worker pool closed: {e}") },
            };

            let job = {
                let (area, area_type) = (area.clone(), area_type.clone());
                tokio::spawn(async move {
                    let _permit = permit;
                    runner.run(&area, &area_type).await
                })
            };

            match tokio::time::timeout(job_timeout, job).await {
                Ok(Ok(result)) => AreaOutcome::from_result(result),
                Ok(Err(e)) => {
                    tracing::warn!(%area, %area_type, error = %e, "Area job panicked");
                    AreaOutcome::Failed { reason: Error::TaskFailed(e.to_string()).to_string() }
                }
                Err(_) => {
                    let timeout_ms = job_timeout.as_millis() as u64;
                    tracing::warn!(%area, %area_type, timeout_ms, "Area job timed out");
                    AreaOutcome::TimedOut { after_ms: timeout_ms }
                }
            }
        })
    }
}
