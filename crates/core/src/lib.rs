//! Core types and services for housestats.
//!
//! This crate provides:
//! - The aggregation engine turning sale records into per-period statistics
//! - Cache coordination against the ingest freshness marker
//! - Multi-area fan-out and house valuation
//! - SQLite-backed statistics cache
//! - Unified error types and layered configuration

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod freshness;
pub mod model;
pub mod orchestrator;
pub mod source;
pub mod stats;
pub mod valuation;

pub use cache::{CacheDb, CacheEntry, CacheStore};
pub use config::{AppConfig, ConfigError};
pub use coordinator::{CacheCoordinator, CachedStats, CoordinatorOptions};
pub use error::Error;
pub use model::{AreaQuery, AreaType, HouseProfile, Partition, Period, QueryKey, SaleRecord};
pub use orchestrator::{AreaJob, AreaOutcome, TaskOrchestrator};
pub use source::{RetryingSource, SaleSource};
pub use stats::{AggregateOptions, Aggregator, PeriodStats, StatisticsDocument};
pub use valuation::{Valuation, Valuer};
