//! Cache-related MCP tools.
//!
//! This module provides read access to the statistics cache.

pub mod get;

pub use get::{CacheGetParams, get_impl};
