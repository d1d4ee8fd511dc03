//! Data access for housestats.
//!
//! This crate provides the SQLite-backed sale record source read by the
//! cache coordinator and the valuation pipeline.

pub mod sales;

pub use sales::SqliteSaleSource;
