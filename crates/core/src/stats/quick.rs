//! Headline snapshot of the latest bucket.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::PartitionSeries;
use super::metrics::pct_delta;
use crate::model::SaleRecord;

/// Days searched from the latest bucket start for the most expensive sale.
const EXPENSIVE_SALE_WINDOW_DAYS: i64 = 31;

/// Latest bucket of the `all` partition compared with the one before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickStats {
    pub current_time: Option<NaiveDate>,
    pub average_price: f64,
    pub average_change: Option<f64>,
    pub sales_qty: f64,
    pub sales_qty_change: Option<f64>,
    pub sales_volume: f64,
    pub sales_volume_change: Option<f64>,
    pub expensive_sale: f64,
}

impl QuickStats {
    /// Snapshot reported when fewer than two buckets exist.
    pub fn zeroed() -> Self {
        Self {
            current_time: None,
            average_price: 0.0,
            average_change: Some(0.0),
            sales_qty: 0.0,
            sales_qty_change: Some(0.0),
            sales_volume: 0.0,
            sales_volume_change: Some(0.0),
            expensive_sale: 0.0,
        }
    }

    /// Build the snapshot from the `all` partition's series.
    pub fn from_series(
        prices: &PartitionSeries, qty: &PartitionSeries, volume: &PartitionSeries, records: &[SaleRecord],
    ) -> Self {
        let Some((current_time, current_average, previous_average)) = last_two(prices) else {
            return Self::zeroed();
        };

        let (sales_qty, sales_qty_change) = change_or_zero(qty);
        let (sales_volume, sales_volume_change) = change_or_zero(volume);

        Self {
            current_time: Some(current_time),
            average_price: current_average,
            average_change: pct_delta(current_average, previous_average),
            sales_qty,
            sales_qty_change,
            sales_volume,
            sales_volume_change,
            expensive_sale: expensive_sale(records, current_time),
        }
    }
}

fn last_two(series: &PartitionSeries) -> Option<(NaiveDate, f64, f64)> {
    let n = series.values.len();
    if n < 2 || series.dates.len() != n {
        return None;
    }
    Some((series.dates[n - 1], series.values[n - 1], series.values[n - 2]))
}

fn change_or_zero(series: &PartitionSeries) -> (f64, Option<f64>) {
    match last_two(series) {
        Some((_, current, previous)) => (current, pct_delta(current, previous)),
        None => (0.0, Some(0.0)),
    }
}

/// Highest single price in `[start, start + 31 days)`, 0 when none.
fn expensive_sale(records: &[SaleRecord], start: NaiveDate) -> f64 {
    let end = start + Duration::days(EXPENSIVE_SALE_WINDOW_DAYS);
    records
        .iter()
        .filter(|r| r.date >= start && r.date < end)
        .map(|r| r.price)
        .fold(0.0, f64::max)
}
