//! Per-bucket scalar metrics.

use super::bucket::Point;
use crate::model::{Period, SaleRecord};

/// `exp(mean(ln price))`; `None` for an empty bucket.
pub fn geometric_mean(prices: &[f64]) -> Option<f64> {
    if prices.is_empty() {
        return None;
    }
    let log_sum: f64 = prices.iter().map(|p| p.ln()).sum();
    Some((log_sum / prices.len() as f64).exp())
}

/// Smallest slice the outlier trim applies to.
pub const MIN_TRIM_SALES: usize = 4;

/// Drop sales priced above `mean + factor * stddev`.
///
/// Each sale is tested against the mean and sample standard deviation of the
/// other sales in the slice, so one extreme sale cannot widen its own bound.
/// When the other sales have no spread the whole slice's bound applies instead.
/// Slices smaller than [`MIN_TRIM_SALES`] are returned unchanged.
pub fn trim_outliers<'a>(records: &[&'a SaleRecord], factor: f64) -> Vec<&'a SaleRecord> {
    let n = records.len();
    if n < MIN_TRIM_SALES {
        return records.to_vec();
    }

    let count = n as f64;
    let mean = records.iter().map(|r| r.price).sum::<f64>() / count;
    let m2: f64 = records.iter().map(|r| (r.price - mean).powi(2)).sum();
    if m2 == 0.0 {
        return records.to_vec();
    }
    let whole_bound = mean + factor * (m2 / (count - 1.0)).sqrt();

    records
        .iter()
        .filter(|record| {
            let delta = record.price - mean;
            let others_mean = mean - delta / (count - 1.0);
            let others_m2 = (m2 - delta * delta * count / (count - 1.0)).max(0.0);
            if others_m2 <= m2 * 1e-9 {
                return record.price <= whole_bound;
            }
            let others_std = (others_m2 / (count - 2.0)).sqrt();
            record.price <= others_mean + factor * others_std
        })
        .copied()
        .collect()
}

/// Change of each bucket against the previous produced bucket, scaled by the
/// period's annualization divisor. The first bucket has no entry.
pub fn percentage_changes(averages: &[Point], period: Period) -> Vec<Point> {
    let divisor = period.annualization_divisor();
    averages
        .windows(2)
        .filter_map(|pair| {
            let (previous, (date, current)) = (pair[0].1, pair[1]);
            if current == 0.0 {
                return None;
            }
            Some((date, (current - previous) / current * 100.0 / divisor))
        })
        .collect()
}

/// Percentage delta rounded to two places, `None` when `previous` is zero.
pub fn pct_delta(current: f64, previous: f64) -> Option<f64> {
    if previous == 0.0 {
        return None;
    }
    Some(round2(100.0 * (current - previous) / previous))
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
