//! Calendar bucketing and gap filling.
//!
//! Buckets are addressed by month index (`year * 12 + month0`). A bucket of
//! width `P` months starts at an index divisible by `P`, so the slices produced
//! from the data always land on the padding grid that starts at 1995-01.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};

use crate::model::{Period, SaleRecord};

/// Month index of 1995-01, the first slice of every padded series.
pub const EPOCH_MONTH: i32 = 1995 * 12;

/// A dated value in a bucket series.
pub type Point = (NaiveDate, f64);

/// Why a series could not be padded onto the calendar grid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PadError {
    #[error("series is empty")]
    EmptySeries,

    #[error("no admissible latest date")]
    NoBoundary,
}

fn month_index(date: NaiveDate) -> i32 {
    date.year() * 12 + date.month0() as i32
}

fn month_start(index: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(index.div_euclid(12), index.rem_euclid(12) as u32 + 1, 1)
}

/// First day of the period-wide slice containing `date`.
pub fn bucket_start(date: NaiveDate, period: Period) -> Option<NaiveDate> {
    let index = month_index(date);
    month_start(index - index.rem_euclid(period.months() as i32))
}

/// Group sale prices into the period slices that contain at least one sale.
pub fn group_by_period<'a>(
    records: impl IntoIterator<Item = &'a SaleRecord>, period: Period,
) -> BTreeMap<NaiveDate, Vec<f64>> {
    let mut buckets: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for record in records {
        if let Some(start) = bucket_start(record.date, period) {
            buckets.entry(start).or_default().push(record.price);
        }
    }
    buckets
}

fn before(date: NaiveDate, boundary: NaiveDateTime) -> bool {
    date.and_time(NaiveTime::MIN) < boundary
}

/// Every slice start from the epoch up to, but excluding, `boundary`.
pub fn padding_grid(period: Period, boundary: NaiveDateTime) -> Vec<NaiveDate> {
    let step = period.months() as i32;
    let mut grid = Vec::new();
    let mut index = EPOCH_MONTH;
    while let Some(start) = month_start(index)
        && before(start, boundary)
    {
        grid.push(start);
        index += step;
    }
    grid
}

/// Outer-join `series` onto the padding grid, filling gaps with zero and
/// dropping slices at or after `boundary`.
pub fn pad(series: &[Point], period: Period, boundary: Option<NaiveDateTime>) -> Result<Vec<Point>, PadError> {
    let boundary = boundary.ok_or(PadError::NoBoundary)?;
    if series.is_empty() {
        return Err(PadError::EmptySeries);
    }

    let mut joined: BTreeMap<NaiveDate, f64> =
        padding_grid(period, boundary).into_iter().map(|date| (date, 0.0)).collect();

    let epoch = month_start(EPOCH_MONTH);
    for &(date, value) in series {
        if Some(date) >= epoch && before(date, boundary) {
            joined.insert(date, value);
        }
    }

    Ok(joined.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn midnight(y: i32, m: u32, d: u32) -> NaiveDateTime {
        date(y, m, d).and_time(NaiveTime::MIN)
    }

    #[test]
    fn test_bucket_start_alignment() {
        assert_eq!(bucket_start(date(2024, 2, 20), Period::OneMonth), Some(date(2024, 2, 1)));
        assert_eq!(bucket_start(date(2024, 5, 9), Period::ThreeMonths), Some(date(2024, 4, 1)));
        assert_eq!(bucket_start(date(2024, 5, 9), Period::SixMonths), Some(date(2024, 1, 1)));
        assert_eq!(bucket_start(date(2024, 11, 30), Period::SixMonths), Some(date(2024, 7, 1)));
        assert_eq!(bucket_start(date(2024, 11, 30), Period::TwelveMonths), Some(date(2024, 1, 1)));
    }

    #[test]
    fn test_group_skips_empty_slices() {
        let records = vec![
            SaleRecord::new(100.0, date(2024, 1, 10), "D", "h1"),
            SaleRecord::new(200.0, date(2024, 3, 2), "D", "h2"),
            SaleRecord::new(300.0, date(2024, 3, 28), "S", "h3"),
        ];
        let buckets = group_by_period(&records, Period::OneMonth);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[&date(2024, 3, 1)], vec![200.0, 300.0]);
    }

    #[test]
    fn test_grid_length_matches_calendar_count() {
        let boundary = midnight(2024, 8, 1);
        // 1995-01 .. 2024-07 inclusive
        let months: usize = (2024 - 1995) * 12 + 7;
        assert_eq!(padding_grid(Period::OneMonth, boundary).len(), months);
        assert_eq!(padding_grid(Period::ThreeMonths, boundary).len(), months.div_ceil(3));
        assert_eq!(padding_grid(Period::SixMonths, boundary).len(), months.div_ceil(6));
        assert_eq!(padding_grid(Period::TwelveMonths, boundary).len(), months.div_ceil(12));
    }

    #[test]
    fn test_grid_boundary_mid_month_keeps_that_month() {
        let grid = padding_grid(Period::OneMonth, midnight(1995, 3, 15));
        assert_eq!(grid, vec![date(1995, 1, 1), date(1995, 2, 1), date(1995, 3, 1)]);
    }

    #[test]
    fn test_pad_fills_gaps_and_drops_trailing() {
        let series = vec![(date(1995, 2, 1), 10.0), (date(1995, 4, 1), 30.0), (date(1995, 6, 1), 60.0)];
        let padded = pad(&series, Period::OneMonth, Some(midnight(1995, 6, 1))).unwrap();
        assert_eq!(
            padded,
            vec![
                (date(1995, 1, 1), 0.0),
                (date(1995, 2, 1), 10.0),
                (date(1995, 3, 1), 0.0),
                (date(1995, 4, 1), 30.0),
                (date(1995, 5, 1), 0.0),
            ]
        );
    }

    #[test]
    fn test_pad_is_contiguous_for_every_period() {
        let boundary = midnight(2003, 5, 1);
        for period in Period::ALL {
            let series = vec![(bucket_start(date(2000, 6, 15), period).unwrap(), 1.0)];
            let padded = pad(&series, period, Some(boundary)).unwrap();
            assert_eq!(padded.len(), padding_grid(period, boundary).len());
            for pair in padded.windows(2) {
                assert_eq!(bucket_start(pair[1].0, period), Some(pair[1].0));
                assert_eq!(month_index(pair[1].0) - month_index(pair[0].0), period.months() as i32);
            }
        }
    }

    #[test]
    fn test_pad_failures() {
        let series = vec![(date(2000, 1, 1), 1.0)];
        assert_eq!(pad(&series, Period::OneMonth, None), Err(PadError::NoBoundary));
        assert_eq!(pad(&[], Period::OneMonth, Some(midnight(2001, 1, 1))), Err(PadError::EmptySeries));
    }
}
