//! Aggregation engine: sale records in, per-period statistics out.
//!
//! Everything here is pure. The padding boundary and the outlier factor are
//! handed in through [`AggregateOptions`] so the engine never reads a clock or
//! a config file.

pub mod bucket;
pub mod metrics;
pub mod quick;
pub mod tenancy;

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::model::{Partition, Period, SaleRecord};
pub use bucket::{PadError, Point};
pub use quick::QuickStats;

/// Inputs that shape aggregation but do not come from the records.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AggregateOptions {
    /// Padding boundary; slices at or after it are dropped.
    pub latest: Option<NaiveDateTime>,
    /// Standard deviations above the mean a price may reach before it is
    /// trimmed. `None` disables trimming.
    pub outlier_factor: Option<f64>,
}

/// One partition's dated series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSeries {
    pub partition: Partition,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl PartitionSeries {
    fn from_points(partition: Partition, points: Vec<Point>) -> Self {
        let (dates, values) = points.into_iter().unzip();
        Self { partition, dates, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate `(date, value)` pairs.
    pub fn points(&self) -> impl Iterator<Item = Point> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeProportion {
    pub property_type: String,
    pub houses: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionTenancy {
    pub partition: Partition,
    pub seconds: f64,
}

/// Statistics for one bucket width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodStats {
    pub period: Period,
    pub average_price: Vec<PartitionSeries>,
    pub type_proportions: Vec<TypeProportion>,
    pub monthly_qty: Vec<PartitionSeries>,
    pub monthly_volume: Vec<PartitionSeries>,
    pub percentage_change: Vec<PartitionSeries>,
    pub average_tenancy: Vec<PartitionTenancy>,
    pub quick_stats: QuickStats,
}

impl PeriodStats {
    /// Average-price series of one partition.
    pub fn price_series(&self, partition: &Partition) -> Option<&PartitionSeries> {
        self.average_price.iter().find(|s| &s.partition == partition)
    }

    /// Percentage-change series of one partition.
    pub fn perc_series(&self, partition: &Partition) -> Option<&PartitionSeries> {
        self.percentage_change.iter().find(|s| &s.partition == partition)
    }
}

/// Statistics for every period, in period order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsDocument {
    pub periods: Vec<PeriodStats>,
}

impl StatisticsDocument {
    pub fn period(&self, period: Period) -> Option<&PeriodStats> {
        self.periods.iter().find(|p| p.period == period)
    }

    /// True for the zeroed document cached when an area has no sales.
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }
}

/// Records of one partition, before and after outlier trimming.
struct PartitionSlice<'a> {
    partition: Partition,
    records: Vec<&'a SaleRecord>,
    trimmed: Vec<&'a SaleRecord>,
}

/// Per-period series for one partition.
struct PartitionOutput {
    price: PartitionSeries,
    qty: PartitionSeries,
    volume: PartitionSeries,
    perc: PartitionSeries,
}

pub struct Aggregator {
    options: AggregateOptions,
}

impl Aggregator {
    pub fn new(options: AggregateOptions) -> Self {
        Self { options }
    }

    /// Statistics for a single period.
    pub fn aggregate(&self, records: &[SaleRecord], period: Period) -> PeriodStats {
        let records = usable_records(records);
        let slices = self.partition(&records);
        let proportions = type_proportions(&records);
        let tenancy = partition_tenancy(&slices);
        self.aggregate_period(&slices, &records, period, proportions, tenancy)
    }

    /// Statistics for every period. Partitioning, trimming, tenancy and type
    /// proportions are computed once and shared.
    pub fn aggregate_all(&self, records: &[SaleRecord]) -> StatisticsDocument {
        let records = usable_records(records);
        let slices = self.partition(&records);
        let proportions = type_proportions(&records);
        let tenancy = partition_tenancy(&slices);

        let periods = Period::ALL
            .into_iter()
            .map(|period| self.aggregate_period(&slices, &records, period, proportions.clone(), tenancy.clone()))
            .collect();

        StatisticsDocument { periods }
    }

    fn partition<'a>(&self, records: &'a [SaleRecord]) -> Vec<PartitionSlice<'a>> {
        let mut by_type: BTreeMap<Partition, Vec<&'a SaleRecord>> = BTreeMap::new();
        for record in records {
            by_type.entry(Partition::Type(record.property_type.clone())).or_default().push(record);
        }
        by_type.insert(Partition::All, records.iter().collect());

        by_type
            .into_iter()
            .map(|(partition, mut records)| {
                records.sort_by_key(|r| r.date);
                let trimmed = match self.options.outlier_factor {
                    Some(factor) => metrics::trim_outliers(&records, factor),
                    None => records.clone(),
                };
                PartitionSlice { partition, records, trimmed }
            })
            .collect()
    }

    fn aggregate_period(
        &self, slices: &[PartitionSlice<'_>], records: &[SaleRecord], period: Period,
        type_proportions: Vec<TypeProportion>, average_tenancy: Vec<PartitionTenancy>,
    ) -> PeriodStats {
        let outputs: Vec<PartitionOutput> = slices.iter().map(|slice| self.partition_series(slice, period)).collect();

        let quick_stats = outputs
            .iter()
            .find(|o| o.price.partition == Partition::All)
            .map(|all| QuickStats::from_series(&all.price, &all.qty, &all.volume, records))
            .unwrap_or_else(QuickStats::zeroed);

        let mut stats = PeriodStats {
            period,
            average_price: Vec::with_capacity(outputs.len()),
            type_proportions,
            monthly_qty: Vec::with_capacity(outputs.len()),
            monthly_volume: Vec::with_capacity(outputs.len()),
            percentage_change: Vec::with_capacity(outputs.len()),
            average_tenancy,
            quick_stats,
        };

        for output in outputs {
            stats.average_price.push(output.price);
            stats.monthly_qty.push(output.qty);
            stats.monthly_volume.push(output.volume);
            stats.percentage_change.push(output.perc);
        }

        stats
    }

    fn partition_series(&self, slice: &PartitionSlice<'_>, period: Period) -> PartitionOutput {
        let averages: Vec<Point> = bucket::group_by_period(slice.trimmed.iter().copied(), period)
            .into_iter()
            .filter_map(|(date, prices)| metrics::geometric_mean(&prices).map(|mean| (date, mean)))
            .collect();
        let perc = metrics::percentage_changes(&averages, period);

        let untrimmed = bucket::group_by_period(slice.records.iter().copied(), period);
        let qty: Vec<Point> = untrimmed.iter().map(|(date, prices)| (*date, prices.len() as f64)).collect();
        let volume: Vec<Point> = untrimmed.iter().map(|(date, prices)| (*date, prices.iter().sum())).collect();

        let series = |points: Vec<Point>| {
            PartitionSeries::from_points(slice.partition.clone(), self.pad_or_keep(points, period, &slice.partition))
        };

        PartitionOutput { price: series(averages), qty: series(qty), volume: series(volume), perc: series(perc) }
    }

    fn pad_or_keep(&self, points: Vec<Point>, period: Period, partition: &Partition) -> Vec<Point> {
        match bucket::pad(&points, period, self.options.latest) {
            Ok(padded) => padded,
            Err(err) => {
                tracing::debug!(%period, %partition, error = %err, "Padding skipped, keeping unpadded series");
                points
            }
        }
    }
}

/// Distinct houses per property type, sorted by type.
/// Sales whose price can enter a log mean: finite and positive.
fn usable_records(records: &[SaleRecord]) -> Cow<'_, [SaleRecord]> {
    let usable = |r: &SaleRecord| r.price.is_finite() && r.price > 0.0;
    if records.iter().all(usable) {
        return Cow::Borrowed(records);
    }

    let kept: Vec<SaleRecord> = records.iter().filter(|r| usable(*r)).cloned().collect();
    tracing::warn!(dropped = records.len() - kept.len(), "Skipped sales with unusable prices");
    Cow::Owned(kept)
}

fn type_proportions(records: &[SaleRecord]) -> Vec<TypeProportion> {
    let mut houses: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for record in records {
        houses.entry(record.property_type.as_str()).or_default().insert(record.house_id.as_str());
    }

    houses
        .into_iter()
        .map(|(property_type, ids)| TypeProportion {
            property_type: property_type.to_string(),
            houses: ids.len() as u64,
        })
        .collect()
}

fn partition_tenancy(slices: &[PartitionSlice<'_>]) -> Vec<PartitionTenancy> {
    slices
        .iter()
        .map(|slice| PartitionTenancy {
            partition: slice.partition.clone(),
            seconds: tenancy::average_tenancy(slice.records.iter().copied()),
        })
        .collect()
}
