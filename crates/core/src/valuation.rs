//! House price estimation from area growth.
//!
//! A house's last sale price is carried forward month by month using the
//! monthly percentage-change series of every area it belongs to. Each area
//! gives one estimate; the spread across areas is the reported range.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::model::{AreaQuery, Partition, Period, SaleRecord};
use crate::orchestrator::{AreaOutcome, TaskOrchestrator};
use crate::source::SaleSource;
use crate::stats::PartitionSeries;
use crate::stats::bucket::bucket_start;

/// Estimate derived from one area's growth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaEstimate {
    pub area: String,
    pub area_type: String,
    pub estimate: f64,
}

/// An area that did not contribute an estimate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedArea {
    pub area: String,
    pub area_type: String,
    pub outcome: AreaOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    pub house_id: String,
    pub last_sale: SaleRecord,
    pub low: f64,
    pub high: f64,
    pub estimates: Vec<AreaEstimate>,
    pub skipped: Vec<SkippedArea>,
}

/// Carry `price` forward through every monthly change dated after the month
/// of `sold_on`. Changes are annualized, so each is scaled back by 12.
pub fn compound(price: f64, sold_on: NaiveDate, monthly_changes: &PartitionSeries) -> f64 {
    let sale_month = bucket_start(sold_on, Period::OneMonth);
    monthly_changes
        .points()
        .filter(|(date, _)| Some(*date) > sale_month)
        .fold(price, |value, (_, perc)| value * (1.0 + perc * Period::OneMonth.annualization_divisor() / 100.0))
}

pub struct Valuer {
    source: Arc<dyn SaleSource>,
    orchestrator: TaskOrchestrator,
}

impl Valuer {
    pub fn new(source: Arc<dyn SaleSource>, orchestrator: TaskOrchestrator) -> Self {
        Self { source, orchestrator }
    }

    /// Estimate the current price range of a house.
    pub async fn value_house(&self, house_id: &str) -> Result<Valuation, Error> {
        let house_id = house_id.trim();
        if house_id.is_empty() {
            return Err(Error::InvalidInput("house_id cannot be empty".into()));
        }

        let profile = self
            .source
            .fetch_house(house_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("unknown house {house_id}")))?;

        let last_sale = profile
            .sales
            .iter()
            .max_by_key(|sale| sale.date)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("house {house_id} has no sales")))?;

        let areas: Vec<AreaQuery> = profile.areas;
        let requests = areas.iter().map(|q| (q.area.clone(), q.area_type.as_str().to_string())).collect();
        let outcomes = self.orchestrator.run_multi_area_job(requests).await;

        let mut estimates = Vec::new();
        let mut skipped = Vec::new();
        for (query, outcome) in areas.into_iter().zip(outcomes) {
            let area_type = query.area_type.as_str().to_string();
            let changes = outcome
                .document()
                .and_then(|doc| doc.period(Period::OneMonth))
                .and_then(|stats| stats.perc_series(&Partition::All));

            match changes {
                Some(series) => estimates.push(AreaEstimate {
                    estimate: compound(last_sale.price, last_sale.date, series),
                    area: query.area,
                    area_type,
                }),
                None => skipped.push(SkippedArea { area: query.area, area_type, outcome }),
            }
        }

        if estimates.is_empty() {
            return Err(Error::NotFound(format!("no area statistics available for house {house_id}")));
        }

        let low = estimates.iter().map(|e| e.estimate).fold(f64::INFINITY, f64::min).round();
        let high = estimates.iter().map(|e| e.estimate).fold(f64::NEG_INFINITY, f64::max).round();

        tracing::info!(house_id, low, high, areas = estimates.len(), skipped = skipped.len(), "Valued house");
        Ok(Valuation { house_id: house_id.to_string(), last_sale, low, high, estimates, skipped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::tests::{FakeSource, date};
    use crate::model::{HouseProfile, QueryKey};
    use crate::orchestrator::AreaJob;
    use crate::stats::{PeriodStats, QuickStats, StatisticsDocument};
    use std::collections::HashMap;
    use std::time::Duration;

    fn monthly_changes(points: &[(NaiveDate, f64)]) -> PartitionSeries {
        PartitionSeries {
            partition: Partition::All,
            dates: points.iter().map(|p| p.0).collect(),
            values: points.iter().map(|p| p.1).collect(),
        }
    }

    fn document(changes: PartitionSeries) -> StatisticsDocument {
        StatisticsDocument {
            periods: vec![PeriodStats {
                period: Period::OneMonth,
                average_price: Vec::new(),
                type_proportions: Vec::new(),
                monthly_qty: Vec::new(),
                monthly_volume: Vec::new(),
                percentage_change: vec![changes],
                average_tenancy: Vec::new(),
                quick_stats: QuickStats::zeroed(),
            }],
        }
    }

    /// Serves fixed documents keyed by query key.
    struct FixedDocuments(HashMap<QueryKey, StatisticsDocument>);

    #[async_trait::async_trait]
    impl AreaJob for FixedDocuments {
        async fn run(&self, area: &str, area_type: &str) -> Result<StatisticsDocument, Error> {
            self.0.get(&QueryKey::new(area, area_type)).cloned().ok_or_else(|| Error::NotFound(area.to_string()))
        }
    }

    #[test]
    fn test_compound_skips_sale_month_and_earlier() {
        // 12% annualized is 1% a month
        let changes = monthly_changes(&[
            (date(2023, 12, 1), 12.0),
            (date(2024, 1, 1), 12.0),
            (date(2024, 2, 1), 12.0),
            (date(2024, 3, 1), -12.0),
        ]);
        let value = compound(100_000.0, date(2024, 1, 20), &changes);
        assert!((value - 100_000.0 * 1.01 * 0.99).abs() < 1e-6);
    }

    #[test]
    fn test_compound_without_later_changes() {
        let changes = monthly_changes(&[(date(2020, 1, 1), 24.0)]);
        assert_eq!(compound(250_000.0, date(2021, 6, 1), &changes), 250_000.0);
    }

    fn house(areas: &[(&str, &str)]) -> HouseProfile {
        HouseProfile {
            house_id: "h1".into(),
            property_type: "D".into(),
            areas: areas.iter().map(|(a, t)| AreaQuery::parse(a, t).unwrap()).collect(),
            sales: vec![
                SaleRecord::new(80_000.0, date(2010, 5, 2), "D", "h1"),
                SaleRecord::new(100_000.0, date(2024, 1, 20), "D", "h1"),
            ],
        }
    }

    fn valuer(profile: HouseProfile, documents: HashMap<QueryKey, StatisticsDocument>) -> Valuer {
        let mut source = FakeSource::default();
        source.houses.insert(profile.house_id.clone(), profile);
        let orchestrator = TaskOrchestrator::new(Arc::new(FixedDocuments(documents)), 2, Duration::from_secs(5));
        Valuer::new(Arc::new(source), orchestrator)
    }

    #[tokio::test]
    async fn test_range_over_areas() {
        let mut documents = HashMap::new();
        documents.insert(QueryKey::new("EX2", "OUTCODE"), document(monthly_changes(&[(date(2024, 2, 1), 12.0)])));
        documents.insert(QueryKey::new("EXETER", "TOWN"), document(monthly_changes(&[(date(2024, 2, 1), 24.0)])));

        let valuation = valuer(house(&[("EX2", "outcode"), ("EXETER", "town"), ("EX", "area")]), documents)
            .value_house("h1")
            .await
            .unwrap();

        assert_eq!(valuation.last_sale.price, 100_000.0);
        assert_eq!(valuation.estimates.len(), 2);
        assert_eq!(valuation.low, 101_000.0);
        assert_eq!(valuation.high, 102_000.0);
        assert_eq!(valuation.skipped.len(), 1);
        assert_eq!(valuation.skipped[0].area, "EX");
        assert!(matches!(valuation.skipped[0].outcome, AreaOutcome::NoData { .. }));
    }

    #[tokio::test]
    async fn test_unknown_house() {
        let result = valuer(house(&[]), HashMap::new()).value_house("nope").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_no_completed_areas() {
        let result = valuer(house(&[("EX2", "outcode")]), HashMap::new()).value_house("h1").await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_house_without_sales() {
        let mut profile = house(&[("EX2", "outcode")]);
        profile.sales.clear();
        let result = valuer(profile, HashMap::new()).value_house("h1").await;
        assert!(matches!(result, Err(Error::NotFound(ref msg)) if msg.contains("no sales")));
    }
}
