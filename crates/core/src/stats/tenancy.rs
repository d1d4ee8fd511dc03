//! Average ownership duration from resale history.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::model::SaleRecord;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Mean over houses of each house's mean interval between consecutive sales,
/// in seconds. Houses sold once are skipped; 0 when no house was resold.
pub fn average_tenancy<'a>(records: impl IntoIterator<Item = &'a SaleRecord>) -> f64 {
    let mut by_house: HashMap<&str, Vec<NaiveDate>> = HashMap::new();
    for record in records {
        by_house.entry(record.house_id.as_str()).or_default().push(record.date);
    }

    let per_house: Vec<f64> = by_house
        .into_values()
        .filter(|dates| dates.len() >= 2)
        .map(|mut dates| {
            dates.sort_unstable();
            let total_days: i64 = dates.windows(2).map(|pair| (pair[1] - pair[0]).num_days()).sum();
            total_days as f64 / (dates.len() - 1) as f64
        })
        .collect();

    if per_house.is_empty() {
        return 0.0;
    }

    per_house.iter().sum::<f64>() / per_house.len() as f64 * SECONDS_PER_DAY
}
