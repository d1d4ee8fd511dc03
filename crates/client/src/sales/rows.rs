//! Decoding of sale store rows.

use chrono::{DateTime, NaiveDate, Utc};
use housestats_core::{AreaQuery, AreaType};
use tokio_rusqlite::rusqlite::types::Value;

/// Parse a stored sale date. Accepts a bare date or a date followed by a time.
pub fn parse_sale_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// Interpret the `settings.data` value of the `last_updated` row as unix
/// seconds. The ingest pipeline writes it as text, but numeric values are
/// accepted too.
pub fn parse_marker(value: &Value) -> Option<DateTime<Utc>> {
    let seconds = match value {
        Value::Integer(secs) => *secs as f64,
        Value::Real(secs) => *secs,
        Value::Text(text) => text.trim().parse::<f64>().ok()?,
        Value::Null | Value::Blob(_) => return None,
    };
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

/// Geographies a house is looked up under for valuation, narrowest first.
pub const HOUSE_AREA_TYPES: [AreaType; 7] = [
    AreaType::Postcode,
    AreaType::Sector,
    AreaType::Outcode,
    AreaType::Area,
    AreaType::District,
    AreaType::Town,
    AreaType::County,
];

/// Build area queries from the postcode row of a house, skipping blank
/// columns. `values` is aligned with [`HOUSE_AREA_TYPES`].
pub fn house_areas(values: &[Option<String>]) -> Vec<AreaQuery> {
    HOUSE_AREA_TYPES
        .iter()
        .zip(values)
        .filter_map(|(area_type, value)| {
            let value = value.as_deref()?.trim();
            if value.is_empty() {
                return None;
            }
            AreaQuery::parse(value, area_type.as_str()).ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sale_date() {
        let expected = NaiveDate::from_ymd_opt(2021, 3, 9);
        assert_eq!(parse_sale_date("2021-03-09"), expected);
        assert_eq!(parse_sale_date("2021-03-09 00:00"), expected);
        assert_eq!(parse_sale_date("09/03/2021"), None);
        assert_eq!(parse_sale_date(""), None);
    }

    #[test]
    fn test_parse_marker_forms() {
        let expected = DateTime::from_timestamp(1_700_000_000, 0);
        assert_eq!(parse_marker(&Value::Integer(1_700_000_000)), expected);
        assert_eq!(parse_marker(&Value::Text("1700000000.0".into())), expected);
        assert_eq!(parse_marker(&Value::Real(1_700_000_000.5)), DateTime::from_timestamp(1_700_000_000, 500_000_000));
        assert_eq!(parse_marker(&Value::Text("yesterday".into())), None);
        assert_eq!(parse_marker(&Value::Null), None);
    }

    #[test]
    fn test_house_areas_skip_blanks() {
        let values = vec![
            Some("EX2 4AB".to_string()),
            Some("EX2 4".to_string()),
            Some("EX2".to_string()),
            Some("EX".to_string()),
            None,
            Some(" ".to_string()),
            Some("DEVON".to_string()),
        ];
        let areas = house_areas(&values);
        let names: Vec<String> = areas.iter().map(|a| a.to_string()).collect();
        assert_eq!(names, vec!["EX2 4AB(POSTCODE)", "EX2 4(SECTOR)", "EX2(OUTCODE)", "EX(AREA)", "DEVON(COUNTY)"]);
    }
}
