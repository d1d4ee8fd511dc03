//! Freshness boundary derived from the ingestion marker.
//!
//! The ingest pipeline stamps the sale store after every load, but the most
//! recent months of a load are still incomplete. A marker inside the window is
//! therefore pulled back to a fixed month boundary so both cache validity and
//! padding ignore the partial months.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, Utc};

/// Window and backdate applied to the raw marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    pub window_days: i64,
    pub backdate_months: u32,
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self { window_days: 60, backdate_months: 2 }
    }
}

impl FreshnessPolicy {
    /// Effective marker for `raw` as seen at `now`. A missing marker is the
    /// Unix epoch.
    pub fn effective_marker(&self, raw: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
        let raw = raw.unwrap_or(DateTime::UNIX_EPOCH);
        // a window reaching past the representable range covers every marker
        let window_start = Duration::try_days(self.window_days)
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        if raw <= window_start {
            return raw;
        }

        NaiveDate::from_ymd_opt(now.year(), now.month(), 1)
            .and_then(|month_start| month_start.checked_sub_months(Months::new(self.backdate_months)))
            .map(|start| start.and_time(NaiveTime::MIN).and_utc())
            .unwrap_or(raw)
    }
}

/// An entry stamped at `last_updated` is valid against `effective`.
pub fn is_fresh(last_updated: DateTime<Utc>, effective: DateTime<Utc>) -> bool {
    last_updated >= effective
}
