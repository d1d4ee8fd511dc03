//! Domain types shared by the stats engine, the cache and the sale source.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::Error;

/// A single completed sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub price: f64,
    pub date: NaiveDate,
    pub property_type: String,
    pub house_id: String,
}

impl SaleRecord {
    pub fn new(price: f64, date: NaiveDate, property_type: impl Into<String>, house_id: impl Into<String>) -> Self {
        Self { price, date, property_type: property_type.into(), house_id: house_id.into() }
    }
}

/// Bucket width used when grouping sales over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1mo")]
    OneMonth,
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
    #[serde(rename = "12mo")]
    TwelveMonths,
}

impl Period {
    pub const ALL: [Period; 4] = [Period::OneMonth, Period::ThreeMonths, Period::SixMonths, Period::TwelveMonths];

    /// Width of the bucket in calendar months.
    pub fn months(self) -> u32 {
        match self {
            Period::OneMonth => 1,
            Period::ThreeMonths => 3,
            Period::SixMonths => 6,
            Period::TwelveMonths => 12,
        }
    }

    /// Divisor applied to period-over-period percentage changes.
    pub fn annualization_divisor(self) -> f64 {
        match self {
            Period::OneMonth => 12.0,
            Period::ThreeMonths => 4.0,
            Period::SixMonths => 2.0,
            Period::TwelveMonths => 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Period::OneMonth => "1mo",
            Period::ThreeMonths => "3mo",
            Period::SixMonths => "6mo",
            Period::TwelveMonths => "12mo",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A slice of the sales used for one set of series.
///
/// Ordering puts every property type (sorted by code) before `All`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Partition {
    Type(String),
    All,
}

impl From<String> for Partition {
    fn from(value: String) -> Self {
        if value == "all" { Partition::All } else { Partition::Type(value) }
    }
}

impl From<Partition> for String {
    fn from(value: Partition) -> Self {
        match value {
            Partition::Type(code) => code,
            Partition::All => "all".to_string(),
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Partition::Type(code) => f.write_str(code),
            Partition::All => f.write_str("all"),
        }
    }
}

/// Geography an area name is matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AreaType {
    Postcode,
    Street,
    Town,
    District,
    County,
    Outcode,
    Area,
    Sector,
    /// The whole dataset; only valid with the area `ALL`.
    Country,
}

impl AreaType {
    /// Column of the `postcodes` table holding this geography.
    pub fn column(self) -> Option<&'static str> {
        match self {
            AreaType::Postcode => Some("postcode"),
            AreaType::Street => Some("street"),
            AreaType::Town => Some("town"),
            AreaType::District => Some("district"),
            AreaType::County => Some("county"),
            AreaType::Outcode => Some("outcode"),
            AreaType::Area => Some("area"),
            AreaType::Sector => Some("sector"),
            AreaType::Country => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AreaType::Postcode => "POSTCODE",
            AreaType::Street => "STREET",
            AreaType::Town => "TOWN",
            AreaType::District => "DISTRICT",
            AreaType::County => "COUNTY",
            AreaType::Outcode => "OUTCODE",
            AreaType::Area => "AREA",
            AreaType::Sector => "SECTOR",
            AreaType::Country => "COUNTRY",
        }
    }

    /// Parse a case-insensitive area type name.
    pub fn parse(value: &str) -> Result<Self, Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "postcode" => Ok(AreaType::Postcode),
            "street" => Ok(AreaType::Street),
            "town" => Ok(AreaType::Town),
            "district" => Ok(AreaType::District),
            "county" => Ok(AreaType::County),
            "outcode" => Ok(AreaType::Outcode),
            "area" => Ok(AreaType::Area),
            "sector" => Ok(AreaType::Sector),
            "country" => Ok(AreaType::Country),
            other => Err(Error::InvalidInput(format!("unknown area type: {other:?}"))),
        }
    }
}

impl fmt::Display for AreaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache identifier for one area query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(String);

impl QueryKey {
    /// Canonical key: area followed by area type, uppercased, whitespace removed.
    pub fn new(area: &str, area_type: &str) -> Self {
        let key = area
            .chars()
            .chain(area_type.chars())
            .filter(|c| !c.is_whitespace())
            .flat_map(char::to_uppercase)
            .collect();
        Self(key)
    }

    /// Wrap a key read back from storage without re-canonicalizing it.
    pub(crate) fn from_stored(key: String) -> Self {
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A validated `(area, area_type)` request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AreaQuery {
    pub area: String,
    pub area_type: AreaType,
}

/// Area name that selects the whole dataset together with [`AreaType::Country`].
pub const COUNTRY_AREA: &str = "ALL";

impl AreaQuery {
    /// Validate and normalize a raw query. No I/O happens here.
    pub fn parse(area: &str, area_type: &str) -> Result<Self, Error> {
        let area_type = AreaType::parse(area_type)?;
        let area = area.trim().to_uppercase();

        if area.is_empty() {
            return Err(Error::InvalidInput("area cannot be empty".into()));
        }

        if (area_type == AreaType::Country) != (area == COUNTRY_AREA) {
            return Err(Error::InvalidInput(format!("{area} is not valid for area type {area_type}")));
        }

        Ok(Self { area, area_type })
    }

    /// The whole-dataset query.
    pub fn country() -> Self {
        Self { area: COUNTRY_AREA.to_string(), area_type: AreaType::Country }
    }

    pub fn is_country(&self) -> bool {
        self.area_type == AreaType::Country
    }

    pub fn key(&self) -> QueryKey {
        QueryKey::new(&self.area, self.area_type.as_str())
    }
}

impl fmt::Display for AreaQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.area, self.area_type)
    }
}

/// A house together with its sale history and the areas it sits in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseProfile {
    pub house_id: String,
    pub property_type: String,
    pub areas: Vec<AreaQuery>,
    pub sales: Vec<SaleRecord>,
}
