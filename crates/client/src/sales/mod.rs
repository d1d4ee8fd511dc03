//! Sale record source over the SQLite price-paid store.
//!
//! ### Tables
//! - `postcodes`: one row per postcode with its street, town, district,
//!   county, outcode, area and sector.
//! - `houses`: `houseid`, `postcode`, `type`, plus address columns.
//! - `sales`: `houseid`, `price`, `date`, `ppd_cat`.
//! - `settings`: `name`/`data` pairs; `last_updated` holds unix seconds.
//!
//! ### Filters
//! - Only standard price-paid sales (`ppd_cat = 'A'`).
//! - Property type `O` (other) is excluded.
//!
//! The store is written by the ingest pipeline; this module only reads it.

pub mod rows;

use std::path::Path;

use chrono::{DateTime, Utc};
use housestats_core::{AreaQuery, Error, HouseProfile, SaleRecord, SaleSource};
use tokio_rusqlite::Connection;
use tokio_rusqlite::rusqlite::{self, ErrorCode, OpenFlags, OptionalExtension, params};

use rows::{house_areas, parse_marker, parse_sale_date};

const SALES_SELECT: &str = "SELECT s.price, s.date, h.type, h.houseid
     FROM postcodes AS p
     INNER JOIN houses AS h ON p.postcode = h.postcode AND h.type != 'O'
     INNER JOIN sales AS s ON h.houseid = s.houseid
     WHERE s.ppd_cat = 'A'";

/// Read-only sale store handle.
#[derive(Clone, Debug)]
pub struct SqliteSaleSource {
    conn: Connection,
}

impl SqliteSaleSource {
    /// Open the store at `path` read-only.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX | OpenFlags::SQLITE_OPEN_URI;
        let conn = Connection::open_with_flags(&path, flags)
            .await
            .map_err(|e| Error::SourceUnavailable(format!("cannot open {}: {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "Opened sale store");
        Ok(Self { conn })
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    async fn read<T, F>(&self, f: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: FnOnce(&mut rusqlite::Connection) -> Result<T, Error> + Send + 'static,
    {
        self.conn.call(f).await.map_err(|e| match e {
            tokio_rusqlite::Error::Error(err) => err,
            tokio_rusqlite::Error::ConnectionClosed => Error::SourceUnavailable("sale store connection closed".into()),
            _ => Error::SourceUnavailable("sale store connection failed".into()),
        })
    }
}

/// Lock, busy and open failures are transient; everything else is a store error.
fn store_error(err: rusqlite::Error) -> Error {
    match err.sqlite_error_code() {
        Some(
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen | ErrorCode::SystemIoFailure,
        ) => {
            Error::SourceUnavailable(err.to_string())
        }
        _ => Error::from(err),
    }
}

fn collect_sales(stmt: &mut rusqlite::Statement<'_>, params: impl rusqlite::Params) -> Result<Vec<SaleRecord>, Error> {
    let rows = stmt
        .query_map(params, |row| {
            Ok((row.get::<_, f64>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?, row.get::<_, String>(3)?))
        })
        .map_err(store_error)?;

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for row in rows {
        let (price, date, property_type, house_id) = row.map_err(store_error)?;
        match parse_sale_date(&date) {
            Some(date) if price > 0.0 => records.push(SaleRecord::new(price, date, property_type, house_id)),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::warn!(skipped, "Skipped sale rows with unreadable date or price");
    }
    Ok(records)
}

#[async_trait::async_trait]
impl SaleSource for SqliteSaleSource {
    async fn fetch_records(&self, query: &AreaQuery) -> Result<Vec<SaleRecord>, Error> {
        let query = query.clone();
        let records = self
            .read(move |conn| -> Result<Vec<SaleRecord>, Error> {
                let Some(column) = query.area_type.column() else {
                    let mut stmt = conn.prepare(SALES_SELECT).map_err(store_error)?;
                    return collect_sales(&mut stmt, []);
                };

                let exists = format!("SELECT 1 FROM postcodes WHERE {column} = ?1 LIMIT 1");
                let known: Option<i64> = conn
                    .query_row(&exists, params![query.area], |row| row.get(0))
                    .optional()
                    .map_err(store_error)?;
                if known.is_none() {
                    return Err(Error::NotFound(format!("unknown {} {}", column, query.area)));
                }

                let mut stmt = conn.prepare(&format!("{SALES_SELECT} AND p.{column} = ?1")).map_err(store_error)?;
                let records = collect_sales(&mut stmt, params![query.area])?;
                if records.is_empty() {
                    return Err(Error::NotFound(format!("no sales for {query}")));
                }
                Ok(records)
            })
            .await?;

        tracing::debug!(count = records.len(), "Loaded sale records");
        Ok(records)
    }

    async fn fetch_freshness_marker(&self) -> Result<Option<DateTime<Utc>>, Error> {
        self.read(|conn| -> Result<Option<DateTime<Utc>>, Error> {
            let value: Option<rusqlite::types::Value> = conn
                .query_row("SELECT data FROM settings WHERE name = 'last_updated'", [], |row| row.get(0))
                .optional()
                .map_err(store_error)?;
            Ok(value.as_ref().and_then(parse_marker))
        })
        .await
    }

    async fn fetch_house(&self, house_id: &str) -> Result<Option<HouseProfile>, Error> {
        let house_id = house_id.to_string();
        self.read(move |conn| -> Result<Option<HouseProfile>, Error> {
            let house = conn
                .query_row(
                    "SELECT h.type, p.postcode, p.sector, p.outcode, p.area, p.district, p.town, p.county
                     FROM houses AS h
                     INNER JOIN postcodes AS p ON p.postcode = h.postcode
                     WHERE h.houseid = ?1",
                    params![house_id],
                    |row| {
                        let property_type: String = row.get(0)?;
                        let areas =
                            (1..=7usize).map(|i| row.get::<_, Option<String>>(i)).collect::<Result<Vec<_>, _>>()?;
                        Ok((property_type, areas))
                    },
                )
                .optional()
                .map_err(store_error)?;

            let Some((property_type, area_values)) = house else {
                return Ok(None);
            };

            let mut stmt = conn
                .prepare(
                    "SELECT s.price, s.date, h.type, h.houseid
                     FROM sales AS s
                     INNER JOIN houses AS h ON h.houseid = s.houseid
                     WHERE s.houseid = ?1 AND s.ppd_cat = 'A'
                     ORDER BY s.date",
                )
                .map_err(store_error)?;
            let sales = collect_sales(&mut stmt, params![house_id])?;

            Ok(Some(HouseProfile { house_id, property_type, areas: house_areas(&area_values), sales }))
        })
        .await
    }
}
