//! SQLite implementation of the Repository trait
//!
//! Records are stored as serialized JSON alongside the columns the
//! queries need (status, timestamps, amounts), using rusqlite and
//! tokio-rusqlite for async operations.

use async_trait::async_trait;
use tokio_rusqlite::Connection;

use super::migrations::CREATE_SCHEMA;
use super::Repository;
use crate::error::RepoError;
use crate::models::{DateRange, ListingRecord, SaleRecord};

/// SQLite repository implementation
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Open (or create) a repository at the given path
    ///
    /// Use `:memory:` for an in-memory database.
    pub async fn new(path: &str) -> Result<Self, RepoError> {
        let conn = Connection::open(path).await?;

        conn.call(|conn| {
            conn.execute_batch(CREATE_SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Create an in-memory repository (useful for testing)
    pub async fn in_memory() -> Result<Self, RepoError> {
        Self::new(":memory:").await
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn load_listing(&self, id: &str) -> Result<Option<ListingRecord>, RepoError> {
        let id = id.to_string();

        let payload: Option<String> = self
            .conn
            .call(move |conn| {
                use rusqlite::OptionalExtension;
                let payload = conn
                    .query_row(
                        "SELECT record FROM listings WHERE id = ?1",
                        [&id],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(payload)
            })
            .await?;

        match payload {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save_listing(&self, record: &ListingRecord) -> Result<(), RepoError> {
        let id = record.id.clone();
        let status = serde_json::to_string(&record.status)?;
        let updated_at = record.updated_at.to_rfc3339();
        let payload = serde_json::to_string(record)?;

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT OR REPLACE INTO listings (id, status, updated_at, record)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                    rusqlite::params![id, status, updated_at, payload],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    async fn delete_listing(&self, id: &str) -> Result<bool, RepoError> {
        let id = id.to_string();

        let deleted = self
            .conn
            .call(move |conn| {
                let count = conn.execute("DELETE FROM listings WHERE id = ?1", [&id])?;
                Ok(count > 0)
            })
            .await?;

        Ok(deleted)
    }

    async fn all_listings(&self) -> Result<Vec<ListingRecord>, RepoError> {
        let payloads: Vec<String> = self
            .conn
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT record FROM listings ORDER BY id")?;
                let rows = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        payloads
            .iter()
            .map(|json| serde_json::from_str(json).map_err(Into::into))
            .collect()
    }

    async fn load_sales(&self, range: &DateRange) -> Result<Vec<SaleRecord>, RepoError> {
        let start = range.start.to_rfc3339();
        let end = range.end.to_rfc3339();

        let payloads: Vec<String> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"
                    SELECT record FROM sales
                    WHERE sale_date >= ?1 AND sale_date <= ?2
                    ORDER BY sale_date
                    "#,
                )?;
                let rows = stmt
                    .query_map([&start, &end], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        payloads
            .iter()
            .map(|json| serde_json::from_str(json).map_err(Into::into))
            .collect()
    }

    async fn append_sale(&self, sale: &SaleRecord) -> Result<(), RepoError> {
        let sale_id = sale.sale_id.clone();
        let platform = sale.platform.clone();
        let listing_id = sale.listing_id.clone();
        let sale_date = sale.sale_date.to_rfc3339();
        let gross_amount = sale.gross_amount;
        let fees = sale.fees;
        let payload = serde_json::to_string(sale)?;

        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"
                    INSERT OR IGNORE INTO sales
                    (sale_id, platform, listing_id, sale_date, gross_amount, fees, record)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                    rusqlite::params![
                        sale_id,
                        platform,
                        listing_id,
                        sale_date,
                        gross_amount,
                        fees,
                        payload
                    ],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }
}
