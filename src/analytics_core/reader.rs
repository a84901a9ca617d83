//! Read-only SQLite access for observations, listings, and alert definitions
//!
//! Every pipeline worker opens its own reader connection; WAL mode lets
//! readers proceed concurrently with the single writer connection.

use super::types::{AlertDefinition, Listing, PriceObservation};
use crate::storage::apply_pragmas;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const SECS_PER_DAY: i64 = 86_400;

#[derive(Debug)]
pub enum ReaderError {
    Database(rusqlite::Error),
}

impl From<rusqlite::Error> for ReaderError {
    fn from(err: rusqlite::Error) -> Self {
        ReaderError::Database(err)
    }
}

impl std::fmt::Display for ReaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReaderError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for ReaderError {}

/// Read-only price history reader
pub struct PriceReader {
    conn: Connection,
}

impl PriceReader {
    /// Open a read-only reader against the pipeline database
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, ReaderError> {
        let conn = Connection::open(db_path)?;
        apply_pragmas(&conn)?;

        // Reader connections never take write locks
        conn.execute("PRAGMA query_only = ON", [])?;

        Ok(Self { conn })
    }

    fn map_observation(row: &rusqlite::Row<'_>) -> rusqlite::Result<PriceObservation> {
        Ok(PriceObservation {
            id: row.get(0)?,
            listing_id: row.get(1)?,
            price: row.get(2)?,
            original_price: row.get(3)?,
            is_in_stock: row.get(4)?,
            observed_at: row.get(5)?,
        })
    }

    /// Observations for a listing in `[start, reference]`, ordered by
    /// observation time, ties broken by insertion order.
    ///
    /// Returns an empty Vec (not an error) when the window holds nothing.
    /// Duplicate-timestamp observations are all kept.
    pub fn observations_since(
        &self,
        listing_id: i64,
        start: i64,
        reference: i64,
    ) -> Result<Vec<PriceObservation>, ReaderError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, listing_id, price, original_price, is_in_stock, observed_at
             FROM observations
             WHERE listing_id = ?1 AND observed_at >= ?2 AND observed_at <= ?3
             ORDER BY observed_at ASC, id ASC",
        )?;

        let rows = stmt.query_map(
            rusqlite::params![listing_id, start, reference],
            Self::map_observation,
        )?;

        let mut observations = Vec::new();
        for row in rows {
            observations.push(row?);
        }
        Ok(observations)
    }

    /// Observations in the trailing `days`-day window ending at `reference`
    pub fn observations_in_window(
        &self,
        listing_id: i64,
        days: i64,
        reference: i64,
    ) -> Result<Vec<PriceObservation>, ReaderError> {
        self.observations_since(listing_id, reference - days * SECS_PER_DAY, reference)
    }

    /// Most recent observation at or before `reference`, None when absent
    pub fn latest_observation(
        &self,
        listing_id: i64,
        reference: i64,
    ) -> Result<Option<PriceObservation>, ReaderError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, listing_id, price, original_price, is_in_stock, observed_at
             FROM observations
             WHERE listing_id = ?1 AND observed_at <= ?2
             ORDER BY observed_at DESC, id DESC
             LIMIT 1",
        )?;

        let obs = stmt
            .query_row(rusqlite::params![listing_id, reference], Self::map_observation)
            .optional()?;
        Ok(obs)
    }

    fn map_listing(row: &rusqlite::Row<'_>) -> rusqlite::Result<Listing> {
        Ok(Listing {
            id: row.get(0)?,
            product_id: row.get(1)?,
            source_id: row.get(2)?,
            is_active: row.get(3)?,
        })
    }

    pub fn get_listing(&self, listing_id: i64) -> Result<Option<Listing>, ReaderError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, product_id, source_id, is_active FROM listings WHERE id = ?1",
        )?;
        let listing = stmt
            .query_row([listing_id], Self::map_listing)
            .optional()?;
        Ok(listing)
    }

    /// Ids of every active listing, ordered for deterministic batches
    pub fn active_listing_ids(&self) -> Result<Vec<i64>, ReaderError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM listings WHERE is_active = 1 ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    pub fn active_listings_of_product(
        &self,
        product_id: i64,
    ) -> Result<Vec<Listing>, ReaderError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, product_id, source_id, is_active
             FROM listings
             WHERE product_id = ?1 AND is_active = 1
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([product_id], Self::map_listing)?;

        let mut listings = Vec::new();
        for row in rows {
            listings.push(row?);
        }
        Ok(listings)
    }

    /// Ids of products having at least one active listing
    pub fn products_with_active_listings(&self) -> Result<Vec<i64>, ReaderError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT product_id FROM listings WHERE is_active = 1 ORDER BY product_id ASC",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    pub fn product_exists(&self, product_id: i64) -> Result<bool, ReaderError> {
        let mut stmt = self.conn.prepare("SELECT id FROM products WHERE id = ?1")?;
        Ok(stmt.exists([product_id])?)
    }

    /// All active alert definitions; inactive ones are never evaluated
    pub fn active_alerts(&self) -> Result<Vec<AlertDefinition>, ReaderError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, product_id, target_price, drop_percentage, is_active,
                    last_triggered_at, trigger_count
             FROM alert_definitions
             WHERE is_active = 1
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(AlertDefinition {
                id: row.get(0)?,
                product_id: row.get(1)?,
                target_price: row.get(2)?,
                drop_percentage: row.get(3)?,
                is_active: row.get(4)?,
                last_triggered_at: row.get(5)?,
                trigger_count: row.get(6)?,
            })
        })?;

        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(row?);
        }
        Ok(alerts)
    }

    /// Best price from the freshest comparison summary for a product
    pub fn latest_comparison_best(
        &self,
        product_id: i64,
    ) -> Result<Option<f64>, ReaderError> {
        let mut stmt = self.conn.prepare(
            "SELECT best_price FROM comparison_summaries
             WHERE product_id = ?1
             ORDER BY comparison_date DESC
             LIMIT 1",
        )?;
        let best = stmt
            .query_row([product_id], |row| row.get(0))
            .optional()?;
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::init_schema;
    use tempfile::tempdir;

    fn setup_test_db() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        let conn = Connection::open(&db_path).unwrap();
        init_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO sources (id, name) VALUES (1, 'shopA'), (2, 'shopB');
             INSERT INTO products (id, name) VALUES (10, 'widget');
             INSERT INTO listings (id, product_id, source_id, is_active)
             VALUES (100, 10, 1, 1), (101, 10, 2, 1), (102, 10, 2, 0);",
        )
        .unwrap();

        (dir, db_path)
    }

    fn insert_observation(conn: &Connection, listing_id: i64, price: f64, observed_at: i64) {
        conn.execute(
            "INSERT INTO observations (listing_id, price, observed_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![listing_id, price, observed_at],
        )
        .unwrap();
    }

    #[test]
    fn test_window_boundaries_inclusive() {
        let (_dir, db_path) = setup_test_db();
        let conn = Connection::open(&db_path).unwrap();

        let reference = 1_700_000_000;
        let start = reference - 30 * SECS_PER_DAY;
        insert_observation(&conn, 100, 1.0, start - 1); // outside
        insert_observation(&conn, 100, 2.0, start); // boundary
        insert_observation(&conn, 100, 3.0, reference); // boundary
        insert_observation(&conn, 100, 4.0, reference + 1); // outside
        drop(conn);

        let reader = PriceReader::open(&db_path).unwrap();
        let obs = reader.observations_in_window(100, 30, reference).unwrap();
        let prices: Vec<f64> = obs.iter().map(|o| o.price).collect();
        assert_eq!(prices, vec![2.0, 3.0]);
    }

    #[test]
    fn test_duplicate_timestamps_kept_in_insertion_order() {
        let (_dir, db_path) = setup_test_db();
        let conn = Connection::open(&db_path).unwrap();

        insert_observation(&conn, 100, 5.0, 1000);
        insert_observation(&conn, 100, 6.0, 1000);
        insert_observation(&conn, 100, 7.0, 1000);
        drop(conn);

        let reader = PriceReader::open(&db_path).unwrap();
        let obs = reader.observations_since(100, 0, 2000).unwrap();
        let prices: Vec<f64> = obs.iter().map(|o| o.price).collect();
        assert_eq!(prices, vec![5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_empty_window_is_empty_vec() {
        let (_dir, db_path) = setup_test_db();
        let reader = PriceReader::open(&db_path).unwrap();

        let obs = reader.observations_in_window(100, 30, 1_700_000_000).unwrap();
        assert!(obs.is_empty());
    }

    #[test]
    fn test_latest_observation_at_or_before_reference() {
        let (_dir, db_path) = setup_test_db();
        let conn = Connection::open(&db_path).unwrap();

        insert_observation(&conn, 100, 10.0, 1000);
        insert_observation(&conn, 100, 11.0, 2000);
        insert_observation(&conn, 100, 12.0, 3000);
        drop(conn);

        let reader = PriceReader::open(&db_path).unwrap();

        let latest = reader.latest_observation(100, 2500).unwrap().unwrap();
        assert_eq!(latest.price, 11.0);

        // Exact match counts
        let at = reader.latest_observation(100, 2000).unwrap().unwrap();
        assert_eq!(at.price, 11.0);

        // Nothing at or before
        assert!(reader.latest_observation(100, 500).unwrap().is_none());
    }

    #[test]
    fn test_active_enumeration_skips_inactive() {
        let (_dir, db_path) = setup_test_db();
        let reader = PriceReader::open(&db_path).unwrap();

        assert_eq!(reader.active_listing_ids().unwrap(), vec![100, 101]);
        let of_product = reader.active_listings_of_product(10).unwrap();
        assert_eq!(of_product.len(), 2);
        assert_eq!(reader.products_with_active_listings().unwrap(), vec![10]);
    }

    #[test]
    fn test_reader_is_query_only() {
        let (_dir, db_path) = setup_test_db();
        let reader = PriceReader::open(&db_path).unwrap();

        let result = reader.conn.execute(
            "INSERT INTO observations (listing_id, price, observed_at) VALUES (100, 1.0, 0)",
            [],
        );
        assert!(result.is_err());
    }
}
