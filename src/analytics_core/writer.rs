//! Result persistence: keyed upserts and alert trigger bookkeeping
//!
//! One writer connection is shared behind a mutex; each verdict or summary
//! commits in a single upsert statement, so a row is never half-written.
//! The UNIQUE (key, date) constraints make re-runs overwrite in place.

use super::types::{ComparisonSummary, DiscountVerdict};
use crate::storage::apply_pragmas;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub enum WriterError {
    Database(rusqlite::Error),
    /// The targeted row does not exist (e.g. alert definition deleted mid-run)
    MissingRow(String),
    Poisoned,
}

impl From<rusqlite::Error> for WriterError {
    fn from(err: rusqlite::Error) -> Self {
        WriterError::Database(err)
    }
}

impl std::fmt::Display for WriterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriterError::Database(e) => write!(f, "Database error: {}", e),
            WriterError::MissingRow(what) => write!(f, "Missing row: {}", what),
            WriterError::Poisoned => write!(f, "Writer lock poisoned"),
        }
    }
}

impl std::error::Error for WriterError {}

/// Shared writer for pipeline results
pub struct ResultWriter {
    conn: Arc<Mutex<Connection>>,
}

impl ResultWriter {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, WriterError> {
        let conn = Connection::open(db_path)?;
        apply_pragmas(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, WriterError> {
        self.conn.lock().map_err(|_| WriterError::Poisoned)
    }

    /// Upsert a verdict keyed by (listing_id, analysis_date)
    pub fn upsert_verdict(&self, verdict: &DiscountVerdict, now: i64) -> Result<(), WriterError> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO discount_verdicts (
                listing_id, analysis_date,
                min_price_30d, max_price_30d, avg_price_30d,
                min_price_60d, max_price_60d, avg_price_60d,
                min_price_90d, max_price_90d, avg_price_90d,
                current_price, claimed_discount_pct, actual_discount_pct,
                is_fake, fake_reason, trend, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(listing_id, analysis_date) DO UPDATE SET
                min_price_30d = excluded.min_price_30d,
                max_price_30d = excluded.max_price_30d,
                avg_price_30d = excluded.avg_price_30d,
                min_price_60d = excluded.min_price_60d,
                max_price_60d = excluded.max_price_60d,
                avg_price_60d = excluded.avg_price_60d,
                min_price_90d = excluded.min_price_90d,
                max_price_90d = excluded.max_price_90d,
                avg_price_90d = excluded.avg_price_90d,
                current_price = excluded.current_price,
                claimed_discount_pct = excluded.claimed_discount_pct,
                actual_discount_pct = excluded.actual_discount_pct,
                is_fake = excluded.is_fake,
                fake_reason = excluded.fake_reason,
                trend = excluded.trend
            "#,
            rusqlite::params![
                verdict.listing_id,
                verdict.analysis_date.to_string(),
                verdict.stats_30d.map(|s| s.min),
                verdict.stats_30d.map(|s| s.max),
                verdict.stats_30d.map(|s| s.mean),
                verdict.stats_60d.map(|s| s.min),
                verdict.stats_60d.map(|s| s.max),
                verdict.stats_60d.map(|s| s.mean),
                verdict.stats_90d.map(|s| s.min),
                verdict.stats_90d.map(|s| s.max),
                verdict.stats_90d.map(|s| s.mean),
                verdict.current_price,
                verdict.claimed_discount_pct,
                verdict.actual_discount_pct,
                verdict.is_fake,
                verdict.fake_reason,
                verdict.trend.as_str(),
                now,
            ],
        )?;
        Ok(())
    }

    /// Upsert a summary keyed by (product_id, comparison_date)
    pub fn upsert_comparison(
        &self,
        summary: &ComparisonSummary,
        now: i64,
    ) -> Result<(), WriterError> {
        let conn = self.lock()?;
        conn.execute(
            r#"
            INSERT INTO comparison_summaries (
                product_id, comparison_date, best_price, best_listing_id,
                min_price, max_price, mean_price, price_variance,
                source_count, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(product_id, comparison_date) DO UPDATE SET
                best_price = excluded.best_price,
                best_listing_id = excluded.best_listing_id,
                min_price = excluded.min_price,
                max_price = excluded.max_price,
                mean_price = excluded.mean_price,
                price_variance = excluded.price_variance,
                source_count = excluded.source_count
            "#,
            rusqlite::params![
                summary.product_id,
                summary.comparison_date.to_string(),
                summary.best_price,
                summary.best_listing_id,
                summary.min_price,
                summary.max_price,
                summary.mean_price,
                summary.price_variance,
                summary.source_count as i64,
                now,
            ],
        )?;
        Ok(())
    }

    /// Record one alert firing: bump trigger_count by exactly 1 and stamp
    /// last_triggered_at
    pub fn record_trigger(&self, definition_id: i64, fired_at: i64) -> Result<(), WriterError> {
        let conn = self.lock()?;
        let updated = conn.execute(
            "UPDATE alert_definitions
             SET last_triggered_at = ?1, trigger_count = trigger_count + 1
             WHERE id = ?2",
            rusqlite::params![fired_at, definition_id],
        )?;
        if updated == 0 {
            return Err(WriterError::MissingRow(format!(
                "alert definition {}",
                definition_id
            )));
        }
        Ok(())
    }
}
