//! SQLite schema bootstrap and connection tuning
//!
//! All DDL uses IF NOT EXISTS so schema initialization is idempotent and
//! safe to run at every startup.

use rusqlite::Connection;

/// Apply connection PRAGMAs (WAL, NORMAL, busy_timeout)
///
/// WAL lets the pipeline's read connections proceed while the single
/// writer connection commits upserts.
pub fn apply_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "busy_timeout", 5000)?;
    Ok(())
}

/// Create all tables and indexes used by the pipeline
///
/// Reference data (sources, products, listings) and observations are
/// populated externally by the scraping subsystem; the pipeline only
/// reads them. Result tables (discount_verdicts, comparison_summaries)
/// and alert trigger bookkeeping are owned by the pipeline.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sources (
            id          INTEGER PRIMARY KEY,
            name        TEXT NOT NULL UNIQUE,
            is_active   INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS products (
            id          INTEGER PRIMARY KEY,
            name        TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS listings (
            id          INTEGER PRIMARY KEY,
            product_id  INTEGER NOT NULL REFERENCES products(id),
            source_id   INTEGER NOT NULL REFERENCES sources(id),
            is_active   INTEGER NOT NULL DEFAULT 1
        );

        CREATE TABLE IF NOT EXISTS observations (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            listing_id      INTEGER NOT NULL REFERENCES listings(id),
            price           REAL NOT NULL CHECK (price > 0),
            original_price  REAL,
            is_in_stock     INTEGER NOT NULL DEFAULT 1,
            observed_at     INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_observations_listing_time
            ON observations(listing_id, observed_at DESC);

        CREATE TABLE IF NOT EXISTS discount_verdicts (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            listing_id          INTEGER NOT NULL,
            analysis_date       TEXT NOT NULL,
            min_price_30d       REAL,
            max_price_30d       REAL,
            avg_price_30d       REAL,
            min_price_60d       REAL,
            max_price_60d       REAL,
            avg_price_60d       REAL,
            min_price_90d       REAL,
            max_price_90d       REAL,
            avg_price_90d       REAL,
            current_price       REAL NOT NULL,
            claimed_discount_pct REAL,
            actual_discount_pct REAL,
            is_fake             INTEGER NOT NULL DEFAULT 0,
            fake_reason         TEXT,
            trend               TEXT NOT NULL,
            created_at          INTEGER NOT NULL,
            UNIQUE(listing_id, analysis_date)
        );

        CREATE TABLE IF NOT EXISTS comparison_summaries (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            product_id      INTEGER NOT NULL,
            comparison_date TEXT NOT NULL,
            best_price      REAL NOT NULL,
            best_listing_id INTEGER NOT NULL,
            min_price       REAL NOT NULL,
            max_price       REAL NOT NULL,
            mean_price      REAL NOT NULL,
            price_variance  REAL NOT NULL,
            source_count    INTEGER NOT NULL,
            created_at      INTEGER NOT NULL,
            UNIQUE(product_id, comparison_date)
        );

        CREATE TABLE IF NOT EXISTS alert_definitions (
            id                INTEGER PRIMARY KEY,
            product_id        INTEGER NOT NULL,
            target_price      REAL,
            drop_percentage   REAL,
            is_active         INTEGER NOT NULL DEFAULT 1,
            last_triggered_at INTEGER,
            trigger_count     INTEGER NOT NULL DEFAULT 0
        );
        "#,
    )
}

/// Open (or create) the pipeline database with pragmas and schema applied
pub fn init_db(db_path: &str) -> rusqlite::Result<Connection> {
    if let Some(parent) = std::path::Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
    let conn = Connection::open(db_path)?;
    apply_pragmas(&conn)?;
    init_schema(&conn)?;
    Ok(conn)
}
