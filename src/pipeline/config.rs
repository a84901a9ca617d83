//! Pipeline configuration from environment variables

use crate::analytics_core::classifier::ClassifierPolicy;
use std::env;

/// Configuration for pipeline runtime
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Path to SQLite database file
    pub db_path: String,

    /// Maximum items analyzed concurrently per task
    pub concurrency: usize,

    /// Per-item deadline in seconds; a timed-out item fails, the batch continues
    pub item_timeout_secs: u64,

    /// Backoff before the single retry of a transient item failure
    pub retry_backoff_ms: u64,

    /// Maximum item errors kept per task report
    pub error_cap: usize,

    /// Minimum actual/claimed discount ratio below which a claim is overstated
    pub overstatement_ratio: f64,

    /// Mean-shift percent separating directional trends from stable
    pub trend_threshold_pct: f64,

    /// 30-day spread percent above which a price history is volatile
    pub volatility_threshold_pct: f64,
}

impl PipelineConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `PRICEWATCH_DB_PATH` (default: data/pricewatch.db)
    /// - `PIPELINE_CONCURRENCY` (default: 4)
    /// - `ITEM_TIMEOUT_SECS` (default: 30)
    /// - `RETRY_BACKOFF_MS` (default: 250)
    /// - `REPORT_ERROR_CAP` (default: 50)
    /// - `OVERSTATEMENT_RATIO` (default: 0.5)
    /// - `TREND_THRESHOLD_PCT` (default: 2.0)
    /// - `VOLATILITY_THRESHOLD_PCT` (default: 25.0)
    pub fn from_env() -> Self {
        Self {
            db_path: env::var("PRICEWATCH_DB_PATH")
                .unwrap_or_else(|_| "data/pricewatch.db".to_string()),

            concurrency: env::var("PIPELINE_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(4),

            item_timeout_secs: env::var("ITEM_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),

            retry_backoff_ms: env::var("RETRY_BACKOFF_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(250),

            error_cap: env::var("REPORT_ERROR_CAP")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(50),

            overstatement_ratio: env::var("OVERSTATEMENT_RATIO")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(0.5),

            trend_threshold_pct: env::var("TREND_THRESHOLD_PCT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2.0),

            volatility_threshold_pct: env::var("VOLATILITY_THRESHOLD_PCT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(25.0),
        }
    }

    /// Classifier knobs derived from this configuration
    pub fn classifier_policy(&self) -> ClassifierPolicy {
        ClassifierPolicy::new(
            self.overstatement_ratio,
            self.trend_threshold_pct,
            self.volatility_threshold_pct,
        )
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            db_path: "data/pricewatch.db".to_string(),
            concurrency: 4,
            item_timeout_secs: 30,
            retry_backoff_ms: 250,
            error_cap: 50,
            overstatement_ratio: 0.5,
            trend_threshold_pct: 2.0,
            volatility_threshold_pct: 25.0,
        }
    }
}
