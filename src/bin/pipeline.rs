//! Pipeline Binary - Price Analytics Runner
//!
//! Runs the batch analytics pipeline (discount analysis, price
//! comparison, alert checks) once and prints the run report as JSON.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --release --bin pipeline            # all tasks, in order
//! cargo run --release --bin pipeline discounts  # discount analysis only
//! cargo run --release --bin pipeline comparison # price comparison only
//! cargo run --release --bin pipeline alerts     # alert checks only
//! ```
//!
//! ## Environment Variables
//!
//! - PRICEWATCH_DB_PATH - SQLite database path (default: data/pricewatch.db)
//! - PIPELINE_CONCURRENCY - Concurrent items per task (default: 4)
//! - ITEM_TIMEOUT_SECS - Per-item deadline (default: 30)
//! - RETRY_BACKOFF_MS - Backoff before the single retry (default: 250)
//! - REPORT_ERROR_CAP - Max item errors kept per task report (default: 50)
//! - OVERSTATEMENT_RATIO / TREND_THRESHOLD_PCT / VOLATILITY_THRESHOLD_PCT
//!   - Classifier policy knobs (defaults: 0.5 / 2.0 / 25.0)
//! - RUST_LOG - Logging level (optional, default: info)

use pricewatch::pipeline::{Orchestrator, PipelineConfig, RunReport};
use pricewatch::storage;
use std::env;
use std::sync::atomic::Ordering;

fn print_summary(report: &RunReport) {
    log::info!(
        "🏁 Run complete: {}/{} tasks succeeded in {}ms",
        report.successful_tasks,
        report.total_tasks,
        report.duration_ms
    );
    for task in &report.tasks {
        log::info!(
            "   {} [{}]: {} processed, {} succeeded, {} failed, {} flagged",
            task.task,
            task.status.as_str(),
            task.processed,
            task.succeeded,
            task.failed,
            task.flagged
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    dotenv::dotenv().ok();

    let config = PipelineConfig::from_env();

    log::info!("🚀 Starting Price Analytics Pipeline");
    log::info!("   Database: {}", config.db_path);
    log::info!("   Concurrency: {}", config.concurrency);
    log::info!("   Item timeout: {}s", config.item_timeout_secs);
    log::info!("   Overstatement ratio: {}", config.overstatement_ratio);
    log::info!("   Trend threshold: {}%", config.trend_threshold_pct);
    log::info!("   Volatility threshold: {}%", config.volatility_threshold_pct);

    storage::init_db(&config.db_path)?;

    let orchestrator = Orchestrator::new(config)?;

    // Ctrl-C stops the run between items, not mid-item
    let cancel = orchestrator.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("⚠️ Shutdown requested, finishing in-flight items...");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let task = env::args().nth(1).unwrap_or_else(|| "all".to_string());
    let report = match task.as_str() {
        "all" => orchestrator.run_all().await,
        "discounts" => orchestrator.run_discount_analysis().await,
        "comparison" => orchestrator.run_price_comparison().await,
        "alerts" => orchestrator.run_alert_checks().await,
        other => {
            log::error!("❌ Unknown task '{}' (expected all|discounts|comparison|alerts)", other);
            std::process::exit(2);
        }
    };

    print_summary(&report);
    println!("{}", serde_json::to_string_pretty(&report)?);

    if report.failed_tasks > 0 {
        std::process::exit(1);
    }
    Ok(())
}
