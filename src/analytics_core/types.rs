//! Domain types shared across the analytics pipeline

use super::stats::WindowStats;
use chrono::NaiveDate;
use serde::Serialize;

/// One product as offered by one source. Read-only reference data.
#[derive(Debug, Clone)]
pub struct Listing {
    pub id: i64,
    pub product_id: i64,
    pub source_id: i64,
    pub is_active: bool,
}

/// Immutable price fact scraped from a source. Append-only; the pipeline
/// never updates or deletes observations. Ordering key is `observed_at`,
/// ties broken by `id` (insertion order).
#[derive(Debug, Clone)]
pub struct PriceObservation {
    pub id: i64,
    pub listing_id: i64,
    pub price: f64,
    pub original_price: Option<f64>,
    pub is_in_stock: bool,
    pub observed_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceTrend {
    Increasing,
    Decreasing,
    Stable,
    Volatile,
    Unknown,
}

impl PriceTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceTrend::Increasing => "increasing",
            PriceTrend::Decreasing => "decreasing",
            PriceTrend::Stable => "stable",
            PriceTrend::Volatile => "volatile",
            PriceTrend::Unknown => "unknown",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "increasing" => Some(PriceTrend::Increasing),
            "decreasing" => Some(PriceTrend::Decreasing),
            "stable" => Some(PriceTrend::Stable),
            "volatile" => Some(PriceTrend::Volatile),
            "unknown" => Some(PriceTrend::Unknown),
            _ => None,
        }
    }
}

/// Discount-legitimacy verdict for one listing on one analysis date.
///
/// Window statistics are None when the window held no observations;
/// callers must distinguish "no data" from a zero price.
#[derive(Debug, Clone)]
pub struct DiscountVerdict {
    pub listing_id: i64,
    pub analysis_date: NaiveDate,
    pub stats_30d: Option<WindowStats>,
    pub stats_60d: Option<WindowStats>,
    pub stats_90d: Option<WindowStats>,
    pub current_price: f64,
    pub claimed_discount_pct: Option<f64>,
    pub actual_discount_pct: Option<f64>,
    pub is_fake: bool,
    pub fake_reason: Option<String>,
    pub trend: PriceTrend,
}

/// Cross-listing price snapshot for one product on one comparison date.
#[derive(Debug, Clone)]
pub struct ComparisonSummary {
    pub product_id: i64,
    pub comparison_date: NaiveDate,
    pub best_price: f64,
    pub best_listing_id: i64,
    pub min_price: f64,
    pub max_price: f64,
    pub mean_price: f64,
    pub price_variance: f64,
    pub source_count: usize,
}

/// Standing alert rule on a product. Created and deactivated externally;
/// the pipeline only reads it and updates the trigger bookkeeping.
#[derive(Debug, Clone)]
pub struct AlertDefinition {
    pub id: i64,
    pub product_id: i64,
    pub target_price: Option<f64>,
    pub drop_percentage: Option<f64>,
    pub is_active: bool,
    pub last_triggered_at: Option<i64>,
    pub trigger_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FireReason {
    TargetReached,
    PercentageDrop,
}

impl FireReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FireReason::TargetReached => "target_reached",
            FireReason::PercentageDrop => "percentage_drop",
        }
    }
}

/// Ephemeral output of one alert evaluation pass.
#[derive(Debug, Clone, Serialize)]
pub struct AlertFireEvent {
    pub definition_id: i64,
    pub product_id: i64,
    pub observed_price: f64,
    pub reason: FireReason,
    pub fired_at: i64,
}
