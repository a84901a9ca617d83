//! Cross-source price comparison for one product

use super::stats;
use super::types::ComparisonSummary;
use chrono::NaiveDate;

/// Latest price quote contributed by one active listing
#[derive(Debug, Clone, Copy)]
pub struct LatestQuote {
    pub listing_id: i64,
    pub price: f64,
}

pub struct ComparisonAggregator;

impl ComparisonAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Aggregate the latest prices of a product's active listings.
    ///
    /// Returns None when no listing contributed a price: absence of data
    /// is recorded by the absence of a summary row, never a row of nulls.
    /// On price ties the first listing in iteration order wins "best".
    pub fn summarize(
        &self,
        product_id: i64,
        comparison_date: NaiveDate,
        quotes: &[LatestQuote],
    ) -> Option<ComparisonSummary> {
        if quotes.is_empty() {
            return None;
        }

        let prices: Vec<f64> = quotes.iter().map(|q| q.price).collect();
        let stats = stats::compute(&prices)?;
        let variance = stats::sample_variance(&prices)?;

        let mut best = quotes[0];
        for quote in &quotes[1..] {
            if quote.price < best.price {
                best = *quote;
            }
        }

        Some(ComparisonSummary {
            product_id,
            comparison_date,
            best_price: best.price,
            best_listing_id: best.listing_id,
            min_price: stats.min,
            max_price: stats.max,
            mean_price: stats.mean,
            price_variance: variance,
            source_count: quotes.len(),
        })
    }
}

impl Default for ComparisonAggregator {
    fn default() -> Self {
        Self::new()
    }
}
