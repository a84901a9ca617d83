//! pricewatch - retail price analytics pipeline
//!
//! Turns an append-only series of scraped price observations into
//! discount-legitimacy verdicts, cross-source price comparisons, and
//! alert-trigger decisions. See `analytics_core` for the computations
//! and `pipeline` for the batch orchestration.

pub mod analytics_core;
pub mod pipeline;
pub mod storage;
