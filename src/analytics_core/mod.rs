//! Analytics Core - Price History Analysis Engine
//!
//! This module provides the batch computations that turn an append-only
//! series of price observations into discount verdicts, cross-source
//! comparisons, and alert decisions.
//!
//! # Architecture
//!
//! ```text
//! SQLite Database → PriceReader (windowed observation queries)
//!     ↓
//! WindowStats (min/max/mean per 30/60/90-day window)
//!     ↓
//! DiscountClassifier (fake-discount rule, trend classification)
//! ComparisonAggregator (best price across active listings)
//! AlertEvaluator (target-price / percentage-drop decisions)
//!     ↓
//! ResultWriter → keyed upserts + trigger bookkeeping
//! ```

pub mod alerts;
pub mod classifier;
pub mod comparison;
pub mod reader;
pub mod stats;
pub mod types;
pub mod writer;

pub use alerts::{AlertError, AlertEvaluator};
pub use classifier::{ClassifierPolicy, DiscountClassifier};
pub use comparison::{ComparisonAggregator, LatestQuote};
pub use reader::{PriceReader, ReaderError};
pub use stats::WindowStats;
pub use types::{
    AlertDefinition, AlertFireEvent, ComparisonSummary, DiscountVerdict, FireReason, Listing,
    PriceObservation, PriceTrend,
};
pub use writer::{ResultWriter, WriterError};
