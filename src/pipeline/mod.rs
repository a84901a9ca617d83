//! Batch analytics pipeline
//!
//! A run executes three tasks against the price database in a fixed
//! order and emits a structured report:
//!
//! ```text
//! Orchestrator::run_all()
//!     ↓
//! DiscountAnalysisTask   (listings  → discount_verdicts)
//!     ↓
//! PriceComparisonTask    (products  → comparison_summaries)
//!     ↓
//! AlertCheckTask         (alert definitions → trigger bookkeeping)
//!     ↓
//! RunReport (JSON-serializable)
//! ```
//!
//! Result rows are keyed by (item, date), so re-running a pipeline for
//! the same date overwrites its own output instead of duplicating it.

pub mod config;
pub mod orchestrator;
pub mod report;
pub mod tasks;

pub use config::PipelineConfig;
pub use orchestrator::Orchestrator;
pub use report::{ErrorKind, ItemError, RunReport, TaskReport, TaskStatus};
pub use tasks::{
    AlertCheckTask, DiscountAnalysisTask, PipelineTask, PriceComparisonTask, TaskContext,
};
