//! Run orchestration
//!
//! Tasks run in a fixed order: discount analysis, then price comparison,
//! then alert checks (alerts read the comparison output, so the ordering
//! matters). Task failures are isolated: a task that fails outright is
//! recorded in the run report and the remaining tasks still run.

use super::config::PipelineConfig;
use super::report::{RunReport, TaskReport, TaskStatus};
use super::tasks::{
    AlertCheckTask, DiscountAnalysisTask, PipelineTask, PriceComparisonTask, TaskContext,
};
use crate::analytics_core::writer::{ResultWriter, WriterError};
use log::{error, info, warn};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

pub struct Orchestrator {
    config: PipelineConfig,
    writer: Arc<ResultWriter>,
    cancel: Arc<AtomicBool>,
    now_fn: Arc<dyn Fn() -> i64 + Send + Sync>,
}

impl Orchestrator {
    pub fn new(config: PipelineConfig) -> Result<Self, WriterError> {
        Self::with_clock(config, Arc::new(|| chrono::Utc::now().timestamp()))
    }

    /// Construct with an injected clock for deterministic runs in tests
    pub fn with_clock(
        config: PipelineConfig,
        now_fn: Arc<dyn Fn() -> i64 + Send + Sync>,
    ) -> Result<Self, WriterError> {
        let writer = Arc::new(ResultWriter::open(&config.db_path)?);
        Ok(Self {
            config,
            writer,
            cancel: Arc::new(AtomicBool::new(false)),
            now_fn,
        })
    }

    /// Flag polled between items; set it to stop the run gracefully
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    fn context(&self) -> TaskContext {
        TaskContext {
            config: self.config.clone(),
            writer: self.writer.clone(),
            cancel: self.cancel.clone(),
            now_fn: self.now_fn.clone(),
        }
    }

    async fn run_task(&self, task: &dyn PipelineTask) -> TaskReport {
        info!("🚀 Running task: {}", task.name());
        let report = task.run(&self.context()).await;
        match report.status {
            TaskStatus::Succeeded => info!(
                "✅ {}: {} processed, {} flagged in {}ms",
                report.task, report.processed, report.flagged, report.elapsed_ms
            ),
            TaskStatus::PartiallyFailed => warn!(
                "⚠️ {}: {}/{} items failed",
                report.task, report.failed, report.processed
            ),
            _ => error!("❌ {} failed outright", report.task),
        }
        report
    }

    fn assemble(&self, started: Instant, started_at: i64, tasks: Vec<TaskReport>) -> RunReport {
        let completed_at = (self.now_fn)();
        RunReport::from_tasks(
            started_at,
            completed_at,
            started.elapsed().as_millis() as u64,
            tasks,
        )
    }

    /// Run all three tasks in order; no task failure stops a later task
    pub async fn run_all(&self) -> RunReport {
        let started = Instant::now();
        let started_at = (self.now_fn)();

        let mut tasks = Vec::with_capacity(3);
        tasks.push(self.run_task(&DiscountAnalysisTask).await);
        tasks.push(self.run_task(&PriceComparisonTask).await);
        tasks.push(self.run_task(&AlertCheckTask).await);

        self.assemble(started, started_at, tasks)
    }

    async fn run_single(&self, task: &dyn PipelineTask) -> RunReport {
        let started = Instant::now();
        let started_at = (self.now_fn)();
        let report = self.run_task(task).await;
        self.assemble(started, started_at, vec![report])
    }

    pub async fn run_discount_analysis(&self) -> RunReport {
        self.run_single(&DiscountAnalysisTask).await
    }

    pub async fn run_price_comparison(&self) -> RunReport {
        self.run_single(&PriceComparisonTask).await
    }

    pub async fn run_alert_checks(&self) -> RunReport {
        self.run_single(&AlertCheckTask).await
    }
}
