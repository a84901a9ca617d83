//! Pipeline tasks: discount analysis, price comparison, alert checks
//!
//! Every task follows the same shape: enumerate its items from the
//! database, fan the items out over a bounded pool of blocking workers,
//! and tally the outcomes into a `TaskReport`. Only enumeration failure
//! is task-fatal; any single item failing leaves the rest of the batch
//! untouched.

use super::config::PipelineConfig;
use super::report::{ErrorKind, ItemError, TaskReport, TaskStatus};
use crate::analytics_core::alerts::{AlertError, AlertEvaluator};
use crate::analytics_core::classifier::{ClassifierPolicy, DiscountClassifier};
use crate::analytics_core::comparison::{ComparisonAggregator, LatestQuote};
use crate::analytics_core::reader::{PriceReader, ReaderError};
use crate::analytics_core::types::AlertDefinition;
use crate::analytics_core::writer::{ResultWriter, WriterError};
use async_trait::async_trait;
use chrono::NaiveDate;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::spawn_blocking;
use tokio::time::{sleep, timeout};

/// Shared state handed to every task in a run
#[derive(Clone)]
pub struct TaskContext {
    pub config: PipelineConfig,
    pub writer: Arc<ResultWriter>,
    /// Checked before each item; set by the shutdown handler
    pub cancel: Arc<AtomicBool>,
    /// Clock, injectable for deterministic tests
    pub now_fn: Arc<dyn Fn() -> i64 + Send + Sync>,
}

impl TaskContext {
    pub fn now(&self) -> i64 {
        (self.now_fn)()
    }

    /// Calendar date of a reference timestamp (UTC)
    pub fn date_of(&self, reference: i64) -> NaiveDate {
        chrono::DateTime::from_timestamp(reference, 0)
            .map(|dt| dt.date_naive())
            .unwrap_or_default()
    }
}

/// One analytics task inside a pipeline run
#[async_trait]
pub trait PipelineTask: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &TaskContext) -> TaskReport;
}

#[derive(Debug)]
struct ItemOutcome {
    flagged: bool,
}

#[derive(Debug)]
struct ItemFailure {
    kind: ErrorKind,
    message: String,
}

fn persistence(err: impl std::fmt::Display) -> ItemFailure {
    ItemFailure {
        kind: ErrorKind::PersistenceFailure,
        message: err.to_string(),
    }
}

fn write_failure(err: WriterError) -> ItemFailure {
    match err {
        WriterError::MissingRow(what) => ItemFailure {
            kind: ErrorKind::InvalidReference,
            message: format!("missing {}", what),
        },
        other => persistence(other),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Enumerate a task's items on a blocking worker with its own reader
async fn enumerate<T, F>(ctx: &TaskContext, what: &str, query: F) -> Result<Vec<T>, String>
where
    T: Send + 'static,
    F: FnOnce(&PriceReader) -> Result<Vec<T>, ReaderError> + Send + 'static,
{
    let db_path = ctx.config.db_path.clone();
    match spawn_blocking(move || {
        let reader = PriceReader::open(&db_path)?;
        query(&reader)
    })
    .await
    {
        Ok(Ok(items)) => Ok(items),
        Ok(Err(e)) => Err(format!("{} enumeration failed: {}", what, e)),
        Err(e) => Err(format!("{} enumeration worker panicked: {}", what, e)),
    }
}

/// One deadline-bounded attempt at an item.
///
/// The deadline does not kill the blocking worker; an abandoned worker
/// may still finish its keyed upsert, which a later run overwrites
/// anyway.
async fn attempt<I, W>(item: I, work: W, deadline: Duration) -> Result<ItemOutcome, ItemFailure>
where
    I: Send + 'static,
    W: Fn(I) -> Result<ItemOutcome, ItemFailure> + Send + Sync + 'static,
{
    let job = spawn_blocking(move || work(item));
    match timeout(deadline, job).await {
        Err(_) => Err(ItemFailure {
            kind: ErrorKind::PersistenceFailure,
            message: format!("item exceeded {}s deadline", deadline.as_secs()),
        }),
        Ok(Err(e)) => Err(ItemFailure {
            kind: ErrorKind::PersistenceFailure,
            message: format!("worker panicked: {}", e),
        }),
        Ok(Ok(result)) => result,
    }
}

/// Run an item, retrying transient failures exactly once after a backoff
async fn attempt_with_retry<I, W>(
    item: I,
    work: W,
    deadline: Duration,
    backoff: Duration,
) -> Result<ItemOutcome, ItemFailure>
where
    I: Clone + Send + 'static,
    W: Fn(I) -> Result<ItemOutcome, ItemFailure> + Send + Sync + Clone + 'static,
{
    match attempt(item.clone(), work.clone(), deadline).await {
        Err(failure) if failure.kind.is_retryable() => {
            debug!("Retrying after transient failure: {}", failure.message);
            sleep(backoff).await;
            attempt(item, work, deadline).await
        }
        result => result,
    }
}

/// Fan items out over a semaphore-bounded pool and tally the outcomes
async fn fan_out<I, F, W>(ctx: &TaskContext, report: &mut TaskReport, items: Vec<I>, id_of: F, work: W)
where
    I: Clone + Send + 'static,
    F: Fn(&I) -> i64,
    W: Fn(I) -> Result<ItemOutcome, ItemFailure> + Send + Sync + Clone + 'static,
{
    report.status = TaskStatus::Running;

    let semaphore = Arc::new(Semaphore::new(ctx.config.concurrency));
    let deadline = Duration::from_secs(ctx.config.item_timeout_secs);
    let backoff = Duration::from_millis(ctx.config.retry_backoff_ms);

    let mut handles = Vec::with_capacity(items.len());
    for item in items {
        if ctx.cancel.load(Ordering::SeqCst) {
            warn!("⚠️ Cancellation requested, {} stops before its next item", report.task);
            break;
        }

        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        let id = id_of(&item);
        let work = work.clone();
        handles.push(tokio::spawn(async move {
            let _permit = permit;
            (id, attempt_with_retry(item, work, deadline, backoff).await)
        }));
    }

    for handle in handles {
        match handle.await {
            Ok((_, Ok(outcome))) => {
                report.succeeded += 1;
                if outcome.flagged {
                    report.flagged += 1;
                }
            }
            Ok((id, Err(failure))) => {
                report.failed += 1;
                warn!(
                    "❌ Item {} failed ({}): {}",
                    id,
                    failure.kind.as_str(),
                    failure.message
                );
                report.push_error(
                    ItemError {
                        item_id: id,
                        kind: failure.kind,
                        message: failure.message,
                    },
                    ctx.config.error_cap,
                );
            }
            Err(e) => {
                report.failed += 1;
                report.push_error(
                    ItemError {
                        item_id: 0,
                        kind: ErrorKind::PersistenceFailure,
                        message: format!("worker panicked: {}", e),
                    },
                    ctx.config.error_cap,
                );
            }
        }
    }
}

/// Judges every active listing's current discount claim against its
/// 30/60/90-day price history.
pub struct DiscountAnalysisTask;

#[async_trait]
impl PipelineTask for DiscountAnalysisTask {
    fn name(&self) -> &'static str {
        "discount_analysis"
    }

    async fn run(&self, ctx: &TaskContext) -> TaskReport {
        let started = Instant::now();
        let mut report = TaskReport::new(self.name());

        let reference = ctx.now();
        let analysis_date = ctx.date_of(reference);

        let listing_ids = match enumerate(ctx, "listing", |r| r.active_listing_ids()).await {
            Ok(ids) => ids,
            Err(message) => return TaskReport::failed(self.name(), message, elapsed_ms(started)),
        };
        info!("📊 Discount analysis: {} active listings", listing_ids.len());

        let db_path = ctx.config.db_path.clone();
        let writer = ctx.writer.clone();
        let policy = ctx.config.classifier_policy();
        let work = move |listing_id: i64| {
            analyze_listing(&db_path, &writer, policy, listing_id, analysis_date, reference)
        };

        fan_out(ctx, &mut report, listing_ids, |id| *id, work).await;
        report.finish(elapsed_ms(started));
        report
    }
}

fn analyze_listing(
    db_path: &str,
    writer: &ResultWriter,
    policy: ClassifierPolicy,
    listing_id: i64,
    analysis_date: NaiveDate,
    reference: i64,
) -> Result<ItemOutcome, ItemFailure> {
    let reader = PriceReader::open(db_path).map_err(persistence)?;

    // A listing with no observations has nothing to judge; no verdict row
    let current = match reader
        .latest_observation(listing_id, reference)
        .map_err(persistence)?
    {
        Some(obs) => obs,
        None => {
            debug!("Listing {} has no observations, skipping", listing_id);
            return Ok(ItemOutcome { flagged: false });
        }
    };

    // One 90-day read; the classifier slices 30/60 from it so the three
    // windows always describe the same snapshot
    let window = reader
        .observations_in_window(listing_id, 90, reference)
        .map_err(persistence)?;

    let verdict =
        DiscountClassifier::new(policy).classify(listing_id, analysis_date, &current, &window, reference);

    let flagged = verdict.is_fake;
    if let (true, Some(reason)) = (verdict.is_fake, verdict.fake_reason.as_deref()) {
        info!("🔎 Fake discount on listing {}: {}", listing_id, reason);
    }

    writer.upsert_verdict(&verdict, reference).map_err(write_failure)?;
    Ok(ItemOutcome { flagged })
}

/// Builds a cross-source price summary for every product that has at
/// least one active listing.
pub struct PriceComparisonTask;

#[async_trait]
impl PipelineTask for PriceComparisonTask {
    fn name(&self) -> &'static str {
        "price_comparison"
    }

    async fn run(&self, ctx: &TaskContext) -> TaskReport {
        let started = Instant::now();
        let mut report = TaskReport::new(self.name());

        let reference = ctx.now();
        let comparison_date = ctx.date_of(reference);

        let product_ids = match enumerate(ctx, "product", |r| r.products_with_active_listings()).await
        {
            Ok(ids) => ids,
            Err(message) => return TaskReport::failed(self.name(), message, elapsed_ms(started)),
        };
        info!("📊 Price comparison: {} products", product_ids.len());

        let db_path = ctx.config.db_path.clone();
        let writer = ctx.writer.clone();
        let work = move |product_id: i64| {
            compare_product(&db_path, &writer, product_id, comparison_date, reference)
        };

        fan_out(ctx, &mut report, product_ids, |id| *id, work).await;
        report.finish(elapsed_ms(started));
        report
    }
}

fn compare_product(
    db_path: &str,
    writer: &ResultWriter,
    product_id: i64,
    comparison_date: NaiveDate,
    reference: i64,
) -> Result<ItemOutcome, ItemFailure> {
    let reader = PriceReader::open(db_path).map_err(persistence)?;

    let mut quotes = Vec::new();
    for listing in reader
        .active_listings_of_product(product_id)
        .map_err(persistence)?
    {
        if let Some(obs) = reader
            .latest_observation(listing.id, reference)
            .map_err(persistence)?
        {
            quotes.push(LatestQuote {
                listing_id: listing.id,
                price: obs.price,
            });
        }
    }

    match ComparisonAggregator::new().summarize(product_id, comparison_date, &quotes) {
        Some(summary) => {
            debug!(
                "Product {}: best {:.2} across {} listings",
                product_id, summary.best_price, summary.source_count
            );
            writer
                .upsert_comparison(&summary, reference)
                .map_err(write_failure)?;
        }
        None => debug!("Product {} has no quotes, no summary row", product_id),
    }
    Ok(ItemOutcome { flagged: false })
}

/// Evaluates every active alert definition against the product's current
/// best price.
pub struct AlertCheckTask;

#[async_trait]
impl PipelineTask for AlertCheckTask {
    fn name(&self) -> &'static str {
        "alert_checks"
    }

    async fn run(&self, ctx: &TaskContext) -> TaskReport {
        let started = Instant::now();
        let mut report = TaskReport::new(self.name());

        let reference = ctx.now();

        let definitions = match enumerate(ctx, "alert", |r| r.active_alerts()).await {
            Ok(defs) => defs,
            Err(message) => return TaskReport::failed(self.name(), message, elapsed_ms(started)),
        };
        info!("📊 Alert checks: {} active definitions", definitions.len());

        let db_path = ctx.config.db_path.clone();
        let writer = ctx.writer.clone();
        let work = move |definition: AlertDefinition| {
            check_alert(&db_path, &writer, &definition, reference)
        };

        fan_out(ctx, &mut report, definitions, |d| d.id, work).await;
        report.finish(elapsed_ms(started));
        report
    }
}

fn check_alert(
    db_path: &str,
    writer: &ResultWriter,
    definition: &AlertDefinition,
    reference: i64,
) -> Result<ItemOutcome, ItemFailure> {
    let reader = PriceReader::open(db_path).map_err(persistence)?;

    if !reader
        .product_exists(definition.product_id)
        .map_err(persistence)?
    {
        return Err(ItemFailure {
            kind: ErrorKind::InvalidReference,
            message: format!(
                "alert {} references missing product {}",
                definition.id, definition.product_id
            ),
        });
    }

    let listings = reader
        .active_listings_of_product(definition.product_id)
        .map_err(persistence)?;

    // Best price: freshest comparison summary when one exists, otherwise
    // the cheapest latest observation across the product's listings
    let mut best = reader
        .latest_comparison_best(definition.product_id)
        .map_err(persistence)?;
    if best.is_none() {
        for listing in &listings {
            if let Some(obs) = reader
                .latest_observation(listing.id, reference)
                .map_err(persistence)?
            {
                best = Some(best.map_or(obs.price, |b: f64| b.min(obs.price)));
            }
        }
    }
    let best = match best {
        Some(price) => price,
        None => {
            debug!(
                "Product {} has no price data, alert {} stays quiet",
                definition.product_id, definition.id
            );
            return Ok(ItemOutcome { flagged: false });
        }
    };

    // Product-level 30-day floor for the percentage-drop mode. The same
    // floor concept as the discount classifier: each listing's latest
    // observation is the price under judgment and stays out of its floor.
    let mut floor: Option<f64> = None;
    for listing in &listings {
        let latest_id = reader
            .latest_observation(listing.id, reference)
            .map_err(persistence)?
            .map(|obs| obs.id);
        for obs in reader
            .observations_in_window(listing.id, 30, reference)
            .map_err(persistence)?
        {
            if Some(obs.id) == latest_id {
                continue;
            }
            floor = Some(floor.map_or(obs.price, |f| f.min(obs.price)));
        }
    }

    match AlertEvaluator::new().evaluate(definition, best, floor, reference) {
        Ok(Some(event)) => {
            info!(
                "🔔 Alert {} fired on product {} ({}) at {:.2}",
                event.definition_id,
                event.product_id,
                event.reason.as_str(),
                event.observed_price
            );
            writer
                .record_trigger(event.definition_id, event.fired_at)
                .map_err(write_failure)?;
            Ok(ItemOutcome { flagged: true })
        }
        Ok(None) => Ok(ItemOutcome { flagged: false }),
        Err(AlertError::NoFiringMode(id)) => Err(ItemFailure {
            kind: ErrorKind::PolicyMisconfiguration,
            message: format!("alert {} has no firing mode configured", id),
        }),
    }
}
