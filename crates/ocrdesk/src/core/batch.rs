//! Batch recognition with cache short-circuit and per-item error isolation.
//!
//! For every item: cache lookup (when enabled), optional optimization,
//! payload size check, remote call, then cache store and stats update.
//! A failing item produces an error slot; the batch itself never fails.
//!
//! Items with identical bytes are recognized once per batch when caching is
//! enabled. The other copies share the result and count as cache hits.
//!
//! Output order always matches input order, whether items run on a bounded
//! worker pool or one after another.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::cache::{ContentCache, content_hash};
use crate::core::config::ProcessingSettings;
use crate::core::optimize::{OptimizeOptions, optimize_or_original};
use crate::core::validation::check_file_size;
use crate::error::{OcrDeskError, Result};
use crate::ocr::Recognizer;
use crate::ocr::languages::normalize_code;
use crate::stats::StatsTracker;
use crate::types::{
    BatchItem, BatchItemResult, BatchProgress, BatchSettings, RecognitionError, RecognitionOutcome,
    RecognitionRequest, RecognitionResult,
};

/// Called after each item completes.
pub type ProgressCallback = dyn Fn(BatchProgress) + Send + Sync;

/// Limits applied to every batch.
#[derive(Debug, Clone, Copy)]
pub struct BatchLimits {
    /// Maximum size of the payload sent to the recognizer, after optimization.
    pub max_payload_bytes: usize,
    pub optimize: OptimizeOptions,
    pub max_concurrent: usize,
    pub count_cache_hits: bool,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self::from(&ProcessingSettings::default())
    }
}

impl From<&ProcessingSettings> for BatchLimits {
    fn from(settings: &ProcessingSettings) -> Self {
        Self {
            max_payload_bytes: settings.max_file_bytes(),
            optimize: settings.optimize_options(),
            max_concurrent: settings.concurrency(),
            count_cache_hits: settings.count_cache_hits,
        }
    }
}

/// How one distinct payload was resolved.
enum ItemRun {
    Hit(RecognitionResult),
    Fresh {
        result: RecognitionResult,
        storage_warning: Option<String>,
    },
    Failed(OcrDeskError),
    Cancelled,
}

/// Items sharing one payload. The leader is the first occurrence.
struct Group {
    leader: usize,
    followers: Vec<usize>,
    bytes: Arc<Vec<u8>>,
}

fn plan_groups(items: Vec<BatchItem>, dedupe: bool) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    let mut by_hash: HashMap<String, usize> = HashMap::new();

    for (index, item) in items.into_iter().enumerate() {
        if dedupe {
            let hash = content_hash(&item.bytes);
            if let Some(&group) = by_hash.get(&hash) {
                groups[group].followers.push(index);
                continue;
            }
            by_hash.insert(hash, groups.len());
        }
        groups.push(Group {
            leader: index,
            followers: Vec::new(),
            bytes: Arc::new(item.bytes),
        });
    }

    groups
}

fn item_context(name: &str, index: usize) -> String {
    format!("Failed to recognize '{}' (item {})", name, index + 1)
}

/// Runs a single distinct payload through cache, optimizer and recognizer.
struct Worker {
    recognizer: Arc<dyn Recognizer>,
    cache: Arc<ContentCache>,
    limits: BatchLimits,
    settings: BatchSettings,
}

impl Worker {
    async fn run(&self, name: &str, raw: Arc<Vec<u8>>) -> ItemRun {
        if self.settings.use_cache {
            match self.cache.lookup(&raw) {
                Ok(Some(result)) => {
                    tracing::debug!(name, "served from cache");
                    return ItemRun::Hit(result);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(name, error = %e, "Cache lookup failed, recognizing anyway"),
            }
        }

        let payload = if self.settings.optimize {
            let options = self.limits.optimize;
            let source = Arc::clone(&raw);
            match tokio::task::spawn_blocking(move || optimize_or_original(&source, &options)).await {
                Ok(optimized) => optimized,
                Err(e) => {
                    tracing::warn!(name, error = %e, "Optimization task failed, sending original bytes");
                    raw.to_vec()
                }
            }
        } else {
            raw.to_vec()
        };

        if let Err(e) = check_file_size(payload.len(), self.limits.max_payload_bytes) {
            return ItemRun::Failed(e);
        }

        let result = match self
            .recognizer
            .recognize(&payload, &self.settings.language, self.settings.quality)
            .await
        {
            Ok(result) => result,
            Err(e) => return ItemRun::Failed(e),
        };

        let storage_warning = match self.cache.store(&raw, &result) {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(name, error = %e, "Failed to cache recognition result");
                Some(format!("Result not cached: {}", e))
            }
        };

        ItemRun::Fresh {
            result,
            storage_warning,
        }
    }
}

/// Fills result slots, updates stats and reports progress as groups finish.
struct Collector<'a> {
    names: Vec<String>,
    raw_lens: Vec<usize>,
    slots: Vec<Option<BatchItemResult>>,
    completed: usize,
    progress: Option<&'a ProgressCallback>,
    stats: &'a StatsTracker,
    count_cache_hits: bool,
}

impl<'a> Collector<'a> {
    fn fill(&mut self, index: usize, from_cache: bool, outcome: RecognitionOutcome, storage_warning: Option<String>) {
        self.slots[index] = Some(BatchItemResult {
            index,
            name: self.names[index].clone(),
            from_cache,
            outcome,
            storage_warning,
        });
        self.completed += 1;
        if let Some(progress) = self.progress {
            progress(BatchProgress {
                completed: self.completed,
                total: self.slots.len(),
            });
        }
    }

    fn fail(&mut self, index: usize, err: &OcrDeskError, storage_warning: Option<String>) {
        let error = RecognitionError::from_error(err, &item_context(&self.names[index], index));
        tracing::warn!(index, error = %error.message, "batch item failed");
        self.fill(index, false, RecognitionOutcome::Failure(error), storage_warning);
    }

    fn record_stats(&self, success: bool, index: usize) -> Option<String> {
        self.stats
            .record(success, self.raw_lens[index] as u64)
            .err()
            .map(|e| self.stats_warning(e))
    }

    fn record_hit(&self) -> Option<String> {
        if !self.count_cache_hits {
            return None;
        }
        self.stats.record_cache_hit().err().map(|e| self.stats_warning(e))
    }

    fn stats_warning(&self, e: OcrDeskError) -> String {
        tracing::warn!(error = %e, "Failed to persist statistics");
        format!("Statistics not saved: {}", e)
    }

    fn finish(&mut self, group: &Group, run: ItemRun) {
        match run {
            ItemRun::Hit(result) => {
                for index in std::iter::once(group.leader).chain(group.followers.iter().copied()) {
                    let warning = self.record_hit();
                    self.fill(index, true, RecognitionOutcome::Success(result.clone()), warning);
                }
            }
            ItemRun::Fresh {
                result,
                storage_warning,
            } => {
                let stats_warning = self.record_stats(true, group.leader);
                let warning = join_warnings(storage_warning, stats_warning);
                self.fill(group.leader, false, RecognitionOutcome::Success(result.clone()), warning);

                for &index in &group.followers {
                    let warning = self.record_hit();
                    self.fill(index, true, RecognitionOutcome::Success(result.clone()), warning);
                }
            }
            ItemRun::Failed(err) => {
                for index in std::iter::once(group.leader).chain(group.followers.iter().copied()) {
                    let warning = self.record_stats(false, index);
                    self.fail(index, &err, warning);
                }
            }
            ItemRun::Cancelled => {
                for index in std::iter::once(group.leader).chain(group.followers.iter().copied()) {
                    self.fail(index, &OcrDeskError::Cancelled, None);
                }
            }
        }
    }

    fn into_results(mut self) -> Vec<BatchItemResult> {
        for index in 0..self.slots.len() {
            if self.slots[index].is_none() {
                self.fail(index, &OcrDeskError::Other("worker task ended unexpectedly".to_string()), None);
            }
        }
        self.slots.into_iter().flatten().collect()
    }
}

fn join_warnings(a: Option<String>, b: Option<String>) -> Option<String> {
    match (a, b) {
        (Some(a), Some(b)) => Some(format!("{}; {}", a, b)),
        (a, b) => a.or(b),
    }
}

/// Applies a [`Recognizer`] to ordered batches of images.
#[derive(Clone)]
pub struct BatchProcessor {
    recognizer: Arc<dyn Recognizer>,
    cache: Arc<ContentCache>,
    stats: Arc<StatsTracker>,
    limits: BatchLimits,
}

impl std::fmt::Debug for BatchProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchProcessor")
            .field("recognizer", &self.recognizer.name())
            .field("cache", &self.cache.cache_dir())
            .field("limits", &self.limits)
            .finish()
    }
}

impl BatchProcessor {
    pub fn new(
        recognizer: Arc<dyn Recognizer>,
        cache: Arc<ContentCache>,
        stats: Arc<StatsTracker>,
        limits: BatchLimits,
    ) -> Self {
        Self {
            recognizer,
            cache,
            stats,
            limits,
        }
    }

    pub fn limits(&self) -> &BatchLimits {
        &self.limits
    }

    /// Process `items` and return one result per item, in input order.
    pub async fn process(&self, items: Vec<BatchItem>, settings: &BatchSettings) -> Vec<BatchItemResult> {
        self.process_with_cancel(items, settings, None, &CancellationToken::new())
            .await
    }

    pub async fn process_with_progress(
        &self,
        items: Vec<BatchItem>,
        settings: &BatchSettings,
        progress: &ProgressCallback,
    ) -> Vec<BatchItemResult> {
        self.process_with_cancel(items, settings, Some(progress), &CancellationToken::new())
            .await
    }

    /// Like [`process`](Self::process), stopping between items once `cancel` fires.
    ///
    /// Items that had not started yet get a `Cancelled` error slot and are
    /// not counted in the statistics.
    pub async fn process_with_cancel(
        &self,
        items: Vec<BatchItem>,
        settings: &BatchSettings,
        progress: Option<&ProgressCallback>,
        cancel: &CancellationToken,
    ) -> Vec<BatchItemResult> {
        let total = items.len();
        if total == 0 {
            return Vec::new();
        }

        let started = Instant::now();
        let mut collector = Collector {
            names: items.iter().map(|i| i.name.clone()).collect(),
            raw_lens: items.iter().map(|i| i.bytes.len()).collect(),
            slots: vec![None; total],
            completed: 0,
            progress,
            stats: &self.stats,
            count_cache_hits: self.limits.count_cache_hits,
        };

        let language = match normalize_code(&settings.language) {
            Ok(code) => code,
            Err(e) => {
                tracing::warn!(language = %settings.language, "Rejecting batch with unsupported language");
                for index in 0..total {
                    collector.fail(index, &e, None);
                }
                return collector.into_results();
            }
        };

        let groups = plan_groups(items, settings.use_cache);
        let worker = Arc::new(Worker {
            recognizer: Arc::clone(&self.recognizer),
            cache: Arc::clone(&self.cache),
            limits: self.limits,
            settings: BatchSettings {
                language: language.to_string(),
                ..settings.clone()
            },
        });

        tracing::info!(
            items = total,
            distinct = groups.len(),
            parallel = settings.parallel,
            recognizer = self.recognizer.name(),
            "batch started"
        );

        if settings.parallel && groups.len() > 1 {
            let semaphore = Arc::new(Semaphore::new(self.limits.max_concurrent.max(1)));
            let mut tasks = JoinSet::new();

            for (group_index, group) in groups.iter().enumerate() {
                let worker = Arc::clone(&worker);
                let semaphore = Arc::clone(&semaphore);
                let cancel = cancel.clone();
                let name = collector.names[group.leader].clone();
                let bytes = Arc::clone(&group.bytes);

                tasks.spawn(async move {
                    let permit = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        permit = semaphore.acquire_owned() => permit.ok(),
                    };
                    let run = match permit {
                        Some(_permit) if !cancel.is_cancelled() => worker.run(&name, bytes).await,
                        _ => ItemRun::Cancelled,
                    };
                    (group_index, run)
                });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((group_index, run)) => collector.finish(&groups[group_index], run),
                    Err(e) => tracing::error!(error = %e, "batch worker task failed"),
                }
            }
        } else {
            for group in &groups {
                let run = if cancel.is_cancelled() {
                    ItemRun::Cancelled
                } else {
                    worker.run(&collector.names[group.leader], Arc::clone(&group.bytes)).await
                };
                collector.finish(group, run);
            }
        }

        let results = collector.into_results();
        let succeeded = results.iter().filter(|r| r.outcome.is_success()).count();
        tracing::info!(
            items = total,
            succeeded,
            failed = total - succeeded,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch finished"
        );
        results
    }

    /// Run a single request through the pipeline.
    pub async fn process_request(&self, name: impl Into<String>, request: RecognitionRequest) -> Result<BatchItemResult> {
        let settings = BatchSettings {
            language: request.language,
            quality: request.quality,
            optimize: request.optimize,
            use_cache: request.use_cache,
            parallel: false,
        };
        self.process(vec![BatchItem::new(name, request.image_bytes)], &settings)
            .await
            .into_iter()
            .next()
            .ok_or_else(|| OcrDeskError::Other("empty batch result".to_string()))
    }
}
