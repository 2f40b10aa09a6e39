//! The streaming transformation pipeline.
//!
//! Records flow from the walker through their individual transformer
//! chains. Up to N records run in parallel; within one record the chain is
//! strictly sequential. Output preserves input order through a reorder
//! buffer unless the caller opts out (NDJSON). Heavy transformers are
//! bounded by a global semaphore, consult the on-disk cache first, and may
//! batch concurrently submitted records into one backend call.

use super::registry::TransformerRegistry;
use super::{TransformContext, Transformer};
use crate::cache::TransformCache;
use crate::cancellation::CancellationToken;
use crate::core_types::{FileContent, FileRecord};
use crate::errors::{Error, Result};
use crate::profile::Profile;
use crate::progress::{ProgressBus, Stage};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

/// Tuning knobs for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Records transformed in parallel.
    pub concurrency: usize,
    /// Bounded-channel capacity between stages (the high-water mark).
    pub high_water: usize,
    /// Emit in input order (false only for streaming NDJSON).
    pub preserve_order: bool,
    /// Outstanding heavy operations allowed at once.
    pub heavy_concurrency: usize,
    /// Per-file line cap applied near the end of the chain.
    pub max_lines: Option<usize>,
    /// Per-file character cap applied near the end of the chain.
    pub max_characters: Option<usize>,
    /// Expected record count, for progress scaling.
    pub total_hint: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: crate::constants::DEFAULT_CONCURRENCY,
            high_water: crate::constants::DEFAULT_CONCURRENCY * 2,
            preserve_order: true,
            heavy_concurrency: 2,
            max_lines: None,
            max_characters: None,
            total_hint: None,
        }
    }
}

/// The pipeline: registry + profile + cache, ready to consume a stream.
pub struct TransformPipeline {
    registry: Arc<TransformerRegistry>,
    profile: Arc<Profile>,
    cache: Option<Arc<TransformCache>>,
    config: PipelineConfig,
    token: CancellationToken,
    progress: Arc<ProgressBus>,
}

/// The pipeline's output: an ordered stream of transformed records, plus
/// the transformer errors collected along the way.
pub struct RecordStream {
    receiver: Receiver<Result<FileRecord>>,
    token: CancellationToken,
    aborted: bool,
    errors: Arc<Mutex<Vec<String>>>,
}

impl RecordStream {
    /// Transformer error messages collected so far. Complete once the
    /// stream has been fully drained.
    pub fn transformer_errors(&self) -> Vec<String> {
        self.errors.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl Iterator for RecordStream {
    type Item = Result<FileRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.aborted {
            return None;
        }
        if self.token.is_cancelled() {
            self.aborted = true;
            return Some(Err(Error::ScanAborted));
        }
        match self.receiver.recv() {
            Ok(item) => {
                if item.is_err() {
                    self.aborted = true;
                }
                Some(item)
            }
            Err(_) => None,
        }
    }
}

struct Job {
    seq: u64,
    record: FileRecord,
}

impl TransformPipeline {
    pub fn new(
        registry: Arc<TransformerRegistry>,
        profile: Arc<Profile>,
        cache: Option<Arc<TransformCache>>,
        config: PipelineConfig,
        token: CancellationToken,
        progress: Arc<ProgressBus>,
    ) -> Self {
        Self {
            registry,
            profile,
            cache,
            config,
            token,
            progress,
        }
    }

    fn make_shared(&self) -> Arc<WorkerShared> {
        Arc::new(WorkerShared {
            registry: Arc::clone(&self.registry),
            profile: Arc::clone(&self.profile),
            cache: self.cache.clone(),
            config: self.config.clone(),
            token: self.token.clone(),
            progress: Arc::clone(&self.progress),
            heavy_gate: HeavyGate::new(self.config.heavy_concurrency),
            errors: Arc::new(Mutex::new(Vec::new())),
            processed: AtomicUsize::new(0),
            skipped: AtomicU64::new(0),
        })
    }

    /// Transforms an already-collected batch in parallel with `rayon`,
    /// preserving input order. The non-streaming `copy` path uses this;
    /// within one record the chain is still strictly sequential.
    pub fn run_batch(&self, records: Vec<FileRecord>) -> Result<(Vec<FileRecord>, Vec<String>)> {
        use rayon::prelude::*;

        let shared = self.make_shared();
        let transformed: Vec<FileRecord> = records
            .into_par_iter()
            .map(|record| {
                if shared.token.is_cancelled() {
                    record
                } else {
                    shared.transform_one(record)
                }
            })
            .collect();
        if self.token.is_cancelled() {
            return Err(Error::ScanAborted);
        }
        let errors = shared
            .errors
            .lock()
            .map(|errors| errors.clone())
            .unwrap_or_default();
        Ok((
            transformed
                .into_iter()
                .filter(|record| !record.skipped)
                .collect(),
            errors,
        ))
    }

    /// Consumes `input` on background threads and returns the transformed
    /// stream. Dropping the stream early tears the workers down without
    /// leaking threads: every send into a closed channel stops its sender.
    pub fn run<I>(self, input: I) -> RecordStream
    where
        I: Iterator<Item = Result<FileRecord>> + Send + 'static,
    {
        let (work_tx, work_rx) = bounded::<Job>(self.config.high_water);
        let (done_tx, done_rx) = bounded::<(u64, FileRecord)>(self.config.high_water);
        let (out_tx, out_rx) = bounded::<Result<FileRecord>>(self.config.high_water);

        let shared = self.make_shared();
        let errors = Arc::clone(&shared.errors);

        // Feeder: tags each record with its input position. A stream error
        // (ScanAborted, ScanIo) flows straight to the consumer.
        let feeder_out = out_tx.clone();
        let feeder_token = self.token.clone();
        thread::spawn(move || {
            let mut seq = 0u64;
            for item in input {
                if feeder_token.is_cancelled() {
                    break;
                }
                match item {
                    Ok(record) => {
                        if work_tx.send(Job { seq, record }).is_err() {
                            break;
                        }
                        seq += 1;
                    }
                    Err(e) => {
                        let _ = feeder_out.send(Err(e));
                        break;
                    }
                }
            }
            // Dropping work_tx closes the workers' input.
        });

        for _ in 0..self.config.concurrency.max(1) {
            let work_rx = work_rx.clone();
            let done_tx = done_tx.clone();
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                while let Ok(job) = work_rx.recv() {
                    if shared.token.is_cancelled() {
                        break;
                    }
                    let seq = job.seq;
                    let record = shared.transform_one(job.record);
                    if done_tx.send((seq, record)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(done_tx);

        // Reorder: releases completions in input order (or immediately).
        let preserve_order = self.config.preserve_order;
        let reorder_shared = Arc::clone(&shared);
        thread::spawn(move || {
            let mut next_seq = 0u64;
            let mut buffer: BTreeMap<u64, FileRecord> = BTreeMap::new();
            while let Ok((seq, record)) = done_rx.recv() {
                if !preserve_order {
                    if !emit(&out_tx, &reorder_shared, record) {
                        return;
                    }
                    continue;
                }
                buffer.insert(seq, record);
                while let Some(record) = buffer.remove(&next_seq) {
                    next_seq += 1;
                    if !emit(&out_tx, &reorder_shared, record) {
                        return;
                    }
                }
            }
            // Skipped records leave holes in the sequence; flush the rest
            // in order.
            for (_, record) in std::mem::take(&mut buffer) {
                if !emit(&out_tx, &reorder_shared, record) {
                    return;
                }
            }
        });

        RecordStream {
            receiver: out_rx,
            token: self.token,
            aborted: false,
            errors,
        }
    }
}

/// Sends one record unless it was dropped by a `skip` policy. Returns
/// `false` when the consumer went away.
fn emit(
    out: &Sender<Result<FileRecord>>,
    shared: &WorkerShared,
    record: FileRecord,
) -> bool {
    if record.skipped {
        shared.skipped.fetch_add(1, Ordering::Relaxed);
        return true;
    }
    out.send(Ok(record)).is_ok()
}

struct WorkerShared {
    registry: Arc<TransformerRegistry>,
    profile: Arc<Profile>,
    cache: Option<Arc<TransformCache>>,
    config: PipelineConfig,
    token: CancellationToken,
    progress: Arc<ProgressBus>,
    heavy_gate: HeavyGate,
    errors: Arc<Mutex<Vec<String>>>,
    processed: AtomicUsize,
    skipped: AtomicU64,
}

impl WorkerShared {
    /// Runs one record through its chain, localizing failures to the
    /// record itself.
    fn transform_one(&self, mut record: FileRecord) -> FileRecord {
        let chain = self.registry.chain_for(&record, &self.profile);
        for (transformer, ctx) in chain {
            if self.token.is_cancelled() {
                break;
            }
            let descriptor = transformer.descriptor();
            let result = if descriptor.heavy {
                self.apply_heavy(transformer, &ctx, record.clone())
            } else {
                transformer.apply(record.clone(), &ctx)
            };
            match result {
                Ok(next) => record = next,
                Err(e) => {
                    warn!("{e}");
                    if let Ok(mut errors) = self.errors.lock() {
                        errors.push(e.to_string());
                    }
                    record.error = Some(e.to_string());
                    // The rest of the chain would act on a record the
                    // failed stage never produced.
                    break;
                }
            }
            if record.skipped {
                break;
            }
        }

        apply_limits(
            &mut record,
            self.config.max_lines,
            self.config.max_characters,
        );

        let processed = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(total) = self.config.total_hint {
            let percent = 50 + (processed * 39 / total.max(1)) as u8;
            self.progress.update(
                percent.min(89),
                &format!("Transformed {processed} file(s)"),
                Stage::Transform,
            );
        }
        record
    }

    /// Heavy path: semaphore, cache consult, single-flight, batching.
    fn apply_heavy(
        &self,
        transformer: &dyn Transformer,
        ctx: &TransformContext,
        record: FileRecord,
    ) -> Result<FileRecord> {
        let descriptor = transformer.descriptor();
        let cache_key = self.cache.as_ref().and_then(|cache| {
            content_bytes(&record).map(|bytes| {
                (
                    Arc::clone(cache),
                    TransformCache::key(
                        descriptor.name,
                        descriptor.version,
                        &TransformCache::content_hash(bytes),
                        &ctx.options,
                    ),
                )
            })
        });

        if let Some((cache, key)) = &cache_key {
            if let Some(value) = cache.get(key) {
                return Ok(apply_cached(record, value, descriptor.name));
            }
        }

        let _permit = self.heavy_gate.acquire();

        // Single-flight: whoever holds the entry lock computes; everyone
        // else finds the entry on the re-check.
        let _entry_lock = cache_key
            .as_ref()
            .and_then(|(cache, key)| cache.lock_entry(key));
        if let Some((cache, key)) = &cache_key {
            if let Some(value) = cache.get(key) {
                return Ok(apply_cached(record, value, descriptor.name));
            }
        }

        let transformed = if descriptor.batch_size > 1 {
            self.heavy_gate
                .batched(transformer, ctx, record, descriptor.batch_size)?
        } else {
            transformer.apply(record, ctx)?
        };

        if let Some((cache, key)) = &cache_key {
            cache.put(key, cached_value(&transformed));
        }
        Ok(transformed)
    }
}

/// The serialized result of a heavy transformation: enough to reproduce
/// the record delta on a cache hit.
#[derive(Serialize, Deserialize)]
struct CachedResult {
    text: Option<String>,
    metadata: BTreeMap<String, serde_json::Value>,
}

fn cached_value(record: &FileRecord) -> serde_json::Value {
    let result = CachedResult {
        text: record
            .content
            .as_ref()
            .and_then(|c| c.as_text())
            .map(str::to_string),
        metadata: record.metadata.clone(),
    };
    serde_json::to_value(result).unwrap_or(serde_json::Value::Null)
}

fn apply_cached(mut record: FileRecord, value: serde_json::Value, name: &str) -> FileRecord {
    match serde_json::from_value::<CachedResult>(value) {
        Ok(cached) => {
            if let Some(text) = cached.text {
                record.size = text.len() as u64;
                record.content = Some(FileContent::Text(text));
            }
            record.metadata.extend(cached.metadata);
            record.mark_transformed(name);
        }
        Err(e) => debug!("Ignoring malformed cache value for {}: {e}", record.path),
    }
    record
}

fn content_bytes(record: &FileRecord) -> Option<&[u8]> {
    match record.content.as_ref()? {
        FileContent::Text(text) | FileContent::Placeholder(text) => Some(text.as_bytes()),
        FileContent::Bytes(bytes) => Some(bytes),
    }
}

/// Applies the per-file line and character caps.
fn apply_limits(record: &mut FileRecord, max_lines: Option<usize>, max_characters: Option<usize>) {
    let Some(FileContent::Text(text)) = &record.content else {
        return;
    };
    let mut text = text.clone();
    let mut truncated = false;

    if let Some(limit) = max_lines {
        let count = text.lines().count();
        if count > limit {
            text = text
                .lines()
                .take(limit)
                .map(|line| format!("{line}\n"))
                .collect();
            truncated = true;
        }
    }
    if let Some(limit) = max_characters {
        if text.chars().count() > limit {
            text = text.chars().take(limit).collect();
            truncated = true;
        }
    }
    if truncated {
        record.size = text.len() as u64;
        record.content = Some(FileContent::Text(text));
        record
            .metadata
            .insert("truncated".into(), serde_json::Value::Bool(true));
    }
}

/// Counting semaphore plus the batch collector for heavy transformers.
struct HeavyGate {
    permits: Mutex<usize>,
    available: Condvar,
    batches: Mutex<HashMap<&'static str, PendingBatch>>,
    next_submission: AtomicU64,
}

struct PendingBatch {
    submissions: Vec<(u64, FileRecord, Sender<Result<FileRecord>>)>,
}

struct Permit<'a> {
    gate: &'a HeavyGate,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if let Ok(mut permits) = self.gate.permits.lock() {
            *permits += 1;
            self.gate.available.notify_one();
        }
    }
}

impl HeavyGate {
    fn new(limit: usize) -> Self {
        Self {
            permits: Mutex::new(limit.max(1)),
            available: Condvar::new(),
            batches: Mutex::new(HashMap::new()),
            next_submission: AtomicU64::new(0),
        }
    }

    fn acquire(&self) -> Option<Permit<'_>> {
        let mut permits = self.permits.lock().ok()?;
        while *permits == 0 {
            permits = self.available.wait(permits).ok()?;
        }
        *permits -= 1;
        Some(Permit { gate: self })
    }

    /// Submits a record for batched transformation; blocks until the batch
    /// it joined was dispatched. A batch goes out when it reaches
    /// `batch_size`, or when the flush window passes with the batch still
    /// partial (the oldest submitter dispatches it).
    fn batched(
        &self,
        transformer: &dyn Transformer,
        ctx: &TransformContext,
        record: FileRecord,
        batch_size: usize,
    ) -> Result<FileRecord> {
        const FLUSH_WINDOW: Duration = Duration::from_millis(25);

        let id = self.next_submission.fetch_add(1, Ordering::Relaxed);
        let (result_tx, result_rx) = bounded::<Result<FileRecord>>(1);
        let name = transformer.descriptor().name;

        let full = {
            let mut batches = self.batches.lock().map_err(|_| Error::Transformer {
                transformer: name.to_string(),
                path: record.path.clone(),
                reason: "batch collector poisoned".to_string(),
            })?;
            let pending = batches.entry(name).or_insert_with(|| PendingBatch {
                submissions: Vec::new(),
            });
            pending.submissions.push((id, record, result_tx));
            if pending.submissions.len() >= batch_size {
                Some(std::mem::take(&mut pending.submissions))
            } else {
                None
            }
        };
        if let Some(submissions) = full {
            dispatch_batch(transformer, ctx, submissions);
        }

        loop {
            match result_rx.recv_timeout(FLUSH_WINDOW) {
                Ok(result) => return result,
                Err(RecvTimeoutError::Timeout) => {
                    // Flush a partial batch if ours is still queued.
                    let stale = {
                        let mut batches = self.batches.lock().map_err(|_| Error::Transformer {
                            transformer: name.to_string(),
                            path: String::new(),
                            reason: "batch collector poisoned".to_string(),
                        })?;
                        match batches.get_mut(name) {
                            Some(pending)
                                if pending.submissions.iter().any(|(sid, _, _)| *sid == id) =>
                            {
                                Some(std::mem::take(&mut pending.submissions))
                            }
                            _ => None,
                        }
                    };
                    if let Some(submissions) = stale {
                        dispatch_batch(transformer, ctx, submissions);
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::Transformer {
                        transformer: name.to_string(),
                        path: String::new(),
                        reason: "batch dispatcher dropped the submission".to_string(),
                    })
                }
            }
        }
    }
}

fn dispatch_batch(
    transformer: &dyn Transformer,
    ctx: &TransformContext,
    submissions: Vec<(u64, FileRecord, Sender<Result<FileRecord>>)>,
) {
    if submissions.is_empty() {
        return;
    }
    let mut senders = Vec::with_capacity(submissions.len());
    let mut records = Vec::with_capacity(submissions.len());
    for (_, record, sender) in submissions {
        records.push(record);
        senders.push(sender);
    }
    let results = transformer.apply_batch(records, ctx);
    for (sender, result) in senders.into_iter().zip(results) {
        let _ = sender.send(result);
    }
}
