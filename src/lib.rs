//! copytree: walk a project directory, filter it through layered ignore
//! rules and profiles, transform file contents, and emit one structured
//! document for LLM prompts or downstream tooling.
//!
//! The public surface is five functions over an explicit [`Options`]
//! struct: [`scan`] yields records, [`copy`] renders and delivers a
//! document, [`copy_stream`] streams its chunks, and [`format`] /
//! [`format_stream`] render records the caller already owns.

pub mod cache;
pub mod cancellation;
pub mod cli;
pub mod constants;
pub mod core_types;
pub mod errors;
pub mod ignore_rules;
pub mod options;
pub mod output;
pub mod pattern;
pub mod profile;
pub mod progress;
pub mod retry;
pub mod transform;
pub mod walker;

pub use cancellation::CancellationToken;
pub use core_types::{FileContent, FileRecord, ManifestEntry, Stats};
pub use errors::{Error, Result};
pub use options::{Options, OutputFormat, ProfileSelection, SortKey};
pub use profile::Profile;

use crate::cache::TransformCache;
use crate::core_types::ScanErrorEntry;
use crate::output::{ChunkStream, FormatMeta, TreeEntry};
use crate::profile::{discover_profile, find_named_profile, load_profile_file, resolve_rules, ResolvedRules};
use crate::progress::{ProgressBus, Stage};
use crate::retry::{ErrorReporter, RetryPolicy};
use crate::transform::filters::{CsvHead, FirstLines, HtmlStrip, LineNumbers, MarkdownLinkStrip};
use crate::transform::loader::{BinaryProbe, Loader};
use crate::transform::summarize::AiSummary;
use crate::transform::{PipelineConfig, TransformPipeline, TransformerRegistry};
use crate::walker::{walk, ScanStream, WalkContext, WalkLimits};
use log::{debug, info};
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The result of a [`copy`] run.
#[derive(Debug)]
pub struct CopyResult {
    /// The rendered document (empty for dry runs).
    pub output: String,
    /// The finalized records, in emission order.
    pub files: Vec<FileRecord>,
    /// `{path, size}` per emitted file; always the same length and order
    /// as `files`.
    pub manifest: Vec<ManifestEntry>,
    /// Run statistics.
    pub stats: Stats,
    /// Where the output was written, when `--output` was used.
    pub output_path: Option<PathBuf>,
}

/// Pre-resolved stages shared by the entry points.
struct Prepared {
    base: PathBuf,
    rules: ResolvedRules,
    profile: Arc<Profile>,
    registry: Arc<TransformerRegistry>,
    cache: Option<Arc<TransformCache>>,
    token: CancellationToken,
    progress: Arc<ProgressBus>,
    reporter: Arc<ErrorReporter>,
}

impl Prepared {
    fn walk_context(&self, options: &Options) -> Result<WalkContext> {
        Ok(WalkContext {
            base: self.base.clone(),
            ignore: ignore_rules::IgnoreStack::load(&self.base, options.case_insensitive)?,
            rules: self.rules.clone(),
            limits: WalkLimits {
                max_file_size: options.max_file_size,
                max_file_count: options.max_file_count,
                max_total_size: options.max_total_size,
            },
            sort: options.sort,
            follow_symlinks: options.follow_symlinks,
            concurrency: options.concurrency(),
            token: self.token.clone(),
            retry: RetryPolicy::default(),
            reporter: Arc::clone(&self.reporter),
            progress: Arc::clone(&self.progress),
        })
    }

    fn pipeline(&self, options: &Options, total_hint: Option<usize>) -> TransformPipeline {
        let config = PipelineConfig {
            concurrency: options.concurrency(),
            high_water: options.high_water(),
            preserve_order: !output::allows_completion_order(options.format),
            heavy_concurrency: 2,
            max_lines: options.max_lines,
            max_characters: options.max_characters,
            total_hint,
        };
        TransformPipeline::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.profile),
            self.cache.clone(),
            config,
            self.token.clone(),
            Arc::clone(&self.progress),
        )
    }
}

/// Resolves profile, rules, registry, and cache for a run.
fn prepare(base: &Path, options: &mut Options) -> Result<Prepared> {
    if base.as_os_str().is_empty() {
        return Err(Error::Validation("base path is empty".into()));
    }

    let token = options.token();
    let progress = Arc::new(ProgressBus::new(
        options.on_progress.take(),
        options.on_event.take(),
        Duration::from_millis(options.progress_throttle_ms),
    ));

    progress.stage_start(Stage::Resolve);
    progress.start(Stage::Resolve, "Resolving profile");

    let profile = match std::mem::take(&mut options.profile) {
        ProfileSelection::Inline(profile) => Some(profile),
        ProfileSelection::Named(name) => {
            Some(load_profile_file(&find_named_profile(base, &name)?)?)
        }
        ProfileSelection::Auto => match discover_profile(base) {
            Some(path) => Some(load_profile_file(&path)?),
            None => None,
        },
    };
    let rules = resolve_rules(
        profile,
        &options.filter,
        &options.exclude,
        options.case_insensitive,
    )?;
    let profile = Arc::new(rules.profile.clone());

    let registry = Arc::new(build_registry(options)?);
    registry.validate_profile(&profile)?;

    let cache = if options.use_cache {
        match TransformCache::open(options.cache_dir.clone()) {
            Ok(cache) => Some(Arc::new(cache)),
            Err(e) => {
                // The cache is an optimization; a failure to open it never
                // fails the run.
                log::warn!("Transformer cache unavailable: {e}");
                None
            }
        }
    } else {
        None
    };

    progress.stage_end(Stage::Resolve);
    debug!("Prepared run for base {}", base.display());

    Ok(Prepared {
        base: base.to_path_buf(),
        rules,
        profile,
        registry,
        cache,
        token,
        progress,
        reporter: Arc::new(ErrorReporter::new()),
    })
}

/// Builds the registry of built-in transformers for one run.
fn build_registry(options: &Options) -> Result<TransformerRegistry> {
    let mut registry = TransformerRegistry::new();
    registry.register_mandatory(Box::new(BinaryProbe::new()))?;
    registry.register_mandatory(Box::new(Loader::new(
        options.binary_policy.clone(),
        options.max_file_size,
        options.document_converter.clone(),
    )))?;
    registry.register(Box::new(HtmlStrip::new()))?;
    registry.register(Box::new(MarkdownLinkStrip::new()))?;
    registry.register(Box::new(FirstLines::new()))?;
    registry.register(Box::new(CsvHead::new()))?;
    if options.add_line_numbers {
        registry.register_mandatory(Box::new(LineNumbers::new()))?;
    }
    if let Some(summarizer) = &options.summarizer {
        registry.register(Box::new(AiSummary::new(Arc::clone(summarizer), 1)))?;
    }
    Ok(registry)
}

/// Walks `base` and yields records.
///
/// With `include_content` the records run through the transformation
/// pipeline first; otherwise they carry stat data only.
pub fn scan(
    base: &Path,
    mut options: Options,
) -> Result<Box<dyn Iterator<Item = Result<FileRecord>> + Send>> {
    let prepared = prepare(base, &mut options)?;
    prepared.progress.stage_start(Stage::Walk);
    let stream = walk(prepared.walk_context(&options)?)?;
    prepared.progress.stage_end(Stage::Walk);

    if !options.include_content {
        return Ok(Box::new(stream));
    }
    let total = stream.remaining();
    prepared.progress.stage_start(Stage::Transform);
    let pipeline = prepared.pipeline(&options, Some(total));
    Ok(Box::new(pipeline.run(stream)))
}

/// Scans, transforms, renders, and delivers one document.
pub fn copy(base: &Path, mut options: Options) -> Result<CopyResult> {
    let started = Instant::now();
    let prepared = prepare(base, &mut options)?;

    prepared.progress.stage_start(Stage::Walk);
    let stream = walk(prepared.walk_context(&options)?)?;
    prepared.progress.stage_end(Stage::Walk);

    if options.dry_run {
        let files: Vec<FileRecord> = stream.collect::<Result<_>>()?;
        let manifest = manifest_of(&files);
        let stats = finish_stats(&prepared, &files, 0, started, true, Vec::new(), None);
        prepared.progress.finish(Stage::Format, "Dry run complete");
        info!("Dry run: {} file(s) would be copied", files.len());
        return Ok(CopyResult {
            output: String::new(),
            files,
            manifest,
            stats,
            output_path: None,
        });
    }

    let discovered: Vec<FileRecord> = stream.collect::<Result<_>>()?;
    prepared.progress.stage_start(Stage::Transform);
    let pipeline = prepared.pipeline(&options, Some(discovered.len()));
    let (files, mut transformer_errors) = pipeline.run_batch(discovered)?;
    transformer_errors.dedup();
    prepared.progress.stage_end(Stage::Transform);

    prepared.progress.stage_start(Stage::Format);
    prepared
        .progress
        .update(90, "Formatting output", Stage::Format);
    let meta = FormatMeta::from_entries(
        base.display().to_string(),
        tree_entries_of(&files),
        options.instructions.clone(),
        options.show_size,
        options.only_tree,
    );
    let output = output::render_to_string(
        options.format,
        &meta,
        &mut files.iter().cloned().map(Ok),
    )?;
    prepared.progress.stage_end(Stage::Format);

    let delivery = output::writer::deliver(&output, &options)?;
    let manifest = manifest_of(&files);
    let stats = finish_stats(
        &prepared,
        &files,
        output.len(),
        started,
        false,
        transformer_errors,
        delivery.clipboard_error,
    );
    prepared.progress.finish(Stage::Format, "Done");
    info!(
        "Copied {} file(s), {} output bytes in {} ms",
        stats.total_files, stats.output_size, stats.duration_ms
    );

    Ok(CopyResult {
        output,
        files,
        manifest,
        stats,
        output_path: delivery.output_path,
    })
}

/// Scans and streams rendered output chunks without materializing the
/// document. Header counts reflect discovery; records stream through the
/// pipeline as the consumer pulls.
pub fn copy_stream(base: &Path, mut options: Options) -> Result<ChunkStream> {
    let prepared = prepare(base, &mut options)?;
    prepared.progress.stage_start(Stage::Walk);
    let stream = walk(prepared.walk_context(&options)?)?;
    prepared.progress.stage_end(Stage::Walk);

    let entries = stream.remaining();
    let meta = FormatMeta::from_entries(
        base.display().to_string(),
        stream_entries(&stream),
        options.instructions.clone(),
        options.show_size,
        options.only_tree,
    );

    prepared.progress.stage_start(Stage::Transform);
    let record_stream = prepared.pipeline(&options, Some(entries)).run(stream);

    Ok(ChunkStream::spawn(
        options.format,
        meta,
        record_stream,
        prepared.token.clone(),
        options.high_water(),
    ))
}

/// Renders records the caller already owns into one document.
pub fn format(files: Vec<FileRecord>, options: &Options) -> Result<String> {
    let meta = FormatMeta::from_entries(
        files
            .first()
            .and_then(|record| {
                record
                    .absolute_path
                    .parent()
                    .map(|p| p.display().to_string())
            })
            .unwrap_or_else(|| ".".to_string()),
        tree_entries_of(&files),
        options.instructions.clone(),
        options.show_size,
        options.only_tree,
    );
    output::render_to_string(options.format, &meta, &mut files.into_iter().map(Ok))
}

/// Streams rendered chunks for records the caller already owns.
pub fn format_stream(files: Vec<FileRecord>, options: &Options) -> Result<ChunkStream> {
    let meta = FormatMeta::from_entries(
        ".".to_string(),
        tree_entries_of(&files),
        options.instructions.clone(),
        options.show_size,
        options.only_tree,
    );
    let token = options.token();
    let stream = ScanStream::from_records(files, token.clone());
    Ok(ChunkStream::spawn(
        options.format,
        meta,
        stream,
        token,
        options.high_water(),
    ))
}

fn manifest_of(files: &[FileRecord]) -> Vec<ManifestEntry> {
    files
        .iter()
        .map(|record| ManifestEntry {
            path: record.path.clone(),
            size: record.size,
        })
        .collect()
}

fn tree_entries_of(files: &[FileRecord]) -> Vec<TreeEntry> {
    files
        .iter()
        .map(|record| TreeEntry {
            path: record.path.clone(),
            size: record.size,
        })
        .collect()
}

fn stream_entries(stream: &ScanStream) -> Vec<TreeEntry> {
    stream
        .entries()
        .into_iter()
        .map(|(path, size)| TreeEntry { path, size })
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn finish_stats(
    prepared: &Prepared,
    files: &[FileRecord],
    output_size: usize,
    started: Instant,
    dry_run: bool,
    transformer_errors: Vec<String>,
    clipboard_error: Option<String>,
) -> Stats {
    let (retries, entries) = prepared.reporter.snapshot();
    let scan_errors: Vec<ScanErrorEntry> = entries;
    Stats {
        total_files: files.len(),
        total_size: files.iter().map(|record| record.size).sum(),
        output_size,
        duration_ms: started.elapsed().as_millis(),
        scan_errors,
        transformer_errors,
        clipboard_error,
        dry_run,
        retries,
    }
}

static DEFAULT_OPTIONS: Lazy<Options> = Lazy::new(Options::default);

/// Backwards-compatible accessor for a default option set.
#[deprecated(note = "pass an explicit `Options` to the entry points instead")]
pub fn config() -> &'static Options {
    &DEFAULT_OPTIONS
}
