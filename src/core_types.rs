//! Defines core data structures used throughout the application pipeline.
//!
//! `FileRecord` is the unit of data flowing from the walker through the
//! transformation pipeline into the formatters. Everything downstream of
//! discovery consumes and re-yields records; a record is never shared
//! mutably across stages.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::SystemTime;

/// How a record's content is encoded when serialized into the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Plain UTF-8 text.
    Utf8,
    /// Binary content carried as a base64 payload.
    Base64,
    /// Binary content that is not carried at all (skipped or placeholder).
    Binary,
}

/// Content of a record once a loader transformer has populated it.
#[derive(Debug, Clone, PartialEq)]
pub enum FileContent {
    /// UTF-8 (possibly lossily decoded) text.
    Text(String),
    /// Raw bytes, emitted base64-encoded.
    Bytes(Vec<u8>),
    /// A stand-in string such as `"[File too large]"` or a binary comment.
    Placeholder(String),
}

impl FileContent {
    /// Byte length of the content as it will appear in the output.
    pub fn len(&self) -> usize {
        match self {
            FileContent::Text(s) | FileContent::Placeholder(s) => s.len(),
            FileContent::Bytes(b) => b.len(),
        }
    }

    /// True when there is nothing to emit.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrows the text form, if this is text or a placeholder.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FileContent::Text(s) | FileContent::Placeholder(s) => Some(s),
            FileContent::Bytes(_) => None,
        }
    }
}

/// A structured metadata value attached to a record by a transformer.
pub type MetadataValue = serde_json::Value;

/// Represents a file discovered during the walk, flowing through the pipeline.
///
/// The walker produces records with `content = None`; the loader transformer
/// populates content, later transformers may filter it, attach metadata, or
/// replace it with a placeholder. `path` is unique within one scan's output.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// POSIX-normalized path relative to the scan base (`/` separators).
    pub path: String,
    /// The absolute path to the file on the filesystem.
    pub absolute_path: PathBuf,
    /// Size in bytes from metadata. Matches content length for loaded text.
    pub size: u64,
    /// Last modification time, when the filesystem reports one.
    pub modified: Option<SystemTime>,
    /// Whether the file was detected as binary. Detected lazily; `None`
    /// until the loader (or an explicit probe) has sampled the file head.
    pub is_binary: Option<bool>,
    /// Encoding of `content` in the final output.
    pub encoding: Encoding,
    /// Content; `None` until a loader transformer populates it.
    pub content: Option<FileContent>,
    /// Free-form structured metadata populated by transformers
    /// (e.g. `pages`, `ocr_confidence`, `ai_summary`).
    pub metadata: BTreeMap<String, MetadataValue>,
    /// Ordered names of the transformers that have touched this record.
    pub trail: Vec<String>,
    /// Set when a transformer failed on this record; the record passed
    /// through unmodified and the error text is kept for the stats.
    pub error: Option<String>,
    /// Set by a `skip` binary-policy action; the pipeline drops the
    /// record before formatting.
    pub skipped: bool,
}

impl FileRecord {
    /// Creates a stat-only record as the walker yields it.
    pub fn new(path: String, absolute_path: PathBuf, size: u64, modified: Option<SystemTime>) -> Self {
        Self {
            path,
            absolute_path,
            size,
            modified,
            is_binary: None,
            encoding: Encoding::Utf8,
            content: None,
            metadata: BTreeMap::new(),
            trail: Vec::new(),
            error: None,
            skipped: false,
        }
    }

    /// Records that `transformer` produced this version of the record.
    pub fn mark_transformed(&mut self, transformer: &str) {
        self.trail.push(transformer.to_string());
    }

    /// The record's modification time as seconds since the Unix epoch.
    pub fn modified_epoch(&self) -> Option<u64> {
        self.modified
            .and_then(|m| m.duration_since(SystemTime::UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
    }
}

/// Lightweight `{path, size}` entry; the manifest always has exactly one
/// entry per emitted file, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    /// POSIX-normalized relative path.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
}

/// Aggregate result statistics surfaced by `copy`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Number of files in the output (equals the manifest length).
    pub total_files: usize,
    /// Sum of file sizes in bytes.
    pub total_size: u64,
    /// Size of the rendered output in bytes (0 for dry runs).
    pub output_size: usize,
    /// Wall-clock duration of the run in milliseconds.
    pub duration_ms: u128,
    /// Per-path scan errors that were skipped, if any.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scan_errors: Vec<ScanErrorEntry>,
    /// Per-record transformer failures, if any.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transformer_errors: Vec<String>,
    /// Set when the clipboard sink failed; the run itself still succeeds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clipboard_error: Option<String>,
    /// True when the run was a dry run.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
    /// Retry-layer aggregate counters.
    pub retries: RetryStats,
}

/// One skipped path with its classified error.
#[derive(Debug, Clone, Serialize)]
pub struct ScanErrorEntry {
    /// Path the error occurred on.
    pub path: String,
    /// OS error code or `io::ErrorKind` name.
    pub error_code: String,
    /// `retryable`, `permanent`, or `gave-up`.
    pub classification: String,
    /// Number of attempts made.
    pub attempts: u32,
}

/// Aggregate counters maintained by the retry layer.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryStats {
    /// Total retry attempts across all paths.
    pub retries: u64,
    /// Operations abandoned after exhausting the attempt budget.
    pub given_up: u64,
    /// Operations that failed permanently without retry.
    pub permanent: u64,
    /// Operations that succeeded after at least one retry.
    pub success_after_retry: u64,
}
