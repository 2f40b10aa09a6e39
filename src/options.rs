//! The explicit options struct consumed by the public API.
//!
//! Configuration is resolved once at the entry point and passed down;
//! nothing in the core reads global state. See the deprecated
//! [`crate::config`] accessor for the one backwards-compatible exception.

use crate::cancellation::CancellationToken;
use crate::constants::DEFAULT_PROGRESS_THROTTLE_MS;
use crate::errors::{Error, Result};
use crate::profile::Profile;
use crate::progress::{ProgressEvent, StageEvent};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// The wire format of the generated document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// `ct:`-namespaced XML (the default for `copy`).
    #[default]
    Xml,
    /// One JSON object with `metadata` and `files`.
    Json,
    /// YAML-front-matter Markdown with fenced file blocks.
    Markdown,
    /// Directory tree only, box-drawing connectors.
    Tree,
    /// Newline-delimited JSON: metadata, one line per file, summary.
    Ndjson,
    /// SARIF 2.1.0 shell with file entries as locations.
    Sarif,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "xml" => Ok(OutputFormat::Xml),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "tree" => Ok(OutputFormat::Tree),
            "ndjson" => Ok(OutputFormat::Ndjson),
            "sarif" => Ok(OutputFormat::Sarif),
            other => Err(Error::Validation(format!("unknown format '{other}'"))),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Xml => "xml",
            OutputFormat::Json => "json",
            OutputFormat::Markdown => "markdown",
            OutputFormat::Tree => "tree",
            OutputFormat::Ndjson => "ndjson",
            OutputFormat::Sarif => "sarif",
        };
        f.write_str(name)
    }
}

/// Emission order of file records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    /// Lexicographic by POSIX path (the default; always deterministic).
    #[default]
    Path,
    /// Ascending size.
    Size,
    /// Ascending modification time.
    Modified,
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "path" => Ok(SortKey::Path),
            "size" => Ok(SortKey::Size),
            "modified" => Ok(SortKey::Modified),
            other => Err(Error::Validation(format!("unknown sort key '{other}'"))),
        }
    }
}

/// Which profile a scan uses.
#[derive(Debug, Clone, Default)]
pub enum ProfileSelection {
    /// Discover `.copytree.*` in the base directory, else the default
    /// profile (include everything minus global excludes).
    #[default]
    Auto,
    /// `--profile <name>`; missing file is a hard error.
    Named(String),
    /// An inline profile object supplied by the caller.
    Inline(Profile),
}

type ProgressCallback = Box<dyn Fn(&ProgressEvent) + Send + Sync>;
type EventCallback = Box<dyn Fn(&StageEvent) + Send + Sync>;

/// Options accepted by `scan`, `copy`, `copy_stream`, `format`, and
/// `format_stream`.
///
/// All fields are public; `Options::default()` is a valid configuration
/// that scans everything under the base with XML output.
pub struct Options {
    /// Include-glob overrides; replaces the profile's include list.
    pub filter: Vec<String>,
    /// Exclude-glob additions; concatenated ahead of the profile's.
    pub exclude: Vec<String>,
    /// Profile selection.
    pub profile: ProfileSelection,
    /// Output format.
    pub format: OutputFormat,
    /// Omit file contents; header and tree only.
    pub only_tree: bool,
    /// In `scan`, run the loader so records carry content eagerly.
    pub include_content: bool,
    /// Prefix each content line with `"%4d: "`.
    pub add_line_numbers: bool,
    /// Annotate the tree with file sizes.
    pub show_size: bool,
    /// Per-file byte ceiling; larger files become placeholder records.
    pub max_file_size: Option<u64>,
    /// Total accepted-bytes ceiling.
    pub max_total_size: Option<u64>,
    /// Maximum number of accepted files.
    pub max_file_count: Option<usize>,
    /// Per-file line cap applied near the end of the pipeline.
    pub max_lines: Option<usize>,
    /// Per-file character cap applied near the end of the pipeline.
    pub max_characters: Option<usize>,
    /// Emission order; `None` keeps the default path order.
    pub sort: Option<SortKey>,
    /// Follow symlinks (with loop detection). Off by default.
    pub follow_symlinks: bool,
    /// Case-insensitive pattern matching.
    pub case_insensitive: bool,
    /// Produce stats and manifest but an empty output body.
    pub dry_run: bool,
    /// Cancellation signal observed by every stage.
    pub signal: Option<CancellationToken>,
    /// Structured stage-event observer.
    pub on_event: Option<EventCallback>,
    /// Throttled progress observer.
    pub on_progress: Option<ProgressCallback>,
    /// Progress throttle interval in milliseconds.
    pub progress_throttle_ms: u64,
    /// Copy the rendered output to the clipboard (`copy` only).
    pub clipboard: bool,
    /// Write the rendered output to this path (`copy` only).
    pub output: Option<PathBuf>,
    /// Echo the rendered output to stdout (`copy` only).
    pub display: bool,
    /// Walker/pipeline parallelism; defaults to available cores.
    pub max_concurrency: Option<usize>,
    /// Bounded-channel capacity; defaults to `2 × concurrency`.
    pub high_water_mark: Option<usize>,
    /// Use the on-disk transformer cache for heavy results.
    pub use_cache: bool,
    /// Override the cache directory (tests; defaults under `~/.copytree`).
    pub cache_dir: Option<PathBuf>,
    /// Free-form instructions included in the output header.
    pub instructions: Option<String>,
    /// Per-category actions for binary files.
    pub binary_policy: crate::transform::loader::BinaryPolicy,
    /// Summarizer backend for the `ai-summary` transformer. Without one
    /// the transformer is not registered.
    pub summarizer: Option<std::sync::Arc<dyn crate::transform::Summarizer>>,
    /// Document converter honored by the loader's `convert` action.
    pub document_converter: Option<std::sync::Arc<dyn crate::transform::loader::DocumentConverter>>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            filter: Vec::new(),
            exclude: Vec::new(),
            profile: ProfileSelection::Auto,
            format: OutputFormat::default(),
            only_tree: false,
            include_content: false,
            add_line_numbers: false,
            show_size: false,
            max_file_size: None,
            max_total_size: None,
            max_file_count: None,
            max_lines: None,
            max_characters: None,
            sort: None,
            follow_symlinks: false,
            case_insensitive: false,
            dry_run: false,
            signal: None,
            on_event: None,
            on_progress: None,
            progress_throttle_ms: DEFAULT_PROGRESS_THROTTLE_MS,
            clipboard: false,
            output: None,
            display: false,
            max_concurrency: None,
            high_water_mark: None,
            use_cache: true,
            cache_dir: None,
            instructions: None,
            binary_policy: crate::transform::loader::BinaryPolicy::default(),
            summarizer: None,
            document_converter: None,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("filter", &self.filter)
            .field("exclude", &self.exclude)
            .field("profile", &self.profile)
            .field("format", &self.format)
            .field("only_tree", &self.only_tree)
            .field("dry_run", &self.dry_run)
            .field("sort", &self.sort)
            .field("max_file_size", &self.max_file_size)
            .field("max_total_size", &self.max_total_size)
            .field("max_file_count", &self.max_file_count)
            .field("follow_symlinks", &self.follow_symlinks)
            .field("use_cache", &self.use_cache)
            .finish_non_exhaustive()
    }
}

impl Options {
    /// Effective walker/pipeline parallelism.
    pub fn concurrency(&self) -> usize {
        self.max_concurrency
            .filter(|&n| n > 0)
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(crate::constants::DEFAULT_CONCURRENCY)
            })
    }

    /// Effective bounded-channel capacity for the walker stream.
    pub fn high_water(&self) -> usize {
        self.high_water_mark
            .filter(|&n| n > 0)
            .unwrap_or_else(|| self.concurrency() * 2)
    }

    /// The cancellation token, creating a detached one when none was given.
    pub fn token(&self) -> CancellationToken {
        self.signal.clone().unwrap_or_default()
    }
}
