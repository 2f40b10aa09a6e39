// src/constants.rs

/// Directories always pruned regardless of profiles or ignore files.
pub const GLOBAL_EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    ".bzr",
    "node_modules",
    "vendor",
    ".idea",
    ".vscode",
    "__pycache__",
    ".pytest_cache",
    ".mypy_cache",
    "target",
    "dist",
    "build",
    ".next",
    ".nuxt",
    ".cache",
];

/// Files always excluded regardless of profiles or ignore files.
pub const GLOBAL_EXCLUDED_FILES: &[&str] = &[
    ".gitignore",
    ".copytreeignore",
    ".ctreeignore",
    ".DS_Store",
    "Thumbs.db",
    "desktop.ini",
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "composer.lock",
    "Cargo.lock",
    "Gemfile.lock",
    "poetry.lock",
    "uv.lock",
];

/// Extensions treated as binary without sampling file contents.
pub const GLOBAL_EXCLUDED_EXTENSIONS: &[&str] = &[
    "exe", "dll", "so", "dylib", "a", "o", "class", "pyc", "pyo", "wasm",
];

/// Ignore file names recognized by the rule engine, in kind order.
pub const GITIGNORE_FILE: &str = ".gitignore";
/// Project-specific overrides; sorts after `.gitignore` at equal depth.
pub const COPYTREEIGNORE_FILE: &str = ".copytreeignore";
/// Legacy alias for [`COPYTREEIGNORE_FILE`] with identical semantics.
pub const CTREEIGNORE_FILE: &str = ".ctreeignore";

/// Placeholder content for records exceeding `max_file_size`.
pub const FILE_TOO_LARGE_PLACEHOLDER: &str = "[File too large]";

/// Bytes sampled from a file head to decide text vs binary.
pub const BINARY_SAMPLE_SIZE: usize = 8 * 1024;

/// Fraction of non-printable bytes above which a sample is binary.
pub const NON_PRINTABLE_THRESHOLD: f64 = 0.30;

/// Fallback walker concurrency when `available_parallelism` is unknown.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Default progress throttle interval in milliseconds.
pub const DEFAULT_PROGRESS_THROTTLE_MS: u64 = 250;

/// Default cache entry time-to-live in seconds (24 hours).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 24 * 60 * 60;

/// Probability (1-in-N) that a cache write also triggers a GC sweep.
pub const CACHE_GC_PROBABILITY: u32 = 50;

/// Default byte ceiling for a single loaded file when none is configured.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Width of the line-number gutter produced by the line-numbers transformer.
pub const LINE_NUMBER_WIDTH: usize = 4;
