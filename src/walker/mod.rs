//! Recursive file discovery with layered filtering, limits, retry, and
//! cancellation.
//!
//! Worker threads share a worklist of directories; each directory read is
//! retried per the retry policy, entries are filtered through the global
//! excludes, the ignore stack, and the resolved profile rules, and accepted
//! files become stat-only [`FileRecord`]s. Records are ordered by the sort
//! key (lexicographic path by default) before the stream yields them, so a
//! given tree and flags always produce the same sequence.

mod stream;

pub use stream::ScanStream;

use crate::cancellation::CancellationToken;
use crate::constants::{
    FILE_TOO_LARGE_PLACEHOLDER, GLOBAL_EXCLUDED_DIRS, GLOBAL_EXCLUDED_EXTENSIONS,
    GLOBAL_EXCLUDED_FILES,
};
use crate::core_types::{FileContent, FileRecord};
use crate::errors::{Error, Result};
use crate::ignore_rules::IgnoreStack;
use crate::options::SortKey;
use crate::profile::ResolvedRules;
use crate::progress::{ProgressBus, Stage};
use crate::retry::{with_retry, ErrorReporter, RetryPolicy};
use log::{debug, warn};
use std::collections::{HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

/// Limits applied during discovery.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkLimits {
    /// Per-file ceiling; larger files become placeholder records.
    pub max_file_size: Option<u64>,
    /// Stop accepting once this many files were taken.
    pub max_file_count: Option<usize>,
    /// Stop accepting once accepted sizes sum past this.
    pub max_total_size: Option<u64>,
}

/// Everything a walk needs, shared across worker threads.
pub struct WalkContext {
    /// Absolute scan base.
    pub base: PathBuf,
    /// Layered ignore rules loaded from the tree.
    pub ignore: IgnoreStack,
    /// Merged profile + CLI include/exclude rules.
    pub rules: ResolvedRules,
    /// Discovery limits.
    pub limits: WalkLimits,
    /// Sort key; `None` is lexicographic path order.
    pub sort: Option<SortKey>,
    /// Follow symlinks, guarding against loops.
    pub follow_symlinks: bool,
    /// Worker thread count.
    pub concurrency: usize,
    /// Cancellation signal.
    pub token: CancellationToken,
    /// Retry policy for directory reads and stat calls.
    pub retry: RetryPolicy,
    /// Error sink for skipped paths.
    pub reporter: Arc<ErrorReporter>,
    /// Progress observer.
    pub progress: Arc<ProgressBus>,
}

/// Runs the walk to completion and returns the stream of accepted records.
///
/// Root-path errors are fatal; everything else is reported to the error
/// reporter and skipped. A cancelled walk returns a stream whose next pull
/// yields [`Error::ScanAborted`].
pub fn walk(ctx: WalkContext) -> Result<ScanStream> {
    let ctx = Arc::new(ctx);

    // The root must be readable; anything less is a fatal error.
    let root_meta = fs::metadata(&ctx.base).map_err(|e| {
        let classification = crate::retry::classify(&e);
        Error::scan_io(e, &ctx.base, classification)
    })?;
    if !root_meta.is_dir() {
        return Err(Error::Validation(format!(
            "base path '{}' is not a directory",
            ctx.base.display()
        )));
    }

    let shared = Arc::new(WalkShared::new(&ctx.base));
    ctx.progress.start(Stage::Walk, "Scanning files");

    let workers: Vec<_> = (0..ctx.concurrency.max(1))
        .map(|_| {
            let ctx = Arc::clone(&ctx);
            let shared = Arc::clone(&shared);
            thread::spawn(move || worker_loop(&ctx, &shared))
        })
        .collect();
    for worker in workers {
        if worker.join().is_err() {
            warn!("A walker thread panicked; results may be partial");
        }
    }

    let cancelled = ctx.token.is_cancelled();
    let mut records = shared.take_records();
    sort_records(&mut records, ctx.sort.unwrap_or_default());
    debug!(
        "Walk finished: {} record(s), cancelled={}",
        records.len(),
        cancelled
    );
    ctx.progress.update(49, "Scan complete", Stage::Walk);

    Ok(ScanStream::new(records, ctx.token.clone(), cancelled))
}

/// Worklist and accumulators shared by the walker threads.
struct WalkShared {
    queue: Mutex<VecDeque<PathBuf>>,
    ready: Condvar,
    /// Directories queued or being processed. The walk is done at zero.
    pending: AtomicUsize,
    processed_dirs: AtomicUsize,
    records: Mutex<Vec<FileRecord>>,
    accepted_count: AtomicUsize,
    accepted_size: AtomicU64,
    /// Set when a count/size limit stops further acceptance.
    limit_reached: AtomicBool,
    /// `(device, inode)` pairs of visited directories under symlink mode.
    visited: Mutex<HashSet<(u64, u64)>>,
}

impl WalkShared {
    fn new(base: &Path) -> Self {
        let mut queue = VecDeque::new();
        queue.push_back(base.to_path_buf());
        Self {
            queue: Mutex::new(queue),
            ready: Condvar::new(),
            pending: AtomicUsize::new(1),
            processed_dirs: AtomicUsize::new(0),
            records: Mutex::new(Vec::new()),
            accepted_count: AtomicUsize::new(0),
            accepted_size: AtomicU64::new(0),
            limit_reached: AtomicBool::new(false),
            visited: Mutex::new(HashSet::new()),
        }
    }

    /// Pops the next directory, blocking until one is available or the
    /// walk has drained.
    fn pop(&self) -> Option<PathBuf> {
        let mut queue = self.queue.lock().ok()?;
        loop {
            if let Some(dir) = queue.pop_front() {
                return Some(dir);
            }
            if self.pending.load(Ordering::SeqCst) == 0 {
                return None;
            }
            queue = self.ready.wait(queue).ok()?;
        }
    }

    fn push(&self, dir: PathBuf) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(dir);
        }
        self.ready.notify_one();
    }

    /// Marks one directory finished; wakes everyone when the walk drains.
    fn finish_one(&self) {
        if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.ready.notify_all();
        }
        self.processed_dirs.fetch_add(1, Ordering::Relaxed);
    }

    /// Drops all queued work so workers exit promptly (cancel / limits).
    fn drain(&self) {
        if let Ok(mut queue) = self.queue.lock() {
            let dropped = queue.len();
            queue.clear();
            if dropped > 0 {
                self.pending.fetch_sub(dropped, Ordering::SeqCst);
            }
        }
        self.ready.notify_all();
    }

    fn take_records(&self) -> Vec<FileRecord> {
        self.records
            .lock()
            .map(|mut records| std::mem::take(&mut *records))
            .unwrap_or_default()
    }
}

fn worker_loop(ctx: &WalkContext, shared: &WalkShared) {
    while let Some(dir) = shared.pop() {
        if ctx.token.is_cancelled() || shared.limit_reached.load(Ordering::Relaxed) {
            shared.finish_one();
            shared.drain();
            continue;
        }
        process_directory(ctx, shared, &dir);
        shared.finish_one();

        let processed = shared.processed_dirs.load(Ordering::Relaxed);
        let outstanding = shared.pending.load(Ordering::SeqCst);
        let percent = (processed * 49 / (processed + outstanding).max(1)) as u8;
        ctx.progress.update(
            percent,
            &format!(
                "Scanning: {} files found",
                shared.accepted_count.load(Ordering::Relaxed)
            ),
            Stage::Walk,
        );
    }
}

/// Reads one directory (with retry) and routes each entry.
fn process_directory(ctx: &WalkContext, shared: &WalkShared, dir: &Path) {
    let entries = with_retry(&ctx.retry, &ctx.reporter, dir, || {
        fs::read_dir(dir).and_then(|iter| iter.collect::<std::io::Result<Vec<_>>>())
    });
    let mut entries = match entries {
        Ok(entries) => entries,
        Err(e) => {
            // Reported by the retry layer; the walk continues.
            debug!("Skipping unreadable directory {}: {e}", dir.display());
            return;
        }
    };
    // Name order keeps acceptance deterministic when limits bite.
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        if ctx.token.is_cancelled() || shared.limit_reached.load(Ordering::Relaxed) {
            return;
        }
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };

        let metadata = if file_type.is_symlink() {
            if !ctx.follow_symlinks {
                debug!("Not following symlink {}", path.display());
                continue;
            }
            match with_retry(&ctx.retry, &ctx.reporter, &path, || fs::metadata(&path)) {
                Ok(meta) => meta,
                Err(_) => continue,
            }
        } else {
            match with_retry(&ctx.retry, &ctx.reporter, &path, || entry.metadata()) {
                Ok(meta) => meta,
                Err(_) => continue,
            }
        };

        let relative = match relative_posix(&ctx.base, &path) {
            Some(rel) => rel,
            None => continue,
        };
        let basename = relative.rsplit('/').next().unwrap_or(&relative);

        if metadata.is_dir() {
            if GLOBAL_EXCLUDED_DIRS.contains(&basename) {
                continue;
            }
            if !ctx.ignore.accepts(&relative, true) {
                debug!("Pruned ignored directory {relative}");
                continue;
            }
            if !ctx.rules.descends_into(&relative) {
                debug!("Pruned excluded directory {relative}");
                continue;
            }
            if ctx.follow_symlinks && !mark_visited(shared, &metadata) {
                debug!("Symlink loop detected at {relative}; skipping");
                continue;
            }
            shared.push(path);
        } else if metadata.is_file() {
            if GLOBAL_EXCLUDED_FILES.contains(&basename) {
                continue;
            }
            if has_excluded_extension(basename) {
                continue;
            }
            if !ctx.ignore.accepts(&relative, false) {
                continue;
            }
            if !ctx.rules.accepts_file(&relative) {
                continue;
            }
            accept_file(ctx, shared, relative, path, &metadata);
        }
    }
}

/// Applies the count/size limits and records the file.
fn accept_file(
    ctx: &WalkContext,
    shared: &WalkShared,
    relative: String,
    path: PathBuf,
    metadata: &fs::Metadata,
) {
    let size = metadata.len();

    // Reserve the count slot atomically so concurrent workers cannot
    // overshoot the limit.
    let max_count = ctx.limits.max_file_count.unwrap_or(usize::MAX);
    if shared
        .accepted_count
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |count| {
            (count < max_count).then_some(count + 1)
        })
        .is_err()
    {
        shared.limit_reached.store(true, Ordering::SeqCst);
        shared.drain();
        return;
    }
    let max_total = ctx.limits.max_total_size.unwrap_or(u64::MAX);
    if shared
        .accepted_size
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |total| {
            (total.saturating_add(size) <= max_total).then(|| total + size)
        })
        .is_err()
    {
        debug!("Total size limit reached at {relative}");
        shared.accepted_count.fetch_sub(1, Ordering::SeqCst);
        shared.limit_reached.store(true, Ordering::SeqCst);
        shared.drain();
        return;
    }

    let mut record = FileRecord::new(relative, path, size, metadata.modified().ok());
    if let Some(max_file) = ctx.limits.max_file_size {
        if size > max_file {
            record.content = Some(FileContent::Placeholder(
                FILE_TOO_LARGE_PLACEHOLDER.to_string(),
            ));
            record.encoding = crate::core_types::Encoding::Binary;
        }
    }

    if let Ok(mut records) = shared.records.lock() {
        records.push(record);
    }
}

/// Tracks `(device, inode)` pairs while following symlinks; returns `false`
/// when the directory was already visited.
#[cfg(unix)]
fn mark_visited(shared: &WalkShared, metadata: &fs::Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    let key = (metadata.dev(), metadata.ino());
    shared
        .visited
        .lock()
        .map(|mut visited| visited.insert(key))
        .unwrap_or(true)
}

#[cfg(not(unix))]
fn mark_visited(_shared: &WalkShared, _metadata: &fs::Metadata) -> bool {
    true
}

fn has_excluded_extension(basename: &str) -> bool {
    basename
        .rsplit_once('.')
        .map(|(_, ext)| {
            GLOBAL_EXCLUDED_EXTENSIONS
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Forward-slash path of `path` relative to `base`.
fn relative_posix(base: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(base)
        .ok()
        .map(|rel| rel.to_string_lossy().replace('\\', "/"))
        .filter(|rel| !rel.is_empty())
}

fn sort_records(records: &mut [FileRecord], key: SortKey) {
    match key {
        SortKey::Path => records.sort_by(|a, b| a.path.cmp(&b.path)),
        SortKey::Size => records.sort_by(|a, b| a.size.cmp(&b.size).then_with(|| a.path.cmp(&b.path))),
        SortKey::Modified => records.sort_by(|a, b| {
            a.modified
                .cmp(&b.modified)
                .then_with(|| a.path.cmp(&b.path))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::resolve_rules;
    use std::fs;
    use tempfile::tempdir;

    fn context(base: &Path) -> WalkContext {
        WalkContext {
            base: base.to_path_buf(),
            ignore: IgnoreStack::load(base, false).unwrap(),
            rules: resolve_rules(None, &[], &[], false).unwrap(),
            limits: WalkLimits::default(),
            sort: None,
            follow_symlinks: false,
            concurrency: 2,
            token: CancellationToken::new(),
            retry: RetryPolicy::default(),
            reporter: Arc::new(ErrorReporter::new()),
            progress: Arc::new(ProgressBus::disabled()),
        }
    }

    fn paths(stream: ScanStream) -> Vec<String> {
        stream
            .map(|record| record.unwrap().path)
            .collect::<Vec<_>>()
    }

    #[test]
    fn walks_in_lexicographic_path_order() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("b/sub")).unwrap();
        fs::write(temp.path().join("z.txt"), "z").unwrap();
        fs::write(temp.path().join("a.txt"), "a").unwrap();
        fs::write(temp.path().join("b/sub/c.txt"), "c").unwrap();

        let stream = walk(context(temp.path())).unwrap();
        assert_eq!(paths(stream), vec!["a.txt", "b/sub/c.txt", "z.txt"]);
    }

    #[test]
    fn gitignore_rules_applied_during_walk() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("build")).unwrap();
        fs::write(temp.path().join(".gitignore"), "build/\n!build/important.log\n").unwrap();
        fs::write(temp.path().join("build/important.log"), "data").unwrap();
        fs::write(temp.path().join("main.rs"), "fn main() {}").unwrap();

        let stream = walk(context(temp.path())).unwrap();
        let found = paths(stream);
        // The negation cannot re-include a file under an ignored directory,
        // and ignore files themselves stay out of the output.
        assert_eq!(found, vec!["main.rs"]);
    }

    #[test]
    fn global_excludes_pruned() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("node_modules/pkg")).unwrap();
        fs::write(temp.path().join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(temp.path().join("Cargo.lock"), "lock").unwrap();
        fs::write(temp.path().join("kept.txt"), "y").unwrap();

        let stream = walk(context(temp.path())).unwrap();
        assert_eq!(paths(stream), vec!["kept.txt"]);
    }

    #[test]
    fn max_file_count_limits_acceptance() {
        let temp = tempdir().unwrap();
        for name in ["a.txt", "b.txt", "c.txt"] {
            fs::write(temp.path().join(name), "x").unwrap();
        }
        let mut ctx = context(temp.path());
        ctx.limits.max_file_count = Some(1);
        let stream = walk(ctx).unwrap();
        assert_eq!(paths(stream).len(), 1);
    }

    #[test]
    fn oversized_files_become_placeholders() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("big.txt"), "0123456789").unwrap();
        fs::write(temp.path().join("small.txt"), "ok").unwrap();
        let mut ctx = context(temp.path());
        ctx.limits.max_file_size = Some(5);
        let stream = walk(ctx).unwrap();
        let records: Vec<_> = stream.map(|r| r.unwrap()).collect();
        let big = records.iter().find(|r| r.path == "big.txt").unwrap();
        assert_eq!(
            big.content,
            Some(FileContent::Placeholder(FILE_TOO_LARGE_PLACEHOLDER.into()))
        );
        let small = records.iter().find(|r| r.path == "small.txt").unwrap();
        assert!(small.content.is_none());
    }

    #[test]
    fn cancelled_walk_raises_scan_aborted() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.txt"), "a").unwrap();
        let ctx = context(temp.path());
        ctx.token.cancel();
        let mut stream = walk(ctx).unwrap();
        match stream.next() {
            Some(Err(Error::ScanAborted)) => {}
            other => panic!("expected ScanAborted, got {other:?}"),
        }
        assert!(stream.next().is_none());
    }

    #[test]
    fn missing_root_is_fatal() {
        let temp = tempdir().unwrap();
        let mut ctx = context(temp.path());
        ctx.base = temp.path().join("does-not-exist");
        assert!(walk(ctx).is_err());
    }

    #[test]
    fn sort_by_size() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("large.txt"), "0123456789").unwrap();
        fs::write(temp.path().join("tiny.txt"), "x").unwrap();
        let mut ctx = context(temp.path());
        ctx.sort = Some(SortKey::Size);
        let stream = walk(ctx).unwrap();
        assert_eq!(paths(stream), vec!["tiny.txt", "large.txt"]);
    }
}
