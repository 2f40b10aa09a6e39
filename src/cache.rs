//! Content-addressed on-disk cache for heavy transformer results.
//!
//! Layout: a flat directory (default `~/.copytree/cache`) of
//! `<sha256>.entry` files, each a JSON record `{key, created_at, ttl,
//! value}`. Keys are derived from transformer identity plus the file's
//! content hash, so renames never invalidate an entry. Writes go through a
//! temp file and an atomic rename; concurrent identical keys collapse to
//! one computation via an advisory lock. Every cache failure degrades to
//! recomputation.

use crate::constants::{CACHE_GC_PROBABILITY, DEFAULT_CACHE_TTL_SECS};
use crate::errors::{io_error_with_path, Result};
use fs2::FileExt;
use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// One serialized cache entry.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    key: String,
    /// Seconds since the Unix epoch at write time.
    created_at: u64,
    /// Time-to-live in seconds.
    ttl: u64,
    value: serde_json::Value,
}

impl CacheEntry {
    fn expired(&self, now: u64) -> bool {
        now >= self.created_at.saturating_add(self.ttl)
    }
}

/// Handle to the on-disk cache directory.
#[derive(Debug, Clone)]
pub struct TransformCache {
    dir: PathBuf,
    ttl: Duration,
}

/// Guard for single-flight computation of one key. Dropping releases the
/// advisory lock.
pub struct EntryLock {
    _file: File,
}

impl TransformCache {
    /// Opens (creating if needed) the cache at `dir`, or the default
    /// location under the user's home directory.
    pub fn open(dir: Option<PathBuf>) -> Result<Self> {
        let dir = match dir {
            Some(dir) => dir,
            None => default_cache_dir()?,
        };
        fs::create_dir_all(&dir).map_err(|e| io_error_with_path(e, &dir))?;
        Ok(Self {
            dir,
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
        })
    }

    /// Overrides the default entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Derives the cache key for a transformer application:
    /// `sha256(name ‖ version ‖ file_sha256 ‖ options_json)`.
    pub fn key(name: &str, version: &str, file_sha256: &str, options: &serde_json::Value) -> String {
        let mut hasher = Sha256::new();
        hasher.update(name.as_bytes());
        hasher.update(version.as_bytes());
        hasher.update(file_sha256.as_bytes());
        hasher.update(options.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Hex SHA-256 of a file's content bytes.
    pub fn content_hash(bytes: &[u8]) -> String {
        hex::encode(Sha256::digest(bytes))
    }

    /// Looks a key up; expired or unreadable entries count as misses (and
    /// expired files are removed opportunistically).
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        let path = self.entry_path(key);
        let content = fs::read_to_string(&path).ok()?;
        let entry: CacheEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Dropping corrupt cache entry {}: {e}", path.display());
                let _ = fs::remove_file(&path);
                return None;
            }
        };
        if entry.expired(now_secs()) {
            debug!("Cache entry expired: {key}");
            let _ = fs::remove_file(&path);
            return None;
        }
        debug!("Cache hit: {key}");
        Some(entry.value)
    }

    /// Writes a value through atomically. Failures are logged, never
    /// propagated; the result was already computed.
    pub fn put(&self, key: &str, value: serde_json::Value) {
        let entry = CacheEntry {
            key: key.to_string(),
            created_at: now_secs(),
            ttl: self.ttl.as_secs(),
            value,
        };
        if let Err(e) = self.write_atomic(key, &entry) {
            warn!("Cache write failed for {key}: {e}");
        }
        self.maybe_gc();
    }

    fn write_atomic(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let json = serde_json::to_string(entry)
            .map_err(|e| crate::errors::Error::Output(e.to_string()))?;
        let mut temp = tempfile::NamedTempFile::new_in(&self.dir)
            .map_err(|e| io_error_with_path(e, &self.dir))?;
        temp.write_all(json.as_bytes())
            .map_err(|e| io_error_with_path(e, temp.path()))?;
        let target = self.entry_path(key);
        temp.persist(&target)
            .map_err(|e| io_error_with_path(e.error, &target))?;
        Ok(())
    }

    /// Takes the single-flight lock for a key, blocking until the current
    /// holder finishes. Callers re-check `get` after acquiring.
    pub fn lock_entry(&self, key: &str) -> Option<EntryLock> {
        let path = self.dir.join(format!("{key}.lock"));
        let file = File::create(&path).ok()?;
        file.lock_exclusive().ok()?;
        Some(EntryLock { _file: file })
    }

    /// Removes every expired entry. Runs probabilistically after writes
    /// and may be invoked directly.
    pub fn gc(&self) {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return;
        };
        let now = now_secs();
        let mut removed = 0usize;
        for dir_entry in entries.flatten() {
            let path = dir_entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("entry") {
                continue;
            }
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            let expired = serde_json::from_str::<CacheEntry>(&content)
                .map(|entry| entry.expired(now))
                .unwrap_or(true);
            if expired && fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        if removed > 0 {
            debug!("Cache GC removed {removed} entr(ies)");
        }
    }

    fn maybe_gc(&self) {
        if rand::thread_rng().gen_ratio(1, CACHE_GC_PROBABILITY) {
            self.gc();
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.entry"))
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn default_cache_dir() -> Result<PathBuf> {
    let base = directories::BaseDirs::new().ok_or_else(|| {
        crate::errors::Error::Validation("cannot determine a home directory for the cache".into())
    })?;
    Ok(base.home_dir().join(".copytree").join("cache"))
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
