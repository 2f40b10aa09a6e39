//! Layered application of ignore rule sets to candidate paths.

use super::{parse_rule_set, RuleKind, RuleSet};
use crate::constants::{COPYTREEIGNORE_FILE, CTREEIGNORE_FILE, GITIGNORE_FILE, GLOBAL_EXCLUDED_DIRS};
use crate::errors::Result;
use log::debug;
use std::fs;
use std::path::Path;

/// All ignore rule sets under one scan base, in application order.
///
/// Sets are sorted by `(depth, kind)`: shallower files first, and at equal
/// depth `.gitignore` before `.copytreeignore`, so Git-compatible rules are
/// applied before project-specific overrides.
#[derive(Debug, Clone, Default)]
pub struct IgnoreStack {
    sets: Vec<RuleSet>,
}

impl IgnoreStack {
    /// An empty stack that accepts everything.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a stack from pre-parsed rule sets (sorting them).
    pub fn from_sets(mut sets: Vec<RuleSet>) -> Self {
        sets.sort_by_key(|set| (set.depth(), set.kind));
        Self { sets }
    }

    /// Scans `base` recursively for `.gitignore` and `.copytreeignore`
    /// (or legacy `.ctreeignore`) files and parses each into a layer.
    ///
    /// Globally excluded directories are not descended into; an ignore
    /// file inside `node_modules` never matters.
    pub fn load(base: &Path, case_insensitive: bool) -> Result<Self> {
        let mut sets = Vec::new();
        collect_sets(base, base, case_insensitive, &mut sets)?;
        debug!("Loaded {} ignore rule set(s) under {}", sets.len(), base.display());
        Ok(Self::from_sets(sets))
    }

    /// The loaded rule sets, in application order.
    pub fn sets(&self) -> &[RuleSet] {
        &self.sets
    }

    /// Returns `true` when the candidate should be kept.
    ///
    /// `relative_path` uses forward slashes and is relative to the scan
    /// base. Applying the same rules twice yields the same decision.
    pub fn accepts(&self, relative_path: &str, is_dir: bool) -> bool {
        !self.is_ignored(relative_path, is_dir)
    }

    /// The layered ignore decision, including Git's rule that a negation
    /// cannot re-include a file below an ignored directory.
    pub fn is_ignored(&self, relative_path: &str, is_dir: bool) -> bool {
        if self.matched_ignored(relative_path, is_dir) {
            return true;
        }
        // A file-level negation cannot resurrect anything under an ignored
        // directory.
        let mut end = 0;
        for segment in relative_path.split('/') {
            if end + segment.len() >= relative_path.len() {
                break;
            }
            end += segment.len();
            let ancestor = &relative_path[..end];
            end += 1; // the slash
            if self.matched_ignored(ancestor, true) {
                return true;
            }
        }
        false
    }

    /// Runs the rule loop itself, without the ancestor check.
    fn matched_ignored(&self, relative_path: &str, is_dir: bool) -> bool {
        let basename = relative_path.rsplit('/').next().unwrap_or(relative_path);
        let mut ignored = false;
        for set in &self.sets {
            let local = if set.base_dir.is_empty() {
                relative_path
            } else {
                // A set only sees candidates under its own directory.
                match relative_path
                    .strip_prefix(set.base_dir.as_str())
                    .and_then(|rest| rest.strip_prefix('/'))
                {
                    Some(local) => local,
                    None => continue,
                }
            };
            for rule in &set.rules {
                if rule.directory_only && !is_dir {
                    continue;
                }
                if rule.matches(local, basename) {
                    ignored = !rule.negation;
                    if ignored && rule.directory_only {
                        break;
                    }
                }
            }
        }
        ignored
    }
}

/// Recursively collects rule sets below `dir`.
fn collect_sets(
    base: &Path,
    dir: &Path,
    case_insensitive: bool,
    sets: &mut Vec<RuleSet>,
) -> Result<()> {
    let base_dir = relative_to(base, dir);

    for (name, kind) in [
        (GITIGNORE_FILE, RuleKind::Gitignore),
        (COPYTREEIGNORE_FILE, RuleKind::CopytreeIgnore),
        (CTREEIGNORE_FILE, RuleKind::CopytreeIgnore),
    ] {
        let path = dir.join(name);
        if let Ok(content) = fs::read_to_string(&path) {
            debug!("Parsed ignore file {}", path.display());
            sets.push(parse_rule_set(&content, &base_dir, kind, case_insensitive));
        }
    }

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        // Unreadable directories are reported later by the walker itself.
        Err(_) => return Ok(()),
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(ft) => ft,
            Err(_) => continue,
        };
        if !file_type.is_dir() || file_type.is_symlink() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if GLOBAL_EXCLUDED_DIRS.contains(&name.as_ref()) {
            continue;
        }
        collect_sets(base, &path, case_insensitive, sets)?;
    }
    Ok(())
}

/// Forward-slash path of `dir` relative to `base`, `""` for the base itself.
fn relative_to(base: &Path, dir: &Path) -> String {
    dir.strip_prefix(base)
        .map(|p| p.to_string_lossy().replace('\\', "/"))
        .unwrap_or_default()
}
