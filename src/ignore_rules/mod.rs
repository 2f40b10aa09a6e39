//! Gitignore-semantics rule engine.
//!
//! One parsed ignore file becomes a [`RuleSet`]; all rule sets discovered
//! under a scan base are layered into an [`IgnoreStack`] which answers
//! accept/reject for candidate paths. `.copytreeignore` (and its legacy
//! alias `.ctreeignore`) participates as an additional layer that sorts
//! after `.gitignore` at the same depth, so project-specific overrides win.

mod parser;
mod stack;

pub use parser::parse_rule_set;
pub use stack::IgnoreStack;

use crate::pattern::Matcher;

/// Which kind of ignore file a rule set came from. Ordering is significant:
/// at equal depth, Git-compatible rules apply before project overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RuleKind {
    /// `.gitignore`
    Gitignore,
    /// `.copytreeignore` or `.ctreeignore`
    CopytreeIgnore,
}

/// The parsed form of one ignore line.
///
/// Invariant: `pattern` is never empty after stripping.
#[derive(Debug, Clone)]
pub struct IgnoreRule {
    /// Canonicalized glob (forward slashes), after prefix/suffix stripping.
    pub pattern: String,
    /// `!`-prefixed re-include.
    pub negation: bool,
    /// Trailing `/`: rule applies only to directories.
    pub directory_only: bool,
    /// Leading `/`: anchored to the ignore file's directory.
    pub leading_slash: bool,
    /// Whether the stripped pattern still names a path. Unanchored rules
    /// without a slash match basenames instead.
    pub contains_slash: bool,
    /// Matcher compiled once when the rule set was loaded.
    matcher: Matcher,
}

impl IgnoreRule {
    /// Tests this rule against a candidate, choosing the subject per the
    /// anchoring flags: anchored or path-shaped rules see the path relative
    /// to the ignore file's directory, everything else sees the basename.
    pub fn matches(&self, local_path: &str, basename: &str) -> bool {
        let subject = if self.leading_slash || self.contains_slash {
            local_path
        } else {
            basename
        };
        self.matcher.is_match(subject)
    }
}

/// The ordered rules of one ignore file.
#[derive(Debug, Clone)]
pub struct RuleSet {
    /// Path from the scan base to the file's directory (`""` for root),
    /// forward slashes, no trailing slash.
    pub base_dir: String,
    /// File kind; decides ordering among sets at the same depth.
    pub kind: RuleKind,
    /// Rules in file order.
    pub rules: Vec<IgnoreRule>,
}

impl RuleSet {
    /// Depth of the containing directory below the scan base.
    pub fn depth(&self) -> usize {
        if self.base_dir.is_empty() {
            0
        } else {
            self.base_dir.matches('/').count() + 1
        }
    }

    /// Re-serializes the parsed rules to ignore-file lines. Parsing the
    /// result yields an equivalent rule set.
    pub fn to_lines(&self) -> Vec<String> {
        self.rules
            .iter()
            .map(|rule| {
                let mut line = String::new();
                if rule.negation {
                    line.push('!');
                }
                if rule.leading_slash {
                    line.push('/');
                }
                line.push_str(&rule.pattern);
                if rule.directory_only {
                    line.push('/');
                }
                line
            })
            .collect()
    }
}
