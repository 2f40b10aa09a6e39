//! Glob pattern engine for ignore rules and profile include/exclude lists.
//!
//! A pattern is brace-expanded first, then each expansion is compiled once
//! into a [`Matcher`]; [`Pattern::is_match`] is the alternation over the
//! expansions. The ignore-file parser instead calls [`brace::expand`]
//! itself and emits one rule per expansion, so both layers share one
//! compiler.

pub mod brace;
mod matcher;

pub use matcher::Matcher;

use crate::errors::Result;

/// A compiled glob pattern: brace expansions joined by alternation.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    matchers: Vec<Matcher>,
}

impl Pattern {
    /// Brace-expands and compiles `source`.
    ///
    /// # Errors
    /// Returns [`crate::errors::Error::Pattern`] for unbalanced braces or an
    /// invalid character class.
    pub fn new(source: &str, case_insensitive: bool) -> Result<Self> {
        let matchers = brace::expand(source)?
            .iter()
            .map(|expansion| Matcher::new(expansion, case_insensitive))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            source: source.to_string(),
            matchers,
        })
    }

    /// Compiles `source`, degrading to a literal matcher when the glob is
    /// malformed so callers never lose a line of input.
    pub fn new_lossy(source: &str, case_insensitive: bool) -> Self {
        Self::new(source, case_insensitive).unwrap_or_else(|e| {
            log::warn!("{e}; treating pattern as literal");
            Self {
                source: source.to_string(),
                matchers: vec![Matcher::literal(source, case_insensitive)],
            }
        })
    }

    /// The original pattern text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether the pattern names a path (contains `/`) rather than a
    /// basename. Decides the matching subject for unanchored rules.
    pub fn contains_slash(&self) -> bool {
        self.source.contains('/')
    }

    /// Tests `subject` against any expansion.
    pub fn is_match(&self, subject: &str) -> bool {
        self.matchers.iter().any(|m| m.is_match(subject))
    }
}
