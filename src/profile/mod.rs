//! Folder profiles: declarative include/exclude patterns plus transformer
//! options, loaded from `.copytree.{yml,yaml,json}` or an INI-style
//! `.copytree` file and merged with CLI overrides.

mod discovery;
mod loader;
mod merge;

pub use discovery::{discover_profile, find_named_profile};
pub use loader::load_profile_file;
pub use merge::{resolve_rules, ResolvedRules};

use serde::Serialize;

/// One external source reference. Fetching is out of core scope; the
/// profile boundary only carries the declaration through.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalSource {
    /// Where the external tree comes from.
    pub source_url: String,
    /// Destination directory below the scan base.
    pub destination: String,
    /// Include patterns applied to the fetched tree.
    pub include_rules: Vec<String>,
}

/// A declarative scan profile.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Profile {
    /// Label; defaults to the profile file's stem.
    pub name: String,
    /// Ordered include glob patterns. Empty means include everything.
    pub include: Vec<String>,
    /// Ordered exclude glob patterns.
    pub exclude: Vec<String>,
    /// Ordered `(name, options)` pairs of opt-in transformers.
    pub transformers: Vec<(String, serde_json::Value)>,
    /// External source declarations, carried but not fetched here.
    pub external_sources: Vec<ExternalSource>,
}

impl Profile {
    /// An unnamed profile with no rules: include everything minus the
    /// built-in global excludes.
    pub fn default_profile() -> Self {
        Self {
            name: "default".to_string(),
            ..Self::default()
        }
    }

    /// True when a transformer is enabled by this profile.
    pub fn transformer_enabled(&self, name: &str) -> bool {
        self.transformers.iter().any(|(n, _)| n == name)
    }

    /// Options declared for a transformer, if enabled.
    pub fn transformer_options(&self, name: &str) -> Option<&serde_json::Value> {
        self.transformers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, options)| options)
    }

    /// Position of a transformer in the profile's declared order. Used to
    /// break ties inside a scheduling bucket.
    pub fn transformer_order(&self, name: &str) -> Option<usize> {
        self.transformers.iter().position(|(n, _)| n == name)
    }
}
