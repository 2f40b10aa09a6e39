//! Merging profiles with CLI overrides into the rules the walker applies.

use super::Profile;
use crate::errors::Result;
use crate::pattern::Pattern;
use log::debug;

/// The fully merged include/exclude rules for one scan.
///
/// Precedence, highest first: a CLI `filter` replaces the profile's
/// include list; CLI `exclude` patterns are concatenated ahead of the
/// profile's. The built-in global excludes and the ignore-file layer are
/// applied on top of these by the walker, always.
#[derive(Debug, Clone)]
pub struct ResolvedRules {
    /// The profile the rules came from.
    pub profile: Profile,
    /// Compiled include patterns; empty means "include everything".
    include: Vec<Pattern>,
    /// Compiled exclude patterns.
    exclude: Vec<Pattern>,
}

impl ResolvedRules {
    /// Merges `profile` with the CLI-level overrides and compiles every
    /// pattern once.
    pub fn new(
        profile: Profile,
        cli_filter: &[String],
        cli_exclude: &[String],
        case_insensitive: bool,
    ) -> Result<Self> {
        let include_sources: Vec<&String> = if cli_filter.is_empty() {
            profile.include.iter().collect()
        } else {
            debug!("CLI filter replaces profile include list");
            cli_filter.iter().collect()
        };
        let exclude_sources: Vec<&String> =
            cli_exclude.iter().chain(profile.exclude.iter()).collect();

        let include = include_sources
            .iter()
            .map(|p| Pattern::new(p, case_insensitive))
            .collect::<Result<Vec<_>>>()?;
        let exclude = exclude_sources
            .iter()
            .map(|p| Pattern::new(p, case_insensitive))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            profile,
            include,
            exclude,
        })
    }

    /// Whether a file at `relative_path` passes the include/exclude lists.
    /// With no include patterns the default is `**/*`: everything passes
    /// that is not excluded.
    pub fn accepts_file(&self, relative_path: &str) -> bool {
        if self.matches_exclude(relative_path) {
            return false;
        }
        if self.include.is_empty() {
            return true;
        }
        self.include.iter().any(|p| p.is_match(relative_path))
    }

    /// Whether the walker should descend into a directory. Include
    /// patterns never prune directories (a deeper file may still match);
    /// excludes do.
    pub fn descends_into(&self, relative_path: &str) -> bool {
        !self.matches_exclude(relative_path)
    }

    fn matches_exclude(&self, relative_path: &str) -> bool {
        self.exclude.iter().any(|p| {
            // A basename-shaped exclude like `*.lock` should match at any
            // depth, the way it would in an ignore file.
            if p.contains_slash() {
                p.is_match(relative_path)
            } else {
                let basename = relative_path.rsplit('/').next().unwrap_or(relative_path);
                p.is_match(basename) || p.is_match(relative_path)
            }
        })
    }
}

/// Resolves the effective rules for a scan: profile (or default) merged
/// with CLI overrides.
pub fn resolve_rules(
    profile: Option<Profile>,
    cli_filter: &[String],
    cli_exclude: &[String],
    case_insensitive: bool,
) -> Result<ResolvedRules> {
    let profile = profile.unwrap_or_else(Profile::default_profile);
    debug!(
        "Resolving rules for profile '{}' ({} include, {} exclude)",
        profile.name,
        profile.include.len(),
        profile.exclude.len()
    );
    ResolvedRules::new(profile, cli_filter, cli_exclude, case_insensitive)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(include: &[&str], exclude: &[&str]) -> Profile {
        Profile {
            name: "test".into(),
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
            ..Profile::default()
        }
    }

    #[test]
    fn default_accepts_everything() {
        let rules = resolve_rules(None, &[], &[], false).unwrap();
        assert!(rules.accepts_file("src/lib.rs"));
        assert!(rules.accepts_file("deep/nested/file.bin"));
    }

    #[test]
    fn profile_include_restricts() {
        let rules =
            resolve_rules(Some(profile(&["src/**/*.rs"], &[])), &[], &[], false).unwrap();
        assert!(rules.accepts_file("src/a/lib.rs"));
        assert!(!rules.accepts_file("docs/readme.md"));
    }

    #[test]
    fn cli_filter_replaces_profile_include() {
        let rules = resolve_rules(
            Some(profile(&["src/**"], &[])),
            &["docs/**".to_string()],
            &[],
            false,
        )
        .unwrap();
        assert!(rules.accepts_file("docs/readme.md"));
        assert!(!rules.accepts_file("src/lib.rs"));
    }

    #[test]
    fn cli_exclude_concatenates_with_profile_exclude() {
        let rules = resolve_rules(
            Some(profile(&[], &["*.md"])),
            &[],
            &["*.txt".to_string()],
            false,
        )
        .unwrap();
        assert!(!rules.accepts_file("notes.txt"));
        assert!(!rules.accepts_file("readme.md"));
        assert!(rules.accepts_file("main.rs"));
    }

    #[test]
    fn exclude_wins_over_include() {
        let rules = resolve_rules(
            Some(profile(&["src/**"], &["src/generated/**"])),
            &[],
            &[],
            false,
        )
        .unwrap();
        assert!(rules.accepts_file("src/lib.rs"));
        assert!(!rules.accepts_file("src/generated/schema.rs"));
    }

    #[test]
    fn directories_pruned_only_by_excludes() {
        let rules =
            resolve_rules(Some(profile(&["src/**/*.rs"], &["target/**"])), &[], &[], false)
                .unwrap();
        // Include list doesn't stop descent; a matching file may be deeper.
        assert!(rules.descends_into("docs"));
        assert!(rules.descends_into("src"));
        assert!(!rules.descends_into("target/debug"));
    }

    #[test]
    fn basename_shaped_exclude_applies_at_depth() {
        let rules = resolve_rules(Some(profile(&[], &["*.lock"])), &[], &[], false).unwrap();
        assert!(!rules.accepts_file("deps/Cargo.lock"));
        assert!(rules.accepts_file("deps/Cargo.toml"));
    }
}
