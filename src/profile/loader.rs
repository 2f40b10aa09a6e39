//! Parsing profile files (YAML, JSON, or INI) into [`Profile`]s.
//!
//! YAML and JSON are read into a `serde_json::Value` first so both formats
//! share one normalization path; ordering comes from arrays, and unknown
//! keys are ignored with a warning. The INI form supports `[profile]`,
//! `[include]`, and `[exclude]` sections with one entry per line.

use super::{ExternalSource, Profile};
use crate::errors::{io_error_with_path, Error, Result};
use log::warn;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Loads and normalizes the profile file at `path`. The profile name
/// defaults to the file stem (minus the `.copytree-` prefix for named
/// profiles).
pub fn load_profile_file(path: &Path) -> Result<Profile> {
    let content = fs::read_to_string(path).map_err(|e| io_error_with_path(e, path))?;
    let stem = profile_name_from_path(path);

    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let mut profile = match extension {
        "yml" | "yaml" => normalize(parse_yaml(&content, path)?),
        "json" => normalize(parse_json(&content, path)?),
        _ => parse_ini(&content),
    }?;
    if profile.name.is_empty() {
        profile.name = stem;
    }
    Ok(profile)
}

fn parse_yaml(content: &str, path: &Path) -> Result<Value> {
    if content.trim().is_empty() {
        return Ok(Value::Object(serde_json::Map::new()));
    }
    serde_yaml::from_str(content)
        .map_err(|e| Error::Validation(format!("invalid YAML profile {}: {e}", path.display())))
}

fn parse_json(content: &str, path: &Path) -> Result<Value> {
    serde_json::from_str(content)
        .map_err(|e| Error::Validation(format!("invalid JSON profile {}: {e}", path.display())))
}

/// Converts a parsed document into a [`Profile`], coercing sections into
/// ordered string sequences and warning on anything unrecognized.
fn normalize(doc: Value) -> Result<Profile> {
    let Value::Object(map) = doc else {
        return Err(Error::Validation(
            "profile file must contain a mapping at the top level".to_string(),
        ));
    };

    let mut profile = Profile::default();
    for (key, value) in map {
        match key.as_str() {
            "name" => {
                if let Value::String(name) = value {
                    profile.name = name;
                }
            }
            "include" => profile.include = string_sequence(value),
            "exclude" => profile.exclude = string_sequence(value),
            "transformers" => profile.transformers = transformer_entries(value),
            "external" | "external_sources" => {
                profile.external_sources = external_sources(value)
            }
            other => warn!("Ignoring unknown profile key '{other}'"),
        }
    }
    Ok(profile)
}

/// Coerces a value into an ordered sequence of non-empty strings.
fn string_sequence(value: Value) -> Vec<String> {
    let items = match value {
        Value::Array(items) => items,
        Value::String(single) => vec![Value::String(single)],
        Value::Null => Vec::new(),
        other => {
            warn!("Expected a sequence of patterns, got {other}");
            Vec::new()
        }
    };
    items
        .into_iter()
        .filter_map(|item| match item {
            Value::String(s) if !s.is_empty() => Some(s),
            Value::String(_) => None,
            other => {
                warn!("Skipping non-string pattern entry {other}");
                None
            }
        })
        .collect()
}

/// Accepts transformers as an ordered array of names or single-key maps
/// (`- first-lines: {lines: 50}`), or a plain mapping.
fn transformer_entries(value: Value) -> Vec<(String, Value)> {
    let mut entries = Vec::new();
    match value {
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::String(name) => entries.push((name, Value::Null)),
                    Value::Object(map) if map.len() == 1 => {
                        for (name, options) in map {
                            entries.push((name, options));
                        }
                    }
                    other => warn!("Skipping malformed transformer entry {other}"),
                }
            }
        }
        Value::Object(map) => {
            for (name, options) in map {
                entries.push((name, options));
            }
        }
        Value::Null => {}
        other => warn!("Expected a transformer list, got {other}"),
    }
    entries
}

fn external_sources(value: Value) -> Vec<ExternalSource> {
    let Value::Array(items) = value else {
        warn!("Expected a sequence of external sources");
        return Vec::new();
    };
    items
        .into_iter()
        .filter_map(|item| {
            let Value::Object(map) = item else {
                warn!("Skipping malformed external source entry");
                return None;
            };
            let source_url = map.get("source_url")?.as_str()?.to_string();
            let destination = map
                .get("destination")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let include_rules = map
                .get("include_rules")
                .cloned()
                .map(string_sequence)
                .unwrap_or_default();
            Some(ExternalSource {
                source_url,
                destination,
                include_rules,
            })
        })
        .collect()
}

/// INI-style `.copytree`: `[profile]` holds `name = value` pairs,
/// `[include]`/`[exclude]` hold one pattern per line.
fn parse_ini(content: &str) -> Result<Profile> {
    let mut profile = Profile::default();
    let mut section = String::new();
    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(header) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            section = header.trim().to_ascii_lowercase();
            continue;
        }
        match section.as_str() {
            "profile" => {
                if let Some((key, value)) = line.split_once('=') {
                    if key.trim() == "name" {
                        profile.name = value.trim().to_string();
                    } else {
                        warn!("Ignoring unknown profile key '{}'", key.trim());
                    }
                }
            }
            "include" => profile.include.push(line.to_string()),
            "exclude" => profile.exclude.push(line.to_string()),
            other => warn!("Ignoring line in unknown profile section '[{other}]'"),
        }
    }
    Ok(profile)
}

/// Profile name derived from the file name: stem for the default file,
/// suffix for `.copytree-<name>.<ext>`.
fn profile_name_from_path(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let stem = file_name
        .trim_end_matches(".yml")
        .trim_end_matches(".yaml")
        .trim_end_matches(".json");
    match stem.strip_prefix(".copytree-") {
        Some(name) => name.to_string(),
        None => "default".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn yaml_profile_round_trip() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".copytree.yml");
        fs::write(
            &path,
            "include:\n  - src/**/*.rs\n  - Cargo.toml\nexclude:\n  - target/**\ntransformers:\n  - first-lines: {lines: 40}\n  - ai-summary\n",
        )
        .unwrap();
        let profile = load_profile_file(&path).unwrap();
        assert_eq!(profile.name, "default");
        assert_eq!(profile.include, vec!["src/**/*.rs", "Cargo.toml"]);
        assert_eq!(profile.exclude, vec!["target/**"]);
        assert_eq!(profile.transformers.len(), 2);
        assert_eq!(profile.transformers[0].0, "first-lines");
        assert_eq!(profile.transformers[1].0, "ai-summary");
    }

    #[test]
    fn json_profile_parses() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".copytree-web.json");
        fs::write(
            &path,
            r#"{"include": ["public/**"], "exclude": [], "name": "web-assets"}"#,
        )
        .unwrap();
        let profile = load_profile_file(&path).unwrap();
        assert_eq!(profile.name, "web-assets");
        assert_eq!(profile.include, vec!["public/**"]);
    }

    #[test]
    fn named_profile_name_defaults_to_suffix() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".copytree-docs.yaml");
        fs::write(&path, "include: ['docs/**']\n").unwrap();
        let profile = load_profile_file(&path).unwrap();
        assert_eq!(profile.name, "docs");
    }

    #[test]
    fn ini_profile_sections() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".copytree");
        fs::write(
            &path,
            "[profile]\nname = legacy\n\n[include]\nsrc/**\n# comment\n\n[exclude]\n*.bak\n",
        )
        .unwrap();
        let profile = load_profile_file(&path).unwrap();
        assert_eq!(profile.name, "legacy");
        assert_eq!(profile.include, vec!["src/**"]);
        assert_eq!(profile.exclude, vec!["*.bak"]);
    }

    #[test]
    fn empty_strings_stripped_and_missing_sections_empty() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".copytree.yml");
        fs::write(&path, "include:\n  - ''\n  - src/**\n").unwrap();
        let profile = load_profile_file(&path).unwrap();
        assert_eq!(profile.include, vec!["src/**"]);
        assert!(profile.exclude.is_empty());
    }

    #[test]
    fn unknown_keys_do_not_fail() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".copytree.yml");
        fs::write(&path, "include: ['**/*']\nfuture_option: 7\n").unwrap();
        assert!(load_profile_file(&path).is_ok());
    }

    #[test]
    fn external_sources_carried_through() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".copytree.yml");
        fs::write(
            &path,
            "external:\n  - source_url: https://example.com/repo\n    destination: vendor/repo\n    include_rules: ['**/*.md']\n",
        )
        .unwrap();
        let profile = load_profile_file(&path).unwrap();
        assert_eq!(profile.external_sources.len(), 1);
        assert_eq!(profile.external_sources[0].destination, "vendor/repo");
    }

    #[test]
    fn top_level_sequence_is_invalid() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(".copytree.yml");
        fs::write(&path, "- a\n- b\n").unwrap();
        assert!(load_profile_file(&path).is_err());
    }
}
