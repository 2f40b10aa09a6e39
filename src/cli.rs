// src/cli.rs

use crate::errors::{Error, Result};
use crate::options::{Options, OutputFormat, ProfileSelection, SortKey};
use byte_unit::Byte;
use clap::Parser;
use std::path::PathBuf;

/// Copies a project tree into a single structured document.
///
/// copytree walks a directory, selects files according to layered
/// .gitignore/.copytreeignore rules, folder profiles, and command-line
/// filters, optionally transforms file bodies, and emits one document
/// (XML by default) suitable for pasting into an LLM prompt or piping
/// into other tooling.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the directory to process.
    #[arg(default_value = ".")]
    pub path: PathBuf,

    // --- Selection ---
    /// Use a named profile (.copytree-<NAME>.yml|yaml|json in the base).
    #[arg(long, value_name = "NAME")]
    pub profile: Option<String>,

    /// Include only files matching these globs (replaces the profile's
    /// include list; repeatable).
    #[arg(long = "filter", value_name = "GLOB", num_args = 1..)]
    pub filter: Option<Vec<String>>,

    /// Exclude files matching these globs (added ahead of the profile's
    /// excludes; repeatable).
    #[arg(long = "exclude", value_name = "GLOB", num_args = 1..)]
    pub exclude: Option<Vec<String>>,

    /// Match patterns case-insensitively.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub case_insensitive: bool,

    // --- Limits ---
    /// Maximum single-file size (e.g. "512k", "2M"); larger files become
    /// placeholders.
    #[arg(short = 'm', long, value_name = "BYTES")]
    pub max_file_size: Option<String>,

    /// Stop accepting files once their sizes sum past this (e.g. "10M").
    #[arg(long, value_name = "BYTES")]
    pub max_total_size: Option<String>,

    /// Maximum number of files to include.
    #[arg(long, value_name = "COUNT")]
    pub max_file_count: Option<usize>,

    /// Per-file line cap applied after transformation.
    #[arg(long, value_name = "LINES")]
    pub max_lines: Option<usize>,

    /// Per-file character cap applied after transformation.
    #[arg(long, value_name = "CHARS")]
    pub max_characters: Option<usize>,

    // --- Traversal ---
    /// Emission order: path (default), size, or modified.
    #[arg(long, value_name = "KEY")]
    pub sort: Option<String>,

    /// Follow symlinks (with loop detection).
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub follow_symlinks: bool,

    // --- Output ---
    /// Output format: xml, json, markdown, tree, ndjson, or sarif.
    #[arg(short = 'f', long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// Write output to this file instead of stdout.
    #[arg(short = 'o', long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Echo output to stdout even when another sink is active.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub display: bool,

    #[cfg(feature = "clipboard")]
    /// Copy output to the system clipboard.
    #[arg(short = 'p', long = "clipboard", action = clap::ArgAction::SetTrue)]
    pub clipboard: bool,

    /// Emit the header and directory tree only, no file contents.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub only_tree: bool,

    /// Prefix each content line with its line number.
    #[arg(long = "with-line-numbers", action = clap::ArgAction::SetTrue)]
    pub with_line_numbers: bool,

    /// Annotate the directory tree with file sizes.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub show_size: bool,

    /// Free-form instructions included in the output header.
    #[arg(long, value_name = "TEXT")]
    pub instructions: Option<String>,

    // --- Execution control ---
    /// List what would be copied without reading file contents.
    #[arg(short = 'D', long, action = clap::ArgAction::SetTrue)]
    pub dry_run: bool,

    /// Disable the on-disk transformer cache for this run.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub no_cache: bool,
}

impl Cli {
    /// Converts parsed arguments into the base path and an [`Options`]
    /// value for the library entry points.
    pub fn into_options(self) -> Result<(PathBuf, Options)> {
        let mut options = Options {
            filter: self.filter.unwrap_or_default(),
            exclude: self.exclude.unwrap_or_default(),
            case_insensitive: self.case_insensitive,
            only_tree: self.only_tree,
            add_line_numbers: self.with_line_numbers,
            show_size: self.show_size,
            dry_run: self.dry_run,
            display: self.display,
            output: self.output,
            follow_symlinks: self.follow_symlinks,
            use_cache: !self.no_cache,
            instructions: self.instructions,
            max_file_count: self.max_file_count,
            max_lines: self.max_lines,
            max_characters: self.max_characters,
            ..Options::default()
        };
        #[cfg(feature = "clipboard")]
        {
            options.clipboard = self.clipboard;
        }
        if let Some(name) = self.profile {
            options.profile = ProfileSelection::Named(name);
        }
        if let Some(format) = self.format {
            options.format = format.parse::<OutputFormat>()?;
        }
        if let Some(sort) = self.sort {
            options.sort = Some(sort.parse::<SortKey>()?);
        }
        options.max_file_size = self.max_file_size.as_deref().map(parse_size).transpose()?;
        options.max_total_size = self.max_total_size.as_deref().map(parse_size).transpose()?;
        Ok((self.path, options))
    }
}

/// Parses a human-readable byte size like "512k" or "2MB".
fn parse_size(value: &str) -> Result<u64> {
    Byte::parse_str(value, true)
        .map(|byte| byte.as_u64())
        .map_err(|e| Error::Validation(format!("invalid size '{value}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("copytree").chain(args.iter().copied()))
    }

    #[test]
    fn defaults() {
        let (path, options) = parse(&[]).into_options().unwrap();
        assert_eq!(path, PathBuf::from("."));
        assert_eq!(options.format, OutputFormat::Xml);
        assert!(options.use_cache);
        assert!(!options.dry_run);
    }

    #[test]
    fn human_sizes_parse() {
        let (_, options) = parse(&["--max-file-size", "2k"]).into_options().unwrap();
        assert_eq!(options.max_file_size, Some(2000));
        assert!(parse(&["--max-file-size", "huge"]).into_options().is_err());
    }

    #[test]
    fn format_and_sort_validate() {
        let (_, options) = parse(&["--format", "ndjson", "--sort", "size"])
            .into_options()
            .unwrap();
        assert_eq!(options.format, OutputFormat::Ndjson);
        assert_eq!(options.sort, Some(SortKey::Size));
        assert!(parse(&["--format", "toml"]).into_options().is_err());
    }

    #[test]
    fn filters_collect() {
        let (_, options) = parse(&[
            "--filter",
            "src/**",
            "--exclude",
            "*.lock",
            "target/**",
        ])
        .into_options()
        .unwrap();
        assert_eq!(options.filter, vec!["src/**"]);
        assert_eq!(options.exclude, vec!["*.lock", "target/**"]);
    }

    #[test]
    fn named_profile_selection() {
        let (_, options) = parse(&["--profile", "docs"]).into_options().unwrap();
        assert!(matches!(
            options.profile,
            ProfileSelection::Named(ref name) if name == "docs"
        ));
    }
}
