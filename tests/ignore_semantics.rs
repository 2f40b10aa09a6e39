// tests/ignore_semantics.rs
//
// End-to-end gitignore semantics through the library API: negation under
// ignored directories, double-star patterns, brace expansion, and nested
// ignore layers.

mod common;

use common::create_file;
use copytree::{scan, Options, Result};
use tempfile::tempdir;

fn accepted_paths(base: &std::path::Path) -> Vec<String> {
    let options = Options {
        use_cache: false,
        ..Options::default()
    };
    scan(base, options)
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap()
        .into_iter()
        .map(|record| record.path)
        .collect()
}

#[test]
fn negation_cannot_reinclude_inside_ignored_dir() {
    let temp = tempdir().unwrap();
    create_file(temp.path(), ".gitignore", "build/\n!build/important.log\n");
    create_file(temp.path(), "build/important.log", "keep me?");

    assert_eq!(accepted_paths(temp.path()), Vec::<String>::new());
}

#[test]
fn double_star_pattern_matches_any_depth() {
    let temp = tempdir().unwrap();
    create_file(temp.path(), ".gitignore", "src/**/temp.txt\n");
    create_file(temp.path(), "src/a/b/temp.txt", "x");
    create_file(temp.path(), "src/temp.txt", "x");
    create_file(temp.path(), "src/a/keep.txt", "x");

    assert_eq!(accepted_paths(temp.path()), vec!["src/a/keep.txt"]);
}

#[test]
fn brace_expansion_in_ignore_file() {
    let temp = tempdir().unwrap();
    create_file(temp.path(), ".gitignore", "src/{foo,bar}/**/*.{js,jsx}\n");
    create_file(temp.path(), "src/foo/x/app.js", "x");
    create_file(temp.path(), "src/bar/x/app.jsx", "x");
    create_file(temp.path(), "src/baz/x/app.js", "x");

    assert_eq!(accepted_paths(temp.path()), vec!["src/baz/x/app.js"]);
}

#[test]
fn nested_ignore_layers_apply_in_order() {
    let temp = tempdir().unwrap();
    create_file(temp.path(), ".gitignore", "*.log\n");
    create_file(temp.path(), "logs/.gitignore", "!important.log\n");
    create_file(temp.path(), "logs/deep/.gitignore", "specific.log\n");
    create_file(temp.path(), "error.log", "x");
    create_file(temp.path(), "logs/important.log", "x");
    create_file(temp.path(), "logs/debug.log", "x");
    create_file(temp.path(), "logs/deep/important.log", "x");
    create_file(temp.path(), "logs/deep/specific.log", "x");

    assert_eq!(
        accepted_paths(temp.path()),
        vec!["logs/deep/important.log", "logs/important.log"]
    );
}

#[test]
fn copytreeignore_layers_after_gitignore() {
    let temp = tempdir().unwrap();
    create_file(temp.path(), ".gitignore", "*.tmp\n");
    create_file(temp.path(), ".copytreeignore", "!keep.tmp\n");
    create_file(temp.path(), "keep.tmp", "x");
    create_file(temp.path(), "drop.tmp", "x");

    assert_eq!(accepted_paths(temp.path()), vec!["keep.tmp"]);
}

#[test]
fn legacy_ctreeignore_is_an_alias() {
    let temp = tempdir().unwrap();
    create_file(temp.path(), ".ctreeignore", "secret/\n");
    create_file(temp.path(), "secret/key.txt", "x");
    create_file(temp.path(), "open.txt", "x");

    assert_eq!(accepted_paths(temp.path()), vec!["open.txt"]);
}

#[test]
fn no_rules_accepts_all_regular_files() {
    let temp = tempdir().unwrap();
    create_file(temp.path(), "a.txt", "x");
    create_file(temp.path(), "sub/b.txt", "x");
    create_file(temp.path(), "node_modules/pkg/c.js", "x");

    // Everything except the built-in global excludes.
    assert_eq!(accepted_paths(temp.path()), vec!["a.txt", "sub/b.txt"]);
}
